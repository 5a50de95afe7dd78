pub mod raw;
pub mod stack;
