pub mod evaluation;

pub use evaluation::{read_config_file, Config, ConfigError};
