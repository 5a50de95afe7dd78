pub mod types;
pub mod error;
pub mod io;
pub mod acquisition;
pub mod gauss;
pub mod registration;
pub mod lambert;
pub mod deadtime;
pub mod tew;
pub mod decay;
pub mod timeline;
pub mod roi;
pub mod quadrature;
pub mod uptake;
pub mod dose;
pub mod calibration;
pub mod quantify;
pub mod config;
pub mod session;
pub mod evaluate;
pub mod plot;
pub mod report;
pub mod utils;

pub use types::{Image, Mask, Vertex};
pub use error::{Error, Result, ShapeMismatchError};
pub use acquisition::{Acquisition, Projection, Window};
pub use registration::Shift;
pub use uptake::{Rates, UptakeFit};
pub use session::Session;

pub type BoxErr<T> = std::result::Result<T, Box<dyn std::error::Error>>;
