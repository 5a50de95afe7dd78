//! Crate-wide error type
//!
//! Each component reports failures through its own small error enum; `Error`
//! gathers them so that session-level operations can use `?` throughout.

use thiserror::Error;

use crate::types::Shape;

pub use crate::acquisition::{InvalidWindowError, LoadError};
pub use crate::config::ConfigError;
pub use crate::decay::DecayError;
pub use crate::plot::PlotError;
pub use crate::quadrature::IntegrationError;
pub use crate::quantify::QuantifyError;
pub use crate::timeline::TimeParseError;
pub use crate::uptake::FitError;

/// Two images which must be conformable have different shapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("arrays are not conformable: {left:?} vs {right:?}")]
pub struct ShapeMismatchError {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

impl ShapeMismatchError {
    pub fn new(left: &[usize], right: &[usize]) -> Self {
        Self { left: left.to_vec(), right: right.to_vec() }
    }

    pub fn check(left: Shape, right: Shape) -> std::result::Result<(), Self> {
        if left == right { Ok(()) } else { Err(Self::new(&[left.0, left.1], &[right.0, right.1])) }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)] Load         (#[from] LoadError),
    #[error(transparent)] Shape        (#[from] ShapeMismatchError),
    #[error(transparent)] InvalidWindow(#[from] InvalidWindowError),
    #[error(transparent)] Decay        (#[from] DecayError),
    #[error(transparent)] TimeParse    (#[from] TimeParseError),
    #[error(transparent)] Fit          (#[from] FitError),
    #[error(transparent)] Integration  (#[from] IntegrationError),
    #[error(transparent)] Quantify     (#[from] QuantifyError),
    #[error(transparent)] Config       (#[from] ConfigError),
    #[error(transparent)] Plot         (#[from] PlotError),

    #[error("could not write image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error on `{path}`: {source}")]
    Io { path: std::path::PathBuf, #[source] source: std::io::Error },

    #[error("no acquisition with index {index}: session holds {len}")]
    NoSuchAcquisition { index: usize, len: usize },

    #[error("session holds no acquisitions")]
    EmptySession,

    #[error("no time-activity samples available yet")]
    NoTimeActivity,

    #[error("no uptake fit available yet")]
    NoFit,
}

pub type Result<T> = std::result::Result<T, Error>;
