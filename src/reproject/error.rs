//! Errors associated with reprojecting solar images.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReprojectError {
    #[error("Couldn't transform the image: {reason}")]
    TransformFailed { reason: String },
}

impl ReprojectError {
    pub(crate) fn failed<S: Into<String>>(reason: S) -> ReprojectError {
        ReprojectError::TransformFailed {
            reason: reason.into(),
        }
    }
}
