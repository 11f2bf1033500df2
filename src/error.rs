//! Error type for all eovsa_synop-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynopError {
    #[error("{0}")]
    Image(#[from] crate::image::ImageError),

    #[error("{0}")]
    Header(#[from] crate::fits::HeaderError),

    #[error("{0}")]
    Fits(#[from] crate::fits::FitsError),

    #[error("{0}")]
    Reproject(#[from] crate::reproject::ReprojectError),

    #[error("{0}")]
    Rotate(#[from] crate::rotate::RotateError),

    #[error("{0}")]
    Wsclean(#[from] crate::wsclean::WscleanError),

    #[error("{0}")]
    Ms(#[from] crate::ms::MsError),

    #[error("{0}")]
    Date(#[from] crate::time::DateParseError),
}
