//! Errors associated with reading and writing FITS files.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitsError {
    /// Error when opening a fits file.
    #[error(
        "{source_file}:{source_line}:{source_column}: Couldn't open {fits_filename}: {fits_error}"
    )]
    Open {
        fits_error: Box<fitsio::errors::Error>,
        fits_filename: Box<Path>,
        source_file: &'static str,
        source_line: u32,
        source_column: u32,
    },

    /// Error when creating a new fits file.
    #[error(
        "{source_file}:{source_line}:{source_column}: Couldn't create {fits_filename}: {fits_error}"
    )]
    Create {
        fits_error: Box<fitsio::errors::Error>,
        fits_filename: Box<Path>,
        source_file: &'static str,
        source_line: u32,
        source_column: u32,
    },

    /// Error describing a HDU that couldn't be used as an image (e.g. `HduInfo::ImageInfo`).
    #[error("{source_file}:{source_line}:{source_column}: {fits_filename} HDU {hdu_num}: Tried to use as an image, but not an image")]
    NotImage {
        fits_filename: Box<Path>,
        hdu_num: usize,
        source_file: &'static str,
        source_line: u32,
        source_column: u32,
    },

    /// The image has more than two non-degenerate axes.
    #[error("{fits_filename} HDU {hdu_num}: Expected a 2D image (degenerate axes allowed), but the shape is {shape:?}")]
    Not2D {
        fits_filename: Box<Path>,
        hdu_num: usize,
        shape: Vec<usize>,
    },

    /// A header card couldn't be read or written.
    #[error("{source_file}:{source_line}:{source_column}: {fits_filename}: Header card {card_num}: {fits_error}")]
    Card {
        fits_error: Box<fitsio::errors::Error>,
        fits_filename: Box<Path>,
        card_num: usize,
        source_file: &'static str,
        source_line: u32,
        source_column: u32,
    },

    /// A generic error associated with the fitsio crate.
    #[error(
        "{source_file}:{source_line}:{source_column}: {fits_filename} HDU '{hdu_description}': {fits_error}"
    )]
    Fitsio {
        fits_error: Box<fitsio::errors::Error>,
        fits_filename: Box<Path>,
        hdu_description: Box<str>,
        source_file: &'static str,
        source_line: u32,
        source_column: u32,
    },
}
