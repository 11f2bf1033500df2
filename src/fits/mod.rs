//! Helper functions for reading and writing FITS images and their headers.
//!
//! Header cards are moved around as raw 80-character records, so anything that
//! isn't explicitly changed survives a read-write cycle untouched.

mod error;
pub mod header;

pub use error::FitsError;
pub use header::{Card, FitsHeader, HeaderError, HeaderValue};

use std::{
    ffi::{CStr, CString},
    fmt::Display,
    os::raw::{c_char, c_int},
    path::Path,
};

use fitsio::{
    hdu::{DescribesHdu, FitsHdu, HduInfo},
    images::{ImageDescription, ImageType},
    FitsFile,
};
use log::trace;
use ndarray::Array2;

/// The length of a FITS header card, plus a NUL terminator.
const FLEN_CARD: usize = 81;

/// Open a fits file.
#[track_caller]
pub(crate) fn fits_open<P: AsRef<Path>>(file: P) -> Result<FitsFile, FitsError> {
    FitsFile::open(file.as_ref()).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Open {
            fits_error: Box::new(e),
            fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Open a fits file's HDU.
#[track_caller]
pub(crate) fn fits_open_hdu<T: DescribesHdu + Display + Copy>(
    fits_fptr: &mut FitsFile,
    hdu_description: T,
) -> Result<FitsHdu, FitsError> {
    fits_fptr.hdu(hdu_description).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Fitsio {
            fits_error: Box::new(e),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_description: format!("{hdu_description}").into_boxed_str(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Read every header card of the current HDU, in order, excluding END.
#[track_caller]
pub(crate) fn fits_get_header(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<FitsHeader, FitsError> {
    let caller = std::panic::Location::caller();
    let card_error = |e: fitsio::errors::Error, filename: &Path, card_num: usize| FitsError::Card {
        fits_error: Box::new(e),
        fits_filename: filename.to_path_buf().into_boxed_path(),
        card_num,
        source_file: caller.file(),
        source_line: caller.line(),
        source_column: caller.column(),
    };

    // Make sure cfitsio is looking at the right HDU.
    fits_open_hdu(fits_fptr, hdu.number)?;

    let mut status = 0;
    let mut num_keys: c_int = 0;
    let mut num_more: c_int = 0;
    unsafe {
        // ffghsp = fits_get_hdrspace
        fitsio_sys::ffghsp(
            fits_fptr.as_raw(),
            &mut num_keys,
            &mut num_more,
            &mut status,
        );
    }
    fitsio::errors::check_status(status)
        .map_err(|e| card_error(e, fits_fptr.file_path(), 0))?;
    trace!("{} header cards in HDU {}", num_keys, hdu.number + 1);

    let mut cards = Vec::with_capacity(num_keys as usize);
    for i_card in 1..=num_keys {
        let mut buffer = [0 as c_char; FLEN_CARD];
        unsafe {
            // ffgrec = fits_read_record
            fitsio_sys::ffgrec(
                fits_fptr.as_raw(),
                i_card,
                buffer.as_mut_ptr(),
                &mut status,
            );
        }
        fitsio::errors::check_status(status)
            .map_err(|e| card_error(e, fits_fptr.file_path(), i_card as usize))?;
        let record = unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy();
        cards.push(Card::from_record(&record));
    }

    Ok(FitsHeader::from_cards(cards))
}

/// Given a FITS file pointer and a HDU, read the associated image as a 2D
/// array of doubles. Degenerate axes beyond the first two (e.g. frequency and
/// Stokes axes of length 1) are squeezed out.
#[track_caller]
pub(crate) fn fits_get_image_2d(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<Array2<f64>, FitsError> {
    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.clone(),
        _ => {
            let caller = std::panic::Location::caller();
            return Err(FitsError::NotImage {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            });
        }
    };
    // fitsio reports the slowest-varying axis first, so NAXIS1 is last. Only
    // the axes before the last two may be squeezed.
    let (ny, nx) = match shape.as_slice() {
        [leading @ .., ny, nx] if leading.iter().all(|&n| n == 1) => (*ny, *nx),
        _ => {
            return Err(FitsError::Not2D {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                shape,
            })
        }
    };

    let data: Vec<f64> = hdu.read_image(fits_fptr).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Fitsio {
            fits_error: Box::new(e),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })?;

    Array2::from_shape_vec((ny, nx), data).map_err(|_| FitsError::Not2D {
        fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
        hdu_num: hdu.number + 1,
        shape,
    })
}

/// Create a new fits file whose primary HDU is a 2D double-precision image of
/// the given `(ny, nx)` shape. The file must not already exist.
#[track_caller]
pub(crate) fn fits_create_image<P: AsRef<Path>>(
    file: P,
    (ny, nx): (usize, usize),
) -> Result<FitsFile, FitsError> {
    let image_description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[ny, nx],
    };
    FitsFile::create(file.as_ref())
        .with_custom_primary(&image_description)
        .open()
        .map_err(|e| {
            let caller = std::panic::Location::caller();
            FitsError::Create {
                fits_error: Box::new(e),
                fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            }
        })
}

/// Append raw header cards to the current HDU, in order.
#[track_caller]
pub(crate) fn fits_write_cards<'a, I: IntoIterator<Item = &'a Card>>(
    fits_fptr: &mut FitsFile,
    cards: I,
) -> Result<(), FitsError> {
    for (i_card, card) in cards.into_iter().enumerate() {
        let record =
            CString::new(card.as_str()).expect("header cards are printable ASCII without NULs");
        let mut status = 0;
        unsafe {
            // ffprec = fits_write_record
            fitsio_sys::ffprec(fits_fptr.as_raw(), record.as_ptr(), &mut status);
        }
        if let Err(e) = fitsio::errors::check_status(status) {
            let caller = std::panic::Location::caller();
            return Err(FitsError::Card {
                fits_error: Box::new(e),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                card_num: i_card + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            });
        }
    }

    Ok(())
}

/// Given a FITS file pointer and a HDU, write the image.
#[track_caller]
pub(crate) fn fits_write_image(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    data: &[f64],
) -> Result<(), FitsError> {
    match &hdu.info {
        HduInfo::ImageInfo { .. } => hdu.write_image(fits_fptr, data).map_err(|e| {
            let caller = std::panic::Location::caller();
            FitsError::Fitsio {
                fits_error: Box::new(e),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            }
        }),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::NotImage {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}
