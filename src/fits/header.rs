//! An ordered collection of FITS header cards.
//!
//! Cards are kept as their raw 80-character records. Values are parsed on
//! demand, and only cards that are explicitly set get re-rendered.

use std::{ffi::CStr, fmt::Display, os::raw::c_char};

use log::trace;
use thiserror::Error;

use super::FLEN_CARD;

/// The number of characters in a FITS header card.
pub const CARD_LEN: usize = 80;

/// cfitsio's buffer sizes for a card's value and comment, including the NUL.
const FLEN_VALUE: usize = 71;
const FLEN_COMMENT: usize = 73;

/// Keywords describing the data layout. These are regenerated by cfitsio for
/// whatever array is written, so they are never copied from a template.
const STRUCTURAL_KEYWORDS: [&str; 8] = [
    "SIMPLE", "BITPIX", "NAXIS", "EXTEND", "BSCALE", "BZERO", "BLANK", "END",
];

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Header key {key} has value '{value}', which couldn't be parsed as a {expected}")]
    Parse {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Refusing to write a non-finite value ({value}) to header key {key}")]
    NonFinite { key: String, value: f64 },
}

/// A single 80-character header card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card(String);

impl Card {
    /// Create a card from a raw record. Non-printable and non-ASCII characters
    /// are replaced with spaces, and the record is padded or truncated to
    /// [`CARD_LEN`].
    pub fn from_record(record: &str) -> Card {
        let mut card: String = record
            .chars()
            .take(CARD_LEN)
            .map(|c| if c.is_ascii_graphic() { c } else { ' ' })
            .collect();
        let len = card.len();
        card.extend(std::iter::repeat(' ').take(CARD_LEN - len));
        Card(card)
    }

    /// Render a new value card for `keyword`.
    pub fn new_value(keyword: &str, value: &HeaderValue, comment: Option<&str>) -> Card {
        // Strings start in column 11; everything else is right justified to
        // column 30.
        let mut record = match value {
            HeaderValue::Str(_) => format!("{keyword:<8}= {:<20}", value.render()),
            _ => format!("{keyword:<8}= {:>20}", value.render()),
        };
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            record.push_str(" / ");
            record.push_str(comment);
        }
        Card::from_record(&record)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn keyword(&self) -> &str {
        self.0[..8].trim_end()
    }

    /// Does this card carry a value (columns 9-10 are "= ")?
    pub fn has_value(&self) -> bool {
        &self.0[8..10] == "= "
    }

    /// The value and comment fields of the card as split by cfitsio, if it
    /// has a value. String values keep their quotes.
    fn split_value_comment(&self) -> Option<(String, Option<String>)> {
        if !self.has_value() {
            return None;
        }
        let mut record = [0 as c_char; FLEN_CARD];
        for (dst, b) in record.iter_mut().zip(self.0.bytes()) {
            *dst = b as c_char;
        }
        let mut value = [0 as c_char; FLEN_VALUE];
        let mut comment = [0 as c_char; FLEN_COMMENT];
        let mut status = 0;
        unsafe {
            // ffpsvc = fits_parse_value
            fitsio_sys::ffpsvc(
                record.as_mut_ptr(),
                value.as_mut_ptr(),
                comment.as_mut_ptr(),
                &mut status,
            );
        }
        if status != 0 {
            trace!("cfitsio couldn't split the value of '{self}' (status {status})");
            return None;
        }
        let value = unsafe { CStr::from_ptr(value.as_ptr()) }
            .to_string_lossy()
            .trim()
            .to_string();
        let comment = unsafe { CStr::from_ptr(comment.as_ptr()) }
            .to_string_lossy()
            .trim()
            .to_string();
        Some((value, Some(comment).filter(|c| !c.is_empty())))
    }

    /// The value of the card, with string quotes removed.
    pub fn value(&self) -> Option<String> {
        self.split_value_comment().map(|(v, _)| unquote(&v))
    }

    pub fn comment(&self) -> Option<String> {
        self.split_value_comment().and_then(|(_, c)| c)
    }

    /// Is this one of the cards describing the data layout?
    pub fn is_structural(&self) -> bool {
        let keyword = self.keyword();
        if STRUCTURAL_KEYWORDS.contains(&keyword) {
            return true;
        }
        // NAXISn
        keyword
            .strip_prefix("NAXIS")
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.trim_end())
    }
}

/// A value to be written into a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Float(f64),
    Int(i64),
    Str(String),
    Logical(bool),
}

impl HeaderValue {
    fn render(&self) -> String {
        match self {
            HeaderValue::Float(f) => render_float(*f),
            HeaderValue::Int(i) => i.to_string(),
            HeaderValue::Logical(true) => "T".to_string(),
            HeaderValue::Logical(false) => "F".to_string(),
            HeaderValue::Str(s) => {
                // At least 8 characters inside the quotes.
                let escaped = s.replace('\'', "''");
                format!("'{escaped:<8}'")
            }
        }
    }
}

/// Strip the quotes from a string value and undo doubled quotes. Trailing spaces
/// inside the quotes aren't significant.
fn unquote(value: &str) -> String {
    match value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'").trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Render a float so that it always reads back as a float and round-trips
/// exactly.
fn render_float(f: f64) -> String {
    let plain = format!("{f:?}");
    if f == 0.0 || ((1e-4..1e15).contains(&f.abs()) && plain.len() <= 20) {
        plain
    } else {
        format!("{f:E}")
    }
}

/// The header of a FITS HDU, as an ordered list of cards. END is implicit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<Card>,
}

impl FitsHeader {
    pub fn from_cards(cards: Vec<Card>) -> FitsHeader {
        FitsHeader {
            cards: cards.into_iter().filter(|c| c.keyword() != "END").collect(),
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Cards that should be carried into a newly-written file.
    pub fn non_structural_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| !c.is_structural())
    }

    /// The first value card with the keyword `key`.
    pub fn get(&self, key: &str) -> Option<&Card> {
        self.cards
            .iter()
            .find(|c| c.has_value() && c.keyword() == key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|c| c.value())
    }

    /// Get a float-valued key. Fortran-style `D` exponents are accepted.
    /// Absent keys and empty values are `Ok(None)`.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, HeaderError> {
        let value = match self.get_str(key) {
            Some(v) if !v.is_empty() => v,
            _ => return Ok(None),
        };
        match value.replace(['D', 'd'], "E").parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Some(f)),
            _ => Err(HeaderError::Parse {
                key: key.to_string(),
                value,
                expected: "finite float",
            }),
        }
    }

    /// Set a key's value. An existing card is replaced where it is (keeping
    /// its comment); otherwise a new card is appended.
    pub fn set(&mut self, key: &str, value: HeaderValue) -> Result<(), HeaderError> {
        if let HeaderValue::Float(f) = value {
            if !f.is_finite() {
                return Err(HeaderError::NonFinite {
                    key: key.to_string(),
                    value: f,
                });
            }
        }

        match self
            .cards
            .iter()
            .position(|c| c.has_value() && c.keyword() == key)
        {
            Some(i) => {
                let comment = self.cards[i].comment();
                let card = Card::new_value(key, &value, comment.as_deref());
                trace!("Replacing '{}' with '{card}'", self.cards[i]);
                self.cards[i] = card;
            }
            None => {
                let card = Card::new_value(key, &value, None);
                trace!("Appending '{card}'");
                self.cards.push(card);
            }
        }
        Ok(())
    }
}
