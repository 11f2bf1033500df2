//! Parsing and formatting of FITS-style date strings.

use std::str::FromStr;

use hifitime::{Epoch, TimeUnits};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Couldn't parse '{input}' as a date; expected YYYY-MM-DDThh:mm:ss[.fff]: {err}")]
pub struct DateParseError {
    pub input: String,
    pub err: hifitime::Errors,
}

/// Parse a UTC date string like those found in DATE-OBS. Both the ISO-8601
/// `T` separator and a space are accepted, as is a date without a time, a
/// trailing "Z" or a trailing time scale (e.g. " UTC").
pub fn parse_utc_date(s: &str) -> Result<Epoch, DateParseError> {
    Epoch::from_str(s.trim()).map_err(|err| DateParseError {
        input: s.to_string(),
        err,
    })
}

/// Format an [`Epoch`] as a UTC ISO-8601 string with millisecond precision,
/// e.g. "2024-12-15T20:00:00.000".
pub fn format_utc_date(epoch: Epoch) -> String {
    let rounded = epoch.round(1.milliseconds());
    let (year, month, day, hour, minute, second, nanos) = rounded.to_gregorian_utc();
    let millis = nanos / 1_000_000;
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_date() {
        let expected = Epoch::from_gregorian_utc(2024, 12, 15, 20, 0, 30, 250_000_000);
        for s in [
            "2024-12-15T20:00:30.25",
            "2024-12-15 20:00:30.250",
            " 2024-12-15T20:00:30.250Z ",
            "2024-12-15T20:00:30.250 UTC",
        ] {
            assert_eq!(parse_utc_date(s).unwrap(), expected, "{s}");
        }

        assert_eq!(
            parse_utc_date("2024-12-15").unwrap(),
            Epoch::from_gregorian_utc_at_midnight(2024, 12, 15)
        );
    }

    #[test]
    fn test_parse_utc_date_rejects_garbage() {
        for s in ["", "yesterday", "2024-13-01T00:00:00", "2024-12-15T25:00:00", "2024-12-15T20:00:00:00"] {
            assert!(parse_utc_date(s).is_err(), "{s}");
        }
    }

    #[test]
    fn test_format_utc_date() {
        let e = Epoch::from_gregorian_utc(2024, 12, 15, 20, 0, 30, 250_400_000);
        assert_eq!(format_utc_date(e), "2024-12-15T20:00:30.250");
        assert_eq!(parse_utc_date(&format_utc_date(e)).unwrap(), e.round(1.milliseconds()));
    }
}
