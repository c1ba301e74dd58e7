use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use crate::element_set::ElementSet;

/// Both data lines must reach at least this column for every field to be addressable.
pub const MIN_LINE_LENGTH: usize = 68;

/// Two-digit epoch years below this value are in the 2000s, the rest in the 1900s.
/// This is the historical convention of the format and will misfile epochs from 2057 onwards.
pub const EPOCH_YEAR_PIVOT: u8 = 57;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

// Column ranges, zero-based and end-exclusive.
const CATALOG_ID: Range<usize> = 2..7;
const CLASSIFICATION: Range<usize> = 7..8;
const INTERNATIONAL_DESIGNATOR: Range<usize> = 9..17;
const EPOCH_YEAR: Range<usize> = 18..20;
const EPOCH_DAY: Range<usize> = 20..32;
const MEAN_MOTION_DOT: Range<usize> = 33..43;
const MEAN_MOTION_DDOT: Range<usize> = 44..52;
const DRAG_TERM: Range<usize> = 53..61;

const INCLINATION: Range<usize> = 8..16;
const RAAN: Range<usize> = 17..25;
const ECCENTRICITY: Range<usize> = 26..33;
const ARG_PERIGEE: Range<usize> = 34..42;
const MEAN_ANOMALY: Range<usize> = 43..51;
const MEAN_MOTION: Range<usize> = 52..63;
const REV_NUMBER: Range<usize> = 63..68;

/// The required fields of an element set. A failure to parse any of these rejects the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CatalogId,
    Classification,
    InternationalDesignator,
    EpochYear,
    EpochDay,
    Inclination,
    RightAscension,
    Eccentricity,
    ArgumentOfPerigee,
    MeanAnomaly,
    MeanMotion,
    RevolutionNumber,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CatalogId => "catalog_id",
            Field::Classification => "classification",
            Field::InternationalDesignator => "international_designator",
            Field::EpochYear => "epoch_year",
            Field::EpochDay => "epoch_day",
            Field::Inclination => "inclination",
            Field::RightAscension => "raan",
            Field::Eccentricity => "eccentricity",
            Field::ArgumentOfPerigee => "arg_perigee",
            Field::MeanAnomaly => "mean_anomaly",
            Field::MeanMotion => "mean_motion",
            Field::RevolutionNumber => "rev_number",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumeration of reasons an element set could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line {line} has {len} characters but at least {MIN_LINE_LENGTH} are required")]
    Truncated { line: u8, len: usize },
    #[error("line {line} contains non-ASCII characters")]
    NotAscii { line: u8 },
    #[error("field {0} could not be parsed")]
    FieldInvalid(Field),
}

/// The drag term did not follow either the exponent or the plain decimal notation.
/// This never fails a record: the drag term is left unknown instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("drag term {raw:?} could not be parsed")]
pub struct DragTermUnparseable {
    pub raw: String,
}

/// Decode one element set from its two data lines.
///
/// Fields are extracted by column position, so both lines must be ASCII. Any required field that
/// does not parse rejects the whole record; the drag term and the mean motion derivatives degrade
/// to `None` instead.
///
/// # Arguments
///
/// * `line1`: First data line, at least `MIN_LINE_LENGTH` characters.
/// * `line2`: Second data line, at least `MIN_LINE_LENGTH` characters.
/// * `name`: The name line preceding the data lines, stored as given.
/// * `fetched_at`: When the payload containing this record was fetched.
pub fn decode(
    line1: &str,
    line2: &str,
    name: &str,
    fetched_at: DateTime<Utc>,
) -> Result<ElementSet, DecodeError> {
    ensure_well_formed(line1, 1)?;
    ensure_well_formed(line2, 2)?;

    let catalog_id: i64 = parse_field(line1, CATALOG_ID, Field::CatalogId)?;
    let classification = column(line1, CLASSIFICATION, Field::Classification)?
        .chars()
        .next()
        .ok_or(DecodeError::FieldInvalid(Field::Classification))?;
    let international_designator = column(
        line1,
        INTERNATIONAL_DESIGNATOR,
        Field::InternationalDesignator,
    )?
    .trim()
    .to_owned();

    let epoch_year: u8 = parse_field(line1, EPOCH_YEAR, Field::EpochYear)?;
    let epoch_day = parse_real(line1, EPOCH_DAY, Field::EpochDay)?;
    let epoch = epoch_from_parts(epoch_year, epoch_day)
        .ok_or(DecodeError::FieldInvalid(Field::EpochDay))?;

    let mean_motion_dot = line1
        .get(MEAN_MOTION_DOT)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite());
    let mean_motion_ddot = line1.get(MEAN_MOTION_DDOT).and_then(parse_exponent_notation);
    let drag_term = match parse_drag_term(line1.get(DRAG_TERM).unwrap_or_default()) {
        Ok(drag_term) => Some(drag_term),
        Err(error) => {
            debug!(catalog_id, "{}", error);
            None
        }
    };

    Ok(ElementSet {
        catalog_id,
        name: name.to_owned(),
        classification,
        international_designator,
        epoch,
        fetched_at,
        mean_motion_dot,
        mean_motion_ddot,
        drag_term,
        inclination_deg: parse_real(line2, INCLINATION, Field::Inclination)?,
        raan_deg: parse_real(line2, RAAN, Field::RightAscension)?,
        eccentricity: parse_eccentricity(line2)?,
        arg_perigee_deg: parse_real(line2, ARG_PERIGEE, Field::ArgumentOfPerigee)?,
        mean_anomaly_deg: parse_real(line2, MEAN_ANOMALY, Field::MeanAnomaly)?,
        mean_motion_rev_per_day: parse_real(line2, MEAN_MOTION, Field::MeanMotion)?,
        rev_number: parse_field(line2, REV_NUMBER, Field::RevolutionNumber)?,
        line1: line1.to_owned(),
        line2: line2.to_owned(),
    })
}

/// Rebuild an absolute epoch from a two-digit year and a fractional, one-based day of year.
/// Sub-day precision is kept down to the microsecond.
pub fn epoch_from_parts(two_digit_year: u8, day_of_year: f64) -> Option<DateTime<Utc>> {
    let full_year = if two_digit_year < EPOCH_YEAR_PIVOT {
        2000 + i32::from(two_digit_year)
    } else {
        1900 + i32::from(two_digit_year)
    };

    let micros = ((day_of_year - 1.0) * MICROS_PER_DAY).round();
    if !micros.is_finite() {
        return None;
    }

    NaiveDate::from_ymd_opt(full_year, 1, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc()
        .checked_add_signed(Duration::microseconds(micros as i64))
}

/// Decode a drag term field, e.g. `44559-4` for `0.44559e-4`.
pub fn parse_drag_term(raw: &str) -> Result<f64, DragTermUnparseable> {
    parse_exponent_notation(raw).ok_or_else(|| DragTermUnparseable {
        raw: raw.trim().to_owned(),
    })
}

/// Parse the compact mantissa/exponent notation used by the drag term and the second
/// derivative of mean motion.
///
/// When the second to last character is a sign, the last two characters are the exponent and
/// the rest is an optionally signed run of digits with an implied leading `0.`. Anything else
/// is read as a plain decimal, ignoring embedded blanks.
pub fn parse_exponent_notation(raw: &str) -> Option<f64> {
    let field = raw.trim();
    let bytes = field.as_bytes();

    let value = if bytes.len() >= 2 && matches!(bytes[bytes.len() - 2], b'+' | b'-') {
        let (mantissa, exponent) = field.split_at(field.len() - 2);
        let (sign, digits) = match mantissa.strip_prefix('-') {
            Some(digits) => ("-", digits),
            None => ("", mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        format!("{sign}0.{digits}e{exponent}").parse::<f64>().ok()?
    } else {
        let compact: String = field.chars().filter(|c| !c.is_whitespace()).collect();
        compact.parse::<f64>().ok()?
    };

    value.is_finite().then_some(value)
}

// Columns are byte offsets, which only line up with characters on ASCII input.
fn ensure_well_formed(line: &str, line_number: u8) -> Result<(), DecodeError> {
    if !line.is_ascii() {
        return Err(DecodeError::NotAscii { line: line_number });
    }

    let len = line.len();
    if len < MIN_LINE_LENGTH {
        return Err(DecodeError::Truncated {
            line: line_number,
            len,
        });
    }
    Ok(())
}

fn column(line: &str, range: Range<usize>, field: Field) -> Result<&str, DecodeError> {
    line.get(range).ok_or(DecodeError::FieldInvalid(field))
}

fn parse_field<T: FromStr>(line: &str, range: Range<usize>, field: Field) -> Result<T, DecodeError> {
    column(line, range, field)?
        .trim()
        .parse()
        .map_err(|_| DecodeError::FieldInvalid(field))
}

fn parse_real(line: &str, range: Range<usize>, field: Field) -> Result<f64, DecodeError> {
    let value: f64 = parse_field(line, range, field)?;
    if !value.is_finite() {
        return Err(DecodeError::FieldInvalid(field));
    }
    Ok(value)
}

// The field never carries the decimal point, so the value is always in [0, 1).
fn parse_eccentricity(line2: &str) -> Result<f64, DecodeError> {
    let digits = column(line2, ECCENTRICITY, Field::Eccentricity)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::FieldInvalid(Field::Eccentricity));
    }

    format!("0.{digits}")
        .parse()
        .map_err(|_| DecodeError::FieldInvalid(Field::Eccentricity))
}
