//! Serial command grammar.
//!
//! A command line has exactly three colon-separated fields:
//!
//! ```text
//! LED:<count>:<freq>
//! ```
//!
//! The tag must match [`COMMAND_TAG`] byte for byte. Numeric fields are read
//! the way a C `atoi` would read them: leading whitespace and a single `+` are
//! skipped, then the leading run of decimal digits is the value. A field with
//! no digits there (including a `-` sign) reads as zero. Zero is never in
//! range, so non-numeric or negative input always fails validation, and the
//! frequency is range-checked before anything divides by it.

use core::fmt;

use winnow::ModalResult;
use winnow::ascii::digit0;
use winnow::combinator::{opt, preceded};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::pattern::{BlinkSpec, COUNT_RANGE, FREQUENCY_RANGE, SpecError};

/// Literal device tag expected in the first field.
pub const COMMAND_TAG: &[u8] = b"LED";
/// Field separator.
pub const FIELD_SEPARATOR: u8 = b':';

/// Positional command fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Tag,
    Count,
    Frequency,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Tag => f.write_str("tag"),
            Field::Count => f.write_str("count"),
            Field::Frequency => f.write_str("frequency"),
        }
    }
}

/// Reasons a command line is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// Line ended before the named field.
    MissingField(Field),
    /// First field was not [`COMMAND_TAG`].
    TagMismatch,
    /// More than three fields were supplied.
    TrailingField,
    /// Count decoded outside [`COUNT_RANGE`].
    CountOutOfRange(u32),
    /// Frequency decoded outside [`FREQUENCY_RANGE`].
    FrequencyOutOfRange(u32),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingField(field) => write!(f, "missing {field} field"),
            ParseError::TagMismatch => f.write_str("unknown device tag"),
            ParseError::TrailingField => f.write_str("unexpected trailing field"),
            ParseError::CountOutOfRange(count) => {
                write!(f, "count {count} outside {COUNT_RANGE:?}")
            }
            ParseError::FrequencyOutOfRange(freq) => {
                write!(f, "frequency {freq} outside {FREQUENCY_RANGE:?}")
            }
        }
    }
}

impl From<SpecError> for ParseError {
    fn from(error: SpecError) -> Self {
        match error {
            SpecError::CountOutOfRange(count) => ParseError::CountOutOfRange(count),
            SpecError::FrequencyOutOfRange(freq) => ParseError::FrequencyOutOfRange(freq),
        }
    }
}

/// Raw, not yet validated command fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct RawFields<'a> {
    tag: &'a [u8],
    count: &'a [u8],
    frequency: &'a [u8],
}

fn field<'a>(input: &mut &'a [u8]) -> ModalResult<&'a [u8]> {
    take_till(0.., FIELD_SEPARATOR).parse_next(input)
}

fn separated_field<'a>(input: &mut &'a [u8]) -> ModalResult<&'a [u8]> {
    preceded(FIELD_SEPARATOR, field).parse_next(input)
}

fn split_fields(line: &[u8]) -> Result<RawFields<'_>, ParseError> {
    let mut input = line;
    let tag = field
        .parse_next(&mut input)
        .map_err(|_| ParseError::MissingField(Field::Tag))?;
    let count = separated_field
        .parse_next(&mut input)
        .map_err(|_| ParseError::MissingField(Field::Count))?;
    let frequency = separated_field
        .parse_next(&mut input)
        .map_err(|_| ParseError::MissingField(Field::Frequency))?;

    if !input.is_empty() {
        return Err(ParseError::TrailingField);
    }

    Ok(RawFields {
        tag,
        count,
        frequency,
    })
}

// C `isspace`: space, \t, \n, \v, \f, \r.
fn is_c_space(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0x0b
}

fn unsigned_digits<'i>(input: &mut &'i [u8]) -> ModalResult<&'i [u8]> {
    preceded((take_while(0.., is_c_space), opt(b'+')), digit0).parse_next(input)
}

/// Decodes the leading decimal digits of `field`, saturating on overflow.
///
/// Leading whitespace and one `+` are skipped first. A field without digits
/// after that decodes to zero.
#[must_use]
pub fn decimal_prefix(field: &[u8]) -> u32 {
    let mut input = field;
    let digits = unsigned_digits(&mut input).unwrap_or_default();

    digits.iter().fold(0u32, |value, digit| {
        value
            .saturating_mul(10)
            .saturating_add(u32::from(digit - b'0'))
    })
}

/// Parses and validates a completed command line.
///
/// # Errors
///
/// Returns a [`ParseError`] when a field is missing, the tag differs from
/// [`COMMAND_TAG`], a fourth field is present, or either number is out of
/// range.
pub fn parse_command(line: &[u8]) -> Result<BlinkSpec, ParseError> {
    let fields = split_fields(line)?;

    if fields.tag != COMMAND_TAG {
        return Err(ParseError::TagMismatch);
    }

    let count = decimal_prefix(fields.count);
    let frequency = decimal_prefix(fields.frequency);
    Ok(BlinkSpec::new(count, frequency)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_command() {
        let spec = parse_command(b"LED:3:10").expect("command should parse");
        assert_eq!(spec.count(), 3);
        assert_eq!(spec.frequency_hz(), 10);
    }

    #[test]
    fn decimal_prefix_follows_atoi() {
        assert_eq!(decimal_prefix(b"42"), 42);
        assert_eq!(decimal_prefix(b"7x"), 7);
        assert_eq!(decimal_prefix(b"x7"), 0);
        assert_eq!(decimal_prefix(b""), 0);
        assert_eq!(decimal_prefix(b"-5"), 0);
        assert_eq!(decimal_prefix(b" 5"), 5);
        assert_eq!(decimal_prefix(b"\t\x0b 12x"), 12);
        assert_eq!(decimal_prefix(b"+7"), 7);
        assert_eq!(decimal_prefix(b" +8"), 8);
        assert_eq!(decimal_prefix(b"++8"), 0);
        assert_eq!(decimal_prefix(b"+ 8"), 0);
        assert_eq!(decimal_prefix(b"99999999999999"), u32::MAX);
    }

    #[test]
    fn missing_fields_are_named() {
        assert_eq!(
            parse_command(b"LED"),
            Err(ParseError::MissingField(Field::Count))
        );
        assert_eq!(
            parse_command(b"LED:3"),
            Err(ParseError::MissingField(Field::Frequency))
        );
    }

    #[test]
    fn fourth_field_is_rejected() {
        assert_eq!(parse_command(b"LED:3:10:1"), Err(ParseError::TrailingField));
    }

    #[test]
    fn tag_is_case_sensitive() {
        assert_eq!(parse_command(b"led:3:10"), Err(ParseError::TagMismatch));
        assert_eq!(parse_command(b"LEDS:3:10"), Err(ParseError::TagMismatch));
    }

    #[test]
    fn range_check_precedes_any_use_of_frequency() {
        assert_eq!(
            parse_command(b"LED:3:0"),
            Err(ParseError::FrequencyOutOfRange(0))
        );
        assert_eq!(
            parse_command(b"LED:3:abc"),
            Err(ParseError::FrequencyOutOfRange(0))
        );
    }
}
