use std::fmt;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60_000;

/// `M:SS`, used for the running position label.
pub fn format_position(ms: u64) -> String {
    format!("{}:{:02}", ms / MS_PER_MINUTE, (ms / MS_PER_SECOND) % 60)
}

/// `M:SS.mmm`, used for the loop boundary labels.
pub fn format_precise(ms: u64) -> String {
    format!("{}.{:03}", format_position(ms), ms % MS_PER_SECOND)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    Empty,
    InvalidNumber(String),
    SecondsOutOfRange(u64),
    TooManyDigits(String),
    TooLarge,
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimestampError::Empty => write!(f, "empty timestamp"),
            TimestampError::InvalidNumber(part) => write!(f, "invalid number: {:?}", part),
            TimestampError::SecondsOutOfRange(secs) => {
                write!(f, "seconds must be below 60 when minutes are given, got {}", secs)
            }
            TimestampError::TooManyDigits(part) => {
                write!(f, "at most 3 fractional digits allowed, got {:?}", part)
            }
            TimestampError::TooLarge => write!(f, "timestamp too large"),
        }
    }
}

impl std::error::Error for TimestampError {}

/// Parses `SS`, `SS.mmm`, `M:SS` or `M:SS.mmm` into milliseconds.
///
/// The fractional part is read as a decimal fraction, so `1.5` is 1500 ms.
pub fn parse_timestamp(text: &str) -> Result<u64, TimestampError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TimestampError::Empty);
    }

    let (minutes, rest) = match text.split_once(':') {
        Some((m, rest)) => (Some(parse_number(m)?), rest),
        None => (None, text),
    };

    let (secs_part, frac_part) = match rest.split_once('.') {
        Some((s, frac)) => (s, Some(frac)),
        None => (rest, None),
    };

    let seconds = parse_number(secs_part)?;
    if minutes.is_some() && seconds >= 60 {
        return Err(TimestampError::SecondsOutOfRange(seconds));
    }

    let millis = match frac_part {
        Some(frac) if frac.len() > 3 => return Err(TimestampError::TooManyDigits(frac.to_string())),
        Some(frac) => {
            let value = parse_number(frac)?;
            value * 10u64.pow(3 - frac.len() as u32)
        }
        None => 0,
    };

    minutes
        .unwrap_or(0)
        .checked_mul(MS_PER_MINUTE)
        .zip(seconds.checked_mul(MS_PER_SECOND))
        .and_then(|(minutes_ms, seconds_ms)| minutes_ms.checked_add(seconds_ms))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or(TimestampError::TooLarge)
}

fn parse_number(part: &str) -> Result<u64, TimestampError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampError::InvalidNumber(part.to_string()));
    }
    part.parse::<u64>()
        .map_err(|_| TimestampError::InvalidNumber(part.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precise_labels() {
        assert_eq!(format_precise(61_234), "1:01.234");
        assert_eq!(format_precise(0), "0:00.000");
        assert_eq!(format_precise(3_599_000), "59:59.000");
        assert_eq!(format_precise(7), "0:00.007");
    }

    #[test]
    fn position_label_drops_millis() {
        assert_eq!(format_position(61_999), "1:01");
        assert_eq!(format_position(59_999), "0:59");
        // Minutes are not wrapped into hours.
        assert_eq!(format_position(3_600_000), "60:00");
    }

    #[test]
    fn parses_all_forms() {
        assert_eq!(parse_timestamp("5"), Ok(5_000));
        assert_eq!(parse_timestamp("90"), Ok(90_000));
        assert_eq!(parse_timestamp("1.5"), Ok(1_500));
        assert_eq!(parse_timestamp("1:01.234"), Ok(61_234));
        assert_eq!(parse_timestamp(" 2:00 "), Ok(120_000));
        assert_eq!(parse_timestamp("0:00.05"), Ok(50));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(parse_timestamp(""), Err(TimestampError::Empty));
        assert_eq!(parse_timestamp("1:75"), Err(TimestampError::SecondsOutOfRange(75)));
        assert!(matches!(parse_timestamp("a:10"), Err(TimestampError::InvalidNumber(_))));
        assert!(matches!(parse_timestamp("-3"), Err(TimestampError::InvalidNumber(_))));
        assert!(matches!(parse_timestamp("1.2345"), Err(TimestampError::TooManyDigits(_))));
    }

    #[test]
    fn rejects_overflowing_values() {
        assert_eq!(parse_timestamp("400000000000000:00"), Err(TimestampError::TooLarge));
        assert_eq!(parse_timestamp("20000000000000000"), Err(TimestampError::TooLarge));
        assert_eq!(parse_timestamp("307445734561825:51.615"), Ok(u64::MAX));
        assert_eq!(parse_timestamp("307445734561825:51.616"), Err(TimestampError::TooLarge));
    }

    #[test]
    fn precise_label_parses_back() {
        let ms = 754_321;
        assert_eq!(parse_timestamp(&format_precise(ms)), Ok(ms));
    }
}
