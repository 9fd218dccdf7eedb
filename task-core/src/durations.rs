//! Human-readable durations such as `3d 21h 13m 17s`.

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid duration '{0}', expected a form like '1d 2h 3m 4s'")]
pub struct ParseDurationError(String);

/// Parse `[Nd][Nh][Nm][Ns]`, case-insensitive, ignoring whitespace.
///
/// Units must appear in that order and at least one must be present.
pub fn parse_duration(text: &str) -> Result<Duration, ParseDurationError> {
    let error = || ParseDurationError(text.to_string());
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if compact.is_empty() {
        return Err(error());
    }

    let units = [('d', DAY), ('h', HOUR), ('m', MINUTE), ('s', 1)];
    let mut next_unit = 0;
    let mut total: u64 = 0;
    let mut rest = compact.as_str();
    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(error());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| error())?;
        let unit = rest[digits..].chars().next().ok_or_else(error)?;
        let position = units[next_unit..]
            .iter()
            .position(|(symbol, _)| *symbol == unit)
            .ok_or_else(error)?;
        let (_, seconds) = units[next_unit + position];
        total = value
            .checked_mul(seconds)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(error)?;
        next_unit += position + 1;
        rest = &rest[digits + unit.len_utf8()..];
    }
    Ok(Duration::from_secs(total))
}

/// Format whole seconds of `duration` as `1d 2h 3m 4s`, skipping zero parts.
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_secs();
    if remaining == 0 {
        return "0s".to_string();
    }
    let mut parts = Vec::new();
    for (symbol, seconds) in [("d", DAY), ("h", HOUR), ("m", MINUTE), ("s", 1)] {
        let count = remaining / seconds;
        remaining %= seconds;
        if count > 0 {
            parts.push(format!("{count}{symbol}"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(d: u64, h: u64, m: u64, s: u64) -> Duration {
        Duration::from_secs(d * DAY + h * HOUR + m * MINUTE + s)
    }

    #[test]
    fn test_parse_valid_durations() {
        assert_eq!(parse_duration("17d").unwrap(), secs(17, 0, 0, 0));
        assert_eq!(parse_duration(" 17 H ").unwrap(), secs(0, 17, 0, 0));
        assert_eq!(parse_duration("13M17S").unwrap(), secs(0, 0, 13, 17));
        assert_eq!(parse_duration(" 21 h 13 m 17 s ").unwrap(), secs(0, 21, 13, 17));
        assert_eq!(parse_duration("3d21h13m17s").unwrap(), secs(3, 21, 13, 17));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_invalid_durations() {
        for text in ["", " ", "17", "s", "17x", "1s2m", "1m1m", "-3s", "1.5h"] {
            assert!(parse_duration(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(secs(0, 0, 0, 17)), "17s");
        assert_eq!(format_duration(secs(0, 0, 13, 17)), "13m 17s");
        assert_eq!(format_duration(secs(0, 21, 0, 17)), "21h 17s");
        assert_eq!(format_duration(secs(3, 21, 13, 17)), "3d 21h 13m 17s");
    }

    #[test]
    fn test_format_parse_round_trip_on_formatted_text() {
        let text = "3d 21h 13m 17s";
        assert_eq!(format_duration(parse_duration(text).unwrap()), text);
    }
}
