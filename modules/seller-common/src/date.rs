//! The calendar-date wire format shared by every event and aggregate.

use chrono::NaiveDate;

use crate::error::InvalidDate;

/// `YYYY-MM-DD`, zero padded, no time-of-day component.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a wire date. Strict: the string must round-trip through
/// [`DATE_FORMAT`] unchanged, so `2022-1-1` or ` 2022-01-01` are rejected.
pub fn parse_date(raw: &str) -> Result<NaiveDate, InvalidDate> {
    let date =
        NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| InvalidDate(raw.to_string()))?;

    if format_date(date) != raw {
        return Err(InvalidDate(raw.to_string()));
    }

    Ok(date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_date() {
        let date = parse_date("2022-01-01").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
    }

    #[test]
    fn rejects_comma_separated_date() {
        assert_eq!(
            parse_date("2022,01-01"),
            Err(InvalidDate("2022,01-01".to_string()))
        );
    }

    #[test]
    fn rejects_unpadded_and_empty_dates() {
        assert!(parse_date("2022-1-1").is_err());
        assert!(parse_date("").is_err());
        assert!(parse_date("2022-01-01T00:00:00Z").is_err());
        assert!(parse_date("2022-02-30").is_err());
    }

    #[test]
    fn format_is_inverse_of_parse() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 9).unwrap();
        assert_eq!(format_date(date), "2023-12-09");
        assert_eq!(parse_date(&format_date(date)).unwrap(), date);
    }
}
