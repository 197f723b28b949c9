use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Placeholder date substituted for missing or unparsable dates.
pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Placeholder text substituted for missing descriptive values.
pub const UNKNOWN_TEXT: &str = "Unknown";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Scalar stored in a table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(value) => Some(*value),
            _ => None,
        }
    }

    /// Coerce the value into a calendar date.
    ///
    /// Dates pass through, text is parsed with the accepted formats, and
    /// everything else (including unparsable text) becomes `Null`.
    pub fn to_date(&self) -> Value {
        match self {
            Value::Date(date) => Value::Date(*date),
            Value::Text(text) => parse_date(text).map(Value::Date).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Normalized identity used for joins, deduplication and lookups.
    ///
    /// Integral floats share the key of the matching integer so that an id
    /// read as `7.0` resolves against an id read as `7`.
    pub fn key(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    (*value as i64).to_string()
                } else {
                    value.to_string()
                }
            }
            Value::Text(value) => value.clone(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn to_csv(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

/// Parse a date from the text forms found in operational extracts.
///
/// Time-of-day components are discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Composite key for a tuple of values.
pub fn tuple_key<'a>(values: impl IntoIterator<Item = &'a Value>) -> String {
    values
        .into_iter()
        .map(|value| escape_key_component(&value.key()))
        .collect::<Vec<_>>()
        .join("|")
}

fn escape_key_component(value: &str) -> String {
    value.replace('\\', "\\\\").replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn integral_float_shares_integer_key() {
        assert_eq!(Value::Float(7.0).key(), Value::Int(7).key());
        assert_ne!(Value::Float(7.5).key(), Value::Int(7).key());
    }

    #[test]
    fn parses_common_date_forms() {
        assert_eq!(parse_date("2024-03-05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("03/05/2024"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 13:45:00"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T13:45:00.250"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T13:45:00+02:00"), Some(date(2024, 3, 5)));
    }

    #[test]
    fn unparsable_text_coerces_to_null() {
        assert_eq!(Value::text("Unknown").to_date(), Value::Null);
        assert_eq!(Value::text("2024-02-30").to_date(), Value::Null);
        assert_eq!(Value::Int(20240101).to_date(), Value::Null);
    }

    #[test]
    fn tuple_key_escapes_separator() {
        let a = [Value::text("a|b"), Value::text("c")];
        let b = [Value::text("a"), Value::text("b|c")];
        assert_ne!(tuple_key(&a), tuple_key(&b));
    }

    #[test]
    fn sentinel_is_first_of_1900() {
        assert_eq!(sentinel_date(), date(1900, 1, 1));
    }
}
