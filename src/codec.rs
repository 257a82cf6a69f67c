//! Conversion between raw user input and typed field values.
//!
//! Cell edits arrive as text. The declared column type decides how the text is
//! coerced on the way in and how a stored value is rendered on the way out.
//! The required check runs before any coercion so an empty required cell is
//! reported as missing, not as a parse failure.

use crate::catalog::schema::ColumnDef;
use crate::catalog::types::{FieldType, FieldValue};
use crate::error::GridError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Coerce raw input into a typed value for the given declared type.
pub fn encode(raw: &str, declared: FieldType) -> Result<FieldValue, GridError> {
    match declared {
        FieldType::Number => {
            let parsed = raw.trim().parse::<f64>();
            match parsed {
                Ok(n) if n.is_finite() => Ok(FieldValue::Number(n)),
                _ => Err(GridError::InvalidNumber { raw: raw.into() }),
            }
        }
        FieldType::Boolean => Ok(FieldValue::Boolean(parse_boolean(raw))),
        FieldType::Date => parse_date(raw)
            .map(FieldValue::Date)
            .ok_or_else(|| GridError::InvalidDate { raw: raw.into() }),
        FieldType::String => Ok(FieldValue::Text(raw.into())),
    }
}

/// Required check, then coercion against the column's declared type.
pub fn encode_cell(column: &ColumnDef, raw: &str) -> Result<FieldValue, GridError> {
    if column.is_required && raw.trim().is_empty() {
        return Err(GridError::RequiredFieldMissing {
            column: column.name.clone(),
        });
    }
    encode(raw, column.field_type)
}

/// Render a typed value in its display form. The declared type picks the
/// convention when it matches the stored variant; a value left behind by an
/// earlier definition of the column falls back to its own shape.
pub fn decode(value: &FieldValue, declared: FieldType) -> String {
    match (declared, value) {
        (FieldType::Number, FieldValue::Number(n)) => format_number(*n),
        (FieldType::Boolean, FieldValue::Boolean(b)) => b.to_string(),
        (FieldType::Date, FieldValue::Date(d)) => format_date(d),
        (FieldType::String, FieldValue::Text(s)) => s.to_string(),
        _ => display_value(value),
    }
}

/// Display form of a value by its own type, used for column defaults and for
/// values whose declared type no longer matches.
pub fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.to_string(),
        FieldValue::Number(n) => format_number(*n),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Date(d) => format_date(d),
    }
}

/// Lenient by contract: boolean coercion has no failure mode. Recognized
/// falsy spellings and the empty string are false, everything else is true.
fn parse_boolean(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    !matches!(lower.as_str(), "" | "false" | "0" | "no")
}

/// Accepts an RFC 3339 instant, a zoneless `YYYY-MM-DDTHH:MM[:SS]`, or a bare
/// `YYYY-MM-DD`; zoneless inputs are taken as UTC.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn format_number(n: f64) -> String {
    format!("{n}")
}

fn format_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, encode_cell};
    use crate::catalog::schema::ColumnDef;
    use crate::catalog::types::{FieldType, FieldValue};
    use crate::error::GridErrorCode;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn column(field_type: FieldType, is_required: bool) -> ColumnDef {
        ColumnDef {
            id: 1,
            view_id: 1,
            owner_id: "user-a".into(),
            name: "Region".into(),
            field_type,
            is_required,
            default_value: None,
        }
    }

    #[test]
    fn number_encoding() {
        assert_eq!(
            encode("42", FieldType::Number).expect("integer"),
            FieldValue::Number(42.0)
        );
        assert_eq!(
            encode(" -3.5 ", FieldType::Number).expect("trimmed float"),
            FieldValue::Number(-3.5)
        );
        for bad in ["", "abc", "1.2.3", "inf", "NaN"] {
            let err = encode(bad, FieldType::Number).expect_err(bad);
            assert_eq!(err.code(), GridErrorCode::InvalidNumber);
        }
    }

    #[test]
    fn boolean_encoding_is_lenient() {
        for truthy in ["true", "TRUE", "1", "yes", "anything", "x"] {
            assert_eq!(
                encode(truthy, FieldType::Boolean).expect(truthy),
                FieldValue::Boolean(true)
            );
        }
        for falsy in ["", "false", "False", "0", "no", "  "] {
            assert_eq!(
                encode(falsy, FieldType::Boolean).expect(falsy),
                FieldValue::Boolean(false)
            );
        }
    }

    #[test]
    fn date_encoding_accepts_common_forms() {
        let full = encode("2024-03-05T10:30:00Z", FieldType::Date).expect("rfc3339");
        assert_eq!(
            full,
            FieldValue::Date("2024-03-05T10:30:00Z".parse::<DateTime<Utc>>().expect("ts"))
        );

        let day = encode("2024-03-05", FieldType::Date).expect("bare date");
        assert_eq!(
            day,
            FieldValue::Date("2024-03-05T00:00:00Z".parse::<DateTime<Utc>>().expect("ts"))
        );

        let local = encode("2024-03-05T10:30", FieldType::Date).expect("datetime-local");
        assert_eq!(
            local,
            FieldValue::Date("2024-03-05T10:30:00Z".parse::<DateTime<Utc>>().expect("ts"))
        );

        for bad in ["", "yesterday", "2024-13-40", "05/03/2024"] {
            let err = encode(bad, FieldType::Date).expect_err(bad);
            assert_eq!(err.code(), GridErrorCode::InvalidDate);
        }
    }

    #[test]
    fn string_passes_through_untrimmed() {
        assert_eq!(
            encode("  keep me  ", FieldType::String).expect("string"),
            FieldValue::Text("  keep me  ".into())
        );
    }

    #[test]
    fn required_check_precedes_coercion() {
        let col = column(FieldType::Number, true);
        let err = encode_cell(&col, "  ").expect_err("empty required");
        assert_eq!(err.code(), GridErrorCode::RequiredFieldMissing);

        let col = column(FieldType::Number, false);
        let err = encode_cell(&col, "").expect_err("empty optional number");
        assert_eq!(err.code(), GridErrorCode::InvalidNumber);

        let col = column(FieldType::String, true);
        let ok = encode_cell(&col, "value").expect("non-empty required");
        assert_eq!(ok, FieldValue::Text("value".into()));
    }

    #[test]
    fn representative_values_roundtrip_through_display() {
        let cases = [
            ("42", FieldType::Number),
            ("42.5", FieldType::Number),
            ("-0.25", FieldType::Number),
            ("true", FieldType::Boolean),
            ("false", FieldType::Boolean),
            ("2024-03-05T10:30:00.000Z", FieldType::Date),
            ("hello world", FieldType::String),
        ];
        for (raw, declared) in cases {
            let typed = encode(raw, declared).expect(raw);
            assert_eq!(decode(&typed, declared), raw, "roundtrip of {raw:?}");
        }
    }

    #[test]
    fn decode_falls_back_on_type_mismatch() {
        // A number column can hold text left behind by a removed definition.
        let stale = FieldValue::Text("legacy".into());
        assert_eq!(decode(&stale, FieldType::Number), "legacy");
    }

    fn arb_millis_date() -> impl Strategy<Value = DateTime<Utc>> {
        (0i64..4_102_444_800_000i64).prop_map(|millis| {
            DateTime::from_timestamp_millis(millis).expect("timestamp in range")
        })
    }

    fn arb_typed() -> impl Strategy<Value = (FieldValue, FieldType)> {
        prop_oneof![
            any::<bool>().prop_map(|b| (FieldValue::Boolean(b), FieldType::Boolean)),
            any::<f64>()
                .prop_filter("finite float only", |v| v.is_finite())
                .prop_map(|n| (FieldValue::Number(n), FieldType::Number)),
            arb_millis_date().prop_map(|d| (FieldValue::Date(d), FieldType::Date)),
            "\\PC{0,32}".prop_map(|s| (FieldValue::Text(s.into()), FieldType::String)),
        ]
    }

    proptest! {
        #[test]
        fn typed_values_survive_display_and_reencode((value, declared) in arb_typed()) {
            let display = decode(&value, declared);
            let reencoded = encode(&display, declared).expect("display form re-encodes");
            prop_assert_eq!(value, reencoded);
        }
    }
}
