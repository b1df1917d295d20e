use crate::schema::SourceRow;
use crate::store::{Fields, Value};

/// Normalize a single raw field value.
///
/// Space runs collapse to one space and the result is trimmed. Purely numeric
/// values lose their leading zeros, and a value that ends up as `"0"` (or
/// empty) becomes `""`.
pub fn normalize_field(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let mut collapsed = String::with_capacity(raw.len());
    let mut previous_space = false;
    for ch in raw.chars() {
        if ch == ' ' {
            if !previous_space {
                collapsed.push(ch);
            }
            previous_space = true;
        } else {
            collapsed.push(ch);
            previous_space = false;
        }
    }

    let mut value = collapsed.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        value = value.trim_start_matches('0');
    }
    if value == "0" {
        return String::new();
    }
    value.to_string()
}

/// Normalize a stored value, stringifying anything that is not text.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => normalize_field(Some(s)),
        other => normalize_field(Some(&other.to_string())),
    }
}

/// Normalize every canonical field of a parsed row into document fields.
pub fn normalize_row(row: &SourceRow) -> Fields {
    row.values
        .iter()
        .map(|(name, raw)| {
            (
                (*name).to_string(),
                Value::String(normalize_field(raw.as_deref())),
            )
        })
        .collect()
}
