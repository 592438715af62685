//! Text rendering of result rows for a language model.
//!
//! Rows render as literal lists of mappings (`[{'ID': 1}]`) or of tuples
//! (`[(1,)]`), the shape agents built on Python tooling already expect.

use crate::db::{Row, Value};

/// Renders rows as a list of column-name mappings.
pub fn render_records(rows: &[Row]) -> String {
    let items: Vec<String> = rows
        .iter()
        .map(|row| {
            let fields: Vec<String> = row
                .iter()
                .map(|(column, value)| format!("{}: {}", repr_str(column), repr_value(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Renders rows as a list of positional tuples in column order.
pub fn render_tuples(rows: &[Row]) -> String {
    let items: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row.values().map(repr_value).collect();
            match values.len() {
                1 => format!("({},)", values[0]),
                _ => format!("({})", values.join(", ")),
            }
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Literal form of a single value.
pub fn repr_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => repr_float(*f),
        Value::String(s) => repr_str(s),
    }
}

fn repr_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{sign}inf")
    } else {
        // Shortest round-trip digits, switching to exponent form below 1e-4
        // and from 1e16 up.
        let scientific = format!("{f:e}");
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        if f != 0.0 && !(-4..16).contains(&exponent) {
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
        } else {
            let positional = f.to_string();
            if positional.contains('.') {
                positional
            } else {
                format!("{positional}.0")
            }
        }
    }
}

/// Quotes a string with single quotes, or double quotes when that avoids escaping.
fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
