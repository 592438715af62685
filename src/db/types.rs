//! Query result types for db2i-tools.
//!
//! Defines the structures used to represent rows, values and fetch modes
//! exchanged with the daemon.

use crate::error::{Db2iError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a single scalar value from a database query or a bound parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns the string contents if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Converts to the JSON representation sent to the daemon.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// Cells arriving from the daemon as JSON. Nested structures keep their JSON text.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the daemon.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data: column name to value, in column-definition order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    /// Returns the value for a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Iterates over (column, value) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Iterates over values in column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    /// Applies `f` to every value in place.
    pub fn map_values<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(Value) -> Value,
    {
        for value in self.0.values_mut() {
            *value = f(std::mem::take(value));
        }
        self
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// How many rows a single execution retrieves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FetchModeRepr", into = "FetchModeRepr")]
pub enum FetchMode {
    /// Every row in the result set.
    #[default]
    All,
    /// At most one row.
    One,
    /// At most `n` rows; fewer when the result set ends first.
    Count(usize),
}

impl FromStr for FetchMode {
    type Err = Db2iError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "one" => Ok(Self::One),
            other => other
                .parse::<usize>()
                .map(Self::Count)
                .map_err(|_| Db2iError::invalid_argument(format!("Invalid fetch value: {s}"))),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::One => write!(f, "one"),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Wire form of a fetch mode: `"all"`, `"one"` or a row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FetchModeRepr {
    Count(i64),
    Text(String),
}

impl TryFrom<FetchModeRepr> for FetchMode {
    type Error = Db2iError;

    fn try_from(repr: FetchModeRepr) -> Result<Self> {
        match repr {
            FetchModeRepr::Count(n) => usize::try_from(n)
                .map(Self::Count)
                .map_err(|_| Db2iError::invalid_argument(format!("Invalid fetch value: {n}"))),
            FetchModeRepr::Text(s) => s.parse(),
        }
    }
}

impl From<FetchMode> for FetchModeRepr {
    fn from(mode: FetchMode) -> Self {
        match mode {
            FetchMode::Count(n) => FetchModeRepr::Count(n as i64),
            other => FetchModeRepr::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(true).to_display_string(), "true");
        assert_eq!(Value::Int(42).to_display_string(), "42");
        assert_eq!(Value::Float(2.71).to_display_string(), "2.71");
        assert_eq!(
            Value::String("hello".to_string()).to_display_string(),
            "hello"
        );
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(2.71f64), Value::Float(2.71));
        assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(42i32)), Value::Int(42));
    }

    #[test]
    fn test_value_from_json_cells() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(7)), Value::Int(7));
        assert_eq!(Value::from(json!(7.5)), Value::Float(7.5));
        assert_eq!(Value::from(json!("A00")), Value::String("A00".to_string()));
        assert_eq!(Value::from(json!([1, 2])), Value::String("[1,2]".to_string()));
    }

    #[test]
    fn test_value_deserializes_from_scalars() {
        let params: Vec<Value> = serde_json::from_value(json!(["SAMPLE", 10, 1.5, true, null]))
            .unwrap();
        assert_eq!(
            params,
            vec![
                Value::String("SAMPLE".to_string()),
                Value::Int(10),
                Value::Float(1.5),
                Value::Bool(true),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_row_preserves_column_order() {
        let row: Row = vec![
            ("ZED", Value::Int(1)),
            ("ALPHA", Value::Int(2)),
            ("MID", Value::Int(3)),
        ]
        .into_iter()
        .collect();

        let columns: Vec<&String> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["ZED", "ALPHA", "MID"]);
        assert_eq!(row.get("ALPHA"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_row_map_values() {
        let row: Row = vec![("A", Value::Int(1)), ("B", Value::from("x"))]
            .into_iter()
            .collect();
        let mapped = row.map_values(|v| match v {
            Value::Int(i) => Value::Int(i * 10),
            other => other,
        });
        assert_eq!(mapped.get("A"), Some(&Value::Int(10)));
        assert_eq!(mapped.get("B"), Some(&Value::from("x")));
    }

    #[test]
    fn test_fetch_mode_parse() {
        assert_eq!("all".parse::<FetchMode>().unwrap(), FetchMode::All);
        assert_eq!("ONE".parse::<FetchMode>().unwrap(), FetchMode::One);
        assert_eq!("25".parse::<FetchMode>().unwrap(), FetchMode::Count(25));

        let err = "some".parse::<FetchMode>().unwrap_err();
        assert!(matches!(err, Db2iError::InvalidArgument(_)));
    }

    #[test]
    fn test_fetch_mode_deserialize() {
        let mode: FetchMode = serde_json::from_value(json!(5)).unwrap();
        assert_eq!(mode, FetchMode::Count(5));
        let mode: FetchMode = serde_json::from_value(json!("one")).unwrap();
        assert_eq!(mode, FetchMode::One);
        assert!(serde_json::from_value::<FetchMode>(json!(-1)).is_err());
        assert!(serde_json::from_value::<FetchMode>(json!("cursor")).is_err());
    }
}
