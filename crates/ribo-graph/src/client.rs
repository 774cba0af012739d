//! Graph client capability interface and the typed record model.

use async_trait::async_trait;
use ribo_core::{Result, RiboError};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A property value stored on a graph node or edge, or passed as a
/// query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
}

impl GraphValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            GraphValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric accessor; integers coerce to float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            GraphValue::Float(f) => Some(*f),
            GraphValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, GraphValue>> {
        match self {
            GraphValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    /// Human-readable rendering for prose output. Strings render
    /// unquoted; containers fall back to JSON.
    pub fn display_text(&self) -> String {
        match self {
            GraphValue::Null => String::new(),
            GraphValue::Bool(b) => b.to_string(),
            GraphValue::Int(i) => i.to_string(),
            GraphValue::Float(f) => f.to_string(),
            GraphValue::Str(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl Serialize for GraphValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GraphValue::Null => serializer.serialize_none(),
            GraphValue::Bool(b) => serializer.serialize_bool(*b),
            GraphValue::Int(i) => serializer.serialize_i64(*i),
            GraphValue::Float(f) => serializer.serialize_f64(*f),
            GraphValue::Str(s) => serializer.serialize_str(s),
            GraphValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            GraphValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl From<&str> for GraphValue {
    fn from(s: &str) -> Self {
        GraphValue::Str(s.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(s: String) -> Self {
        GraphValue::Str(s)
    }
}

impl From<i64> for GraphValue {
    fn from(i: i64) -> Self {
        GraphValue::Int(i)
    }
}

impl From<f64> for GraphValue {
    fn from(f: f64) -> Self {
        GraphValue::Float(f)
    }
}

impl From<bool> for GraphValue {
    fn from(b: bool) -> Self {
        GraphValue::Bool(b)
    }
}

impl<T: Into<GraphValue>> From<Vec<T>> for GraphValue {
    fn from(items: Vec<T>) -> Self {
        GraphValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Named parameters for one graph query.
pub type Params = BTreeMap<String, GraphValue>;

/// Build a [`Params`] map from `(name, value)` pairs.
pub fn params<const N: usize>(entries: [(&str, GraphValue); N]) -> Params {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// One typed record returned by a graph query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphRecord {
    fields: BTreeMap<String, GraphValue>,
}

impl GraphRecord {
    pub fn new(fields: BTreeMap<String, GraphValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&GraphValue> {
        self.fields.get(field)
    }

    pub fn require_str(&self, field: &str) -> Result<&str> {
        self.get(field)
            .and_then(GraphValue::as_str)
            .ok_or_else(|| RiboError::MalformedRecord(format!("missing string field {field:?}")))
    }

    pub fn require_int(&self, field: &str) -> Result<i64> {
        self.get(field)
            .and_then(GraphValue::as_int)
            .ok_or_else(|| RiboError::MalformedRecord(format!("missing int field {field:?}")))
    }

    pub fn require_float(&self, field: &str) -> Result<f64> {
        self.get(field)
            .and_then(GraphValue::as_float)
            .ok_or_else(|| RiboError::MalformedRecord(format!("missing float field {field:?}")))
    }

    pub fn str_list(&self, field: &str) -> Vec<String> {
        self.get(field)
            .and_then(GraphValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn map_field(&self, field: &str) -> BTreeMap<String, GraphValue> {
        self.get(field)
            .and_then(GraphValue::as_map)
            .cloned()
            .unwrap_or_default()
    }
}

/// Capability interface for executing parameterized pattern-match
/// queries against a labeled property graph.
///
/// One query per call: no implicit transaction batching, no retries —
/// the caller decides retry policy. Execution failures surface as
/// [`RiboError::QueryFailed`] so callers can distinguish "query
/// failed" from "empty result".
#[async_trait]
pub trait GraphQueryClient: Send + Sync {
    /// Execute one parameterized query, optionally against a named
    /// database.
    async fn invoke(
        &self,
        query: &str,
        params: Params,
        database: Option<&str>,
    ) -> Result<Vec<GraphRecord>>;

    /// Release the underlying driver/connection.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accessors_enforce_types() {
        let record = GraphRecord::new(
            [
                ("id".to_string(), GraphValue::from("R-HSA-1")),
                ("rank".to_string(), GraphValue::from(3i64)),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(record.require_str("id").unwrap(), "R-HSA-1");
        assert_eq!(record.require_int("rank").unwrap(), 3);
        assert_eq!(record.require_float("rank").unwrap(), 3.0);
        assert!(record.require_str("rank").is_err());
        assert!(record.require_int("missing").is_err());
    }

    #[test]
    fn graph_values_serialize_as_natural_json() {
        let value = GraphValue::Map(
            [
                ("name".to_string(), GraphValue::from("TP53")),
                (
                    "scores".to_string(),
                    GraphValue::from(vec![GraphValue::from(1i64), GraphValue::from(0.5)]),
                ),
            ]
            .into_iter()
            .collect(),
        );
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"name":"TP53","scores":[1,0.5]}"#);
    }
}
