use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Attribute payloads are limited to scalars and flat lists so node
/// descriptions stay easy to serialize and inspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    BoolList(Vec<bool>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            // The source format sometimes spells booleans as 0/1.
            AttrValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        match self {
            AttrValue::IntList(v) => Some(v.clone()),
            AttrValue::Int(v) => Some(vec![*v]),
            _ => None,
        }
    }
}

/// Named attribute in an operator node's attribute list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrEntry {
    pub name: String,
    pub value: AttrValue,
}

/// Ordered-list attribute accessor.
///
/// The source description format stores attributes as a list, not a keyed
/// map; lookup is linear and duplicate names resolve to the first match.
/// `get` preserves the reference behavior of warning and yielding a neutral
/// absent value; `require` fails fast for attributes an operator cannot do
/// without.
#[derive(Debug, Clone, Copy)]
pub struct Attrs<'a> {
    entries: &'a [AttrEntry],
}

impl<'a> Attrs<'a> {
    pub fn new(entries: &'a [AttrEntry]) -> Self {
        Self { entries }
    }

    /// Optional lookup. A miss is diagnosed but not an error; callers must
    /// tolerate the `None` default.
    pub fn get(&self, name: &str) -> Option<&'a AttrValue> {
        let found = self.entries.iter().find(|entry| entry.name == name);
        if found.is_none() {
            tracing::warn!(attr = name, "attribute not found, using default");
        }
        found.map(|entry| &entry.value)
    }

    /// Lookup without the missing-attribute diagnostic, for probing
    /// attributes that are genuinely expected to be absent most of the time.
    pub fn probe(&self, name: &str) -> Option<&'a AttrValue> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }

    /// Required lookup; absence is an immediate, named failure.
    pub fn require(&self, name: &str) -> EvalResult<&'a AttrValue> {
        self.probe(name).ok_or_else(|| EvalError::MissingAttribute {
            name: name.to_string(),
        })
    }

    pub fn require_int(&self, name: &str) -> EvalResult<i64> {
        self.require(name)?
            .as_int()
            .ok_or_else(|| type_error(name, "int"))
    }

    pub fn require_bool(&self, name: &str) -> EvalResult<bool> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| type_error(name, "bool"))
    }

    pub fn require_str(&self, name: &str) -> EvalResult<&'a str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| type_error(name, "string"))
    }

    pub fn require_int_list(&self, name: &str) -> EvalResult<Vec<i64>> {
        self.require(name)?
            .as_int_list()
            .ok_or_else(|| type_error(name, "int list"))
    }

    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.probe(name).and_then(AttrValue::as_int).unwrap_or(default)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.probe(name)
            .and_then(AttrValue::as_bool)
            .unwrap_or(default)
    }

    pub fn float_or(&self, name: &str, default: f64) -> f64 {
        self.probe(name)
            .and_then(AttrValue::as_float)
            .unwrap_or(default)
    }

    /// Optional axis list: absent means "all axes"; a bare int means a
    /// single axis.
    pub fn axis_list(&self, name: &str) -> Option<Vec<i64>> {
        self.get(name).and_then(AttrValue::as_int_list)
    }
}

fn type_error(name: &str, expected: &'static str) -> EvalError {
    EvalError::AttributeType {
        name: name.to_string(),
        expected,
    }
}
