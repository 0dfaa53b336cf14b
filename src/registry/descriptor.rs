// src/registry/descriptor.rs

//! Parameter schemas of provided sequences.
//!
//! A descriptor is built once at load time from the defaults a unit declares.
//! The type tag is fixed from that default and never re-inferred: later
//! values are coerced to it.

use std::fmt;
use std::str::FromStr;

use rhai::{Array, Dynamic};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SequencerError};
use crate::script::RawParam;

/// Type tag of a sequence parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "list-int")]
    IntList,
    #[serde(rename = "list-float")]
    FloatList,
    #[serde(rename = "list-bool")]
    BoolList,
    #[serde(rename = "list-str")]
    StrList,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Str => "str",
            ParamType::IntList => "list-int",
            ParamType::FloatList => "list-float",
            ParamType::BoolList => "list-bool",
            ParamType::StrList => "list-str",
        }
    }

    pub fn is_list(&self) -> bool {
        self.element().is_some()
    }

    /// Element type of a list tag.
    pub fn element(&self) -> Option<ParamType> {
        match self {
            ParamType::IntList => Some(ParamType::Int),
            ParamType::FloatList => Some(ParamType::Float),
            ParamType::BoolList => Some(ParamType::Bool),
            ParamType::StrList => Some(ParamType::Str),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "int" => Ok(ParamType::Int),
            "float" => Ok(ParamType::Float),
            "bool" => Ok(ParamType::Bool),
            "str" => Ok(ParamType::Str),
            "list-int" => Ok(ParamType::IntList),
            "list-float" => Ok(ParamType::FloatList),
            "list-bool" => Ok(ParamType::BoolList),
            "list-str" => Ok(ParamType::StrList),
            other => Err(format!("unknown parameter type: {other}")),
        }
    }
}

/// A parameter value in host form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    BoolList(Vec<bool>),
    StrList(Vec<String>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamType {
        match self {
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Str(_) => ParamType::Str,
            ParamValue::IntList(_) => ParamType::IntList,
            ParamValue::FloatList(_) => ParamType::FloatList,
            ParamValue::BoolList(_) => ParamType::BoolList,
            ParamValue::StrList(_) => ParamType::StrList,
        }
    }

    pub fn to_dynamic(&self) -> Dynamic {
        fn list<T: Clone + Send + Sync + 'static>(items: &[T]) -> Dynamic {
            Dynamic::from_array(items.iter().cloned().map(Dynamic::from).collect())
        }
        match self {
            ParamValue::Int(v) => Dynamic::from(*v),
            ParamValue::Float(v) => Dynamic::from(*v),
            ParamValue::Bool(v) => Dynamic::from(*v),
            ParamValue::Str(v) => Dynamic::from(v.clone()),
            ParamValue::IntList(v) => list(v),
            ParamValue::FloatList(v) => list(v),
            ParamValue::BoolList(v) => list(v),
            ParamValue::StrList(v) => list(v),
        }
    }

    /// Convert a script value to host form, if it is a supported scalar.
    pub fn scalar_from_dynamic(value: &Dynamic) -> Option<ParamValue> {
        if let Ok(v) = value.as_int() {
            Some(ParamValue::Int(v))
        } else if let Ok(v) = value.as_float() {
            Some(ParamValue::Float(v))
        } else if let Ok(v) = value.as_bool() {
            Some(ParamValue::Bool(v))
        } else if value.is_string() {
            value.clone().into_string().ok().map(ParamValue::Str)
        } else {
            None
        }
    }

    /// Validate a declared default and convert it to host form.
    ///
    /// Lists must be non-empty, flat and homogeneous.
    pub fn from_default(sequence: &str, param: &str, value: &Dynamic) -> Result<ParamValue> {
        if let Some(scalar) = Self::scalar_from_dynamic(value) {
            return Ok(scalar);
        }

        let unsupported = |type_name: &str| SequencerError::UnsupportedDefault {
            sequence: sequence.to_string(),
            param: param.to_string(),
            type_name: type_name.to_string(),
        };

        if !value.is_array() {
            return Err(unsupported(value.type_name()));
        }
        let items: Array = value
            .clone()
            .into_array()
            .map_err(|type_name| unsupported(type_name))?;

        if items.is_empty() {
            return Err(SequencerError::EmptyListDefault {
                sequence: sequence.to_string(),
                param: param.to_string(),
            });
        }
        if items.iter().any(Dynamic::is_array) {
            return Err(SequencerError::NestedListDefault {
                sequence: sequence.to_string(),
                param: param.to_string(),
            });
        }

        let mut elements = Vec::with_capacity(items.len());
        for item in &items {
            let element =
                Self::scalar_from_dynamic(item).ok_or_else(|| unsupported(item.type_name()))?;
            elements.push(element);
        }
        let first = elements[0].kind();
        if elements.iter().any(|e| e.kind() != first) {
            return Err(SequencerError::MixedListDefault {
                sequence: sequence.to_string(),
                param: param.to_string(),
            });
        }

        Ok(collect_list(first, elements))
    }

    /// Coerce `self` to `kind`.
    ///
    /// Strings are parsed (`"3"` → `3`, `"true"` → `true`, `"1,2"` → `[1, 2]`),
    /// ints widen to floats, and scalars render into strings. Anything else is
    /// an error naming the parameter.
    pub fn coerce(self, kind: ParamType, sequence: &str, param: &str) -> Result<ParamValue> {
        if self.kind() == kind {
            return Ok(self);
        }

        let mismatch = |value: &ParamValue| SequencerError::InvalidParamValue {
            sequence: sequence.to_string(),
            param: param.to_string(),
            reason: format!("expected {kind}, got {} '{value}'", value.kind()),
        };

        match (kind, self) {
            (ParamType::Float, ParamValue::Int(v)) => Ok(ParamValue::Float(v as f64)),
            (ParamType::FloatList, ParamValue::IntList(v)) => {
                Ok(ParamValue::FloatList(v.into_iter().map(|i| i as f64).collect()))
            }
            (ParamType::Str, value @ (ParamValue::Int(_) | ParamValue::Float(_) | ParamValue::Bool(_))) => {
                Ok(ParamValue::Str(value.to_string()))
            }
            (ParamType::Int | ParamType::Float | ParamType::Bool, ParamValue::Str(s)) => {
                parse_scalar(kind, &s).ok_or_else(|| mismatch(&ParamValue::Str(s)))
            }
            (list_kind, ParamValue::Str(s)) if list_kind.is_list() => {
                ParamValue::StrList(split_list(&s)).coerce(list_kind, sequence, param)
            }
            (list_kind, ParamValue::StrList(items)) if list_kind.is_list() => {
                cast_list(list_kind, items, param)
            }
            (_, value) => Err(mismatch(&value)),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str("]")
        }
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
            ParamValue::IntList(v) => list(f, v),
            ParamValue::FloatList(v) => list(f, v),
            ParamValue::BoolList(v) => list(f, v),
            ParamValue::StrList(v) => list(f, v),
        }
    }
}

fn collect_list(element: ParamType, elements: Vec<ParamValue>) -> ParamValue {
    match element {
        ParamType::Int => ParamValue::IntList(
            elements
                .into_iter()
                .filter_map(|e| match e {
                    ParamValue::Int(v) => Some(v),
                    _ => None,
                })
                .collect(),
        ),
        ParamType::Float => ParamValue::FloatList(
            elements
                .into_iter()
                .filter_map(|e| match e {
                    ParamValue::Float(v) => Some(v),
                    _ => None,
                })
                .collect(),
        ),
        ParamType::Bool => ParamValue::BoolList(
            elements
                .into_iter()
                .filter_map(|e| match e {
                    ParamValue::Bool(v) => Some(v),
                    _ => None,
                })
                .collect(),
        ),
        _ => ParamValue::StrList(elements.into_iter().map(|e| e.to_string()).collect()),
    }
}

fn parse_scalar(kind: ParamType, raw: &str) -> Option<ParamValue> {
    let raw = raw.trim();
    match kind {
        ParamType::Int => raw.parse().ok().map(ParamValue::Int),
        ParamType::Float => raw.parse().ok().map(ParamValue::Float),
        ParamType::Bool => match raw.to_lowercase().as_str() {
            "true" | "1" => Some(ParamValue::Bool(true)),
            "false" | "0" => Some(ParamValue::Bool(false)),
            _ => None,
        },
        _ => Some(ParamValue::Str(raw.to_string())),
    }
}

fn article(kind: ParamType) -> &'static str {
    match kind {
        ParamType::Int => "an",
        _ => "a",
    }
}

/// Split `"[1, 2, 3]"` or `"1,2,3"` into its trimmed items.
fn split_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(raw);
    raw.split(',')
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn cast_list(kind: ParamType, items: Vec<String>, param: &str) -> Result<ParamValue> {
    let Some(element) = kind.element() else {
        return Ok(ParamValue::StrList(items));
    };
    if element == ParamType::Str {
        return Ok(ParamValue::StrList(items));
    }

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let value = parse_scalar(element, &item).ok_or_else(|| SequencerError::InvalidList {
            param: param.to_string(),
            reason: format!("'{item}' is not {} {element} value", article(element)),
        })?;
        parsed.push(value);
    }
    Ok(collect_list(element, parsed))
}

/// One parameter of a provided sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub default: ParamValue,
    /// Current value, set by the controlling application.
    pub value: ParamValue,
    #[serde(rename = "type")]
    pub kind: ParamType,
}

impl ParamDescriptor {
    pub fn from_raw(sequence: &str, raw: &RawParam) -> Result<Self> {
        let default = raw
            .default
            .as_ref()
            .ok_or_else(|| SequencerError::MissingDefault {
                sequence: sequence.to_string(),
                param: raw.name.clone(),
            })?;
        let default = ParamValue::from_default(sequence, &raw.name, default)?;

        Ok(Self {
            name: raw.name.clone(),
            kind: default.kind(),
            value: default.clone(),
            default,
        })
    }
}

/// Schema of one provided sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceDescriptor {
    pub name: String,
    pub module: String,
    pub params: Vec<ParamDescriptor>,
}

impl SequenceDescriptor {
    pub fn build(module: &str, sequence: &str, raw: &[RawParam]) -> Result<Self> {
        let params = raw
            .iter()
            .map(|p| ParamDescriptor::from_raw(sequence, p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: sequence.to_string(),
            module: module.to_string(),
            params,
        })
    }

    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Coerce `value` to the parameter's type and store it as current value.
    pub fn set_value(&mut self, param: &str, value: ParamValue) -> Result<()> {
        let sequence = self.name.clone();
        let descriptor = self
            .params
            .iter_mut()
            .find(|p| p.name == param)
            .ok_or_else(|| SequencerError::InvalidParamValue {
                sequence: sequence.clone(),
                param: param.to_string(),
                reason: "no such parameter".to_string(),
            })?;

        descriptor.value = value.coerce(descriptor.kind, &sequence, param)?;
        Ok(())
    }

    /// Every parameter's current value, in call order.
    pub fn current_values(&self) -> Vec<Dynamic> {
        self.params.iter().map(|p| p.value.to_dynamic()).collect()
    }
}
