//! Descriptor names, types and values
//!
//! A descriptor is a named attribute of an audio sample. Names are
//! dot-separated paths (`lowlevel.mfcc.mean`, `highlevel.type.value`) and
//! every descriptor carries a type tag shared by all points of a dataset.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Descriptor holding the original file name, used as display label
pub const FILENAME_DESCRIPTOR: &str = "metadata.tags.file_name";
/// Descriptor holding the content hash, used as point identifier
pub const MD5_DESCRIPTOR: &str = "metadata.audio_properties.md5_encoded";
/// Descriptor holding the coarse sample type used for bucketing
pub const TYPE_DESCRIPTOR: &str = "highlevel.type.value";

/// One sample's descriptor mapping, as produced by the extraction service
pub type Descriptors = BTreeMap<String, Value>;

/// Type tag of a descriptor within a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorType {
    /// Numeric descriptor with the same length on every point (scalars are `Real(1)`)
    Real(usize),
    /// Ragged numeric sequence, e.g. raw per-frame features
    VariableLength,
    /// Free-form categorical value
    String,
    /// Categorical value mapped onto an integer code
    Enum,
}

/// Coarse kind of a descriptor, ignoring length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorKind {
    Real,
    String,
    Enum,
}

impl DescriptorType {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            DescriptorType::Real(_) | DescriptorType::VariableLength => DescriptorKind::Real,
            DescriptorType::String => DescriptorKind::String,
            DescriptorType::Enum => DescriptorKind::Enum,
        }
    }

    /// Whether `value` is a valid value for a descriptor of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (DescriptorType::Real(dim), Value::Real(v)) => v.len() == *dim,
            (DescriptorType::VariableLength, Value::Real(_)) => true,
            (DescriptorType::String, Value::String(_)) => true,
            (DescriptorType::Enum, Value::Enum(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorType::Real(dim) => write!(f, "real[{}]", dim),
            DescriptorType::VariableLength => write!(f, "real[*]"),
            DescriptorType::String => write!(f, "string"),
            DescriptorType::Enum => write!(f, "enum"),
        }
    }
}

/// A typed descriptor value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Real(Vec<f32>),
    String(String),
    Enum(u32),
}

impl Value {
    #[inline]
    pub fn scalar(x: f32) -> Self {
        Value::Real(vec![x])
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Value::Real(_) => DescriptorKind::Real,
            Value::String(_) => DescriptorKind::String,
            Value::Enum(_) => DescriptorKind::Enum,
        }
    }

    /// Type this value would have on its own (numeric values report their length)
    pub fn natural_type(&self) -> DescriptorType {
        match self {
            Value::Real(v) => DescriptorType::Real(v.len()),
            Value::String(_) => DescriptorType::String,
            Value::Enum(_) => DescriptorType::Enum,
        }
    }

    #[inline]
    pub fn as_real(&self) -> Option<&[f32]> {
        match self {
            Value::Real(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_enum(&self) -> Option<u32> {
        match self {
            Value::Enum(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::scalar(x)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// A named, typed layout entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DescriptorType,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, ty: DescriptorType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Wildcard pattern over descriptor names
///
/// `*` matches any run of characters (dots included) and `?` matches a
/// single character, so `highlevel.*.all.*` selects every class
/// probability of every classifier. A leading dot is ignored.
#[derive(Debug, Clone)]
pub struct DescriptorPattern {
    source: String,
    regex: Regex,
}

impl DescriptorPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let trimmed = pattern.strip_prefix('.').unwrap_or(pattern);
        let mut expr = String::with_capacity(trimmed.len() + 8);
        expr.push('^');
        for c in trimmed.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr)
            .map_err(|e| Error::InvalidConfig(format!("bad descriptor pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Compile a list of patterns
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>> {
        patterns.iter().map(|p| Self::new(p.as_ref())).collect()
    }

    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
