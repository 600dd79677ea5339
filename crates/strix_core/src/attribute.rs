//! User attributes attached to exported nodes.
//!
//! Values are a tagged variant. Everything that differs between kinds
//! (declaration name, component width, default, JSON decoding) lives in one
//! table entry per kind, so adding a kind is one registration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strix_math::{Mat4, Vec3};

/// Kind tag of an attribute value. The discriminant indexes `KINDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Bool = 0,
    Int = 1,
    Float = 2,
    Vector = 3,
    Color = 4,
    Matrix = 5,
    String = 6,
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector(Vec3),
    Color([f32; 4]),
    Matrix(Mat4),
    String(String),
}

/// Per-kind dispatch entry.
pub struct KindInfo {
    pub kind: AttributeKind,
    /// Type name used in node declarations
    pub type_name: &'static str,
    /// Number of scalar components of one value
    pub components: usize,
    default: fn() -> AttributeValue,
    parse: fn(&Value) -> Option<AttributeValue>,
}

static KINDS: [KindInfo; 7] = [
    KindInfo {
        kind: AttributeKind::Bool,
        type_name: "BOOL",
        components: 1,
        default: default_bool,
        parse: parse_bool,
    },
    KindInfo {
        kind: AttributeKind::Int,
        type_name: "INT",
        components: 1,
        default: default_int,
        parse: parse_int,
    },
    KindInfo {
        kind: AttributeKind::Float,
        type_name: "FLOAT",
        components: 1,
        default: default_float,
        parse: parse_float,
    },
    KindInfo {
        kind: AttributeKind::Vector,
        type_name: "VECTOR",
        components: 3,
        default: default_vector,
        parse: parse_vector,
    },
    KindInfo {
        kind: AttributeKind::Color,
        type_name: "RGBA",
        components: 4,
        default: default_color,
        parse: parse_color,
    },
    KindInfo {
        kind: AttributeKind::Matrix,
        type_name: "MATRIX",
        components: 16,
        default: default_matrix,
        parse: parse_matrix,
    },
    KindInfo {
        kind: AttributeKind::String,
        type_name: "STRING",
        components: 1,
        default: default_string,
        parse: parse_string,
    },
];

fn default_bool() -> AttributeValue {
    AttributeValue::Bool(false)
}
fn default_int() -> AttributeValue {
    AttributeValue::Int(0)
}
fn default_float() -> AttributeValue {
    AttributeValue::Float(0.0)
}
fn default_vector() -> AttributeValue {
    AttributeValue::Vector(Vec3::ZERO)
}
fn default_color() -> AttributeValue {
    AttributeValue::Color([0.0, 0.0, 0.0, 1.0])
}
fn default_matrix() -> AttributeValue {
    AttributeValue::Matrix(Mat4::IDENTITY)
}
fn default_string() -> AttributeValue {
    AttributeValue::String(String::new())
}

fn floats<const N: usize>(value: &Value) -> Option<[f32; N]> {
    let array = value.as_array()?;
    if array.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, v) in out.iter_mut().zip(array) {
        *slot = v.as_f64()? as f32;
    }
    Some(out)
}

fn parse_bool(value: &Value) -> Option<AttributeValue> {
    value.as_bool().map(AttributeValue::Bool)
}
fn parse_int(value: &Value) -> Option<AttributeValue> {
    let i = value.as_i64()?;
    i32::try_from(i).ok().map(AttributeValue::Int)
}
fn parse_float(value: &Value) -> Option<AttributeValue> {
    value.as_f64().map(|f| AttributeValue::Float(f as f32))
}
fn parse_vector(value: &Value) -> Option<AttributeValue> {
    floats::<3>(value).map(|v| AttributeValue::Vector(Vec3::from_array(v)))
}
fn parse_color(value: &Value) -> Option<AttributeValue> {
    // Alpha is optional
    if let Some([r, g, b]) = floats::<3>(value) {
        return Some(AttributeValue::Color([r, g, b, 1.0]));
    }
    floats::<4>(value).map(AttributeValue::Color)
}
fn parse_matrix(value: &Value) -> Option<AttributeValue> {
    floats::<16>(value).map(|m| AttributeValue::Matrix(Mat4::from_cols_array(&m)))
}
fn parse_string(value: &Value) -> Option<AttributeValue> {
    value.as_str().map(|s| AttributeValue::String(s.to_string()))
}

impl AttributeKind {
    /// Dispatch entry for this kind.
    pub fn info(self) -> &'static KindInfo {
        &KINDS[self as usize]
    }

    pub fn default_value(self) -> AttributeValue {
        (self.info().default)()
    }

    /// Decode one JSON value as this kind.
    pub fn parse(self, value: &Value) -> Option<AttributeValue> {
        (self.info().parse)(value)
    }
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Bool(_) => AttributeKind::Bool,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::Vector(_) => AttributeKind::Vector,
            AttributeValue::Color(_) => AttributeKind::Color,
            AttributeValue::Matrix(_) => AttributeKind::Matrix,
            AttributeValue::String(_) => AttributeKind::String,
        }
    }
}

/// Pad or truncate `values` to `expected` entries, filling with `fill`.
///
/// Returns true if the array had to be changed.
pub fn conform<T: Clone>(values: &mut Vec<T>, expected: usize, fill: T, what: &str) -> bool {
    if values.len() == expected {
        return false;
    }
    log::warn!(
        "{} has {} values, expected {}; {}",
        what,
        values.len(),
        expected,
        if values.len() < expected {
            "padding with default"
        } else {
            "truncating"
        }
    );
    values.resize(expected, fill);
    true
}

/// A homogeneous array of attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttributeArray")]
pub struct AttributeArray {
    kind: AttributeKind,
    values: Vec<AttributeValue>,
}

#[derive(Deserialize)]
struct RawAttributeArray {
    kind: AttributeKind,
    values: Vec<Value>,
}

impl TryFrom<RawAttributeArray> for AttributeArray {
    type Error = String;

    fn try_from(raw: RawAttributeArray) -> Result<Self, Self::Error> {
        let values = raw
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                raw.kind
                    .parse(v)
                    .ok_or_else(|| format!("value {} is not a valid {:?}: {}", i, raw.kind, v))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kind: raw.kind,
            values,
        })
    }
}

impl AttributeArray {
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
        }
    }

    /// Build from values. Values of another kind are dropped with a warning.
    pub fn from_values(kind: AttributeKind, values: impl IntoIterator<Item = AttributeValue>) -> Self {
        let mut array = Self::new(kind);
        for value in values {
            array.push(value);
        }
        array
    }

    /// Append a value. Returns false (and keeps the array unchanged) on a
    /// kind mismatch.
    pub fn push(&mut self, value: AttributeValue) -> bool {
        if value.kind() != self.kind {
            log::warn!(
                "Dropping {:?} value pushed into a {:?} attribute array",
                value.kind(),
                self.kind
            );
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// Number of scalar components across the whole array.
    pub fn component_count(&self) -> usize {
        self.values.len() * self.kind.info().components
    }

    /// Pad or truncate to `expected` values using the kind's default.
    pub fn conform(&mut self, expected: usize, what: &str) -> bool {
        conform(&mut self.values, expected, self.kind.default_value(), what)
    }
}

/// Whether an attribute holds one value per object or one per strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeScope {
    Constant,
    Uniform,
}

/// A named user attribute declared on an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAttribute {
    pub name: String,
    pub scope: AttributeScope,
    pub values: AttributeArray,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, scope: AttributeScope, values: AttributeArray) -> Self {
        Self {
            name: name.into(),
            scope,
            values,
        }
    }

    /// Node declaration string, e.g. `"uniform FLOAT"`.
    pub fn declaration(&self) -> String {
        let scope = match self.scope {
            AttributeScope::Constant => "constant",
            AttributeScope::Uniform => "uniform",
        };
        format!("{} {}", scope, self.values.kind().info().type_name)
    }
}
