//! Argument model for late-bound calls.
//!
//! Submitters pass untyped [`Value`]s. Where the dynamic type of a value is ambiguous (an integer
//! whose width matters, or a null of some reference kind), a [`Arg::Tag`] placed immediately
//! before the value names the parameter kind it must resolve to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An untyped submitted value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
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

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Concrete parameter kind of a registered operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
    Bytes,
}

impl ArgKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArgKind::Bool => "bool",
            ArgKind::I8 => "i8",
            ArgKind::I16 => "i16",
            ArgKind::I32 => "i32",
            ArgKind::I64 => "i64",
            ArgKind::F32 => "f32",
            ArgKind::F64 => "f64",
            ArgKind::Str => "str",
            ArgKind::Bytes => "bytes",
        }
    }

    /// Kinds that accept a tagged null
    pub fn is_nullable(self) -> bool {
        matches!(self, ArgKind::Str | ArgKind::Bytes)
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArgKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(ArgKind::Bool),
            "i8" => Ok(ArgKind::I8),
            "i16" => Ok(ArgKind::I16),
            "i32" => Ok(ArgKind::I32),
            "i64" => Ok(ArgKind::I64),
            "f32" => Ok(ArgKind::F32),
            "f64" => Ok(ArgKind::F64),
            "str" => Ok(ArgKind::Str),
            "bytes" => Ok(ArgKind::Bytes),
            other => Err(format!("Unknown argument kind: {}", other)),
        }
    }
}

/// One submission token: a value, or a type tag describing the value that follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Tag(ArgKind),
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

/// Ordered submission tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Arg>);

impl Args {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an untagged value
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.0.push(Arg::Value(value.into()));
        self
    }

    /// Append a value preceded by its type tag
    pub fn typed(mut self, kind: ArgKind, value: impl Into<Value>) -> Self {
        self.0.push(Arg::Tag(kind));
        self.0.push(Arg::Value(value.into()));
        self
    }

    /// Append a null of the given kind
    pub fn null(self, kind: ArgKind) -> Self {
        self.typed(kind, Value::Null)
    }

    /// Append a raw token
    pub fn token(mut self, arg: Arg) -> Self {
        self.0.push(arg);
        self
    }

    pub fn tokens(&self) -> &[Arg] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve tokens into width-exact values.
    pub fn resolve(&self) -> Result<Vec<TypedValue>, String> {
        let mut out = Vec::with_capacity(self.0.len());
        let mut tokens = self.0.iter();
        while let Some(token) = tokens.next() {
            let position = out.len();
            let typed = match token {
                Arg::Value(value) => TypedValue::natural(value),
                Arg::Tag(kind) => match tokens.next() {
                    Some(Arg::Value(value)) => TypedValue::coerce(*kind, value),
                    Some(Arg::Tag(next)) => Err(format!(
                        "type tag `{}` is followed by another tag `{}`",
                        kind, next
                    )),
                    None => Err(format!("trailing type tag `{}`", kind)),
                },
            };
            out.push(typed.map_err(|e| format!("argument {}: {}", position, e))?);
        }
        Ok(out)
    }
}

impl From<Vec<Arg>> for Args {
    fn from(tokens: Vec<Arg>) -> Self {
        Self(tokens)
    }
}

/// A resolved argument, as seen by operation handlers
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(Option<String>),
    Bytes(Option<Vec<u8>>),
}

impl TypedValue {
    pub fn kind(&self) -> ArgKind {
        match self {
            TypedValue::Bool(_) => ArgKind::Bool,
            TypedValue::I8(_) => ArgKind::I8,
            TypedValue::I16(_) => ArgKind::I16,
            TypedValue::I32(_) => ArgKind::I32,
            TypedValue::I64(_) => ArgKind::I64,
            TypedValue::F32(_) => ArgKind::F32,
            TypedValue::F64(_) => ArgKind::F64,
            TypedValue::Str(_) => ArgKind::Str,
            TypedValue::Bytes(_) => ArgKind::Bytes,
        }
    }

    /// Resolve an untagged value to its natural kind.
    ///
    /// Integers default to `i32`; wider values must be tagged.
    pub fn natural(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Err("untagged null has no type".to_string()),
            Value::Bool(v) => Ok(TypedValue::Bool(*v)),
            Value::Int(v) => i32::try_from(*v)
                .map(TypedValue::I32)
                .map_err(|_| format!("integer {} does not fit i32 (tag it with a wider kind)", v)),
            Value::Float(v) => Ok(TypedValue::F64(*v)),
            Value::Str(v) => Ok(TypedValue::Str(Some(v.clone()))),
            Value::Bytes(v) => Ok(TypedValue::Bytes(Some(v.clone()))),
        }
    }

    /// Resolve a value against an explicit type tag.
    pub fn coerce(kind: ArgKind, value: &Value) -> Result<Self, String> {
        let mismatch = || format!("cannot use {} as `{}`", describe(value), kind);
        let narrow = |v: i64| format!("integer {} out of range for `{}`", v, kind);
        match (kind, value) {
            (kind, Value::Null) if !kind.is_nullable() => Err(format!("`{}` cannot be null", kind)),
            (ArgKind::Bool, Value::Bool(v)) => Ok(TypedValue::Bool(*v)),
            (ArgKind::I8, Value::Int(v)) => {
                i8::try_from(*v).map(TypedValue::I8).map_err(|_| narrow(*v))
            }
            (ArgKind::I16, Value::Int(v)) => {
                i16::try_from(*v).map(TypedValue::I16).map_err(|_| narrow(*v))
            }
            (ArgKind::I32, Value::Int(v)) => {
                i32::try_from(*v).map(TypedValue::I32).map_err(|_| narrow(*v))
            }
            (ArgKind::I64, Value::Int(v)) => Ok(TypedValue::I64(*v)),
            (ArgKind::F32, Value::Int(v)) => Ok(TypedValue::F32(*v as f32)),
            (ArgKind::F32, Value::Float(v)) => Ok(TypedValue::F32(*v as f32)),
            (ArgKind::F64, Value::Int(v)) => Ok(TypedValue::F64(*v as f64)),
            (ArgKind::F64, Value::Float(v)) => Ok(TypedValue::F64(*v)),
            (ArgKind::Str, Value::Str(v)) => Ok(TypedValue::Str(Some(v.clone()))),
            (ArgKind::Str, Value::Null) => Ok(TypedValue::Str(None)),
            (ArgKind::Bytes, Value::Bytes(v)) => Ok(TypedValue::Bytes(Some(v.clone()))),
            (ArgKind::Bytes, Value::Null) => Ok(TypedValue::Bytes(None)),
            _ => Err(mismatch()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer width, widened
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::I8(v) => Some((*v).into()),
            TypedValue::I16(v) => Some((*v).into()),
            TypedValue::I32(v) => Some((*v).into()),
            TypedValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::F32(v) => Some((*v).into()),
            TypedValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TypedValue::Bytes(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Str(None) | TypedValue::Bytes(None))
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => format!("bool {}", v),
        Value::Int(v) => format!("integer {}", v),
        Value::Float(v) => format!("float {}", v),
        Value::Str(_) => "string".to_string(),
        Value::Bytes(_) => "bytes".to_string(),
    }
}
