//! The dynamic value token shared between native code and the engine.
//!
//! [`Value`] is a cheap-clone tag: scalars are carried inline, everything
//! heap-allocated (objects, arrays, functions) is carried as a generational
//! handle into the engine's object or function space.

/// Generational handle to a script object (plain or array).
///
/// Handles stay valid as long as the slot's generation matches; a freed and
/// recycled slot makes old handles stale rather than aliasing the new
/// occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub index: u32,
    pub generation: u32,
}

/// Generational handle to a function value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle {
    pub index: u32,
    pub generation: u32,
}

/// A single dynamically-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    /// The engine has one numeric type; integer conversions truncate.
    Number(f64),
    String(String),
    Array(ObjectHandle),
    Object(ObjectHandle),
    Function(FunctionHandle),
}

/// The kind of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    Function,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Function(_) => ValueKind::Function,
        }
    }

    /// Human-readable kind name, used in diagnostics and signature lists.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or undefined: the "absent" kinds.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ObjectHandle> {
        match self {
            Value::Array(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<FunctionHandle> {
        match self {
            Value::Function(h) => Some(*h),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
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

/// Kind-checked wrapper: the value was a plain object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef(pub ObjectHandle);

/// Kind-checked wrapper: the value was an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRef(pub ObjectHandle);

/// Kind-checked wrapper: the value was a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionRef(pub FunctionHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_type_name_agree() {
        assert_eq!(Value::Null.kind(), ValueKind::Null);
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Number(1.5).type_name(), "number");
        assert_eq!(Value::Bool(true).kind(), ValueKind::Bool);
        assert_eq!(Value::String("x".into()).type_name(), "string");
    }

    #[test]
    fn nullish_covers_null_and_undefined() {
        assert!(Value::Null.is_nullish());
        assert!(Value::Undefined.is_nullish());
        assert!(!Value::Number(0.0).is_nullish());
        assert!(!Value::Bool(false).is_nullish());
    }

    #[test]
    fn accessors_are_kind_strict() {
        assert_eq!(Value::Number(2.0).as_number(), Some(2.0));
        assert_eq!(Value::Bool(true).as_number(), None);
        assert_eq!(Value::String("hi".into()).as_str(), Some("hi"));
        assert_eq!(Value::Null.as_str(), None);
    }

    #[test]
    fn handles_compare_by_index_and_generation() {
        let a = ObjectHandle { index: 1, generation: 0 };
        let b = ObjectHandle { index: 1, generation: 1 };
        assert_ne!(a, b);
        assert_ne!(Value::Object(a), Value::Object(b));
    }
}
