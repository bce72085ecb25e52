//! Bidirectional conversion between [`Value`] and native Rust types.
//!
//! - [`FromScript`]: script → native, with a non-converting [`FromScript::matches`]
//!   predicate used by overload candidate checks.
//! - [`ToScript`]: native → script.
//! - [`ScriptTyped`]: the script-visible type name, used verbatim in
//!   formatted signatures and dispatch diagnostics.
//!
//! Numeric policy: the engine has a single number type, so every integer
//! width converts from `Number` by truncating `as` cast. That narrowing is
//! deliberate and silent; callers wanting range checks do them natively.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::ConversionError;
use crate::value::{ArrayRef, FunctionRef, ObjectRef, Value};

/// The script-visible name of a native type.
pub trait ScriptTyped {
    const SCRIPT_NAME: &'static str;
}

/// Conversion from a script value into a native type.
pub trait FromScript: ScriptTyped + Sized {
    fn from_script(engine: &Engine, value: &Value) -> Result<Self, ConversionError>;

    /// Would [`FromScript::from_script`] accept this value? Never converts,
    /// never errors; this is what overload candidate collection runs.
    fn matches(engine: &Engine, value: &Value) -> bool;
}

/// Conversion from a native value into a script value.
pub trait ToScript: ScriptTyped {
    fn to_script(self, engine: &mut Engine) -> Result<Value, ConversionError>;
}

/// Marker for native types bindable as script classes.
pub trait NativeType: Any + 'static {
    /// The class name as script code sees it.
    const NAME: &'static str;
}

// =============================================================================
// Numbers
// =============================================================================

macro_rules! impl_script_number {
    ($($t:ty),* $(,)?) => {$(
        impl ScriptTyped for $t {
            const SCRIPT_NAME: &'static str = "number";
        }

        impl FromScript for $t {
            #[allow(trivial_numeric_casts, clippy::unnecessary_cast)]
            fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
                match value {
                    Value::Number(n) => Ok(*n as $t),
                    other => Err(ConversionError::mismatch("number", other.type_name())),
                }
            }

            fn matches(_engine: &Engine, value: &Value) -> bool {
                value.is_number()
            }
        }

        impl ToScript for $t {
            #[allow(trivial_numeric_casts, clippy::unnecessary_cast)]
            fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
                Ok(Value::Number(self as f64))
            }
        }
    )*};
}

impl_script_number!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);

// =============================================================================
// Bool, string, unit
// =============================================================================

impl ScriptTyped for bool {
    const SCRIPT_NAME: &'static str = "bool";
}

impl FromScript for bool {
    // No truthiness coercion: only Bool converts.
    fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        value
            .as_bool()
            .ok_or_else(|| ConversionError::mismatch("bool", value.type_name()))
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::Bool(_))
    }
}

impl ToScript for bool {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::Bool(self))
    }
}

impl ScriptTyped for String {
    const SCRIPT_NAME: &'static str = "string";
}

impl FromScript for String {
    fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(ConversionError::mismatch("string", other.type_name())),
        }
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::String(_))
    }
}

impl ToScript for String {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::String(self))
    }
}

impl ScriptTyped for &str {
    const SCRIPT_NAME: &'static str = "string";
}

impl ToScript for &str {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::String(self.to_string()))
    }
}

impl ScriptTyped for () {
    const SCRIPT_NAME: &'static str = "void";
}

impl FromScript for () {
    fn from_script(_engine: &Engine, _value: &Value) -> Result<Self, ConversionError> {
        Ok(())
    }

    fn matches(_engine: &Engine, _value: &Value) -> bool {
        true
    }
}

impl ToScript for () {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::Undefined)
    }
}

// =============================================================================
// Reflexive and kind-checked values
// =============================================================================

impl ScriptTyped for Value {
    const SCRIPT_NAME: &'static str = "any";
}

impl FromScript for Value {
    fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }

    fn matches(_engine: &Engine, _value: &Value) -> bool {
        true
    }
}

impl ToScript for Value {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(self)
    }
}

impl ScriptTyped for ObjectRef {
    const SCRIPT_NAME: &'static str = "object";
}

impl FromScript for ObjectRef {
    fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        value
            .as_object()
            .map(ObjectRef)
            .ok_or_else(|| ConversionError::mismatch("object", value.type_name()))
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::Object(_))
    }
}

impl ToScript for ObjectRef {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::Object(self.0))
    }
}

impl ScriptTyped for ArrayRef {
    const SCRIPT_NAME: &'static str = "array";
}

impl FromScript for ArrayRef {
    fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        value
            .as_array()
            .map(ArrayRef)
            .ok_or_else(|| ConversionError::mismatch("array", value.type_name()))
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::Array(_))
    }
}

impl ToScript for ArrayRef {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::Array(self.0))
    }
}

impl ScriptTyped for FunctionRef {
    const SCRIPT_NAME: &'static str = "function";
}

impl FromScript for FunctionRef {
    fn from_script(_engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        value
            .as_function()
            .map(FunctionRef)
            .ok_or_else(|| ConversionError::mismatch("function", value.type_name()))
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::Function(_))
    }
}

impl ToScript for FunctionRef {
    fn to_script(self, _engine: &mut Engine) -> Result<Value, ConversionError> {
        Ok(Value::Function(self.0))
    }
}

// =============================================================================
// Option, Vec, HashMap
// =============================================================================

impl<T: ScriptTyped> ScriptTyped for Option<T> {
    const SCRIPT_NAME: &'static str = T::SCRIPT_NAME;
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_script(engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        if value.is_nullish() {
            Ok(None)
        } else {
            T::from_script(engine, value).map(Some)
        }
    }

    fn matches(engine: &Engine, value: &Value) -> bool {
        value.is_nullish() || T::matches(engine, value)
    }
}

impl<T: ToScript> ToScript for Option<T> {
    fn to_script(self, engine: &mut Engine) -> Result<Value, ConversionError> {
        match self {
            Some(inner) => inner.to_script(engine),
            None => Ok(Value::Null),
        }
    }
}

impl<T: ScriptTyped> ScriptTyped for Vec<T> {
    const SCRIPT_NAME: &'static str = "array";
}

impl<T: FromScript> FromScript for Vec<T> {
    /// An absent (null/undefined) source converts to an empty container.
    fn from_script(engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null | Value::Undefined => Ok(Vec::new()),
            Value::Array(handle) => {
                let obj = engine
                    .object(*handle)
                    .ok_or_else(|| ConversionError::failed("stale array handle"))?;
                obj.elements()
                    .iter()
                    .map(|element| T::from_script(engine, element))
                    .collect()
            }
            other => Err(ConversionError::mismatch("array", other.type_name())),
        }
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::Array(_) | Value::Null | Value::Undefined)
    }
}

impl<T: ToScript> ToScript for Vec<T> {
    fn to_script(self, engine: &mut Engine) -> Result<Value, ConversionError> {
        let elements = self
            .into_iter()
            .map(|element| element.to_script(engine))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(engine.new_array(elements))
    }
}

impl<V: ScriptTyped> ScriptTyped for HashMap<String, V> {
    const SCRIPT_NAME: &'static str = "object";
}

impl<V: FromScript> FromScript for HashMap<String, V> {
    fn from_script(engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null | Value::Undefined => Ok(HashMap::new()),
            Value::Object(handle) => {
                let obj = engine
                    .object(*handle)
                    .ok_or_else(|| ConversionError::failed("stale object handle"))?;
                obj.entries()
                    .map(|(name, entry)| Ok((name.to_string(), V::from_script(engine, entry)?)))
                    .collect()
            }
            other => Err(ConversionError::mismatch("object", other.type_name())),
        }
    }

    fn matches(_engine: &Engine, value: &Value) -> bool {
        matches!(value, Value::Object(_) | Value::Null | Value::Undefined)
    }
}

impl<V: ToScript> ToScript for HashMap<String, V> {
    fn to_script(self, engine: &mut Engine) -> Result<Value, ConversionError> {
        let entries = self
            .into_iter()
            .map(|(name, entry)| Ok((name, entry.to_script(engine)?)))
            .collect::<Result<Vec<_>, ConversionError>>()?;
        Ok(engine.new_object_with(entries))
    }
}

// =============================================================================
// Native instance handles
// =============================================================================

/// Typed shared handle to a native instance bound into the engine.
///
/// A null handle is a first-class state: script `null` converts to a null
/// handle successfully, mirroring a null native pointer.
pub struct NativeHandle<T: NativeType> {
    cell: Option<Rc<RefCell<T>>>,
}

impl<T: NativeType> NativeHandle<T> {
    pub fn new(value: T) -> Self {
        NativeHandle {
            cell: Some(Rc::new(RefCell::new(value))),
        }
    }

    pub fn null() -> Self {
        NativeHandle { cell: None }
    }

    pub(crate) fn from_rc(rc: Rc<RefCell<T>>) -> Self {
        NativeHandle { cell: Some(rc) }
    }

    pub(crate) fn into_rc(self) -> Option<Rc<RefCell<T>>> {
        self.cell
    }

    pub fn is_null(&self) -> bool {
        self.cell.is_none()
    }

    pub fn borrow(&self) -> Option<Ref<'_, T>> {
        self.cell.as_ref().map(|cell| cell.borrow())
    }

    pub fn borrow_mut(&self) -> Option<RefMut<'_, T>> {
        self.cell.as_ref().map(|cell| cell.borrow_mut())
    }
}

impl<T: NativeType> Clone for NativeHandle<T> {
    fn clone(&self) -> Self {
        NativeHandle {
            cell: self.cell.clone(),
        }
    }
}

impl<T: NativeType> ScriptTyped for NativeHandle<T> {
    const SCRIPT_NAME: &'static str = T::NAME;
}

impl<T: NativeType> FromScript for NativeHandle<T> {
    fn from_script(engine: &Engine, value: &Value) -> Result<Self, ConversionError> {
        match value {
            // Null converts to a null handle: a success, not a failure.
            Value::Null => Ok(NativeHandle::null()),
            Value::Object(handle) => {
                let obj = engine
                    .object(*handle)
                    .ok_or_else(|| ConversionError::failed("stale object handle"))?;
                let bound = obj.bound.as_ref().ok_or_else(|| {
                    ConversionError::mismatch(T::NAME, "object")
                })?;
                let alive = bound
                    .instance
                    .upgrade()
                    .ok_or(ConversionError::DisposedInstance { name: T::NAME })?;
                let typed = alive
                    .downcast::<RefCell<T>>()
                    .map_err(|_| ConversionError::mismatch(T::NAME, bound.type_name))?;
                Ok(NativeHandle::from_rc(typed))
            }
            other => Err(ConversionError::mismatch(T::NAME, other.type_name())),
        }
    }

    fn matches(engine: &Engine, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Object(handle) => engine
                .object(*handle)
                .and_then(|obj| obj.bound.as_ref())
                .and_then(|bound| bound.instance.upgrade())
                .is_some_and(|alive| alive.is::<RefCell<T>>()),
            _ => false,
        }
    }
}

impl<T: NativeType> ToScript for NativeHandle<T> {
    fn to_script(self, engine: &mut Engine) -> Result<Value, ConversionError> {
        match self.cell {
            None => Ok(Value::Null),
            Some(rc) => engine.wrap_rc::<T>(rc),
        }
    }
}
