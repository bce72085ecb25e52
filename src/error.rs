//! Error types for the bridging layer.
//!
//! Four layers, innermost to outermost:
//! - [`ConversionError`]: a single value failed to cross the boundary
//! - [`NativeError`]: a native call failed (dispatch, receiver, argument)
//! - [`BindError`]: a registration was rejected
//! - [`ScriptError`]: the outermost result of driving the engine

use thiserror::Error;

/// Errors from converting a single value between the script and native
/// representations.
///
/// Conversion failure is always an error value, never a thrown script
/// exception; callers decide whether it aborts a candidate check or an
/// actual invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The value's kind does not convert to the requested native type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A native handle referred to a class that was never exposed on this
    /// engine.
    #[error("class '{name}' is not registered with this engine")]
    UnregisteredClass { name: &'static str },

    /// The object's bound instance was already destroyed.
    #[error("instance of '{name}' was already disposed")]
    DisposedInstance { name: &'static str },

    /// Catch-all for custom conversions.
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

impl ConversionError {
    pub fn mismatch(expected: &'static str, actual: &'static str) -> Self {
        ConversionError::TypeMismatch { expected, actual }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ConversionError::Failed {
            message: message.into(),
        }
    }
}

/// Errors produced while dispatching or running a native callable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeError {
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// No registered overload accepted the provided arguments. Lists the
    /// formatted signature of every registered overload.
    #[error(
        "no overload of '{name}' matches the number and/or types of the provided arguments; registered overloads: [{}]",
        .overloads.join(", ")
    )]
    NoMatchingOverload { name: String, overloads: Vec<String> },

    /// More than one overload accepted the provided arguments. Lists the
    /// formatted signature of every surviving candidate.
    #[error(
        "ambiguous call to '{name}' for the provided arguments; candidates: [{}]",
        .candidates.join(", ")
    )]
    AmbiguousOverload { name: String, candidates: Vec<String> },

    /// A class marked abstract was asked to construct an instance.
    #[error("class '{name}' is abstract and cannot be instantiated")]
    AbstractClass { name: String },

    /// The receiver was missing, foreign, or of the wrong native type.
    #[error("invalid receiver: {message}")]
    InvalidThis { message: String },

    #[error("argument index {index} out of bounds (call has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// The receiver is already borrowed by an outer call on the same
    /// instance.
    #[error("instance of '{name}' is already borrowed")]
    BorrowConflict { name: &'static str },

    /// A native callable panicked; the panic was caught at the call
    /// boundary and translated.
    #[error("native callable panicked: {message}")]
    Panic { message: String },
}

impl NativeError {
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }
}

/// Errors from registering functions or classes on an engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("a class named '{name}' is already exposed on this engine")]
    DuplicateClass { name: String },

    #[error("the native type behind '{name}' is already exposed on this engine")]
    DuplicateClassType { name: String },

    #[error("class '{name}' is not exposed on this engine")]
    UnknownClass { name: String },
}

/// The outermost error type: everything that can go wrong while driving
/// the engine from native code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("native error: {0}")]
    Native(#[from] NativeError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("value of kind {actual} is not callable")]
    NotCallable { actual: &'static str },

    /// A handle referred to a heap slot that was freed or recycled.
    #[error("stale handle: the referenced {kind} no longer exists")]
    StaleHandle { kind: &'static str },

    #[error("object has no method '{name}'")]
    UnknownMethod { name: String },

    #[error("property '{name}' is read-only")]
    ReadOnlyProperty { name: String },

    /// Host VM failed to compile a script. The VM itself is outside this
    /// crate; its trampolines surface the failure here.
    #[error("script compilation failed: {message}")]
    Compilation { message: String },

    #[error("script execution failed: {message}")]
    Execution { message: String },

    /// A script-side exception propagated out of a call.
    #[error("script exception: {message}")]
    Thrown { message: String },
}

pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_matching_overload_lists_signatures() {
        let err = NativeError::NoMatchingOverload {
            name: "multiply".into(),
            overloads: vec![
                "number (number, number)".into(),
                "number (number, number, number)".into(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("multiply"));
        assert!(text.contains("number (number, number)"));
        assert!(text.contains("number (number, number, number)"));
    }

    #[test]
    fn ambiguous_overload_lists_candidates() {
        let err = NativeError::AmbiguousOverload {
            name: "add".into(),
            candidates: vec!["number (number)".into(), "string (string)".into()],
        };
        let text = err.to_string();
        assert!(text.contains("ambiguous"));
        assert!(text.contains("number (number)"));
    }

    #[test]
    fn conversion_error_flows_into_native_error() {
        let err: NativeError = ConversionError::mismatch("number", "null").into();
        assert!(matches!(err, NativeError::Conversion(_)));
    }

    #[test]
    fn errors_display_class_names() {
        let err = NativeError::AbstractClass {
            name: "Shape".into(),
        };
        assert!(err.to_string().contains("Shape"));
    }
}
