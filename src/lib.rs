//! Bind native Rust functions and classes into a dynamically-typed,
//! single-threaded scripting engine, and consume script-defined functions,
//! classes, and instances from native code.
//!
//! The pieces, bottom up:
//! - [`value`]: the dynamic value token and generational handles
//! - [`heap`]: the engine-side object space with property attributes
//! - [`convert`]: `FromScript`/`ToScript` with a non-throwing
//!   convertibility predicate
//! - [`signature`] and [`overload`]: compile-time signature extraction
//!   into overload entries, including raw-argument and constructor shapes
//! - [`function`]: the named overload registry with
//!   collect/tie-break/disambiguate dispatch
//! - [`class`] and [`gc`]: class binding and the cross-runtime GC bridge
//!   (an instance is destroyed exactly once, whichever trigger fires)
//! - [`engine`]: the explicit context every operation takes
//! - [`userland`]: native-side wrappers over script-defined values
//!
//! The script VM (parser, compiler, execution) is out of scope; script
//! functions enter the bridge as trampolines installed on the engine, so
//! both directions of the boundary are exercised without one.

pub mod call;
pub mod class;
pub mod convert;
pub mod engine;
pub mod error;
pub mod function;
pub mod gc;
pub mod heap;
pub mod overload;
pub mod signature;
pub mod userland;
pub mod value;

pub mod prelude {
    pub use crate::call::CallContext;
    pub use crate::class::NativeClass;
    pub use crate::convert::{FromScript, NativeHandle, NativeType, ScriptTyped, ToScript};
    pub use crate::engine::Engine;
    pub use crate::error::{BindError, ConversionError, NativeError, ScriptError, ScriptResult};
    pub use crate::function::NativeFunction;
    pub use crate::heap::PropertyAttributes;
    pub use crate::overload::{IntoCtor, IntoOverload, Overload, ThisMut, ThisRef};
    pub use crate::signature::Signature;
    pub use crate::userland::{ScriptArgs, UserClass, UserFunction, UserInstance};
    pub use crate::value::{ArrayRef, FunctionRef, ObjectHandle, ObjectRef, Value, ValueKind};
}

pub use prelude::*;
