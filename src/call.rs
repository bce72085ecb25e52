//! The per-invocation view handed to native callables.
//!
//! A [`CallContext`] packages the receiver, the positional arguments, and
//! mutable access to the engine for the duration of one native call. Typed
//! access goes through the conversion traits; raw-argument callables read
//! the argument values directly.

use std::cell::RefCell;
use std::rc::Rc;

use crate::convert::{FromScript, NativeType, ToScript};
use crate::engine::Engine;
use crate::error::NativeError;
use crate::value::Value;

pub struct CallContext<'e> {
    engine: &'e mut Engine,
    this: Option<Value>,
    args: Vec<Value>,
}

impl<'e> CallContext<'e> {
    pub fn new(engine: &'e mut Engine, this: Option<Value>, args: Vec<Value>) -> Self {
        CallContext { engine, this, args }
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        self.engine
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg_value(&self, index: usize) -> Result<&Value, NativeError> {
        self.args
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.args.len(),
            })
    }

    /// Decode argument `index` into a native type.
    pub fn arg<T: FromScript>(&self, index: usize) -> Result<T, NativeError> {
        let value = self.arg_value(index)?;
        T::from_script(self.engine, value).map_err(NativeError::from)
    }

    pub fn this_value(&self) -> Option<&Value> {
        self.this.as_ref()
    }

    /// Recover the receiver's native instance.
    ///
    /// A missing receiver, a receiver of a foreign type, or a disposed
    /// instance is an error here, never silent misbehavior.
    pub fn this_cell<T: NativeType>(&self) -> Result<Rc<RefCell<T>>, NativeError> {
        let this = self
            .this
            .as_ref()
            .ok_or_else(|| NativeError::invalid_this("call has no receiver"))?;
        let handle = this
            .as_object()
            .ok_or_else(|| NativeError::invalid_this(format!("receiver is {}", this.type_name())))?;
        let obj = self
            .engine
            .object(handle)
            .ok_or_else(|| NativeError::invalid_this("receiver handle is stale"))?;
        let bound = obj
            .bound
            .as_ref()
            .ok_or_else(|| NativeError::invalid_this("receiver has no bound native instance"))?;
        let alive = bound.instance.upgrade().ok_or_else(|| {
            NativeError::invalid_this(format!("instance of '{}' was disposed", bound.type_name))
        })?;
        alive.downcast::<RefCell<T>>().map_err(|_| {
            NativeError::invalid_this(format!(
                "receiver is bound to '{}', expected '{}'",
                bound.type_name,
                T::NAME
            ))
        })
    }

    /// Convert a native result for return to the script side. Convenience
    /// for raw-argument callables.
    pub fn ret<T: ToScript>(&mut self, value: T) -> Result<Value, NativeError> {
        value.to_script(self.engine).map_err(NativeError::from)
    }
}
