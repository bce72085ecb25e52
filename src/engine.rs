//! The engine context: the one explicit object every bridging operation
//! takes.
//!
//! Owns the object space, the function space, the global scope, the class
//! registries, and the external memory counter. There is no process-global
//! engine lookup; native code reaches its engine only through the context
//! it was handed.
//!
//! The script VM itself lives outside this crate. Script-defined functions
//! enter the bridge as trampolines in the function space; native endpoints
//! leave it the same way, so both sides meet at [`Engine::call`].

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::call::CallContext;
use crate::class::{ClassCore, NativeClass};
use crate::convert::{FromScript, NativeType, ToScript};
use crate::error::{BindError, ConversionError, NativeError, ScriptError, ScriptResult};
use crate::function::NativeFunction;
use crate::heap::{ObjectKind, ObjectSpace, PropertyAttributes, ScriptObject};
use crate::value::{FunctionHandle, ObjectHandle, Value};

/// The callable behind a function value. Native endpoints and the host
/// VM's script functions both take this shape.
pub type Trampoline = Rc<dyn Fn(&mut Engine, Option<Value>, &[Value]) -> ScriptResult<Value>>;

struct FnSlot {
    generation: u32,
    entry: Option<Trampoline>,
}

struct FunctionSpace {
    slots: Vec<FnSlot>,
    free: Vec<u32>,
}

impl FunctionSpace {
    fn new() -> Self {
        FunctionSpace {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, trampoline: Trampoline) -> FunctionHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(trampoline);
            FunctionHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(FnSlot {
                generation: 0,
                entry: Some(trampoline),
            });
            FunctionHandle {
                index,
                generation: 0,
            }
        }
    }

    fn get(&self, handle: FunctionHandle) -> Option<Trampoline> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.clone()
    }
}

pub struct Engine {
    objects: ObjectSpace,
    functions: FunctionSpace,
    globals: FxHashMap<String, Value>,
    classes_by_name: FxHashMap<String, Rc<RefCell<ClassCore>>>,
    classes_by_type: FxHashMap<TypeId, Rc<RefCell<ClassCore>>>,
    external_memory: isize,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            objects: ObjectSpace::new(),
            functions: FunctionSpace::new(),
            globals: FxHashMap::default(),
            classes_by_name: FxHashMap::default(),
            classes_by_type: FxHashMap::default(),
            external_memory: 0,
        }
    }

    // =============================================================================
    // Value space
    // =============================================================================

    pub fn object(&self, handle: ObjectHandle) -> Option<&ScriptObject> {
        self.objects.get(handle)
    }

    pub(crate) fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut ScriptObject> {
        self.objects.get_mut(handle)
    }

    pub(crate) fn alloc_plain_object(&mut self) -> ObjectHandle {
        self.objects.alloc(ObjectKind::Plain)
    }

    pub fn new_object(&mut self) -> Value {
        Value::Object(self.objects.alloc(ObjectKind::Plain))
    }

    pub(crate) fn new_object_with(&mut self, entries: Vec<(String, Value)>) -> Value {
        let handle = self.objects.alloc(ObjectKind::Plain);
        if let Some(obj) = self.objects.get_mut(handle) {
            for (name, value) in entries {
                obj.define_property(&name, value, PropertyAttributes::empty());
            }
        }
        Value::Object(handle)
    }

    pub fn new_array(&mut self, elements: Vec<Value>) -> Value {
        Value::Array(self.objects.alloc_array(elements))
    }

    /// Install a trampoline as a function value. This is how the host VM
    /// hands script-defined functions to the bridge.
    pub fn new_function(
        &mut self,
        f: impl Fn(&mut Engine, Option<Value>, &[Value]) -> ScriptResult<Value> + 'static,
    ) -> Value {
        Value::Function(self.functions.alloc(Rc::new(f)))
    }

    // =============================================================================
    // Global scope
    // =============================================================================

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Store a native value at global scope.
    pub fn set_global_typed<T: ToScript>(
        &mut self,
        name: &str,
        value: T,
    ) -> Result<(), ConversionError> {
        let value = value.to_script(self)?;
        self.set_global(name, value);
        Ok(())
    }

    /// Read a global as a native type. An absent global reads as
    /// `undefined`; conversion failure surfaces here, at the outermost
    /// boundary.
    pub fn get_global_typed<T: FromScript>(&self, name: &str) -> ScriptResult<T> {
        let value = self.get_global(name).unwrap_or(Value::Undefined);
        T::from_script(self, &value).map_err(ScriptError::from)
    }

    // =============================================================================
    // Exposure
    // =============================================================================

    /// Expose a native endpoint as a global function value. Re-exposing a
    /// taken name debug-asserts and no-ops, returning the existing value.
    pub fn expose_function(&mut self, func: NativeFunction) -> Value {
        let name = func.name().to_string();
        if let Some(existing) = self.globals.get(&name) {
            debug_assert!(false, "function '{name}' is already exposed");
            return existing.clone();
        }
        let value = self.function_value(func);
        self.globals.insert(name, value.clone());
        value
    }

    /// Wrap an endpoint into a function value without touching the global
    /// scope.
    pub fn function_value(&mut self, func: NativeFunction) -> Value {
        let trampoline: Trampoline = Rc::new(move |engine, this, args| {
            let mut ctx = CallContext::new(engine, this, args.to_vec());
            translate_panics(|| func.invoke(&mut ctx).map_err(ScriptError::from))
        });
        Value::Function(self.functions.alloc(trampoline))
    }

    /// Expose a class: register it by name and native type, and install
    /// its constructor as a global function value.
    pub fn expose_class<T: NativeType>(
        &mut self,
        class: &NativeClass<T>,
    ) -> Result<Value, BindError> {
        let name = class.name();
        // A global of the same name would be clobbered by the ctor value.
        if self.classes_by_name.contains_key(name) || self.globals.contains_key(name) {
            return Err(BindError::DuplicateClass {
                name: name.to_string(),
            });
        }
        if self.classes_by_type.contains_key(&TypeId::of::<T>()) {
            return Err(BindError::DuplicateClassType {
                name: name.to_string(),
            });
        }

        let core = Rc::clone(class.core());
        self.classes_by_name.insert(name.to_string(), core.clone());
        self.classes_by_type.insert(TypeId::of::<T>(), core.clone());

        // Weak capture: the ctor value must not keep a removed class alive.
        let weak: Weak<RefCell<ClassCore>> = Rc::downgrade(&core);
        let ctor: Trampoline = Rc::new(move |engine, _this, args| {
            let core = weak
                .upgrade()
                .ok_or(ScriptError::StaleHandle { kind: "constructor" })?;
            translate_panics(|| {
                ClassCore::construct_value(&core, engine, args).map_err(ScriptError::from)
            })
        });
        let value = Value::Function(self.functions.alloc(ctor));
        self.globals.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Remove an exposed class. Instances already bound stay alive until
    /// disposed or until the last descriptor reference drops.
    pub fn remove_class(&mut self, name: &str) -> Result<(), BindError> {
        let core = self
            .classes_by_name
            .remove(name)
            .ok_or_else(|| BindError::UnknownClass {
                name: name.to_string(),
            })?;
        let type_id = core.borrow().type_id;
        self.classes_by_type.remove(&type_id);
        self.globals.remove(name);
        Ok(())
    }

    /// The exposed class bound to the native type `T`, if any.
    pub fn class_of<T: NativeType>(&self) -> Option<NativeClass<T>> {
        self.classes_by_type
            .get(&TypeId::of::<T>())
            .cloned()
            .map(NativeClass::from_core)
    }

    pub(crate) fn wrap_rc<T: NativeType>(
        &mut self,
        rc: Rc<RefCell<T>>,
    ) -> Result<Value, ConversionError> {
        let core = self
            .classes_by_type
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or(ConversionError::UnregisteredClass { name: T::NAME })?;
        let cell: Rc<dyn Any> = rc;
        Ok(ClassCore::bind_cell(&core, self, cell))
    }

    // =============================================================================
    // Invocation
    // =============================================================================

    pub fn call(&mut self, callee: &Value, args: &[Value]) -> ScriptResult<Value> {
        self.call_with_this(callee, None, args)
    }

    pub fn call_with_this(
        &mut self,
        callee: &Value,
        this: Option<Value>,
        args: &[Value],
    ) -> ScriptResult<Value> {
        let handle = callee.as_function().ok_or(ScriptError::NotCallable {
            actual: callee.type_name(),
        })?;
        let trampoline = self
            .functions
            .get(handle)
            .ok_or(ScriptError::StaleHandle { kind: "function" })?;
        trampoline(self, this, args)
    }

    /// Invoke a named method on an object: class methods first, then a
    /// function-valued own property.
    pub fn call_method(
        &mut self,
        object: &Value,
        name: &str,
        args: &[Value],
    ) -> ScriptResult<Value> {
        let handle = self.expect_object(object)?;

        if let Some(core) = self.bound_class(handle) {
            let method = core.borrow().methods.get(name).cloned();
            if let Some(method) = method {
                let mut ctx = CallContext::new(self, Some(object.clone()), args.to_vec());
                return translate_panics(|| method.invoke(&mut ctx).map_err(ScriptError::from));
            }
        }

        let member = self
            .objects
            .get(handle)
            .and_then(|obj| obj.property(name).cloned());
        match member {
            Some(callee) => self.call_with_this(&callee, Some(object.clone()), args),
            None => Err(ScriptError::UnknownMethod {
                name: name.to_string(),
            }),
        }
    }

    // =============================================================================
    // Property routing
    // =============================================================================

    /// Read a property: class accessor getters take precedence over own
    /// properties; an absent property reads as `undefined`.
    pub fn get_property(&mut self, object: &Value, name: &str) -> ScriptResult<Value> {
        let handle = self.expect_object(object)?;

        if let Some(core) = self.bound_class(handle) {
            let getter = core.borrow().accessors.get(name).map(|a| a.getter.clone());
            if let Some(getter) = getter {
                let mut ctx = CallContext::new(self, Some(object.clone()), Vec::new());
                return translate_panics(|| getter.invoke(&mut ctx).map_err(ScriptError::from));
            }
        }

        Ok(self
            .objects
            .get(handle)
            .and_then(|obj| obj.property(name).cloned())
            .unwrap_or(Value::Undefined))
    }

    /// Write a property through the accessor setter when one exists; a
    /// getter-only accessor makes the property read-only, as do READ_ONLY
    /// own properties.
    pub fn set_property(&mut self, object: &Value, name: &str, value: Value) -> ScriptResult<()> {
        let handle = self.expect_object(object)?;

        if let Some(core) = self.bound_class(handle) {
            let accessor = {
                let c = core.borrow();
                c.accessors
                    .get(name)
                    .map(|a| (a.setter.clone(), a.getter.clone()))
            };
            if let Some((setter, _getter)) = accessor {
                let setter = setter.ok_or_else(|| ScriptError::ReadOnlyProperty {
                    name: name.to_string(),
                })?;
                let mut ctx = CallContext::new(self, Some(object.clone()), vec![value]);
                return translate_panics(|| {
                    setter.invoke(&mut ctx).map(|_| ()).map_err(ScriptError::from)
                });
            }
        }

        let obj = self
            .objects
            .get_mut(handle)
            .ok_or(ScriptError::StaleHandle { kind: "object" })?;
        if obj.set_property(name, value) {
            Ok(())
        } else {
            Err(ScriptError::ReadOnlyProperty {
                name: name.to_string(),
            })
        }
    }

    // =============================================================================
    // GC boundary
    // =============================================================================

    /// The engine GC's weak-callback notification: the object became
    /// unreachable. Disposes any bound instance, then frees the heap slot.
    pub fn notify_unreachable(&mut self, handle: ObjectHandle) {
        if let Some(core) = self.bound_class(handle) {
            ClassCore::dispose_object(&core, self, handle);
        }
        self.objects.free(handle);
    }

    pub(crate) fn adjust_external_memory(&mut self, delta: isize) {
        self.external_memory += delta;
    }

    /// Net external memory the engine has been told native instances
    /// occupy.
    pub fn external_memory(&self) -> isize {
        self.external_memory
    }

    // =============================================================================
    // Internals
    // =============================================================================

    fn expect_object(&self, value: &Value) -> ScriptResult<ObjectHandle> {
        let handle = match value {
            Value::Object(h) | Value::Array(h) => *h,
            other => {
                return Err(ScriptError::Conversion(ConversionError::mismatch(
                    "object",
                    other.type_name(),
                )));
            }
        };
        if self.objects.get(handle).is_none() {
            return Err(ScriptError::StaleHandle { kind: "object" });
        }
        Ok(handle)
    }

    fn bound_class(&self, handle: ObjectHandle) -> Option<Rc<RefCell<ClassCore>>> {
        self.objects
            .get(handle)?
            .bound
            .as_ref()
            .and_then(|bound| bound.class.upgrade())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Native panics stop at the call boundary and cross as errors.
pub(crate) fn translate_panics<T>(f: impl FnOnce() -> ScriptResult<T>) -> ScriptResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ScriptError::Native(NativeError::Panic {
            message: panic_message(payload.as_ref()),
        })),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
