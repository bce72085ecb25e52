//! Native class binding.
//!
//! [`NativeClass<T>`] is a fluent builder over a shared, type-erased
//! [`ClassCore`]: constructor overloads, methods, static methods, accessor
//! registries, class constants, the abstract flag, the custom destructor
//! hook, the per-instance memory cost, and the instance tracker.
//!
//! Construction, in order:
//! 1. abstract classes refuse with [`NativeError::AbstractClass`];
//! 2. zero registered constructor overloads default-construct (captured at
//!    class creation; `without_default` opts out);
//! 3. otherwise the constructor registry dispatches with the same
//!    no-match/ambiguity diagnostics as any overload endpoint.
//!
//! Binding embeds a weak reference to the instance in the object, tracks
//! the strong reference in the class's [`InstanceTracker`], and adjusts the
//! engine's external memory accounting. Disposal (explicit, unreachability
//! notification, or class teardown) releases the tracker entry; that
//! release is the single point of destruction.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::call::CallContext;
use crate::convert::{NativeHandle, NativeType, ToScript};
use crate::engine::Engine;
use crate::error::{ConversionError, NativeError, ScriptError};
use crate::function::{NativeFunction, select_candidate};
use crate::gc::{Finalizer, InstanceTracker};
use crate::heap::BoundInstance;
use crate::overload::{CtorOverload, IntoCtor, IntoOverload, Overload};
use crate::value::{ObjectHandle, Value};

/// A property backed by native code: an overload registry per direction.
/// No setter registry means the property is read-only.
pub(crate) struct Accessor {
    pub getter: NativeFunction,
    pub setter: Option<NativeFunction>,
}

/// Type-erased class state, shared between the engine's registries, every
/// bound object, and each `NativeClass<T>` facade.
pub(crate) struct ClassCore {
    pub name: &'static str,
    pub type_id: TypeId,
    pub is_abstract: bool,
    pub ctors: Vec<Rc<CtorOverload>>,
    pub default_ctor: Option<Box<dyn Fn() -> Rc<dyn Any>>>,
    pub methods: FxHashMap<String, NativeFunction>,
    pub static_methods: FxHashMap<String, NativeFunction>,
    pub accessors: FxHashMap<String, Accessor>,
    pub static_accessors: FxHashMap<String, Accessor>,
    pub constants: FxHashMap<String, Value>,
    pub memory_cost: usize,
    pub destructor: Option<Finalizer>,
    pub tracker: InstanceTracker,
}

enum CtorPath {
    Ready(Rc<dyn Any>),
    Dispatch(Rc<CtorOverload>),
}

impl ClassCore {
    /// Construct an instance and bind it. The engine's constructor
    /// trampoline and `NativeClass::construct` both land here.
    pub(crate) fn construct_value(
        core: &Rc<RefCell<ClassCore>>,
        engine: &mut Engine,
        args: &[Value],
    ) -> Result<Value, NativeError> {
        let path = {
            let c = core.borrow();
            if c.is_abstract {
                return Err(NativeError::AbstractClass {
                    name: c.name.to_string(),
                });
            }
            if c.ctors.is_empty() {
                match &c.default_ctor {
                    Some(make) => CtorPath::Ready(make()),
                    None => {
                        return Err(NativeError::NoMatchingOverload {
                            name: c.name.to_string(),
                            overloads: Vec::new(),
                        });
                    }
                }
            } else {
                CtorPath::Dispatch(select_candidate(
                    c.name,
                    &c.ctors,
                    &*engine,
                    args,
                    |e, en, a| e.can_invoke(en, a),
                    |e| e.is_raw_args(),
                    |e| e.signature().format(),
                )?)
            }
        };

        let cell = match path {
            CtorPath::Ready(cell) => cell,
            CtorPath::Dispatch(ctor) => {
                let mut ctx = CallContext::new(engine, None, args.to_vec());
                ctor.construct(&mut ctx)?
            }
        };

        Ok(Self::bind_cell(core, engine, cell))
    }

    /// Embed, track, account. The wrap-existing path shares this with
    /// construction.
    pub(crate) fn bind_cell(
        core: &Rc<RefCell<ClassCore>>,
        engine: &mut Engine,
        cell: Rc<dyn Any>,
    ) -> Value {
        let id = InstanceTracker::identity(&cell);
        let (name, cost) = {
            let mut c = core.borrow_mut();
            // Wrapping the same instance twice must not re-track it; the
            // second object shares the first tracked entry. Memory is
            // charged per tracked instance, not per wrap, so the single
            // refund on release stays balanced.
            if c.tracker.contains(id) {
                (c.name, 0)
            } else {
                let finalizer = c.destructor.clone();
                c.tracker.track(cell.clone(), finalizer);
                (c.name, c.memory_cost)
            }
        };

        let handle = engine.alloc_plain_object();
        if let Some(obj) = engine.object_mut(handle) {
            obj.bound = Some(BoundInstance {
                instance: Rc::downgrade(&cell),
                class: Rc::downgrade(core),
                id,
                type_name: name,
            });
        }
        engine.adjust_external_memory(cost as isize);
        Value::Object(handle)
    }

    /// Release the object's bound instance. Returns true when this call
    /// was the one that destroyed it.
    pub(crate) fn dispose_object(
        core: &Rc<RefCell<ClassCore>>,
        engine: &mut Engine,
        handle: ObjectHandle,
    ) -> bool {
        // An object bound to some other class is not ours to unbind.
        let ours = engine
            .object(handle)
            .and_then(|obj| obj.bound.as_ref())
            .is_some_and(|bound| bound.class.upgrade().is_some_and(|c| Rc::ptr_eq(&c, core)));
        if !ours {
            return false;
        }
        let Some(bound) = engine.object_mut(handle).and_then(|obj| obj.bound.take()) else {
            return false;
        };
        let (released, cost) = {
            let mut c = core.borrow_mut();
            (c.tracker.release(bound.id), c.memory_cost)
        };
        if released {
            engine.adjust_external_memory(-(cost as isize));
        }
        released
    }
}

/// Fluent builder and typed facade over a bound class.
///
/// Cloning aliases the same class; the engine's registries hold the same
/// shared core once exposed.
pub struct NativeClass<T: NativeType> {
    core: Rc<RefCell<ClassCore>>,
    _marker: PhantomData<T>,
}

impl<T: NativeType> Clone for NativeClass<T> {
    fn clone(&self) -> Self {
        NativeClass {
            core: Rc::clone(&self.core),
            _marker: PhantomData,
        }
    }
}

impl<T: NativeType + Default> NativeClass<T> {
    /// A class whose zero-overload construction default-constructs `T`.
    pub fn new() -> Self {
        Self::build(Some(Box::new(|| {
            let cell: Rc<dyn Any> = Rc::new(RefCell::new(T::default()));
            cell
        })))
    }
}

impl<T: NativeType + Default> Default for NativeClass<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NativeType> NativeClass<T> {
    /// A class without an implicit default constructor; constructing with
    /// zero registered overloads reports no matching overload.
    pub fn without_default() -> Self {
        Self::build(None)
    }

    fn build(default_ctor: Option<Box<dyn Fn() -> Rc<dyn Any>>>) -> Self {
        NativeClass {
            core: Rc::new(RefCell::new(ClassCore {
                name: T::NAME,
                type_id: TypeId::of::<T>(),
                is_abstract: false,
                ctors: Vec::new(),
                default_ctor,
                methods: FxHashMap::default(),
                static_methods: FxHashMap::default(),
                accessors: FxHashMap::default(),
                static_accessors: FxHashMap::default(),
                constants: FxHashMap::default(),
                memory_cost: mem::size_of::<T>(),
                destructor: None,
                tracker: InstanceTracker::new(),
            })),
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_core(core: Rc<RefCell<ClassCore>>) -> Self {
        NativeClass {
            core,
            _marker: PhantomData,
        }
    }

    pub(crate) fn core(&self) -> &Rc<RefCell<ClassCore>> {
        &self.core
    }

    pub fn name(&self) -> &'static str {
        T::NAME
    }

    // =============================================================================
    // Builder surface
    // =============================================================================

    /// Mark the class abstract: every construction attempt fails.
    pub fn declare_abstract(self) -> Self {
        self.core.borrow_mut().is_abstract = true;
        self
    }

    /// Register a typed constructor overload.
    pub fn ctor<Args>(self, f: impl IntoCtor<Args, T>) -> Self {
        self.core.borrow_mut().ctors.push(Rc::new(f.into_ctor()));
        self
    }

    /// Register a raw-argument constructor overload.
    pub fn ctor_raw<F>(self, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<T, NativeError> + 'static,
    {
        self.core
            .borrow_mut()
            .ctors
            .push(Rc::new(CtorOverload::raw(f)));
        self
    }

    /// Register a method overload. Re-using a name merges into the
    /// existing registry, accumulating overloads.
    pub fn method<Args, Ret>(self, name: &str, f: impl IntoOverload<Args, Ret>) -> Self {
        self.core
            .borrow_mut()
            .methods
            .entry(name.to_string())
            .or_insert_with(|| NativeFunction::new(name))
            .push(f.into_overload());
        self
    }

    pub fn method_raw<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, NativeError> + 'static,
    {
        self.core
            .borrow_mut()
            .methods
            .entry(name.to_string())
            .or_insert_with(|| NativeFunction::new(name))
            .push(Overload::raw(f));
        self
    }

    pub fn static_method<Args, Ret>(self, name: &str, f: impl IntoOverload<Args, Ret>) -> Self {
        self.core
            .borrow_mut()
            .static_methods
            .entry(name.to_string())
            .or_insert_with(|| NativeFunction::new(name))
            .push(f.into_overload());
        self
    }

    pub fn static_method_raw<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, NativeError> + 'static,
    {
        self.core
            .borrow_mut()
            .static_methods
            .entry(name.to_string())
            .or_insert_with(|| NativeFunction::new(name))
            .push(Overload::raw(f));
        self
    }

    /// Register a property getter. A property with a getter and no setter
    /// is read-only.
    pub fn getter<Args, Ret>(self, name: &str, f: impl IntoOverload<Args, Ret>) -> Self {
        {
            let mut core = self.core.borrow_mut();
            let accessor = core
                .accessors
                .entry(name.to_string())
                .or_insert_with(|| Accessor {
                    getter: NativeFunction::new(format!("get {name}")),
                    setter: None,
                });
            accessor.getter.push(f.into_overload());
        }
        self
    }

    pub fn setter<Args, Ret>(self, name: &str, f: impl IntoOverload<Args, Ret>) -> Self {
        {
            let mut core = self.core.borrow_mut();
            let accessor = core
                .accessors
                .entry(name.to_string())
                .or_insert_with(|| Accessor {
                    getter: NativeFunction::new(format!("get {name}")),
                    setter: None,
                });
            accessor
                .setter
                .get_or_insert_with(|| NativeFunction::new(format!("set {name}")))
                .push(f.into_overload());
        }
        self
    }

    pub fn static_getter<Args, Ret>(self, name: &str, f: impl IntoOverload<Args, Ret>) -> Self {
        {
            let mut core = self.core.borrow_mut();
            let accessor = core
                .static_accessors
                .entry(name.to_string())
                .or_insert_with(|| Accessor {
                    getter: NativeFunction::new(format!("get {name}")),
                    setter: None,
                });
            accessor.getter.push(f.into_overload());
        }
        self
    }

    pub fn static_setter<Args, Ret>(self, name: &str, f: impl IntoOverload<Args, Ret>) -> Self {
        {
            let mut core = self.core.borrow_mut();
            let accessor = core
                .static_accessors
                .entry(name.to_string())
                .or_insert_with(|| Accessor {
                    getter: NativeFunction::new(format!("get {name}")),
                    setter: None,
                });
            accessor
                .setter
                .get_or_insert_with(|| NativeFunction::new(format!("set {name}")))
                .push(f.into_overload());
        }
        self
    }

    /// Register a class constant.
    pub fn constant<V: ToScript>(
        self,
        engine: &mut Engine,
        name: &str,
        value: V,
    ) -> Result<Self, ConversionError> {
        let value = value.to_script(engine)?;
        self.core
            .borrow_mut()
            .constants
            .insert(name.to_string(), value);
        Ok(self)
    }

    /// Run `f` over the instance just before destruction, whichever
    /// trigger destroys it.
    pub fn custom_destructor(self, f: impl Fn(&mut T) + 'static) -> Self {
        let finalizer: Finalizer = Rc::new(move |cell: &Rc<dyn Any>| {
            if let Some(typed) = cell.downcast_ref::<RefCell<T>>() {
                if let Ok(mut guard) = typed.try_borrow_mut() {
                    f(&mut guard);
                }
            }
        });
        self.core.borrow_mut().destructor = Some(finalizer);
        self
    }

    /// Override the per-instance external memory cost reported to the
    /// engine. Defaults to `size_of::<T>()`.
    pub fn memory_cost(self, bytes: usize) -> Self {
        self.core.borrow_mut().memory_cost = bytes;
        self
    }

    // =============================================================================
    // Operations
    // =============================================================================

    pub fn is_abstract(&self) -> bool {
        self.core.borrow().is_abstract
    }

    pub fn ctor_count(&self) -> usize {
        self.core.borrow().ctors.len()
    }

    pub fn live_instances(&self) -> usize {
        self.core.borrow().tracker.len()
    }

    /// Construct and bind a new instance from script-side arguments.
    pub fn construct(&self, engine: &mut Engine, args: &[Value]) -> Result<Value, NativeError> {
        ClassCore::construct_value(&self.core, engine, args)
    }

    /// Wrap an existing native instance into a bound script object, taking
    /// ownership.
    pub fn wrap(&self, engine: &mut Engine, instance: T) -> Value {
        let cell: Rc<dyn Any> = Rc::new(RefCell::new(instance));
        ClassCore::bind_cell(&self.core, engine, cell)
    }

    /// Wrap an already-shared instance.
    pub fn wrap_handle(&self, engine: &mut Engine, handle: NativeHandle<T>) -> Option<Value> {
        let rc = handle.into_rc()?;
        let cell: Rc<dyn Any> = rc;
        Some(ClassCore::bind_cell(&self.core, engine, cell))
    }

    /// Recover the native instance behind a script value.
    pub fn unwrap(&self, engine: &Engine, value: &Value) -> Result<NativeHandle<T>, ConversionError> {
        use crate::convert::FromScript;
        NativeHandle::<T>::from_script(engine, value)
    }

    pub fn is_instance(&self, engine: &Engine, value: &Value) -> bool {
        let Some(handle) = value.as_object() else {
            return false;
        };
        engine
            .object(handle)
            .and_then(|obj| obj.bound.as_ref())
            .map(|bound| bound.id)
            .is_some_and(|id| self.core.borrow().tracker.contains(id))
    }

    /// Explicitly destroy the instance bound to this object. Returns true
    /// when this call performed the destruction; repeat disposal is a
    /// no-op.
    pub fn dispose(&self, engine: &mut Engine, value: &Value) -> bool {
        match value.as_object() {
            Some(handle) => ClassCore::dispose_object(&self.core, engine, handle),
            None => false,
        }
    }

    pub fn constant_value(&self, name: &str) -> Option<Value> {
        self.core.borrow().constants.get(name).cloned()
    }

    /// Invoke a static method through its overload registry.
    pub fn call_static(
        &self,
        engine: &mut Engine,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        let func = self
            .core
            .borrow()
            .static_methods
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UnknownMethod {
                name: name.to_string(),
            })?;
        let mut ctx = CallContext::new(engine, None, args.to_vec());
        func.invoke(&mut ctx).map_err(ScriptError::from)
    }

    /// Read a static accessor-backed property.
    pub fn get_static(&self, engine: &mut Engine, name: &str) -> Result<Value, ScriptError> {
        let getter = self
            .core
            .borrow()
            .static_accessors
            .get(name)
            .map(|a| a.getter.clone())
            .ok_or_else(|| ScriptError::UnknownMethod {
                name: name.to_string(),
            })?;
        let mut ctx = CallContext::new(engine, None, Vec::new());
        getter.invoke(&mut ctx).map_err(ScriptError::from)
    }

    /// Write a static accessor-backed property. Getter-only properties are
    /// read-only.
    pub fn set_static(
        &self,
        engine: &mut Engine,
        name: &str,
        value: Value,
    ) -> Result<(), ScriptError> {
        let setter = {
            let core = self.core.borrow();
            let accessor =
                core.static_accessors
                    .get(name)
                    .ok_or_else(|| ScriptError::UnknownMethod {
                        name: name.to_string(),
                    })?;
            accessor
                .setter
                .clone()
                .ok_or_else(|| ScriptError::ReadOnlyProperty {
                    name: name.to_string(),
                })?
        };
        let mut ctx = CallContext::new(engine, None, vec![value]);
        setter.invoke(&mut ctx).map(|_| ()).map_err(ScriptError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Point {
        x: f64,
        y: f64,
    }

    impl NativeType for Point {
        const NAME: &'static str = "Point";
    }

    struct Shape;

    impl NativeType for Shape {
        const NAME: &'static str = "Shape";
    }

    #[test]
    fn default_construction_with_zero_ctor_overloads() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new();
        let value = class.construct(&mut engine, &[]).unwrap();
        assert!(matches!(value, Value::Object(_)));
        assert_eq!(class.live_instances(), 1);

        let handle = class.unwrap(&engine, &value).unwrap();
        assert_eq!(handle.borrow().unwrap().x, 0.0);
    }

    #[test]
    fn without_default_and_zero_ctors_is_no_match() {
        let mut engine = Engine::new();
        let class = NativeClass::<Shape>::without_default();
        let err = class.construct(&mut engine, &[]).unwrap_err();
        assert!(matches!(err, NativeError::NoMatchingOverload { .. }));
    }

    #[test]
    fn ctor_overloads_dispatch_by_shape() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new()
            .ctor(|x: f64, y: f64| Point { x, y })
            .ctor(|x: f64| Point { x, y: x });

        let value = class
            .construct(&mut engine, &[Value::Number(1.0), Value::Number(2.0)])
            .unwrap();
        let point = class.unwrap(&engine, &value).unwrap();
        assert_eq!(point.borrow().unwrap().y, 2.0);

        let diagonal = class.construct(&mut engine, &[Value::Number(5.0)]).unwrap();
        let point = class.unwrap(&engine, &diagonal).unwrap();
        assert_eq!(point.borrow().unwrap().y, 5.0);
    }

    #[test]
    fn ctor_no_match_lists_ctor_signatures() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new().ctor(|x: f64, y: f64| Point { x, y });

        let err = class
            .construct(&mut engine, &[Value::Bool(true)])
            .unwrap_err();
        match err {
            NativeError::NoMatchingOverload { name, overloads } => {
                assert_eq!(name, "Point");
                assert_eq!(overloads, vec!["Point (number, number)".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn abstract_classes_refuse_construction() {
        let mut engine = Engine::new();
        let class = NativeClass::<Shape>::without_default().declare_abstract();
        let err = class.construct(&mut engine, &[]).unwrap_err();
        assert_eq!(
            err,
            NativeError::AbstractClass {
                name: "Shape".to_string()
            }
        );
    }

    #[test]
    fn abstract_classes_still_wrap_native_instances() {
        let mut engine = Engine::new();
        let class = NativeClass::<Shape>::without_default().declare_abstract();
        let value = class.wrap(&mut engine, Shape);
        assert!(class.is_instance(&engine, &value));
        assert_eq!(class.live_instances(), 1);
    }

    #[test]
    fn wrap_and_unwrap_round_trip() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new();
        let value = class.wrap(&mut engine, Point { x: 3.0, y: 4.0 });
        assert!(class.is_instance(&engine, &value));

        let handle = class.unwrap(&engine, &value).unwrap();
        assert_eq!(handle.borrow().unwrap().x, 3.0);
    }

    #[test]
    fn unwrap_of_null_is_a_null_handle() {
        let engine = Engine::new();
        let class = NativeClass::<Point>::new();
        let handle = class.unwrap(&engine, &Value::Null).unwrap();
        assert!(handle.is_null());
    }

    #[test]
    fn unwrap_of_plain_object_fails() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new();
        let object = engine.new_object();
        assert!(class.unwrap(&engine, &object).is_err());
        assert!(!class.is_instance(&engine, &object));
    }

    #[test]
    fn dispose_destroys_exactly_once() {
        let destroyed = Rc::new(Cell::new(0));
        let hits = destroyed.clone();

        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new()
            .custom_destructor(move |_| hits.set(hits.get() + 1));

        let value = class.construct(&mut engine, &[]).unwrap();
        assert!(class.dispose(&mut engine, &value));
        assert_eq!(destroyed.get(), 1);

        // Repeat disposal and access after disposal both fail cleanly.
        assert!(!class.dispose(&mut engine, &value));
        assert_eq!(destroyed.get(), 1);
        assert!(matches!(
            class.unwrap(&engine, &value),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn class_teardown_destroys_survivors() {
        let destroyed = Rc::new(Cell::new(0));
        let hits = destroyed.clone();

        let mut engine = Engine::new();
        {
            let class = NativeClass::<Point>::new()
                .custom_destructor(move |_| hits.set(hits.get() + 1));
            let first = class.construct(&mut engine, &[]).unwrap();
            let _second = class.construct(&mut engine, &[]).unwrap();

            // One explicit dispose, one left for teardown.
            assert!(class.dispose(&mut engine, &first));
            assert_eq!(destroyed.get(), 1);
        }
        assert_eq!(destroyed.get(), 2);
    }

    #[test]
    fn disposal_adjusts_external_memory() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new().memory_cost(128);
        let value = class.construct(&mut engine, &[]).unwrap();
        assert_eq!(engine.external_memory(), 128);
        class.dispose(&mut engine, &value);
        assert_eq!(engine.external_memory(), 0);
    }

    #[test]
    fn constants_are_recorded() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new()
            .constant(&mut engine, "ORIGIN_X", 0.0f64)
            .unwrap();
        assert_eq!(class.constant_value("ORIGIN_X"), Some(Value::Number(0.0)));
        assert_eq!(class.constant_value("missing"), None);
    }

    #[test]
    fn static_methods_dispatch() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new().static_method("origin_norm", || 0.0f64);
        let result = class.call_static(&mut engine, "origin_norm", &[]).unwrap();
        assert_eq!(result, Value::Number(0.0));

        assert!(matches!(
            class.call_static(&mut engine, "missing", &[]),
            Err(ScriptError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn static_accessors_honor_read_only() {
        let mut engine = Engine::new();
        let count = Rc::new(Cell::new(7i64));
        let read = count.clone();
        let class = NativeClass::<Point>::new().static_getter("instances", move || read.get());

        assert_eq!(
            class.get_static(&mut engine, "instances").unwrap(),
            Value::Number(7.0)
        );
        assert!(matches!(
            class.set_static(&mut engine, "instances", Value::Number(0.0)),
            Err(ScriptError::ReadOnlyProperty { .. })
        ));
    }

    #[test]
    fn wrapping_the_same_instance_twice_tracks_once() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new();
        let handle = NativeHandle::new(Point { x: 1.0, y: 1.0 });
        let first = class.wrap_handle(&mut engine, handle.clone()).unwrap();
        let _second = class.wrap_handle(&mut engine, handle).unwrap();
        assert_eq!(class.live_instances(), 1);

        assert!(class.dispose(&mut engine, &first));
        assert_eq!(class.live_instances(), 0);
    }

    #[test]
    fn aliased_wraps_charge_external_memory_once() {
        let mut engine = Engine::new();
        let class = NativeClass::<Point>::new().memory_cost(100);
        let handle = NativeHandle::new(Point { x: 0.0, y: 0.0 });
        let first = class.wrap_handle(&mut engine, handle.clone()).unwrap();
        let second = class.wrap_handle(&mut engine, handle).unwrap();
        assert_eq!(engine.external_memory(), 100);

        // The first disposal destroys the shared instance and refunds the
        // single charge; the alias finds nothing left to release.
        assert!(class.dispose(&mut engine, &first));
        assert_eq!(engine.external_memory(), 0);
        assert!(!class.dispose(&mut engine, &second));
        assert_eq!(engine.external_memory(), 0);
    }

    #[test]
    fn disposing_through_the_wrong_class_is_a_no_op() {
        let mut engine = Engine::new();
        let points = NativeClass::<Point>::new().memory_cost(64);
        let shapes = NativeClass::<Shape>::without_default();

        let value = points.wrap(&mut engine, Point { x: 3.0, y: 4.0 });
        assert!(!shapes.dispose(&mut engine, &value));

        // The binding is untouched; the owning class can still reach and
        // later destroy the instance.
        assert!(points.is_instance(&engine, &value));
        assert_eq!(engine.external_memory(), 64);
        assert!(points.dispose(&mut engine, &value));
        assert_eq!(engine.external_memory(), 0);
    }
}
