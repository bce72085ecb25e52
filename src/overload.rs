//! Overload entries and the compile-time signature extraction that builds
//! them.
//!
//! [`IntoOverload`] is implemented for plain `Fn(A0..An) -> R` shapes and
//! for method shapes taking `&T` / `&mut T` receivers, for arities 0..=8.
//! Each impl captures three things from the callable's type: a
//! [`Signature`] for diagnostics, a candidate check (exact arity plus
//! per-argument [`FromScript::matches`]), and an invoker that decodes
//! arguments left-to-right, calls the native code, and converts the result.
//!
//! Raw-argument entries skip extraction entirely: they match any argument
//! list and receive the whole [`CallContext`].

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::call::CallContext;
use crate::convert::{FromScript, NativeType, ToScript};
use crate::engine::Engine;
use crate::error::NativeError;
use crate::signature::Signature;
use crate::value::Value;

/// Marker for method shapes taking the receiver by shared reference.
pub struct ThisRef<T>(PhantomData<T>);

/// Marker for method shapes taking the receiver by mutable reference.
pub struct ThisMut<T>(PhantomData<T>);

/// One registered overload: signature, candidate check, invoker.
pub struct Overload {
    signature: Signature,
    raw_args: bool,
    can: Box<dyn Fn(&Engine, &[Value]) -> bool>,
    invoke: Box<dyn Fn(&mut CallContext<'_>) -> Result<Value, NativeError>>,
}

impl Overload {
    /// A raw-argument overload. Matches any argument list; the callable
    /// sees the whole call context and produces the return value itself.
    pub fn raw<F>(f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<Value, NativeError> + 'static,
    {
        Overload {
            signature: Signature::raw(),
            raw_args: true,
            can: Box::new(|_, _| true),
            invoke: Box::new(f),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_raw_args(&self) -> bool {
        self.raw_args
    }

    /// Would this overload accept the argument list? Exact arity plus
    /// per-argument convertibility, left-to-right. Never converts.
    pub fn can_invoke(&self, engine: &Engine, args: &[Value]) -> bool {
        (self.can)(engine, args)
    }

    pub fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Value, NativeError> {
        (self.invoke)(ctx)
    }
}

/// Conversion of a native callable into an [`Overload`].
///
/// `Args` is a marker tuple distinguishing the receiver shape; `Ret` is the
/// native return type. Both are inferred at the registration call site.
pub trait IntoOverload<Args, Ret> {
    fn into_overload(self) -> Overload;
}

/// One constructor overload: like [`Overload`], but the product is the raw
/// native instance, not a script value.
pub struct CtorOverload {
    signature: Signature,
    raw_args: bool,
    can: Box<dyn Fn(&Engine, &[Value]) -> bool>,
    construct: Box<dyn Fn(&mut CallContext<'_>) -> Result<Rc<dyn Any>, NativeError>>,
}

impl CtorOverload {
    /// A raw-argument constructor overload.
    pub fn raw<F, T>(f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<T, NativeError> + 'static,
        T: NativeType,
    {
        CtorOverload {
            signature: Signature::raw(),
            raw_args: true,
            can: Box::new(|_, _| true),
            construct: Box::new(move |ctx| {
                let instance = f(ctx)?;
                let cell: Rc<dyn Any> = Rc::new(RefCell::new(instance));
                Ok(cell)
            }),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_raw_args(&self) -> bool {
        self.raw_args
    }

    pub fn can_invoke(&self, engine: &Engine, args: &[Value]) -> bool {
        (self.can)(engine, args)
    }

    /// Run the constructor. The produced cell is `RefCell<T>` behind
    /// `Rc<dyn Any>`, ready for binding and tracking.
    pub fn construct(&self, ctx: &mut CallContext<'_>) -> Result<Rc<dyn Any>, NativeError> {
        (self.construct)(ctx)
    }
}

/// Conversion of a native callable into a [`CtorOverload`].
pub trait IntoCtor<Args, T> {
    fn into_ctor(self) -> CtorOverload;
}

macro_rules! count_args {
    () => (0usize);
    ($head:ident $($tail:ident)*) => (1usize + count_args!($($tail)*));
}

macro_rules! impl_into_overload {
    ($($arg:ident => $idx:tt),*) => {
        impl<F, R, $($arg,)*> IntoOverload<((), $($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: ToScript + 'static,
            $($arg: FromScript + 'static,)*
        {
            fn into_overload(self) -> Overload {
                Overload {
                    signature: Signature::function(R::SCRIPT_NAME, vec![$($arg::SCRIPT_NAME),*]),
                    raw_args: false,
                    can: Box::new(|engine: &Engine, args: &[Value]| {
                        let _ = engine;
                        args.len() == count_args!($($arg)*) $(&& $arg::matches(engine, &args[$idx]))*
                    }),
                    invoke: Box::new(move |ctx: &mut CallContext<'_>| {
                        $(
                            #[allow(non_snake_case)]
                            let $arg = ctx.arg::<$arg>($idx)?;
                        )*
                        let result = (self)($($arg),*);
                        result.to_script(ctx.engine_mut()).map_err(NativeError::from)
                    }),
                }
            }
        }

        impl<F, T, R, $($arg,)*> IntoOverload<(ThisRef<T>, $($arg,)*), R> for F
        where
            F: Fn(&T, $($arg),*) -> R + 'static,
            T: NativeType,
            R: ToScript + 'static,
            $($arg: FromScript + 'static,)*
        {
            fn into_overload(self) -> Overload {
                Overload {
                    signature: Signature::method(R::SCRIPT_NAME, T::NAME, vec![$($arg::SCRIPT_NAME),*]),
                    raw_args: false,
                    can: Box::new(|engine: &Engine, args: &[Value]| {
                        let _ = engine;
                        args.len() == count_args!($($arg)*) $(&& $arg::matches(engine, &args[$idx]))*
                    }),
                    invoke: Box::new(move |ctx: &mut CallContext<'_>| {
                        // Recover the receiver before touching the arguments.
                        let cell = ctx.this_cell::<T>()?;
                        $(
                            #[allow(non_snake_case)]
                            let $arg = ctx.arg::<$arg>($idx)?;
                        )*
                        let result = {
                            let guard = cell
                                .try_borrow()
                                .map_err(|_| NativeError::BorrowConflict { name: T::NAME })?;
                            (self)(&*guard, $($arg),*)
                        };
                        result.to_script(ctx.engine_mut()).map_err(NativeError::from)
                    }),
                }
            }
        }

        impl<F, T, R, $($arg,)*> IntoOverload<(ThisMut<T>, $($arg,)*), R> for F
        where
            F: Fn(&mut T, $($arg),*) -> R + 'static,
            T: NativeType,
            R: ToScript + 'static,
            $($arg: FromScript + 'static,)*
        {
            fn into_overload(self) -> Overload {
                Overload {
                    signature: Signature::method(R::SCRIPT_NAME, T::NAME, vec![$($arg::SCRIPT_NAME),*]),
                    raw_args: false,
                    can: Box::new(|engine: &Engine, args: &[Value]| {
                        let _ = engine;
                        args.len() == count_args!($($arg)*) $(&& $arg::matches(engine, &args[$idx]))*
                    }),
                    invoke: Box::new(move |ctx: &mut CallContext<'_>| {
                        // Recover the receiver before touching the arguments.
                        let cell = ctx.this_cell::<T>()?;
                        $(
                            #[allow(non_snake_case)]
                            let $arg = ctx.arg::<$arg>($idx)?;
                        )*
                        let result = {
                            let mut guard = cell
                                .try_borrow_mut()
                                .map_err(|_| NativeError::BorrowConflict { name: T::NAME })?;
                            (self)(&mut *guard, $($arg),*)
                        };
                        result.to_script(ctx.engine_mut()).map_err(NativeError::from)
                    }),
                }
            }
        }

        impl<F, T, $($arg,)*> IntoCtor<((), $($arg,)*), T> for F
        where
            F: Fn($($arg),*) -> T + 'static,
            T: NativeType,
            $($arg: FromScript + 'static,)*
        {
            fn into_ctor(self) -> CtorOverload {
                CtorOverload {
                    signature: Signature::function(T::NAME, vec![$($arg::SCRIPT_NAME),*]),
                    raw_args: false,
                    can: Box::new(|engine: &Engine, args: &[Value]| {
                        let _ = engine;
                        args.len() == count_args!($($arg)*) $(&& $arg::matches(engine, &args[$idx]))*
                    }),
                    construct: Box::new(move |ctx: &mut CallContext<'_>| {
                        $(
                            #[allow(non_snake_case)]
                            let $arg = ctx.arg::<$arg>($idx)?;
                        )*
                        let instance = (self)($($arg),*);
                        let cell: Rc<dyn Any> = Rc::new(RefCell::new(instance));
                        Ok(cell)
                    }),
                }
            }
        }
    };
}

impl_into_overload!();
impl_into_overload!(A0 => 0);
impl_into_overload!(A0 => 0, A1 => 1);
impl_into_overload!(A0 => 0, A1 => 1, A2 => 2);
impl_into_overload!(A0 => 0, A1 => 1, A2 => 2, A3 => 3);
impl_into_overload!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4);
impl_into_overload!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4, A5 => 5);
impl_into_overload!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4, A5 => 5, A6 => 6);
impl_into_overload!(A0 => 0, A1 => 1, A2 => 2, A3 => 3, A4 => 4, A5 => 5, A6 => 6, A7 => 7);

#[cfg(test)]
mod tests {
    use super::*;

    fn entry<Args, Ret>(f: impl IntoOverload<Args, Ret>) -> Overload {
        f.into_overload()
    }

    #[test]
    fn free_function_extraction() {
        let engine = Engine::new();
        let add = entry(|a: i64, b: i64| a + b);
        assert_eq!(add.signature().format(), "number (number, number)");
        assert!(!add.is_raw_args());
        assert!(add.can_invoke(&engine, &[Value::Number(1.0), Value::Number(2.0)]));
        assert!(!add.can_invoke(&engine, &[Value::Number(1.0)]));
        assert!(!add.can_invoke(&engine, &[Value::Number(1.0), Value::Null]));
    }

    #[test]
    fn free_function_invocation() {
        let mut engine = Engine::new();
        let add = entry(|a: i64, b: i64| a + b);
        let mut ctx = CallContext::new(&mut engine, None, vec![Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(add.invoke(&mut ctx).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn nullary_extraction() {
        let engine = Engine::new();
        let answer = entry(|| 42i64);
        assert_eq!(answer.signature().format(), "number ()");
        assert!(answer.can_invoke(&engine, &[]));
        assert!(!answer.can_invoke(&engine, &[Value::Null]));
    }

    #[test]
    fn argument_decoding_is_left_to_right() {
        use std::cell::Cell;
        use std::rc::Rc;

        // The second argument never decodes cleanly; the first must already
        // have been attempted when the failure surfaces.
        let mut engine = Engine::new();
        let touched = Rc::new(Cell::new(false));
        let ran = touched.clone();
        let f = entry(move |_a: i64, _b: i64| {
            ran.set(true);
            0i64
        });
        let mut ctx = CallContext::new(&mut engine, None, vec![Value::Number(1.0), Value::Null]);
        assert!(f.invoke(&mut ctx).is_err());
        assert!(!touched.get());
    }

    #[test]
    fn method_shape_extraction() {
        struct Counter;
        impl NativeType for Counter {
            const NAME: &'static str = "Counter";
        }

        let engine = Engine::new();
        let get = (|this: &Counter, scale: i64| {
            let _ = this;
            scale
        })
        .into_overload();
        assert_eq!(get.signature().format(), "number Counter::(number)");
        assert_eq!(get.signature().arity(), 1);
        // The receiver never counts toward the script-side arity.
        assert!(get.can_invoke(&engine, &[Value::Number(2.0)]));
        assert!(!get.can_invoke(&engine, &[]));
    }

    #[test]
    fn receiver_recovery_precedes_argument_decoding() {
        struct Counter;
        impl NativeType for Counter {
            const NAME: &'static str = "Counter";
        }

        // Both the receiver and the argument are bad; with no receiver at
        // all, that error must surface before any argument is decoded.
        let mut engine = Engine::new();
        let get = (|_this: &Counter, scale: i64| scale).into_overload();
        let mut ctx = CallContext::new(&mut engine, None, vec![Value::Null]);
        let err = get.invoke(&mut ctx).unwrap_err();
        assert!(matches!(err, NativeError::InvalidThis { .. }));
    }

    #[test]
    fn raw_overload_matches_everything() {
        let engine = Engine::new();
        let raw = Overload::raw(|ctx| {
            let total = ctx.arg_count() as f64;
            Ok(Value::Number(total))
        });
        assert!(raw.is_raw_args());
        assert_eq!(raw.signature().format(), "any (...)");
        assert!(raw.can_invoke(&engine, &[]));
        assert!(raw.can_invoke(&engine, &[Value::Null, Value::Undefined]));
    }

    #[test]
    fn raw_overload_sees_the_whole_context() {
        let mut engine = Engine::new();
        let raw = Overload::raw(|ctx| {
            let mut total = 0.0;
            for arg in ctx.args() {
                total += arg.as_number().unwrap_or(0.0);
            }
            Ok(Value::Number(total))
        });
        let mut ctx = CallContext::new(
            &mut engine,
            None,
            vec![Value::Number(1.0), Value::Number(2.0), Value::Bool(true)],
        );
        assert_eq!(raw.invoke(&mut ctx).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn ctor_overload_produces_the_raw_instance() {
        struct Point {
            x: f64,
            y: f64,
        }
        impl NativeType for Point {
            const NAME: &'static str = "Point";
        }

        let mut engine = Engine::new();
        let ctor = (|x: f64, y: f64| Point { x, y }).into_ctor();
        assert_eq!(ctor.signature().format(), "Point (number, number)");

        let mut ctx = CallContext::new(&mut engine, None, vec![Value::Number(1.0), Value::Number(2.0)]);
        let cell = ctor.construct(&mut ctx).unwrap();
        let point = cell.downcast::<RefCell<Point>>().unwrap();
        assert_eq!(point.borrow().x, 1.0);
        assert_eq!(point.borrow().y, 2.0);
    }

    #[test]
    fn raw_ctor_overload() {
        struct Tagged(usize);
        impl NativeType for Tagged {
            const NAME: &'static str = "Tagged";
        }

        let mut engine = Engine::new();
        let ctor = CtorOverload::raw(|ctx| Ok(Tagged(ctx.arg_count())));
        assert!(ctor.is_raw_args());

        let mut ctx = CallContext::new(&mut engine, None, vec![Value::Null, Value::Null]);
        let cell = ctor.construct(&mut ctx).unwrap();
        let tagged = cell.downcast::<RefCell<Tagged>>().unwrap();
        assert_eq!(tagged.borrow().0, 2);
    }
}
