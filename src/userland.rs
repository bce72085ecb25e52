//! Native-side wrappers over script-defined values.
//!
//! The mirror image of exposure: [`UserFunction`], [`UserInstance`], and
//! [`UserClass`] let native code call script functions, read and write
//! script object state, and instantiate script classes, with arguments and
//! results crossing through the conversion traits.

use crate::convert::{FromScript, ToScript};
use crate::engine::Engine;
use crate::error::{ConversionError, ScriptError, ScriptResult};
use crate::value::Value;

/// A tuple of native values convertible into a script argument list.
pub trait ScriptArgs {
    fn into_values(self, engine: &mut Engine) -> Result<Vec<Value>, ConversionError>;
}

macro_rules! impl_script_args {
    ($($t:ident),*) => {
        impl<$($t: ToScript),*> ScriptArgs for ($($t,)*) {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_values(self, engine: &mut Engine) -> Result<Vec<Value>, ConversionError> {
                let ($($t,)*) = self;
                let mut out = Vec::new();
                $(out.push($t.to_script(engine)?);)*
                Ok(out)
            }
        }
    };
}

impl_script_args!();
impl_script_args!(A0);
impl_script_args!(A0, A1);
impl_script_args!(A0, A1, A2);
impl_script_args!(A0, A1, A2, A3);
impl_script_args!(A0, A1, A2, A3, A4);
impl_script_args!(A0, A1, A2, A3, A4, A5);
impl_script_args!(A0, A1, A2, A3, A4, A5, A6);
impl_script_args!(A0, A1, A2, A3, A4, A5, A6, A7);

/// A script-defined function, invokable from native code.
#[derive(Clone)]
pub struct UserFunction {
    value: Value,
}

impl UserFunction {
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_function().map(|_| UserFunction {
            value: value.clone(),
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Call with native arguments and a typed result.
    pub fn invoke<R: FromScript>(
        &self,
        engine: &mut Engine,
        args: impl ScriptArgs,
    ) -> ScriptResult<R> {
        let args = args.into_values(engine).map_err(ScriptError::from)?;
        let result = engine.call(&self.value, &args)?;
        R::from_script(engine, &result).map_err(ScriptError::from)
    }

    /// Call with pre-built script values, keeping the raw result.
    pub fn invoke_raw(&self, engine: &mut Engine, args: &[Value]) -> ScriptResult<Value> {
        engine.call(&self.value, args)
    }
}

/// A script-defined object, readable and writable from native code.
#[derive(Clone)]
pub struct UserInstance {
    value: Value,
}

impl UserInstance {
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|_| UserInstance {
            value: value.clone(),
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn get<T: FromScript>(&self, engine: &mut Engine, name: &str) -> ScriptResult<T> {
        let value = engine.get_property(&self.value, name)?;
        T::from_script(engine, &value).map_err(ScriptError::from)
    }

    pub fn set<T: ToScript>(&self, engine: &mut Engine, name: &str, value: T) -> ScriptResult<()> {
        let value = value.to_script(engine).map_err(ScriptError::from)?;
        engine.set_property(&self.value, name, value)
    }

    /// Invoke a method on this instance with native arguments.
    pub fn call<R: FromScript>(
        &self,
        engine: &mut Engine,
        method: &str,
        args: impl ScriptArgs,
    ) -> ScriptResult<R> {
        let args = args.into_values(engine).map_err(ScriptError::from)?;
        let result = engine.call_method(&self.value, method, &args)?;
        R::from_script(engine, &result).map_err(ScriptError::from)
    }

    pub fn call_raw(&self, engine: &mut Engine, method: &str, args: &[Value]) -> ScriptResult<Value> {
        engine.call_method(&self.value, method, args)
    }
}

/// A script-defined class: its constructor function, instantiable from
/// native code.
#[derive(Clone)]
pub struct UserClass {
    ctor: Value,
}

impl UserClass {
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_function().map(|_| UserClass {
            ctor: value.clone(),
        })
    }

    pub fn constructor(&self) -> &Value {
        &self.ctor
    }

    pub fn new_instance(
        &self,
        engine: &mut Engine,
        args: impl ScriptArgs,
    ) -> ScriptResult<UserInstance> {
        let args = args.into_values(engine).map_err(ScriptError::from)?;
        self.new_instance_raw(engine, &args)
    }

    pub fn new_instance_raw(&self, engine: &mut Engine, args: &[Value]) -> ScriptResult<UserInstance> {
        let result = engine.call(&self.ctor, args)?;
        UserInstance::from_value(&result).ok_or(ScriptError::Conversion(
            ConversionError::mismatch("object", result.type_name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A stand-in for a script-defined function: the host VM would install
    // the same kind of trampoline.
    fn script_square(engine: &mut Engine) -> Value {
        engine.new_function(|engine, _this, args| {
            let n = f64::from_script(engine, args.first().unwrap_or(&Value::Undefined))
                .map_err(ScriptError::from)?;
            Ok(Value::Number(n * n))
        })
    }

    #[test]
    fn user_function_invokes_with_typed_results() {
        let mut engine = Engine::new();
        let value = script_square(&mut engine);
        let func = UserFunction::from_value(&value).unwrap();

        let squared: f64 = func.invoke(&mut engine, (6.0f64,)).unwrap();
        assert_eq!(squared, 36.0);

        let raw = func.invoke_raw(&mut engine, &[Value::Number(3.0)]).unwrap();
        assert_eq!(raw, Value::Number(9.0));
    }

    #[test]
    fn user_function_requires_a_function_value() {
        assert!(UserFunction::from_value(&Value::Number(1.0)).is_none());
        assert!(UserFunction::from_value(&Value::Null).is_none());
    }

    #[test]
    fn result_conversion_failure_surfaces_at_the_boundary() {
        let mut engine = Engine::new();
        let value = script_square(&mut engine);
        let func = UserFunction::from_value(&value).unwrap();

        let err = func.invoke::<String>(&mut engine, (2.0f64,)).unwrap_err();
        assert!(matches!(err, ScriptError::Conversion(_)));
    }

    #[test]
    fn user_instance_reads_and_writes_properties() {
        let mut engine = Engine::new();
        let object = engine.new_object();
        let instance = UserInstance::from_value(&object).unwrap();

        instance.set(&mut engine, "hp", 100i64).unwrap();
        assert_eq!(instance.get::<i64>(&mut engine, "hp").unwrap(), 100);
        assert_eq!(
            instance.get::<Option<i64>>(&mut engine, "missing").unwrap(),
            None
        );
    }

    #[test]
    fn user_instance_calls_function_valued_members() {
        let mut engine = Engine::new();
        let object = engine.new_object();
        let greet = engine.new_function(|_engine, _this, _args| {
            Ok(Value::String("hello".into()))
        });
        engine.set_property(&object, "greet", greet).unwrap();

        let instance = UserInstance::from_value(&object).unwrap();
        let greeting: String = instance.call(&mut engine, "greet", ()).unwrap();
        assert_eq!(greeting, "hello");

        assert!(matches!(
            instance.call::<Value>(&mut engine, "missing", ()),
            Err(ScriptError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn user_class_instantiates_script_objects() {
        let mut engine = Engine::new();
        // A script class constructor: builds an object with a `name`
        // property from its first argument.
        let ctor = engine.new_function(|engine, _this, args| {
            let name = args.first().cloned().unwrap_or(Value::Undefined);
            let object = engine.new_object();
            engine.set_property(&object, "name", name)?;
            Ok(object)
        });

        let class = UserClass::from_value(&ctor).unwrap();
        let instance = class.new_instance(&mut engine, ("widget",)).unwrap();
        assert_eq!(
            instance.get::<String>(&mut engine, "name").unwrap(),
            "widget"
        );
    }

    #[test]
    fn user_class_rejects_non_object_construction_results() {
        let mut engine = Engine::new();
        let ctor = engine.new_function(|_engine, _this, _args| Ok(Value::Number(7.0)));
        let class = UserClass::from_value(&ctor).unwrap();
        assert!(class.new_instance(&mut engine, ()).is_err());
    }

    #[test]
    fn script_errors_propagate_through_user_function() {
        let mut engine = Engine::new();
        let failing = engine.new_function(|_engine, _this, _args| {
            Err(ScriptError::Thrown {
                message: "script threw".into(),
            })
        });
        let func = UserFunction::from_value(&failing).unwrap();
        let err = func.invoke::<Value>(&mut engine, ()).unwrap_err();
        assert!(matches!(err, ScriptError::Thrown { .. }));
    }
}
