use crate::value::Value;
use crate::vm::{RuntimeError, VMResult};
use log::error;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// What a native function may touch while it runs.
pub trait NativeContext {
    fn output(&mut self) -> &mut dyn Write;
    /// The text `print` would show for `value`. May run TalkTalk code.
    fn description(&mut self, value: &Value) -> VMResult<String>;
}

pub trait NativeFunction {
    fn name(&self) -> &'static str;
    fn arity(&self) -> u8;
    /// `arguments` holds exactly [`NativeFunction::arity`] values in source order.
    fn call(&self, arguments: &[Value], context: &mut dyn NativeContext) -> VMResult<Value>;
}

impl Debug for dyn NativeFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native {}>", self.name())
    }
}

/// The natives a VM exposes as globals, keyed by name.
#[derive(Debug, Default)]
pub struct Natives {
    functions: HashMap<&'static str, Rc<dyn NativeFunction>>,
}

impl Natives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut natives = Self::new();
        natives.register::<Clock>();
        natives.register::<WriteValue>();
        natives.register::<Append>();
        natives.register::<Describe>();
        natives
    }

    pub fn register<N: NativeFunction + Default + 'static>(&mut self) {
        let native = N::default();
        self.functions.insert(native.name(), Rc::new(native));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn NativeFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Rc<dyn NativeFunction>)> {
        self.functions.iter().map(|(name, native)| (*name, native))
    }
}

#[derive(Debug, Default)]
struct Clock;

impl NativeFunction for Clock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn arity(&self) -> u8 {
        0
    }

    fn call(&self, _: &[Value], _: &mut dyn NativeContext) -> VMResult<Value> {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Ok(Value::Number(seconds))
    }
}

#[derive(Debug, Default)]
struct WriteValue;

impl NativeFunction for WriteValue {
    fn name(&self) -> &'static str {
        "write"
    }

    fn arity(&self) -> u8 {
        1
    }

    fn call(&self, arguments: &[Value], context: &mut dyn NativeContext) -> VMResult<Value> {
        let description = context.description(&arguments[0])?;
        if let Err(e) = write!(context.output(), "{description}") {
            error!("Error writing output value: {e}")
        }
        Ok(Value::Nil)
    }
}

#[derive(Debug, Default)]
struct Append;

impl NativeFunction for Append {
    fn name(&self) -> &'static str {
        "_append"
    }

    fn arity(&self) -> u8 {
        2
    }

    fn call(&self, arguments: &[Value], _: &mut dyn NativeContext) -> VMResult<Value> {
        match &arguments[0] {
            Value::Array(elements) => {
                let mut elements = Vec::clone(elements);
                elements.push(arguments[1].clone());
                Ok(Value::Array(Rc::new(elements)))
            }
            other => Err(RuntimeError::InvalidArgument {
                function: self.name(),
                expected: "array",
                got: other.type_name(),
            }
            .into()),
        }
    }
}

#[derive(Debug, Default)]
struct Describe;

impl NativeFunction for Describe {
    fn name(&self) -> &'static str {
        "_describe"
    }

    fn arity(&self) -> u8 {
        1
    }

    fn call(&self, arguments: &[Value], context: &mut dyn NativeContext) -> VMResult<Value> {
        let description = context.description(&arguments[0])?;
        Ok(Value::String(description.into()))
    }
}
