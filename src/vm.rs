use crate::chunk::Opcode;
use crate::compiler::compile;
use crate::native::{NativeContext, Natives};
use crate::object::{BoundMethod, Class, Closure, Function, FunctionKind, Instance, Upvalue, UpvalueRef};
use crate::stack::{Stack, StackError};
use crate::value::{Value, ValueError, ValueResult};
use crate::InterpretError;
use log::{debug, error, trace};
use num_enum::TryFromPrimitiveError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

pub type VMResult<A> = Result<A, VMError>;

const STACK_SIZE: usize = 256;
const FRAMES_MAX: usize = 256;
/// Depth limit for nested evaluations, which recurse on the host stack.
const NESTED_MAX: usize = 32;
const PRELUDE: &str = include_str!("stdlib/prelude.talk");

#[derive(Debug)]
struct CallFrame {
    closure: Rc<Closure>,
    ip: usize,
    /// Stack index of the callee slot; locals are addressed relative to it.
    slots: usize,
}

pub struct Vm<'a, W: Write> {
    write: &'a mut W,
    stack: Stack<Value, STACK_SIZE>,
    frames: Stack<CallFrame, FRAMES_MAX>,
    globals: HashMap<Rc<str>, Value>,
    open_upvalues: Vec<UpvalueRef>,
    nested: usize,
    prelude_loaded: bool,
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn new(write: &'a mut W) -> Self {
        Self::with_natives(write, Natives::standard())
    }

    pub fn with_natives(write: &'a mut W, natives: Natives) -> Self {
        let globals = natives
            .iter()
            .map(|(name, native)| (Rc::from(name), Value::Native(native.clone())))
            .collect();
        Self {
            write,
            stack: Stack::new(),
            frames: Stack::new(),
            globals,
            open_upvalues: Vec::new(),
            nested: 0,
            prelude_loaded: false,
        }
    }

    /// Compiles and runs `source`. Globals defined by earlier calls stay visible.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        self.load_prelude()?;
        let function = compile(source)?;
        Ok(self.run(function)?)
    }

    fn load_prelude(&mut self) -> Result<(), InterpretError> {
        if self.prelude_loaded {
            return Ok(());
        }
        self.prelude_loaded = true;
        debug!("Loading standard library");
        let function = compile(PRELUDE)?;
        self.run(function)?;
        Ok(())
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Runs a compiled top-level function to completion. On failure a
    /// diagnostic is written to the output and the VM is reset.
    pub fn run(&mut self, function: Function) -> VMResult<Value> {
        let closure = Rc::new(Closure::new(Rc::new(function), Vec::new()));
        let result = self
            .push(Value::Closure(closure.clone()))
            .and_then(|_| self.call(closure, 0))
            .and_then(|_| self.run_until(0));
        if let Err(e) = &result {
            self.report(e);
            self.reset();
        }
        result
    }

    /// Executes until the frame count drops back to `floor`, returning the
    /// value of the frame that returned last.
    fn run_until(&mut self, floor: usize) -> VMResult<Value> {
        loop {
            trace!("Stack:\n{stack:?}", stack = self.stack);
            trace!(
                "Instruction: {instruction}",
                instruction = self
                    .frames
                    .peek(0)
                    .ok()
                    .and_then(|f| f.closure.function.chunk.disassemble_instruction_at(f.ip))
                    .unwrap_or_else(|| "Not found, crash imminent".to_string())
            );
            let opcode =
                Opcode::try_from(self.read_byte()?).map_err(IncorrectInvariantError::from)?;
            match opcode {
                Opcode::Uninitialized => {
                    return Err(IncorrectInvariantError::UninitializedInstruction.into())
                }
                Opcode::Constant => {
                    let constant = self.read_constant()?;
                    self.push(constant)?;
                }
                Opcode::Return => {
                    let result = self.pop()?;
                    let frame = self.frames.pop()?;
                    self.close_upvalues(frame.slots);
                    self.stack.truncate(frame.slots);
                    if self.frames.len() == floor {
                        return Ok(result);
                    }
                    self.push(result)?;
                }
                Opcode::Negate => {
                    let value = self.pop()?;
                    self.push(value.negate().map_err(RuntimeError::from)?)?;
                }
                Opcode::Not => {
                    let value = self.pop()?;
                    self.push(value.not())?;
                }
                Opcode::Add => self.binary_op(Value::add)?,
                Opcode::Subtract => self.binary_op(Value::subtract)?,
                Opcode::Multiply => self.binary_op(Value::multiply)?,
                Opcode::Divide => self.binary_op(Value::divide)?,
                Opcode::Less => self.binary_op(Value::less)?,
                Opcode::Greater => self.binary_op(Value::greater)?,
                Opcode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b))?;
                }
                Opcode::NotEqual => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a != b))?;
                }
                Opcode::True => self.push(Value::Bool(true))?,
                Opcode::False => self.push(Value::Bool(false))?,
                Opcode::Nil => self.push(Value::Nil)?,
                Opcode::Print => {
                    let value = self.pop()?;
                    let description = self.describe(value)?;
                    if let Err(e) = writeln!(self.write, "{description}") {
                        error!("Error writing output value: {e}")
                    }
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::DefineGlobal => {
                    let name = self.read_string()?;
                    let value = self.pop()?;
                    self.globals.insert(name, value);
                }
                Opcode::GetGlobal => {
                    let name = self.read_string()?;
                    let value = self
                        .globals
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?;
                    self.push(value)?;
                }
                Opcode::SetGlobal => {
                    let name = self.read_string()?;
                    if !self.globals.contains_key(&name) {
                        return Err(RuntimeError::UndefinedVariable(name.to_string()).into());
                    }
                    let value = self.peek(0)?.clone();
                    self.globals.insert(name, value);
                }
                Opcode::GetLocal => {
                    let slot = self.read_byte()? as usize;
                    let base = self.frames.peek(0)?.slots;
                    let value = self.stack.get(base + slot)?.clone();
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let slot = self.read_byte()? as usize;
                    let base = self.frames.peek(0)?.slots;
                    let value = self.peek(0)?.clone();
                    self.stack.set(base + slot, value)?;
                }
                Opcode::GetUpvalue => {
                    let upvalue = self.read_upvalue()?;
                    let value = match &*upvalue.borrow() {
                        Upvalue::Open(slot) => self.stack.get(*slot)?.clone(),
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.push(value)?;
                }
                Opcode::SetUpvalue => {
                    let upvalue = self.read_upvalue()?;
                    let value = self.peek(0)?.clone();
                    match &mut *upvalue.borrow_mut() {
                        Upvalue::Open(slot) => self.stack.set(*slot, value)?,
                        Upvalue::Closed(closed) => *closed = value,
                    };
                }
                Opcode::CloseUpvalue => {
                    let top = self.stack.len().saturating_sub(1);
                    self.close_upvalues(top);
                    self.pop()?;
                }
                Opcode::Jump => {
                    let offset = self.read_short()?;
                    self.frames.last_mut()?.ip += offset as usize;
                }
                Opcode::JumpIfFalse => {
                    let offset = self.read_short()?;
                    if self.peek(0)?.is_falsey() {
                        self.frames.last_mut()?.ip += offset as usize;
                    }
                }
                Opcode::Loop => {
                    let offset = self.read_short()?;
                    let frame = self.frames.last_mut()?;
                    frame.ip = frame.ip.checked_sub(offset as usize).ok_or(
                        IncorrectInvariantError::InvalidInstructionPointer {
                            pointer: frame.ip,
                            chunk_length: frame.closure.function.chunk.len(),
                        },
                    )?;
                }
                Opcode::Call => {
                    let arg_count = self.read_byte()?;
                    let callee = self.peek(arg_count as usize)?.clone();
                    self.call_value(callee, arg_count)?;
                }
                Opcode::Closure => {
                    let function = self
                        .read_constant()?
                        .as_function()
                        .cloned()
                        .ok_or(IncorrectInvariantError::InvalidTypes("function"))?;
                    let (base, enclosing) = {
                        let frame = self.frames.peek(0)?;
                        (frame.slots, frame.closure.clone())
                    };
                    let mut upvalues = Vec::with_capacity(function.upvalue_count);
                    for _ in 0..function.upvalue_count {
                        let is_local = self.read_byte()? == 1;
                        let index = self.read_byte()? as usize;
                        let upvalue = if is_local {
                            self.capture_upvalue(base + index)
                        } else {
                            enclosing
                                .upvalues
                                .get(index)
                                .cloned()
                                .ok_or(IncorrectInvariantError::InvalidUpvalue { index })?
                        };
                        upvalues.push(upvalue);
                    }
                    self.push(Value::Closure(Rc::new(Closure::new(function, upvalues))))?;
                }
                Opcode::Class => {
                    let name = self.read_string()?;
                    self.push(Value::Class(Rc::new(Class::new(name))))?;
                }
                Opcode::GetProperty => {
                    let name = self.read_string()?;
                    let Value::Instance(instance) = self.peek(0)?.clone() else {
                        return Err(RuntimeError::OnlyInstancesHaveProperties.into());
                    };
                    let value = self.property(&instance, &name)?;
                    self.pop()?;
                    self.push(value)?;
                }
                Opcode::SetProperty => {
                    let name = self.read_string()?;
                    let value = self.pop()?;
                    let Value::Instance(instance) = self.pop()? else {
                        return Err(RuntimeError::OnlyInstancesHaveFields.into());
                    };
                    instance.set(name, value.clone());
                    self.push(value)?;
                }
                Opcode::Method => {
                    let name = self.read_string()?;
                    let (class, method) = self.class_member()?;
                    class.define_method(name, method);
                    self.pop()?;
                }
                Opcode::ComputedProperty => {
                    let name = self.read_string()?;
                    let (class, property) = self.class_member()?;
                    class.define_computed_property(name, property);
                    self.pop()?;
                }
                Opcode::Inherit => {
                    let Value::Class(subclass) = self.peek(0)?.clone() else {
                        return Err(IncorrectInvariantError::InvalidTypes("class").into());
                    };
                    let Value::Class(superclass) = self.peek(1)?.clone() else {
                        return Err(RuntimeError::SuperclassMustBeClass.into());
                    };
                    subclass.inherit(&superclass);
                    self.pop()?;
                }
                Opcode::Invoke => {
                    let name = self.read_string()?;
                    let arg_count = self.read_byte()?;
                    self.invoke(&name, arg_count)?;
                }
                Opcode::GetSuper => {
                    let name = self.read_string()?;
                    let superclass = self.pop_class()?;
                    let Value::Instance(receiver) = self.pop()? else {
                        return Err(IncorrectInvariantError::InvalidTypes("instance").into());
                    };
                    let value = match superclass.computed_property(&name) {
                        Some(property) => {
                            self.eval_closure(property, Value::Instance(receiver))?
                        }
                        None => {
                            let method = superclass
                                .method(&name)
                                .ok_or_else(|| RuntimeError::UndefinedProperty(name.to_string()))?;
                            Value::BoundMethod(Rc::new(BoundMethod { receiver, method }))
                        }
                    };
                    self.push(value)?;
                }
                Opcode::InvokeSuper => {
                    let name = self.read_string()?;
                    let arg_count = self.read_byte()?;
                    let superclass = self.pop_class()?;
                    self.invoke_from_class(&superclass, &name, arg_count)?;
                }
                Opcode::ArrayLiteral => {
                    let count = self.read_byte()?;
                    let elements = self.stack.pop_many(count as usize)?;
                    let class = self
                        .globals
                        .get("Array")
                        .cloned()
                        .ok_or(RuntimeError::MissingArrayClass)?;
                    self.push(class.clone())?;
                    self.push(Value::Array(Rc::new(elements)))?;
                    self.push(Value::Int(count.into()))?;
                    self.call_value(class, 2)?;
                }
            }
        }
    }

    fn call_value(&mut self, callee: Value, arg_count: u8) -> VMResult<()> {
        match callee {
            Value::Closure(closure) => self.call(closure, arg_count),
            Value::Class(class) => {
                let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
                self.set_callee(arg_count, instance)?;
                match class.method("init") {
                    Some(init) => self.call(init, arg_count),
                    None if arg_count == 0 => Ok(()),
                    None => Err(RuntimeError::Arity {
                        expected: 0,
                        got: arg_count,
                    }
                    .into()),
                }
            }
            Value::BoundMethod(bound) => {
                self.set_callee(arg_count, Value::Instance(bound.receiver.clone()))?;
                self.call(bound.method.clone(), arg_count)
            }
            Value::Native(native) => {
                if native.arity() != arg_count {
                    return Err(RuntimeError::Arity {
                        expected: native.arity(),
                        got: arg_count,
                    }
                    .into());
                }
                let arguments = self.stack.pop_many(arg_count as usize)?;
                self.pop()?;
                let result = native.call(&arguments, self)?;
                self.push(result)
            }
            Value::Array(elements) => {
                if arg_count != 1 {
                    return Err(RuntimeError::Arity {
                        expected: 1,
                        got: arg_count,
                    }
                    .into());
                }
                let index = self.pop()?;
                self.pop()?;
                let Value::Int(index) = index else {
                    return Err(RuntimeError::InvalidIndex(index.type_name()).into());
                };
                // Out of range reads are nil
                let value = usize::try_from(index)
                    .ok()
                    .and_then(|i| elements.get(i))
                    .cloned()
                    .unwrap_or(Value::Nil);
                self.push(value)
            }
            Value::Instance(instance) => match instance.class.method("subscript") {
                Some(subscript) => self.call(subscript, arg_count),
                None => Err(RuntimeError::NotCallable("instance").into()),
            },
            other => Err(RuntimeError::NotCallable(other.type_name()).into()),
        }
    }

    fn call(&mut self, closure: Rc<Closure>, arg_count: u8) -> VMResult<()> {
        if closure.function.arity != arg_count {
            return Err(RuntimeError::Arity {
                expected: closure.function.arity,
                got: arg_count,
            }
            .into());
        }
        let slots = self
            .stack
            .len()
            .checked_sub(arg_count as usize + 1)
            .ok_or(IncorrectInvariantError::StackUnderflow)?;
        debug!("Calling {} with {arg_count} arguments", closure.function);
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots,
        })?;
        Ok(())
    }

    fn invoke(&mut self, name: &str, arg_count: u8) -> VMResult<()> {
        let Value::Instance(instance) = self.peek(arg_count as usize)?.clone() else {
            return Err(RuntimeError::OnlyInstancesHaveMethods.into());
        };
        if let Some(field) = instance.get(name) {
            self.set_callee(arg_count, field.clone())?;
            return self.call_value(field, arg_count);
        }
        if let Some(property) = instance.class.computed_property(name) {
            let value = self.eval_closure(property, Value::Instance(instance.clone()))?;
            self.set_callee(arg_count, value.clone())?;
            return self.call_value(value, arg_count);
        }
        self.invoke_from_class(&instance.class, name, arg_count)
    }

    fn invoke_from_class(&mut self, class: &Class, name: &str, arg_count: u8) -> VMResult<()> {
        let method = class
            .method(name)
            .ok_or_else(|| RuntimeError::UndefinedProperty(name.to_string()))?;
        self.call(method, arg_count)
    }

    /// Field, then computed property, then bound method.
    fn property(&mut self, instance: &Rc<Instance>, name: &str) -> VMResult<Value> {
        if let Some(value) = instance.get(name) {
            return Ok(value);
        }
        if let Some(property) = instance.class.computed_property(name) {
            return self.eval_closure(property, Value::Instance(instance.clone()));
        }
        let method = instance
            .class
            .method(name)
            .ok_or_else(|| RuntimeError::UndefinedProperty(name.to_string()))?;
        Ok(Value::BoundMethod(Rc::new(BoundMethod {
            receiver: instance.clone(),
            method,
        })))
    }

    /// Calls a zero-argument closure with `receiver` in its callee slot and
    /// runs it to completion on top of the current frames.
    fn eval_closure(&mut self, closure: Rc<Closure>, receiver: Value) -> VMResult<Value> {
        if self.nested >= NESTED_MAX {
            return Err(RuntimeError::StackOverflow.into());
        }
        let floor = self.frames.len();
        self.push(receiver)?;
        self.call(closure, 0)?;
        self.nested += 1;
        let result = self.run_until(floor);
        self.nested -= 1;
        result
    }

    fn describe(&mut self, value: Value) -> VMResult<String> {
        match &value {
            Value::Instance(instance) => {
                if let Some(description) = instance.get("description") {
                    return Ok(description.to_string());
                }
                if let Some(property) = instance.class.computed_property("description") {
                    let description = self.eval_closure(property, value.clone())?;
                    return Ok(description.to_string());
                }
            }
            Value::Array(elements) => {
                let mut parts = Vec::with_capacity(elements.len());
                for element in elements.iter() {
                    parts.push(self.describe(element.clone())?);
                }
                return Ok(format!("[{}]", parts.join(", ")));
            }
            _ => {}
        }
        Ok(value.to_string())
    }

    fn capture_upvalue(&mut self, slot: usize) -> UpvalueRef {
        let existing = self
            .open_upvalues
            .iter()
            .find(|upvalue| matches!(*upvalue.borrow(), Upvalue::Open(s) if s == slot));
        if let Some(upvalue) = existing {
            return upvalue.clone();
        }
        let upvalue = Rc::new(RefCell::new(Upvalue::Open(slot)));
        self.open_upvalues.push(upvalue.clone());
        upvalue
    }

    /// Closes every open upvalue pointing at `last` or above.
    fn close_upvalues(&mut self, last: usize) {
        let stack = &self.stack;
        self.open_upvalues.retain(|upvalue| {
            let mut upvalue = upvalue.borrow_mut();
            match *upvalue {
                Upvalue::Open(slot) if slot >= last => {
                    let value = stack.get(slot).cloned().unwrap_or(Value::Nil);
                    *upvalue = Upvalue::Closed(value);
                    false
                }
                _ => true,
            }
        });
    }

    fn class_member(&self) -> VMResult<(Rc<Class>, Rc<Closure>)> {
        let Value::Closure(closure) = self.peek(0)?.clone() else {
            return Err(IncorrectInvariantError::InvalidTypes("closure").into());
        };
        let Value::Class(class) = self.peek(1)?.clone() else {
            return Err(IncorrectInvariantError::InvalidTypes("class").into());
        };
        Ok((class, closure))
    }

    fn pop_class(&mut self) -> VMResult<Rc<Class>> {
        match self.pop()? {
            Value::Class(class) => Ok(class),
            _ => Err(IncorrectInvariantError::InvalidTypes("class").into()),
        }
    }

    fn set_callee(&mut self, arg_count: u8, value: Value) -> VMResult<()> {
        let slot = self
            .stack
            .len()
            .checked_sub(arg_count as usize + 1)
            .ok_or(IncorrectInvariantError::StackUnderflow)?;
        Ok(self.stack.set(slot, value)?)
    }

    fn read_byte(&mut self) -> VMResult<u8> {
        let frame = self.frames.last_mut()?;
        let chunk = &frame.closure.function.chunk;
        let byte = chunk.get(frame.ip).copied().ok_or(
            IncorrectInvariantError::InvalidInstructionPointer {
                pointer: frame.ip,
                chunk_length: chunk.len(),
            },
        )?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_short(&mut self) -> VMResult<u16> {
        let high = self.read_byte()?;
        let low = self.read_byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn read_constant(&mut self) -> VMResult<Value> {
        let index = self.read_byte()?;
        self.frames
            .peek(0)?
            .closure
            .function
            .chunk
            .get_constant(index)
            .cloned()
            .ok_or_else(|| IncorrectInvariantError::InvalidConstant { index }.into())
    }

    fn read_string(&mut self) -> VMResult<Rc<str>> {
        match self.read_constant()? {
            Value::String(s) => Ok(s),
            _ => Err(IncorrectInvariantError::InvalidTypes("string").into()),
        }
    }

    fn read_upvalue(&mut self) -> VMResult<UpvalueRef> {
        let index = self.read_byte()? as usize;
        self.frames
            .peek(0)?
            .closure
            .upvalues
            .get(index)
            .cloned()
            .ok_or_else(|| IncorrectInvariantError::InvalidUpvalue { index }.into())
    }

    fn push(&mut self, value: Value) -> VMResult<()> {
        Ok(self.stack.push(value)?)
    }

    fn pop(&mut self) -> VMResult<Value> {
        Ok(self.stack.pop()?)
    }

    fn peek(&self, distance: usize) -> VMResult<&Value> {
        Ok(self.stack.peek(distance)?)
    }

    fn binary_op(&mut self, f: fn(&Value, &Value) -> ValueResult<Value>) -> VMResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = f(&a, &b).map_err(RuntimeError::from)?;
        self.push(result)
    }

    fn report(&mut self, error: &VMError) {
        let border = "-".repeat(66);
        let mut report = format!("{border}\n{error}\n{border}\n");
        let stack: String = self.stack.iter().map(|v| format!("[ {v:?} ]")).collect();
        report.push_str(&format!("Stack: {stack}\n"));
        for frame in self.frames.iter().rev() {
            let function = &frame.closure.function;
            let line = function
                .chunk
                .line_at(frame.ip.saturating_sub(1))
                .unwrap_or_default();
            match function.kind {
                FunctionKind::Script => report.push_str(&format!("\t[line {line}] in script\n")),
                _ => report.push_str(&format!("\t[line {line}] in {}()\n", function.name)),
            }
        }
        if let Err(e) = self.write.write_all(report.as_bytes()) {
            error!("Error writing runtime diagnostic: {e}")
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
        self.nested = 0;
    }
}

impl<W: Write> NativeContext for Vm<'_, W> {
    fn output(&mut self) -> &mut dyn Write {
        &mut *self.write
    }

    fn description(&mut self, value: &Value) -> VMResult<String> {
        self.describe(value.clone())
    }
}

#[derive(Error, Debug, Clone)]
pub enum VMError {
    #[error("Internal error: {0}")]
    IncorrectInvariantError(#[from] IncorrectInvariantError),
    #[error("Runtime error: {0}")]
    RuntimeError(#[from] RuntimeError),
}

impl From<StackError> for VMError {
    fn from(e: StackError) -> Self {
        match e {
            StackError::Overflow => RuntimeError::StackOverflow.into(),
            StackError::Underflow => IncorrectInvariantError::StackUnderflow.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum IncorrectInvariantError {
    #[error("invalid opcode? {0}")]
    InvalidOpcode(#[from] TryFromPrimitiveError<Opcode>),
    #[error("uninitialized instruction")]
    UninitializedInstruction,
    #[error("invalid instruction pointer {pointer}, max length {chunk_length}")]
    InvalidInstructionPointer { pointer: usize, chunk_length: usize },
    #[error("invalid constant? {index}")]
    InvalidConstant { index: u8 },
    #[error("invalid upvalue? {index}")]
    InvalidUpvalue { index: usize },
    #[error("stack underflow?")]
    StackUnderflow,
    #[error("expected a {0} from the compiler")]
    InvalidTypes(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Expected {expected} arguments but got {got}.")]
    Arity { expected: u8, got: u8 },
    #[error("Can only call functions and classes, not {0}.")]
    NotCallable(&'static str),
    #[error("Only instances have properties.")]
    OnlyInstancesHaveProperties,
    #[error("Only instances have fields.")]
    OnlyInstancesHaveFields,
    #[error("Only instances have methods.")]
    OnlyInstancesHaveMethods,
    #[error("Superclass must be a class.")]
    SuperclassMustBeClass,
    #[error("Array index must be an int, not {0}.")]
    InvalidIndex(&'static str),
    #[error("Array literals need a global 'Array' class.")]
    MissingArrayClass,
    #[error("{function}() expected {expected}, got {got}.")]
    InvalidArgument {
        function: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    #[error(transparent)]
    Value(#[from] ValueError),
}
