use crate::native::NativeFunction;
use crate::object::{BoundMethod, Class, Closure, Function, Instance};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use thiserror::Error;

pub type ValueResult<A> = Result<A, ValueError>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Number(f64),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Function(Rc<Function>),
    Closure(Rc<Closure>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    BoundMethod(Rc<BoundMethod>),
    Native(Rc<dyn NativeFunction>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Int(a), Value::Number(b)) | (Value::Number(b), Value::Int(a)) => {
                int_equals_number(*a, *b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                Rc::ptr_eq(&a.receiver, &b.receiver) && Rc::ptr_eq(&a.method, &b.method)
            }
            (Value::Native(a), Value::Native(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(s.into())
    }

    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Bool(false) | Value::Nil)
    }

    pub fn as_function(&self) -> Option<&Rc<Function>> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Rc<str>> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Stricter than `==`: `1` and `1.0` are different constants.
    pub fn same_constant(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_), Value::Number(_)) | (Value::Number(_), Value::Int(_)) => false,
            _ => self == other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) | Value::Closure(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::BoundMethod(_) => "bound method",
            Value::Native(_) => "native function",
        }
    }

    pub fn add(&self, other: &Value) -> ValueResult<Value> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Ok(Value::String(s.into()))
            }
            _ => self.arithmetic(other, "+", i64::checked_add, |a, b| a + b),
        }
    }

    pub fn subtract(&self, other: &Value) -> ValueResult<Value> {
        self.arithmetic(other, "-", i64::checked_sub, |a, b| a - b)
    }

    pub fn multiply(&self, other: &Value) -> ValueResult<Value> {
        self.arithmetic(other, "*", i64::checked_mul, |a, b| a * b)
    }

    pub fn divide(&self, other: &Value) -> ValueResult<Value> {
        if let (Value::Int(_), Value::Int(0)) = (self, other) {
            return Err(ValueError::DivisionByZero);
        }
        self.arithmetic(other, "/", i64::checked_div, |a, b| a / b)
    }

    pub fn negate(&self) -> ValueResult<Value> {
        match self {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or(ValueError::Overflow("-")),
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(ValueError::InvalidOperand {
                op: "-",
                operand: self.type_name(),
            }),
        }
    }

    pub fn not(&self) -> Value {
        Value::Bool(self.is_falsey())
    }

    pub fn less(&self, other: &Value) -> ValueResult<Value> {
        self.compare(other, "<", |a, b| a < b, |a, b| a < b, |a, b| a < b)
    }

    pub fn greater(&self, other: &Value) -> ValueResult<Value> {
        self.compare(other, ">", |a, b| a > b, |a, b| a > b, |a, b| a > b)
    }

    fn arithmetic(
        &self,
        other: &Value,
        op: &'static str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> ValueResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
                .map(Value::Int)
                .ok_or(ValueError::Overflow(op)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Number(float_op(a, b))),
                _ => Err(self.invalid_operands(op, other)),
            },
        }
    }

    fn compare(
        &self,
        other: &Value,
        op: &'static str,
        int_op: fn(i64, i64) -> bool,
        str_op: fn(&str, &str) -> bool,
        float_op: fn(f64, f64) -> bool,
    ) -> ValueResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(int_op(*a, *b))),
            (Value::String(a), Value::String(b)) => Ok(Value::Bool(str_op(a, b))),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Bool(float_op(a, b))),
                _ => Err(self.invalid_operands(op, other)),
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn invalid_operands(&self, op: &'static str, other: &Value) -> ValueError {
        ValueError::InvalidOperands {
            op,
            left: self.type_name(),
            right: other.type_name(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Value::Function(function) => write!(f, "{function}"),
            Value::Closure(closure) => write!(f, "{}", closure.function),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class.name),
            Value::BoundMethod(bound) => write!(
                f,
                "<bound method {}.{}>",
                bound.receiver.class.name, bound.method.function.name
            ),
            Value::Native(native) => write!(f, "<native {}>", native.name()),
        }
    }
}

// Objects can refer back to themselves through fields, so this never descends
// into instances.
impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(elements) => f.debug_list().entries(elements.iter()).finish(),
            _ => write!(f, "{self}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Cannot apply '{op}' to {left} and {right}")]
    InvalidOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("Cannot apply '{op}' to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in '{0}'")]
    Overflow(&'static str),
}

/// Exact: true only when `b` is integral and converts back to `a` without rounding.
fn int_equals_number(a: i64, b: f64) -> bool {
    // 2^63 itself is out of range for i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    b.fract() == 0.0 && (-LIMIT..LIMIT).contains(&b) && b as i64 == a
}
