//! Heap objects shared between values. Everything here is reference counted;
//! cyclic structures (an instance storing a closure that captures it) are
//! never reclaimed.

use crate::chunk::Chunk;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

#[derive(Debug)]
pub struct Function {
    pub name: Rc<str>,
    pub arity: u8,
    pub upvalue_count: usize,
    pub kind: FunctionKind,
    pub chunk: Chunk,
}

impl Function {
    pub fn new(name: &str, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            arity: 0,
            upvalue_count: 0,
            kind,
            chunk: Chunk::new(name.to_string()),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

/// A captured variable. While the declaring frame is live the cell points at
/// the variable's stack slot; once the slot is gone it owns the value.
#[derive(Debug, Clone)]
pub enum Upvalue {
    Open(usize),
    Closed(Value),
}

pub type UpvalueRef = Rc<RefCell<Upvalue>>;

#[derive(Debug)]
pub struct Closure {
    pub function: Rc<Function>,
    pub upvalues: Box<[UpvalueRef]>,
}

impl Closure {
    pub fn new(function: Rc<Function>, upvalues: Vec<UpvalueRef>) -> Self {
        Self {
            function,
            upvalues: upvalues.into_boxed_slice(),
        }
    }
}

#[derive(Debug)]
pub struct Class {
    pub name: Rc<str>,
    methods: RefCell<HashMap<Rc<str>, Rc<Closure>>>,
    computed_properties: RefCell<HashMap<Rc<str>, Rc<Closure>>>,
}

impl Class {
    pub fn new(name: Rc<str>) -> Self {
        Self {
            name,
            methods: RefCell::new(HashMap::new()),
            computed_properties: RefCell::new(HashMap::new()),
        }
    }

    pub fn define_method(&self, name: Rc<str>, method: Rc<Closure>) {
        self.methods.borrow_mut().insert(name, method);
    }

    pub fn define_computed_property(&self, name: Rc<str>, property: Rc<Closure>) {
        self.computed_properties.borrow_mut().insert(name, property);
    }

    pub fn method(&self, name: &str) -> Option<Rc<Closure>> {
        self.methods.borrow().get(name).cloned()
    }

    pub fn computed_property(&self, name: &str) -> Option<Rc<Closure>> {
        self.computed_properties.borrow().get(name).cloned()
    }

    /// Copies every method and computed property of `superclass` into this
    /// class. Later changes to `superclass` are not seen.
    pub fn inherit(&self, superclass: &Class) {
        let methods = superclass.methods.borrow();
        self.methods.borrow_mut().extend(
            methods
                .iter()
                .map(|(name, method)| (name.clone(), method.clone())),
        );
        let properties = superclass.computed_properties.borrow();
        self.computed_properties.borrow_mut().extend(
            properties
                .iter()
                .map(|(name, property)| (name.clone(), property.clone())),
        );
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<HashMap<Rc<str>, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set(&self, name: Rc<str>, value: Value) {
        self.fields.borrow_mut().insert(name, value);
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Rc<Instance>,
    pub method: Rc<Closure>,
}
