use crate::compiler::CompileErrors;
use crate::value::Value;
use crate::vm::{VMError, Vm};
use log::trace;
use std::io::Write;
use thiserror::Error;

pub mod chunk;
pub mod compiler;
pub mod native;
pub mod object;
pub mod scanner;
pub mod stack;
pub mod value;
pub mod vm;

/// Runs `source` on a fresh VM, writing program output and runtime
/// diagnostics to `write`.
pub fn interpret<W: Write>(source: &str, write: &mut W) -> Result<Value, InterpretError> {
    trace!("Got input string: {source}");
    let mut vm = Vm::new(write);
    vm.interpret(source)
}

#[derive(Error, Debug, Clone)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileErrors),
    #[error(transparent)]
    Runtime(#[from] VMError),
}
