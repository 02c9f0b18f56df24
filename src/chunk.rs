use crate::value::Value;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::Write;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

pub const MAX_CONSTANTS: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    // Zero is never emitted, so a stray instruction pointer fails loudly
    Uninitialized,
    Constant,
    Return,
    Negate,
    Not,
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    Greater,
    True,
    False,
    Print,
    Pop,
    DefineGlobal,
    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    GetUpvalue,
    SetUpvalue,
    Jump,
    JumpIfFalse,
    Loop,
    Call,
    Closure,
    CloseUpvalue,
    Class,
    GetProperty,
    SetProperty,
    Method,
    Invoke,
    Inherit,
    GetSuper,
    InvokeSuper,
    Nil,
    ArrayLiteral,
    ComputedProperty,
}

impl Opcode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Number of operand bytes following the opcode. `Closure` is followed by
    /// an extra `(is_local, index)` pair per upvalue, which depends on the
    /// function constant and is not counted here.
    pub fn operand_len(self) -> usize {
        use Opcode::*;
        match self {
            Uninitialized | Return | Negate | Not | Add | Subtract | Multiply | Divide | Equal
            | NotEqual | Less | Greater | True | False | Print | Pop | CloseUpvalue | Inherit
            | Nil => 0,
            Constant | DefineGlobal | GetGlobal | SetGlobal | GetLocal | SetLocal | GetUpvalue
            | SetUpvalue | Call | Closure | Class | GetProperty | SetProperty | Method
            | GetSuper | ArrayLiteral | ComputedProperty => 1,
            Jump | JumpIfFalse | Loop | Invoke | InvokeSuper => 2,
        }
    }
}

#[derive(Clone)]
pub struct Chunk {
    code: Vec<u8>,
    constants: Vec<Value>,
    name: String,
    lines: Vec<usize>,
}

impl Chunk {
    pub fn new(name: String) -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            name,
            lines: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_byte(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn add_opcode(&mut self, opcode: Opcode, line: usize) {
        self.add_byte(opcode.as_byte(), line)
    }

    pub fn add_opcode_and_operand(&mut self, opcode: Opcode, operand: u8, line: usize) {
        self.add_byte(opcode.as_byte(), line);
        self.add_byte(operand, line);
    }

    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        let existing_index = self
            .constants
            .iter()
            .position(|c| c.same_constant(&value));
        if let Some(idx) = existing_index {
            Some(idx as u8)
        } else if self.constants.len() < MAX_CONSTANTS {
            self.constants.push(value);
            Some((self.constants.len() - 1) as u8)
        } else {
            None
        }
    }

    pub fn get_constant(&self, index: u8) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn line_at(&self, offset: usize) -> Option<usize> {
        self.lines.get(offset).copied()
    }

    /// Offset the next emitted instruction will land on.
    pub fn get_loop_start(&self) -> usize {
        self.code.len()
    }

    /// Emits `opcode` with a placeholder offset and returns the offset of the
    /// jump instruction itself, to be handed to [`Chunk::patch_jump`].
    pub fn add_dummy_jump(&mut self, opcode: Opcode, line: usize) -> usize {
        let offset = self.code.len();
        self.add_opcode(opcode, line);
        self.add_byte(0xff, line);
        self.add_byte(0xff, line);
        offset
    }

    /// Points the jump at `jump_offset` to the next instruction to be emitted.
    pub fn patch_jump(&mut self, jump_offset: usize) -> Result<(), String> {
        let distance = self
            .code
            .len()
            .checked_sub(jump_offset + 3)
            .ok_or_else(|| format!("invalid jump offset {jump_offset}"))?;
        let distance =
            u16::try_from(distance).map_err(|_| "Too much code to jump over".to_string())?;
        let [high, low] = distance.to_be_bytes();
        self.code[jump_offset + 1] = high;
        self.code[jump_offset + 2] = low;
        Ok(())
    }

    pub fn emit_loop(&mut self, loop_start: usize, line: usize) -> Result<(), String> {
        // The operand is read after the whole instruction has been consumed
        let distance = self.code.len() + 3 - loop_start;
        let distance = u16::try_from(distance).map_err(|_| "Loop body too large".to_string())?;
        let [high, low] = distance.to_be_bytes();
        self.add_opcode(Opcode::Loop, line);
        self.add_byte(high, line);
        self.add_byte(low, line);
        Ok(())
    }

    pub fn read_short(&self, offset: usize) -> Option<u16> {
        let high = *self.code.get(offset)?;
        let low = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([high, low]))
    }

    /// Total length of the instruction starting at `offset`, operands included.
    pub fn instruction_len(&self, offset: usize) -> Option<usize> {
        let opcode = Opcode::try_from(*self.code.get(offset)?).ok()?;
        let mut len = 1 + opcode.operand_len();
        if opcode == Opcode::Closure {
            let constant = self.get_constant(*self.code.get(offset + 1)?)?;
            len += 2 * constant.as_function()?.upvalue_count;
        }
        Some(len)
    }

    /// Decodes the instruction stream into `(offset, opcode)` pairs. Stops at
    /// the first byte that does not decode.
    pub fn instructions(&self) -> Vec<(usize, Opcode)> {
        let mut offset = 0;
        let mut result = Vec::new();
        while offset < self.code.len() {
            let Ok(opcode) = Opcode::try_from(self.code[offset]) else {
                break;
            };
            let Some(len) = self.instruction_len(offset) else {
                break;
            };
            result.push((offset, opcode));
            offset += len;
        }
        result
    }

    pub fn disassemble(&self) -> String {
        let mut result = String::new();
        writeln!(result, "== {} ==", self.name).unwrap();

        let mut offset = 0;
        let mut previous_line: Option<usize> = None;
        while offset < self.code.len() {
            let line = self.lines[offset];
            write!(result, "0x{offset:04x} ").unwrap();
            match previous_line {
                Some(prev_line) if prev_line == line => write!(result, "   | ").unwrap(),
                _ => write!(result, "{line:04} ").unwrap(),
            }
            previous_line = Some(line);
            let (text, len) = self.write_single_instruction(offset);
            writeln!(result, "{text}").unwrap();
            offset += len;
        }

        for constant in &self.constants {
            if let Some(function) = constant.as_function() {
                writeln!(result).unwrap();
                result.push_str(&function.chunk.disassemble());
            }
        }

        result
    }

    pub fn disassemble_instruction_at(&self, offset: usize) -> Option<String> {
        let line = self.line_at(offset)?;
        let (text, _) = self.write_single_instruction(offset);
        Some(format!("0x{offset:04x} {line:04} {text}"))
    }

    fn write_single_instruction(&self, offset: usize) -> (String, usize) {
        let byte = self.code[offset];
        let Ok(opcode) = Opcode::try_from(byte) else {
            return (format!("Unknown opcode 0x{byte:02x}"), 1);
        };
        let operand = self.code.get(offset + 1).copied();
        use Opcode::*;
        let text = match opcode {
            Uninitialized | Return | Negate | Not | Add | Subtract | Multiply | Divide | Equal
            | NotEqual | Less | Greater | True | False | Print | Pop | CloseUpvalue | Inherit
            | Nil => simple_instruction(opcode),
            Constant | DefineGlobal | GetGlobal | SetGlobal | Class | GetProperty
            | SetProperty | Method | GetSuper | ComputedProperty => {
                self.constant_instruction(opcode, operand)
            }
            GetLocal | SetLocal | GetUpvalue | SetUpvalue | Call | ArrayLiteral => {
                byte_instruction(opcode, operand)
            }
            Jump | JumpIfFalse => self.jump_instruction(opcode, offset, 1),
            Loop => self.jump_instruction(opcode, offset, -1),
            Invoke | InvokeSuper => {
                let name = operand
                    .and_then(|idx| self.get_constant(idx))
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "(unknown)".to_string());
                let arg_count = self.code.get(offset + 2).copied().unwrap_or_default();
                format!("{opcode:?} .{name} {arg_count}")
            }
            Closure => self.closure_instruction(offset, operand),
        };
        let len = self.instruction_len(offset).unwrap_or(1);
        (text, len)
    }

    fn constant_instruction(&self, opcode: Opcode, operand: Option<u8>) -> String {
        let value = if let Some(idx) = operand {
            let value = self.get_constant(idx);
            if let Some(value) = value {
                format!("{} {}", idx, value)
            } else {
                format!("(index 0x{idx:02x} unknown)")
            }
        } else {
            "(unknown)".to_string()
        };
        format!("{opcode:?} {value}")
    }

    fn jump_instruction(&self, opcode: Opcode, offset: usize, sign: i64) -> String {
        match self.read_short(offset + 1) {
            Some(jump) => {
                let target = offset as i64 + 3 + sign * jump as i64;
                format!("{opcode:?} {offset} -> {target}")
            }
            None => format!("{opcode:?} (unknown)"),
        }
    }

    fn closure_instruction(&self, offset: usize, operand: Option<u8>) -> String {
        let Some(function) = operand
            .and_then(|idx| self.get_constant(idx))
            .and_then(|c| c.as_function())
        else {
            return "Closure (unknown)".to_string();
        };
        let mut text = format!("Closure {} <fn {}>", operand.unwrap_or_default(), function.name);
        for i in 0..function.upvalue_count {
            let is_local = self.code.get(offset + 2 + 2 * i).copied().unwrap_or_default();
            let index = self.code.get(offset + 3 + 2 * i).copied().unwrap_or_default();
            write!(
                text,
                "\n{:>14} {} {}",
                "|",
                index,
                if is_local == 1 { "local" } else { "upvalue" }
            )
            .unwrap();
        }
        text
    }
}

fn simple_instruction(opcode: Opcode) -> String {
    format!("{opcode:?}")
}

fn byte_instruction(opcode: Opcode, operand: Option<u8>) -> String {
    let value = if let Some(idx) = operand {
        format!("{}", idx)
    } else {
        "(unknown)".to_string()
    };
    format!("{opcode:?} {value}")
}

impl Debug for Chunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.disassemble())?;
        writeln!(f, "Constants:")?;
        for (i, c) in self.constants.iter().enumerate() {
            writeln!(f, "{i:04}: {c:?}")?;
        }
        Ok(())
    }
}

impl Deref for Chunk {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_follow_code() {
        let mut chunk = Chunk::new("test".to_string());
        let idx = chunk.add_constant(Value::Int(1)).unwrap();
        chunk.add_opcode_and_operand(Opcode::Constant, idx, 1);
        chunk.add_opcode(Opcode::Print, 2);
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.line_at(2), Some(2));
        assert_eq!(chunk.line_at(3), None);
    }

    #[test]
    fn constants_are_deduplicated() {
        let mut chunk = Chunk::new("test".to_string());
        let a = chunk.add_constant(Value::string("a")).unwrap();
        let b = chunk.add_constant(Value::Int(2)).unwrap();
        let c = chunk.add_constant(Value::string("a")).unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(chunk.constants().len(), 2);
    }

    #[test]
    fn too_many_constants() {
        let mut chunk = Chunk::new("test".to_string());
        for i in 0..MAX_CONSTANTS {
            assert!(chunk.add_constant(Value::Int(i as i64)).is_some());
        }
        assert!(chunk.add_constant(Value::Int(-1)).is_none());
    }

    #[test]
    fn patched_jump_lands_after_body() {
        let mut chunk = Chunk::new("test".to_string());
        chunk.add_opcode(Opcode::True, 1);
        let jump = chunk.add_dummy_jump(Opcode::JumpIfFalse, 1);
        chunk.add_opcode(Opcode::Pop, 1);
        chunk.add_opcode(Opcode::Nil, 1);
        chunk.patch_jump(jump).unwrap();
        let target = chunk.len();
        let distance = chunk.read_short(jump + 1).unwrap() as usize;
        assert_eq!(jump + 3 + distance, target);
    }

    #[test]
    fn loop_returns_to_start() {
        let mut chunk = Chunk::new("test".to_string());
        chunk.add_opcode(Opcode::Nil, 1);
        let start = chunk.get_loop_start();
        chunk.add_opcode(Opcode::True, 1);
        chunk.add_opcode(Opcode::Pop, 1);
        chunk.emit_loop(start, 1).unwrap();
        let loop_offset = chunk.len() - 3;
        let distance = chunk.read_short(loop_offset + 1).unwrap() as usize;
        assert_eq!(chunk.len() - distance, start);
    }

    #[test]
    fn disassembly_marks_repeated_lines() {
        let mut chunk = Chunk::new("test".to_string());
        chunk.add_opcode(Opcode::Nil, 1);
        chunk.add_opcode(Opcode::Print, 1);
        chunk.add_opcode(Opcode::Nil, 2);
        let text = chunk.disassemble();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "== test ==");
        assert_eq!(lines[1], "0x0000 0001 Nil");
        assert_eq!(lines[2], "0x0001    | Print");
        assert_eq!(lines[3], "0x0002 0002 Nil");
    }

    #[test]
    fn uninitialized_is_zero() {
        assert_eq!(Opcode::Uninitialized.as_byte(), 0);
        assert_eq!(Opcode::try_from(0u8).unwrap(), Opcode::Uninitialized);
        assert!(Opcode::try_from(250u8).is_err());
    }
}
