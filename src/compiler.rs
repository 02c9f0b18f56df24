use crate::chunk::{Chunk, Opcode};
use crate::object::{Function, FunctionKind};
use crate::scanner::{ScanError, Scanner, SourceIterator, Token, TokenKind};
use crate::value::Value;
use arrayvec::ArrayVec;
use log::trace;
use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::mem;
use std::rc::Rc;
use thiserror::Error;

type CompileResult<A> = Result<A, CompileError>;

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;
const MAX_ARGUMENTS: usize = 255;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Ord, Eq)]
enum BindingPower {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl BindingPower {
    fn next(&self) -> Self {
        use BindingPower::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => unreachable!(),
        }
    }
}

/// Compiles a whole program into the function run at top level. Nested
/// functions end up as constants of their enclosing chunk.
pub fn compile(source: &str) -> Result<Function, CompileErrors> {
    let scanner = Scanner::new(source);
    let mut compiler = Compiler::new(source, scanner.iter());
    compiler.compile();
    compiler.finish()
}

struct Compiler<'a> {
    source: &'a str,
    iter: Peekable<SourceIterator<'a>>,
    previous: Token<'a>,
    ctx: FunctionCtx<'a>,
    classes: Vec<ClassCtx>,
    errors: CompileErrors,
}

/// Per-function state. Contexts form a chain through `parent` while nested
/// function bodies are compiled.
struct FunctionCtx<'a> {
    function: Function,
    locals: ArrayVec<Local<'a>, MAX_LOCALS>,
    upvalues: ArrayVec<UpvalueIndex, MAX_UPVALUES>,
    scope_depth: usize,
    parent: Option<Box<FunctionCtx<'a>>>,
}

#[derive(Debug)]
struct Local<'a> {
    name: &'a str,
    depth: usize,
    is_initialized: bool,
    is_captured: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct UpvalueIndex {
    index: u8,
    is_local: bool,
}

#[derive(Debug, Default)]
struct ClassCtx {
    has_superclass: bool,
}

impl<'a> FunctionCtx<'a> {
    fn new(name: &str, kind: FunctionKind) -> Self {
        let mut locals = ArrayVec::new();
        // Slot 0 holds the callee, or the receiver for methods
        locals.push(Local {
            name: match kind {
                FunctionKind::Method | FunctionKind::Initializer => "self",
                FunctionKind::Script | FunctionKind::Function => "",
            },
            depth: 0,
            is_initialized: true,
            is_captured: false,
        });
        Self {
            function: Function::new(name, kind),
            locals,
            upvalues: ArrayVec::new(),
            scope_depth: 0,
            parent: None,
        }
    }

    fn resolve_local(&mut self, name: &str, capture: bool) -> Result<Option<u8>, ErrorKind> {
        match self
            .locals
            .iter_mut()
            .enumerate()
            .rfind(|(_, local)| local.name == name)
        {
            Some((idx, local)) => {
                if !local.is_initialized {
                    return Err(ErrorKind::LocalInOwnInitializer);
                }
                if capture {
                    local.is_captured = true;
                }
                Ok(Some(idx as u8))
            }
            None => Ok(None),
        }
    }

    fn resolve_upvalue(&mut self, name: &str) -> Result<Option<u8>, ErrorKind> {
        let Some(parent) = self.parent.as_mut() else {
            return Ok(None);
        };
        if let Some(index) = parent.resolve_local(name, true)? {
            return self.add_upvalue(index, true).map(Some);
        }
        if let Some(index) = parent.resolve_upvalue(name)? {
            return self.add_upvalue(index, false).map(Some);
        }
        Ok(None)
    }

    fn add_upvalue(&mut self, index: u8, is_local: bool) -> Result<u8, ErrorKind> {
        let upvalue = UpvalueIndex { index, is_local };
        if let Some(existing) = self.upvalues.iter().position(|u| *u == upvalue) {
            return Ok(existing as u8);
        }
        self.upvalues
            .try_push(upvalue)
            .map_err(|_| ErrorKind::TooManyUpvalues)?;
        Ok((self.upvalues.len() - 1) as u8)
    }
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str, iter: SourceIterator<'a>) -> Self {
        Self {
            source,
            iter: iter.peekable(),
            previous: Token::new(TokenKind::Eof, "", 0, 1),
            ctx: FunctionCtx::new("main", FunctionKind::Script),
            classes: Vec::new(),
            errors: CompileErrors::default(),
        }
    }

    fn compile(&mut self) {
        while !self.check(TokenKind::Eof) {
            self.declaration();
        }
    }

    fn finish(mut self) -> Result<Function, CompileErrors> {
        self.emit_return();
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        let function = self.ctx.function;
        trace!("Emitting chunk:\n{:?}", function.chunk);
        Ok(function)
    }

    // Token stream

    fn peek(&mut self) -> Token<'a> {
        loop {
            match self.iter.peek() {
                Some(Ok(token)) => return token.clone(),
                Some(Err(_)) => {
                    if let Some(Err(e)) = self.iter.next() {
                        let error = self.scan_error(e);
                        self.errors.push(error);
                    }
                }
                None => {
                    return Token::new(
                        TokenKind::Eof,
                        "",
                        self.source.len(),
                        self.previous.line,
                    )
                }
            }
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            let _ = self.iter.next();
        }
        self.previous = token.clone();
        token
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &'static str) -> CompileResult<Token<'a>> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error_at(&token, ErrorKind::Expected(message)))
        }
    }

    // Declarations

    fn declaration(&mut self) {
        let result = match self.peek().kind {
            TokenKind::Class => {
                self.advance();
                self.class_declaration()
            }
            TokenKind::Func => {
                self.advance();
                self.func_declaration()
            }
            TokenKind::Var => {
                self.advance();
                self.var_declaration()
            }
            _ => self.statement(),
        };
        if let Err(e) = result {
            self.errors.push(e);
            self.synchronize();
        }
    }

    fn synchronize(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Eof
                | TokenKind::Class
                | TokenKind::Func
                | TokenKind::Var
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn var_declaration(&mut self) -> CompileResult<()> {
        let global = self.parse_variable()?;
        if self.matches(TokenKind::Equal) {
            self.expression()?;
        } else {
            self.emit(Opcode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        self.define_variable(global);
        Ok(())
    }

    fn func_declaration(&mut self) -> CompileResult<()> {
        let global = self.parse_variable()?;
        let name = self.previous.lexeme;
        // Functions may refer to themselves
        self.mark_initialized();
        self.function(name, FunctionKind::Function, true)?;
        self.define_variable(global);
        Ok(())
    }

    fn class_declaration(&mut self) -> CompileResult<()> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;
        let name_constant = self.identifier_constant(&name)?;
        self.declare_variable(&name)?;
        self.chunk()
            .add_opcode_and_operand(Opcode::Class, name_constant, name.line);
        let global = (self.ctx.scope_depth == 0).then_some(name_constant);
        self.define_variable(global);

        self.classes.push(ClassCtx::default());
        let result = self.class_body(&name);
        if let Some(class) = self.classes.pop() {
            if class.has_superclass {
                self.end_scope();
            }
        }
        result
    }

    fn class_body(&mut self, name: &Token<'a>) -> CompileResult<()> {
        if self.matches(TokenKind::Colon) {
            let superclass = self.consume(TokenKind::Identifier, "Expect superclass name.")?;
            if superclass.lexeme == name.lexeme {
                return Err(self.error_at(&superclass, ErrorKind::InheritFromSelf));
            }
            self.named_variable(&superclass, false)?;

            self.begin_scope();
            if let Some(class) = self.classes.last_mut() {
                class.has_superclass = true;
            }
            self.add_local("super", &superclass)?;
            self.define_variable(None);

            self.named_variable(name, false)?;
            self.chunk().add_opcode(Opcode::Inherit, superclass.line);
        }

        self.named_variable(name, false)?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.member()?;
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;
        self.emit(Opcode::Pop);
        Ok(())
    }

    fn member(&mut self) -> CompileResult<()> {
        if self.matches(TokenKind::Var) {
            let name = self.consume(TokenKind::Identifier, "Expect property name.")?;
            let constant = self.identifier_constant(&name)?;
            self.function(name.lexeme, FunctionKind::Method, false)?;
            self.chunk()
                .add_opcode_and_operand(Opcode::ComputedProperty, constant, name.line);
        } else {
            let name = self.consume(TokenKind::Identifier, "Expect method name.")?;
            let constant = self.identifier_constant(&name)?;
            let kind = if name.lexeme == "init" {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };
            self.function(name.lexeme, kind, true)?;
            self.chunk()
                .add_opcode_and_operand(Opcode::Method, constant, name.line);
        }
        Ok(())
    }

    fn function(
        &mut self,
        name: &'a str,
        kind: FunctionKind,
        has_parameters: bool,
    ) -> CompileResult<()> {
        let line = self.previous.line;
        self.begin_function(name, kind);
        let body = self.function_body(has_parameters);
        let (function, upvalues) = self.end_function();
        body?;

        let constant = self.make_constant(Value::Function(Rc::new(function)))?;
        self.chunk()
            .add_opcode_and_operand(Opcode::Closure, constant, line);
        for upvalue in upvalues {
            self.chunk().add_byte(upvalue.is_local.into(), line);
            self.chunk().add_byte(upvalue.index, line);
        }
        Ok(())
    }

    fn function_body(&mut self, has_parameters: bool) -> CompileResult<()> {
        self.begin_scope();
        if has_parameters {
            self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
            if !self.check(TokenKind::RightParen) {
                loop {
                    if self.ctx.function.arity as usize == MAX_ARGUMENTS {
                        let token = self.peek();
                        return Err(self.error_at(&token, ErrorKind::TooManyParameters));
                    }
                    self.ctx.function.arity += 1;
                    let constant = self.parse_variable()?;
                    self.define_variable(constant);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        }
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        // The frame is discarded on return, so the scope is never closed
        self.block()
    }

    fn begin_function(&mut self, name: &str, kind: FunctionKind) {
        let ctx = FunctionCtx::new(name, kind);
        let parent = mem::replace(&mut self.ctx, ctx);
        self.ctx.parent = Some(Box::new(parent));
    }

    fn end_function(&mut self) -> (Function, ArrayVec<UpvalueIndex, MAX_UPVALUES>) {
        self.emit_return();
        let Some(parent) = self.ctx.parent.take() else {
            unreachable!("Ended the top level function context")
        };
        let ctx = mem::replace(&mut self.ctx, *parent);
        let mut function = ctx.function;
        function.upvalue_count = ctx.upvalues.len();
        trace!("Emitting chunk:\n{:?}", function.chunk);
        (function, ctx.upvalues)
    }

    fn parse_variable(&mut self) -> CompileResult<Option<u8>> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        self.declare_variable(&name)?;
        if self.ctx.scope_depth > 0 {
            Ok(None)
        } else {
            self.identifier_constant(&name).map(Some)
        }
    }

    fn identifier_constant(&mut self, name: &Token<'a>) -> CompileResult<u8> {
        self.chunk()
            .add_constant(Value::string(name.lexeme))
            .ok_or_else(|| self.error_at(name, ErrorKind::TooManyConstants))
    }

    fn make_constant(&mut self, value: Value) -> CompileResult<u8> {
        self.chunk().add_constant(value).ok_or_else(|| {
            let previous = self.previous.clone();
            self.error_at(&previous, ErrorKind::TooManyConstants)
        })
    }

    fn declare_variable(&mut self, name: &Token<'a>) -> CompileResult<()> {
        let depth = self.ctx.scope_depth;
        if depth == 0 {
            return Ok(());
        }
        let duplicate = self
            .ctx
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth == depth)
            .any(|local| local.name == name.lexeme);
        if duplicate {
            // Reported, but compilation of the declaration carries on
            let error = self.error_at(name, ErrorKind::DuplicateLocal);
            self.errors.push(error);
        }
        self.add_local(name.lexeme, name)
    }

    fn add_local(&mut self, name: &'a str, token: &Token<'a>) -> CompileResult<()> {
        let depth = self.ctx.scope_depth;
        self.ctx
            .locals
            .try_push(Local {
                name,
                depth,
                is_initialized: false,
                is_captured: false,
            })
            .map_err(|_| self.error_at(token, ErrorKind::TooManyLocals))
    }

    fn define_variable(&mut self, global: Option<u8>) {
        match global {
            Some(idx) => {
                let line = self.previous.line;
                self.chunk()
                    .add_opcode_and_operand(Opcode::DefineGlobal, idx, line);
            }
            None => self.mark_initialized(),
        }
    }

    fn mark_initialized(&mut self) {
        if self.ctx.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.ctx.locals.last_mut() {
            local.is_initialized = true;
        }
    }

    // Statements

    fn statement(&mut self) -> CompileResult<()> {
        let token = self.peek();
        match token.kind {
            TokenKind::Print => {
                self.advance();
                self.expression()?;
                self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
                self.chunk().add_opcode(Opcode::Print, token.line);
                Ok(())
            }
            TokenKind::If => {
                self.advance();
                self.if_statement()
            }
            TokenKind::While => {
                self.advance();
                self.while_statement()
            }
            TokenKind::Return => {
                self.advance();
                self.return_statement(&token)
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.scoped(|s| s.block())
            }
            _ => self.expression_statement(),
        }
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<()>) -> CompileResult<()> {
        self.begin_scope();
        let res = f(self);
        self.end_scope();
        res
    }

    fn begin_scope(&mut self) {
        self.ctx.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.ctx.scope_depth -= 1;
        let line = self.previous.line;
        while let Some(local) = self.ctx.locals.last() {
            if local.depth <= self.ctx.scope_depth {
                break;
            }
            let opcode = if local.is_captured {
                Opcode::CloseUpvalue
            } else {
                Opcode::Pop
            };
            self.ctx.locals.pop();
            self.chunk().add_opcode(opcode, line);
        }
    }

    fn block(&mut self) -> CompileResult<()> {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(())
    }

    fn if_statement(&mut self) -> CompileResult<()> {
        self.expression()?;
        let line = self.previous.line;
        self.consume(TokenKind::LeftBrace, "Expect '{' after if condition.")?;
        let then_jump = self.emit_jump(Opcode::JumpIfFalse, line);
        self.chunk().add_opcode(Opcode::Pop, line);
        self.scoped(|s| s.block())?;

        let else_jump = self.emit_jump(Opcode::Jump, line);
        self.patch_jump(then_jump)?;
        self.chunk().add_opcode(Opcode::Pop, line);

        if self.matches(TokenKind::Else) {
            if self.matches(TokenKind::If) {
                self.if_statement()?;
            } else {
                self.consume(TokenKind::LeftBrace, "Expect '{' after else.")?;
                self.scoped(|s| s.block())?;
            }
        }
        self.patch_jump(else_jump)
    }

    fn while_statement(&mut self) -> CompileResult<()> {
        let loop_start = self.chunk().get_loop_start();
        self.expression()?;
        let line = self.previous.line;
        self.consume(TokenKind::LeftBrace, "Expect '{' after while condition.")?;

        let exit_jump = self.emit_jump(Opcode::JumpIfFalse, line);
        self.chunk().add_opcode(Opcode::Pop, line);
        self.scoped(|s| s.block())?;
        self.emit_loop(loop_start, line)?;

        self.patch_jump(exit_jump)?;
        self.chunk().add_opcode(Opcode::Pop, line);
        Ok(())
    }

    fn return_statement(&mut self, keyword: &Token<'a>) -> CompileResult<()> {
        match self.ctx.function.kind {
            FunctionKind::Script => {
                return Err(self.error_at(keyword, ErrorKind::ReturnFromScript));
            }
            FunctionKind::Initializer => {
                return Err(self.error_at(keyword, ErrorKind::ReturnFromInitializer));
            }
            FunctionKind::Function | FunctionKind::Method => {}
        }
        if self.matches(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            self.expression()?;
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
            self.chunk().add_opcode(Opcode::Return, keyword.line);
        }
        Ok(())
    }

    fn expression_statement(&mut self) -> CompileResult<()> {
        self.expression()?;
        let token = self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        self.chunk().add_opcode(Opcode::Pop, token.line);
        Ok(())
    }

    // Emission

    fn chunk(&mut self) -> &mut Chunk {
        &mut self.ctx.function.chunk
    }

    fn emit(&mut self, opcode: Opcode) {
        let line = self.previous.line;
        self.chunk().add_opcode(opcode, line);
    }

    fn emit_return(&mut self) {
        if self.ctx.function.kind == FunctionKind::Initializer {
            self.emit_with_operand(Opcode::GetLocal, 0);
        } else {
            self.emit(Opcode::Nil);
        }
        self.emit(Opcode::Return);
    }

    fn emit_with_operand(&mut self, opcode: Opcode, operand: u8) {
        let line = self.previous.line;
        self.chunk().add_opcode_and_operand(opcode, operand, line);
    }

    fn emit_jump(&mut self, opcode: Opcode, line: usize) -> usize {
        self.chunk().add_dummy_jump(opcode, line)
    }

    fn patch_jump(&mut self, jump_offset: usize) -> CompileResult<()> {
        self.chunk().patch_jump(jump_offset).map_err(|e| {
            let previous = self.previous.clone();
            self.error_at(&previous, ErrorKind::Jump(e))
        })
    }

    fn emit_loop(&mut self, loop_start: usize, line: usize) -> CompileResult<()> {
        self.chunk().emit_loop(loop_start, line).map_err(|e| {
            let previous = self.previous.clone();
            self.error_at(&previous, ErrorKind::Jump(e))
        })
    }

    // Expressions

    fn expression(&mut self) -> CompileResult<()> {
        self.expression_bp(BindingPower::Assignment)
    }

    fn expression_bp(&mut self, min_bp: BindingPower) -> CompileResult<()> {
        let token = self.advance();
        let Some((prefix_rule, _)) = get_parser(token.kind, OperatorType::Prefix) else {
            return Err(self.error_at(&token, ErrorKind::ExpectedExpression));
        };
        let can_assign = min_bp <= BindingPower::Assignment;
        prefix_rule(self, &token, can_assign)?;

        loop {
            let next = self.peek();
            let Some((infix_rule, infix_bp)) = get_parser(next.kind, OperatorType::Infix) else {
                break;
            };
            if infix_bp < min_bp {
                break;
            }
            let token = self.advance();
            infix_rule(self, &token, can_assign)?;
        }

        if can_assign && self.check(TokenKind::Equal) {
            let token = self.peek();
            return Err(self.error_at(&token, ErrorKind::InvalidAssignmentTarget));
        }
        Ok(())
    }

    fn parse_unary(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression_bp(BindingPower::Unary)?;
        match token.kind {
            TokenKind::Minus => self.chunk().add_opcode(Opcode::Negate, token.line),
            TokenKind::Bang => self.chunk().add_opcode(Opcode::Not, token.line),
            _ => unreachable!("Unexpected unary token, got {token:?}"),
        }
        Ok(())
    }

    fn parse_number(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let value = if token.lexeme.contains('.') {
            token.lexeme.parse().ok().map(Value::Number)
        } else {
            token.lexeme.parse().ok().map(Value::Int)
        };
        let value = value.ok_or_else(|| self.error_at(token, ErrorKind::InvalidNumber))?;
        let constant = self.make_constant(value)?;
        self.chunk()
            .add_opcode_and_operand(Opcode::Constant, constant, token.line);
        Ok(())
    }

    fn parse_string(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let contents = &token.lexeme[1..token.lexeme.len() - 1];
        let constant = self.make_constant(Value::string(contents))?;
        self.chunk()
            .add_opcode_and_operand(Opcode::Constant, constant, token.line);
        Ok(())
    }

    fn parse_literal(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let opcode = match token.kind {
            TokenKind::True => Opcode::True,
            TokenKind::False => Opcode::False,
            TokenKind::Nil => Opcode::Nil,
            _ => unreachable!("Unexpected literal token, got {token:?}"),
        };
        self.chunk().add_opcode(opcode, token.line);
        Ok(())
    }

    fn parse_grouping(&mut self, _token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
        Ok(())
    }

    fn parse_array(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let mut count = 0;
        if !self.check(TokenKind::RightBracket) {
            loop {
                self.expression()?;
                if count == MAX_ARGUMENTS {
                    let previous = self.previous.clone();
                    return Err(self.error_at(&previous, ErrorKind::TooManyElements));
                }
                count += 1;
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after array elements.")?;
        self.chunk()
            .add_opcode_and_operand(Opcode::ArrayLiteral, count as u8, token.line);
        Ok(())
    }

    fn parse_term(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression_bp(BindingPower::Term.next())?;
        match token.kind {
            TokenKind::Plus => self.chunk().add_opcode(Opcode::Add, token.line),
            TokenKind::Minus => self.chunk().add_opcode(Opcode::Subtract, token.line),
            _ => unreachable!("Unexpected term token, got {token:?}"),
        }
        Ok(())
    }

    fn parse_factor(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression_bp(BindingPower::Factor.next())?;
        match token.kind {
            TokenKind::Asterisk => self.chunk().add_opcode(Opcode::Multiply, token.line),
            TokenKind::Slash => self.chunk().add_opcode(Opcode::Divide, token.line),
            _ => unreachable!("Unexpected factor token, got {token:?}"),
        }
        Ok(())
    }

    fn parse_equality(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression_bp(BindingPower::Equality.next())?;
        match token.kind {
            TokenKind::EqualEqual => self.chunk().add_opcode(Opcode::Equal, token.line),
            TokenKind::BangEqual => self.chunk().add_opcode(Opcode::NotEqual, token.line),
            _ => unreachable!("Unexpected equality token, got {token:?}"),
        }
        Ok(())
    }

    fn parse_comparison(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression_bp(BindingPower::Comparison.next())?;
        let line = token.line;
        match token.kind {
            TokenKind::Greater => self.chunk().add_opcode(Opcode::Greater, line),
            TokenKind::GreaterEqual => {
                self.chunk().add_opcode(Opcode::Less, line);
                self.chunk().add_opcode(Opcode::Not, line);
            }
            TokenKind::Less => self.chunk().add_opcode(Opcode::Less, line),
            TokenKind::LessEqual => {
                self.chunk().add_opcode(Opcode::Greater, line);
                self.chunk().add_opcode(Opcode::Not, line);
            }
            _ => unreachable!("Unexpected comparison token, got {token:?}"),
        }
        Ok(())
    }

    fn parse_and(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let end_jump = self.emit_jump(Opcode::JumpIfFalse, token.line);
        self.chunk().add_opcode(Opcode::Pop, token.line);
        self.expression_bp(BindingPower::And)?;
        self.patch_jump(end_jump)
    }

    fn parse_or(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let else_jump = self.emit_jump(Opcode::JumpIfFalse, token.line);
        let end_jump = self.emit_jump(Opcode::Jump, token.line);
        self.patch_jump(else_jump)?;
        self.chunk().add_opcode(Opcode::Pop, token.line);
        self.expression_bp(BindingPower::Or)?;
        self.patch_jump(end_jump)
    }

    fn parse_call(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        let arg_count = self.argument_list()?;
        self.chunk()
            .add_opcode_and_operand(Opcode::Call, arg_count, token.line);
        Ok(())
    }

    fn parse_subscript(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        self.expression()?;
        self.consume(TokenKind::RightBracket, "Expect ']' after subscript.")?;
        self.chunk()
            .add_opcode_and_operand(Opcode::Call, 1, token.line);
        Ok(())
    }

    fn parse_dot(&mut self, _token: &Token<'a>, can_assign: bool) -> CompileResult<()> {
        let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
        let constant = self.identifier_constant(&name)?;
        if can_assign && self.matches(TokenKind::Equal) {
            self.expression()?;
            self.chunk()
                .add_opcode_and_operand(Opcode::SetProperty, constant, name.line);
        } else if self.matches(TokenKind::LeftParen) {
            let arg_count = self.argument_list()?;
            self.chunk()
                .add_opcode_and_operand(Opcode::Invoke, constant, name.line);
            self.chunk().add_byte(arg_count, name.line);
        } else {
            self.chunk()
                .add_opcode_and_operand(Opcode::GetProperty, constant, name.line);
        }
        Ok(())
    }

    fn argument_list(&mut self) -> CompileResult<u8> {
        let mut count = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression()?;
                if count == MAX_ARGUMENTS {
                    let previous = self.previous.clone();
                    return Err(self.error_at(&previous, ErrorKind::TooManyArguments));
                }
                count += 1;
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(count as u8)
    }

    fn parse_identifier(&mut self, token: &Token<'a>, can_assign: bool) -> CompileResult<()> {
        self.named_variable(token, can_assign)
    }

    fn parse_self(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        if self.classes.is_empty() {
            return Err(self.error_at(token, ErrorKind::SelfOutsideClass));
        }
        self.named_variable(token, false)
    }

    fn parse_super(&mut self, token: &Token<'a>, _can_assign: bool) -> CompileResult<()> {
        match self.classes.last() {
            None => return Err(self.error_at(token, ErrorKind::SuperOutsideClass)),
            Some(class) if !class.has_superclass => {
                return Err(self.error_at(token, ErrorKind::SuperWithoutSuperclass))
            }
            Some(_) => {}
        }
        self.consume(TokenKind::Dot, "Expect '.' after 'super'.")?;
        let name = self.consume(TokenKind::Identifier, "Expect superclass method name.")?;
        let constant = self.identifier_constant(&name)?;

        let receiver = Token::new(TokenKind::SelfKw, "self", token.start, token.line);
        self.named_variable(&receiver, false)?;
        let superclass = Token::new(TokenKind::Super, "super", token.start, token.line);
        if self.matches(TokenKind::LeftParen) {
            let arg_count = self.argument_list()?;
            self.named_variable(&superclass, false)?;
            self.chunk()
                .add_opcode_and_operand(Opcode::InvokeSuper, constant, name.line);
            self.chunk().add_byte(arg_count, name.line);
        } else {
            self.named_variable(&superclass, false)?;
            self.chunk()
                .add_opcode_and_operand(Opcode::GetSuper, constant, name.line);
        }
        Ok(())
    }

    fn named_variable(&mut self, token: &Token<'a>, can_assign: bool) -> CompileResult<()> {
        let name = token.lexeme;
        let resolved = match self.ctx.resolve_local(name, false) {
            Ok(Some(idx)) => Some((Opcode::GetLocal, Opcode::SetLocal, idx)),
            Ok(None) => self
                .ctx
                .resolve_upvalue(name)
                .map_err(|kind| self.error_at(token, kind))?
                .map(|idx| (Opcode::GetUpvalue, Opcode::SetUpvalue, idx)),
            Err(kind) => return Err(self.error_at(token, kind)),
        };
        let (get_op, set_op, idx) = match resolved {
            Some(resolved) => resolved,
            None => {
                let idx = self.identifier_constant(token)?;
                (Opcode::GetGlobal, Opcode::SetGlobal, idx)
            }
        };

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression()?;
            self.chunk().add_opcode_and_operand(set_op, idx, token.line);
        } else {
            self.chunk().add_opcode_and_operand(get_op, idx, token.line);
        }
        Ok(())
    }

    // Errors

    fn error_at(&self, token: &Token<'a>, kind: ErrorKind) -> CompileError {
        let location = match token.kind {
            TokenKind::Eof => " at end".to_string(),
            _ => format!(" at '{}'", token.lexeme),
        };
        CompileError {
            line: token.line,
            location,
            kind,
            excerpt: self.excerpt(token.line),
        }
    }

    fn scan_error(&self, e: ScanError) -> CompileError {
        let line = e.line();
        CompileError {
            line,
            location: String::new(),
            kind: e.into(),
            excerpt: self.excerpt(line),
        }
    }

    fn excerpt(&self, line: usize) -> String {
        self.source
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

fn get_parser<'a>(
    kind: TokenKind,
    operator_type: OperatorType,
) -> Option<(Parser<'a>, BindingPower)> {
    use TokenKind::*;
    match (kind, operator_type) {
        (Minus | Bang, OperatorType::Prefix) => Some((Compiler::parse_unary, BindingPower::Unary)),
        (Number, OperatorType::Prefix) => Some((Compiler::parse_number, BindingPower::None)),
        (String, OperatorType::Prefix) => Some((Compiler::parse_string, BindingPower::None)),
        (True | False | Nil, OperatorType::Prefix) => {
            Some((Compiler::parse_literal, BindingPower::None))
        }
        (Identifier, OperatorType::Prefix) => {
            Some((Compiler::parse_identifier, BindingPower::None))
        }
        (SelfKw, OperatorType::Prefix) => Some((Compiler::parse_self, BindingPower::None)),
        (Super, OperatorType::Prefix) => Some((Compiler::parse_super, BindingPower::None)),
        (LeftParen, OperatorType::Prefix) => Some((Compiler::parse_grouping, BindingPower::None)),
        (LeftBracket, OperatorType::Prefix) => Some((Compiler::parse_array, BindingPower::None)),
        (Plus | Minus, OperatorType::Infix) => Some((Compiler::parse_term, BindingPower::Term)),
        (Asterisk | Slash, OperatorType::Infix) => {
            Some((Compiler::parse_factor, BindingPower::Factor))
        }
        (EqualEqual | BangEqual, OperatorType::Infix) => {
            Some((Compiler::parse_equality, BindingPower::Equality))
        }
        (Greater | GreaterEqual | Less | LessEqual, OperatorType::Infix) => {
            Some((Compiler::parse_comparison, BindingPower::Comparison))
        }
        (AndAnd, OperatorType::Infix) => Some((Compiler::parse_and, BindingPower::And)),
        (OrOr, OperatorType::Infix) => Some((Compiler::parse_or, BindingPower::Or)),
        (LeftParen, OperatorType::Infix) => Some((Compiler::parse_call, BindingPower::Call)),
        (LeftBracket, OperatorType::Infix) => {
            Some((Compiler::parse_subscript, BindingPower::Call))
        }
        (Dot, OperatorType::Infix) => Some((Compiler::parse_dot, BindingPower::Call)),
        _ => None,
    }
}

#[derive(Debug, Copy, Clone)]
enum OperatorType {
    Prefix,
    Infix,
}

type Parser<'a> = fn(&mut Compiler<'a>, &Token<'a>, bool) -> CompileResult<()>;

#[derive(Error, Debug, Clone, Default)]
pub struct CompileErrors {
    errors: Vec<CompileError>,
}

impl Display for CompileErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} compilation error{}",
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" }
        )?;
        for e in self.errors.iter() {
            writeln!(f, "{e}")?;
            if !e.excerpt.is_empty() {
                writeln!(f, "{:>6} | {}", e.line, e.excerpt)?;
            }
        }
        Ok(())
    }
}

impl CompileErrors {
    fn push(&mut self, e: CompileError) {
        self.errors.push(e)
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Error, Debug, Clone)]
#[error("[line {line}] Error{location}: {kind}")]
pub struct CompileError {
    pub line: usize,
    location: String,
    pub kind: ErrorKind,
    excerpt: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Expect expression.")]
    ExpectedExpression,
    #[error("{0}")]
    Expected(&'static str),
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Invalid number literal.")]
    InvalidNumber,
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    #[error("Too many local variables in function.")]
    TooManyLocals,
    #[error("Too many closure variables in function.")]
    TooManyUpvalues,
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    #[error("Can't have more than 255 array elements.")]
    TooManyElements,
    #[error("Can't read local variable in its own initializer.")]
    LocalInOwnInitializer,
    #[error("Already a variable with this name in this scope.")]
    DuplicateLocal,
    #[error("Can't return from top-level code.")]
    ReturnFromScript,
    #[error("Can't return from an initializer.")]
    ReturnFromInitializer,
    #[error("Can't use 'self' outside of a class.")]
    SelfOutsideClass,
    #[error("Can't use 'super' outside of a class.")]
    SuperOutsideClass,
    #[error("Can't use 'super' in a class with no superclass.")]
    SuperWithoutSuperclass,
    #[error("A class can't inherit from itself.")]
    InheritFromSelf,
    #[error("{0}")]
    Jump(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcodes(function: &Function) -> Vec<Opcode> {
        function
            .chunk
            .instructions()
            .into_iter()
            .map(|(_, opcode)| opcode)
            .collect()
    }

    fn error_kinds(source: &str) -> Vec<ErrorKind> {
        compile(source)
            .unwrap_err()
            .errors()
            .iter()
            .map(|e| e.kind.clone())
            .collect()
    }

    fn nested_function(function: &Function) -> Rc<Function> {
        function
            .chunk
            .constants()
            .iter()
            .find_map(|c| c.as_function().cloned())
            .unwrap()
    }

    #[test]
    fn scope_exit_pops_every_local() {
        let function = compile("{ var a = 1; var b = 2; { var c = 3; } }").unwrap();
        use Opcode::*;
        assert_eq!(
            opcodes(&function),
            [Constant, Constant, Constant, Pop, Pop, Pop, Nil, Return]
        );
    }

    #[test]
    fn captured_locals_are_closed() {
        let function = compile("{ var a = 1; func f() { return a; } }").unwrap();
        use Opcode::*;
        assert_eq!(
            opcodes(&function),
            [Constant, Closure, Pop, CloseUpvalue, Nil, Return]
        );
        let closure_offset = function.chunk.instructions()[1].0;
        // is_local, slot of `a` (slot 0 is reserved)
        assert_eq!(&function.chunk[closure_offset + 2..closure_offset + 4], [1, 1]);

        let f = nested_function(&function);
        assert_eq!(f.upvalue_count, 1);
        assert_eq!(opcodes(&f), [GetUpvalue, Return, Nil, Return]);
    }

    #[test]
    fn upvalues_chain_through_enclosing_closure() {
        let source = "func outer() { var x = 1; func middle() { func inner() { return x; } } }";
        let function = compile(source).unwrap();
        let outer = nested_function(&function);
        let middle = nested_function(&outer);
        let inner = nested_function(&middle);
        assert_eq!(middle.upvalue_count, 1);
        assert_eq!(inner.upvalue_count, 1);
        let closure_offset = middle
            .chunk
            .instructions()
            .into_iter()
            .find(|(_, op)| *op == Opcode::Closure)
            .unwrap()
            .0;
        // inner captures middle's upvalue 0, not a local
        assert_eq!(&middle.chunk[closure_offset + 2..closure_offset + 4], [0, 0]);
    }

    #[test]
    fn duplicate_local_in_same_scope() {
        assert_eq!(
            error_kinds("{ var a = 1; var a = 2; }"),
            [ErrorKind::DuplicateLocal]
        );
    }

    #[test]
    fn local_capacity() {
        fn block(count: usize) -> String {
            let vars: String = (0..count).map(|i| format!("var v{i} = 0;\n")).collect();
            format!("{{\n{vars}}}")
        }
        // Slot 0 is reserved, leaving 255 for declarations
        assert!(compile(&block(255)).is_ok());
        let errors = compile(&block(256)).unwrap_err();
        assert_eq!(
            errors.errors().iter().map(|e| e.kind.clone()).collect::<Vec<_>>(),
            [ErrorKind::TooManyLocals]
        );
        assert_eq!(errors.errors()[0].line, 257);
    }

    #[test]
    fn shadowing_is_allowed() {
        assert!(compile("{ var a = 1; { var a = 2; } }").is_ok());
        assert!(compile("var a = 1; var a = 2;").is_ok());
    }

    #[test]
    fn local_in_own_initializer() {
        assert_eq!(
            error_kinds("{ var a = a; }"),
            [ErrorKind::LocalInOwnInitializer]
        );
        assert!(compile("var a = 1; { var b = a; }").is_ok());
    }

    #[test]
    fn return_misuse() {
        assert_eq!(error_kinds("return 1;"), [ErrorKind::ReturnFromScript]);
        assert_eq!(
            error_kinds("class A { init() { return; } }"),
            [ErrorKind::ReturnFromInitializer]
        );
        assert!(compile("func f() { return; }").is_ok());
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(
            error_kinds("var a; var b; var c; a + b = c;"),
            [ErrorKind::InvalidAssignmentTarget]
        );
    }

    #[test]
    fn errors_accumulate() {
        let kinds = error_kinds("print ;\nvar = 1;\nprint 1");
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[0], ErrorKind::ExpectedExpression);
    }

    #[test]
    fn scan_errors_are_skipped() {
        let errors = compile("var a = 1;\n# print a;").unwrap_err();
        assert_eq!(errors.errors().len(), 1);
        assert!(matches!(errors.errors()[0].kind, ErrorKind::Scan(_)));
        assert_eq!(errors.errors()[0].line, 2);
    }

    #[test]
    fn error_report_has_excerpt() {
        let errors = compile("var x = 1;\n{ var y = 1; var y = 2; }").unwrap_err();
        let report = errors.to_string();
        assert!(report.contains("[line 2] Error at 'y': Already a variable"));
        assert!(report.contains("{ var y = 1; var y = 2; }"));
    }

    #[test]
    fn if_jumps_land_after_branches() {
        let function = compile("if true { print 1; } print 2;").unwrap();
        let chunk = &function.chunk;
        let instructions = chunk.instructions();
        use Opcode::*;
        let ops: Vec<_> = instructions.iter().map(|(_, op)| *op).collect();
        assert_eq!(
            ops,
            [True, JumpIfFalse, Pop, Constant, Print, Jump, Pop, Constant, Print, Nil, Return]
        );
        let then_jump = instructions[1].0;
        let else_jump = instructions[5].0;
        let then_target = then_jump + 3 + chunk.read_short(then_jump + 1).unwrap() as usize;
        let else_target = else_jump + 3 + chunk.read_short(else_jump + 1).unwrap() as usize;
        // the false branch starts by popping the condition
        assert_eq!(then_target, instructions[6].0);
        assert_eq!(else_target, instructions[7].0);
    }

    #[test]
    fn while_loops_back_to_condition() {
        let function = compile("while false { }").unwrap();
        let chunk = &function.chunk;
        let instructions = chunk.instructions();
        use Opcode::*;
        let ops: Vec<_> = instructions.iter().map(|(_, op)| *op).collect();
        assert_eq!(ops, [False, JumpIfFalse, Pop, Loop, Pop, Nil, Return]);
        let loop_offset = instructions[3].0;
        let back = chunk.read_short(loop_offset + 1).unwrap() as usize;
        assert_eq!(loop_offset + 3 - back, 0);
        let exit_jump = instructions[1].0;
        let exit = exit_jump + 3 + chunk.read_short(exit_jump + 1).unwrap() as usize;
        assert_eq!(exit, instructions[4].0);
    }

    #[test]
    fn decoding_consumes_every_byte() {
        let source = r#"
class Point {
    init(x, y) { self.x = x; self.y = y; }
    var sum { return self.x + self.y; }
    scale(by) { return Point(self.x * by, self.y * by); }
}
func adder(n) { func add(m) { return n + m; } return add; }
var p = Point(1, 2).scale(3);
var items = [p.sum, adder(1)(2)];
while p.x > 0 && !false { p.x = p.x - 1; }
"#;
        let function = compile(source).unwrap();
        let mut pending = vec![Rc::new(function)];
        while let Some(function) = pending.pop() {
            let chunk = &function.chunk;
            let total: usize = chunk
                .instructions()
                .iter()
                .map(|(offset, _)| chunk.instruction_len(*offset).unwrap())
                .sum();
            assert_eq!(total, chunk.len(), "in {}", chunk.name());
            pending.extend(chunk.constants().iter().filter_map(|c| c.as_function().cloned()));
        }
    }

    #[test]
    fn method_calls_use_invoke() {
        use Opcode::*;
        let function = compile("var a; a.b(1); a.c;").unwrap();
        let ops = opcodes(&function);
        assert!(ops.contains(&Invoke));
        assert!(ops.contains(&GetProperty));
        assert!(!ops.contains(&Call));
    }

    #[test]
    fn self_and_super_need_a_class() {
        assert_eq!(error_kinds("print self;"), [ErrorKind::SelfOutsideClass]);
        assert_eq!(
            error_kinds("class A { f() { return super.f(); } }"),
            [ErrorKind::SuperWithoutSuperclass]
        );
        assert_eq!(
            error_kinds("func f() { return super.f(); }"),
            [ErrorKind::SuperOutsideClass]
        );
        assert_eq!(error_kinds("class A : A {}"), [ErrorKind::InheritFromSelf]);
    }

    #[test]
    fn initializer_returns_receiver() {
        let function = compile("class A { init() { } }").unwrap();
        let init = nested_function(&function);
        assert_eq!(init.kind, FunctionKind::Initializer);
        assert_eq!(opcodes(&init), [Opcode::GetLocal, Opcode::Return]);
    }
}
