//! Single-pass bytecode compiler.
//!
//! A Pratt parser that emits instructions while it parses; there is no AST.
//! Each function being compiled gets its own [`FnCompiler`] carrying the
//! chunk under construction, the local-slot array, and loop bookkeeping;
//! nested `def`s swap a fresh context in and restore the enclosing one when
//! the body ends.
//!
//! Error handling is panic-mode: the first error in a statement is
//! recorded, everything after it is suppressed until `synchronize` reaches
//! a statement boundary, and compilation keeps going so one run surfaces
//! as many distinct errors as possible. The compiled script is only
//! returned when no error was recorded.

use std::mem;

use pythowon_core::chunk::{Chunk, MAX_CONSTANTS, OpCode};
use pythowon_core::object::{Function, Heap, ObjRef};
use pythowon_core::table::Table;
use pythowon_core::value::Value;

use crate::error::{CompileError, CompileErrors, ErrorLocation};
use crate::scanner::{Scanner, Token, TokenKind, unescape};

const MAX_LOCALS: usize = 256;

/// Binding power, weakest first. `a <op> b <op2> c` groups left when the
/// second operator's precedence is not higher than the first's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Shift,      // << >>
    Term,       // + -
    Factor,     // * / %
    Unary,      // ! -
    Call,       // ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Shift,
            Precedence::Shift => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'src, 'heap> = fn(&mut Compiler<'src, 'heap>, bool);

struct ParseRule<'src, 'heap> {
    prefix: Option<ParseFn<'src, 'heap>>,
    infix: Option<ParseFn<'src, 'heap>>,
    precedence: Precedence,
}

fn rule<'src, 'heap>(kind: TokenKind) -> ParseRule<'src, 'heap> {
    let (prefix, infix, precedence): (
        Option<ParseFn<'src, 'heap>>,
        Option<ParseFn<'src, 'heap>>,
        Precedence,
    ) = match kind {
        TokenKind::LParen => (
            Some(Compiler::grouping),
            Some(Compiler::call),
            Precedence::Call,
        ),
        TokenKind::Minus => (
            Some(Compiler::unary),
            Some(Compiler::binary),
            Precedence::Term,
        ),
        TokenKind::Plus => (None, Some(Compiler::binary), Precedence::Term),
        TokenKind::Slash | TokenKind::Star | TokenKind::Percent => {
            (None, Some(Compiler::binary), Precedence::Factor)
        }
        TokenKind::Shl | TokenKind::Shr => (None, Some(Compiler::binary), Precedence::Shift),
        TokenKind::Bang => (Some(Compiler::unary), None, Precedence::None),
        TokenKind::BangEq | TokenKind::EqEq => {
            (None, Some(Compiler::binary), Precedence::Equality)
        }
        TokenKind::Greater | TokenKind::GreaterEq | TokenKind::Less | TokenKind::LessEq => {
            (None, Some(Compiler::binary), Precedence::Comparison)
        }
        TokenKind::Identifier => (Some(Compiler::variable), None, Precedence::None),
        TokenKind::Str => (Some(Compiler::string), None, Precedence::None),
        TokenKind::Number => (Some(Compiler::number), None, Precedence::None),
        TokenKind::And => (None, Some(Compiler::and_op), Precedence::And),
        TokenKind::Or => (None, Some(Compiler::or_op), Precedence::Or),
        TokenKind::False | TokenKind::True | TokenKind::None => {
            (Some(Compiler::literal), None, Precedence::None)
        }
        _ => (None, None, Precedence::None),
    };
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

struct Local<'src> {
    name: &'src str,
    /// Scope depth, or -1 while declared but not yet initialized.
    depth: i32,
}

/// Per-function compilation context.
struct FnCompiler<'src> {
    kind: FunctionKind,
    chunk: Chunk,
    name: Option<ObjRef>,
    arity: u8,
    def_arity: u8,
    default_start: usize,
    locals: Vec<Local<'src>>,
    scope_depth: i32,
    /// Identifier-name constants already in this chunk's pool.
    string_constants: Table,
    /// Code offset the innermost enclosing loop restarts at; -1 outside
    /// any loop.
    inner_loop_start: i32,
    inner_loop_scope_depth: i32,
}

impl<'src> FnCompiler<'src> {
    fn new(kind: FunctionKind, name: Option<ObjRef>) -> Self {
        FnCompiler {
            kind,
            chunk: Chunk::new(),
            name,
            arity: 0,
            def_arity: 0,
            default_start: 0,
            // Slot 0 holds the callee; an empty name keeps it unresolvable.
            locals: vec![Local { name: "", depth: 0 }],
            scope_depth: 0,
            string_constants: Table::new(),
            inner_loop_start: -1,
            inner_loop_scope_depth: 0,
        }
    }

    fn into_function(self) -> Function {
        Function {
            arity: self.arity,
            def_arity: self.def_arity,
            default_start: self.default_start,
            chunk: self.chunk,
            name: self.name,
        }
    }
}

struct Compiler<'src, 'heap> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<CompileError>,
    heap: &'heap mut Heap,
    ctx: FnCompiler<'src>,
}

/// Compile a source string into a top-level script function.
///
/// On success the returned function lives in `heap` with `name == None`,
/// arity 0, and a chunk that ends in an implicit `none` return. On failure
/// every collected error is returned and nothing of the partial compile is
/// exposed.
pub fn compile(source: &str, heap: &mut Heap) -> Result<ObjRef, CompileErrors> {
    let placeholder = Token {
        kind: TokenKind::Eof,
        text: "",
        line: 0,
    };
    let mut compiler = Compiler {
        scanner: Scanner::new(source),
        current: placeholder,
        previous: placeholder,
        had_error: false,
        panic_mode: false,
        errors: Vec::new(),
        heap,
        ctx: FnCompiler::new(FunctionKind::Script, None),
    };

    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.emit_return();

    let Compiler {
        had_error,
        errors,
        ctx,
        heap,
        ..
    } = compiler;
    if had_error {
        return Err(CompileErrors(errors));
    }
    tracing::debug!(
        bytes = ctx.chunk.code.len(),
        constants = ctx.chunk.constants.len(),
        "compiled script"
    );
    Ok(heap.alloc_function(ctx.into_function()))
}

impl<'src, 'heap> Compiler<'src, 'heap> {
    // ----- token plumbing -------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.next_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let token = self.current;
            self.report(token, token.text);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ----- error reporting ------------------------------------------------

    fn report(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let location = match token.kind {
            TokenKind::Eof => ErrorLocation::AtEnd,
            TokenKind::Error => ErrorLocation::Bare,
            _ => ErrorLocation::Lexeme(token.text.to_string()),
        };
        self.errors.push(CompileError {
            line: token.line,
            location,
            message: message.to_string(),
        });
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.report(token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.report(token, message);
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semi {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Def
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Switch
                | TokenKind::Continue
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ----- emission -------------------------------------------------------

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.ctx.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    fn emit_u16(&mut self, value: u16) {
        let line = self.previous.line;
        self.ctx.chunk.write_u16(value, line);
    }

    fn emit_return(&mut self) {
        self.emit_ops(OpCode::None, OpCode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u16 {
        let index = self.ctx.chunk.add_constant(value);
        if index >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u16
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.ctx.chunk.add_constant(value);
        if index >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return;
        }
        let line = self.previous.line;
        self.ctx.chunk.write_constant(index, line);
    }

    /// Pool index for an identifier name, deduplicated within this chunk.
    fn identifier_constant(&mut self, name: &str) -> u16 {
        let string = self.heap.copy_string(name);
        let key = Value::Obj(string);
        if let Some(Value::Int(index)) = self.ctx.string_constants.get(self.heap.objects(), key) {
            return index as u16;
        }
        let index = self.make_constant(key);
        self.ctx
            .string_constants
            .set(self.heap.objects(), key, Value::Int(u64::from(index)));
        index
    }

    /// Reserve a long-jump operand; returns the offset to patch later.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        for _ in 0..4 {
            self.emit_byte(0xff);
        }
        self.ctx.chunk.code.len() - 4
    }

    fn patch_jump(&mut self, offset: usize) {
        // Displacement from just past the operand to the current end.
        let jump = self.ctx.chunk.code.len() - offset - 4;
        if jump > u32::MAX as usize {
            self.error("Too much code to jump over.");
            return;
        }
        self.ctx.chunk.code[offset..offset + 4].copy_from_slice(&(jump as u32).to_be_bytes());
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::LoopLong);
        let offset = self.ctx.chunk.code.len() + 4 - loop_start;
        if offset > u32::MAX as usize {
            self.error("Loop body too large.");
        }
        let line = self.previous.line;
        self.ctx.chunk.write_u32(offset as u32, line);
    }

    // ----- scopes and locals ----------------------------------------------

    fn begin_scope(&mut self) {
        self.ctx.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.ctx.scope_depth -= 1;
        while self
            .ctx
            .locals
            .last()
            .is_some_and(|local| local.depth > self.ctx.scope_depth)
        {
            self.emit_op(OpCode::Pop);
            self.ctx.locals.pop();
        }
    }

    fn add_local(&mut self, name: &'src str) {
        if self.ctx.locals.len() == MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.ctx.locals.push(Local { name, depth: -1 });
    }

    fn declare_variable(&mut self) {
        if self.ctx.scope_depth == 0 {
            return;
        }
        let name = self.previous.text;
        let mut duplicate = false;
        for local in self.ctx.locals.iter().rev() {
            if local.depth != -1 && local.depth < self.ctx.scope_depth {
                break;
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    fn parse_variable(&mut self, message: &str) -> u16 {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.ctx.scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(self.previous.text)
    }

    fn mark_initialized(&mut self) {
        if self.ctx.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.ctx.locals.last_mut() {
            local.depth = self.ctx.scope_depth;
        }
    }

    fn define_variable(&mut self, global: u16) {
        if self.ctx.scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op(OpCode::DefGlobal);
        self.emit_u16(global);
    }

    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        let found = self.ctx.locals.iter().rposition(|local| local.name == name);
        let index = found?;
        if self.ctx.locals[index].depth == -1 {
            self.error("Cannot read a local variable from within its own initializer.");
        }
        Some(index as u8)
    }

    // ----- expressions ----------------------------------------------------

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = rule(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        if can_assign && self.match_token(TokenKind::Eq) {
            self.error("Invalid assignment target.");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        let lexeme = self.previous.text;
        let dots = lexeme.bytes().filter(|&b| b == b'.').count();
        match dots {
            0 => match lexeme.parse::<u64>() {
                Ok(value) => self.emit_constant(Value::Int(value)),
                Err(_) => self.error("Integer literal is too large."),
            },
            1 => match lexeme.parse::<f64>() {
                Ok(value) => self.emit_constant(Value::Number(value)),
                Err(_) => self.error("Invalid number literal."),
            },
            _ => self.error("Numbers may only have one decimal point."),
        }
    }

    fn string(&mut self, _can_assign: bool) {
        let text = unescape(self.previous.text);
        let string = self.heap.take_string(text);
        self.emit_constant(Value::Obj(string));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::None => self.emit_op(OpCode::None),
            _ => {}
        }
    }

    fn variable(&mut self, can_assign: bool) {
        self.named_variable(self.previous, can_assign);
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        if let Some(slot) = self.resolve_local(name.text) {
            if can_assign && self.match_token(TokenKind::Eq) {
                self.expression();
                self.emit_op(OpCode::SetLocal);
                self.emit_byte(slot);
            } else {
                self.emit_op(OpCode::GetLocal);
                self.emit_byte(slot);
            }
        } else {
            let arg = self.identifier_constant(name.text);
            if can_assign && self.match_token(TokenKind::Eq) {
                self.expression();
                self.emit_op(OpCode::SetGlobal);
                self.emit_u16(arg);
            } else {
                self.emit_op(OpCode::GetGlobal);
                self.emit_u16(arg);
            }
        }
    }

    fn unary(&mut self, _can_assign: bool) {
        let op = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match op {
            TokenKind::Bang => self.emit_op(OpCode::Not),
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            _ => {}
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let op = self.previous.kind;
        let precedence = rule::<'_, '_>(op).precedence;
        self.parse_precedence(precedence.next());

        match op {
            TokenKind::BangEq => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::EqEq => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEq => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEq => self.emit_ops(OpCode::Greater, OpCode::Not),
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::Percent => self.emit_op(OpCode::Modulo),
            TokenKind::Shl => self.emit_op(OpCode::LeftShift),
            TokenKind::Shr => self.emit_op(OpCode::RightShift),
            _ => {}
        }
    }

    fn and_op(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpFalseLong);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_op(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpFalseLong);
        let end_jump = self.emit_jump(OpCode::JumpLong);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let arg_count = self.argument_list();
        self.emit_op(OpCode::Call);
        self.emit_byte(arg_count);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u32 = 0;
        if !self.check(TokenKind::RParen) {
            loop {
                self.expression();
                if count == 255 {
                    self.error("Cannot have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expect ')' after arguments.");
        count.min(255) as u8
    }

    // ----- declarations ---------------------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Def) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Eq) {
            self.expression();
        } else {
            self.emit_op(OpCode::None);
        }
        self.consume(TokenKind::Semi, "Expected ';' after variable declaration.");
        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        let name = self.previous.text;
        self.mark_initialized();
        self.function(name);
        self.define_variable(global);
    }

    fn function(&mut self, name: &'src str) {
        let fname = self.heap.copy_string(name);
        let parent = mem::replace(
            &mut self.ctx,
            FnCompiler::new(FunctionKind::Function, Some(fname)),
        );

        self.begin_scope();
        self.consume(TokenKind::LParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RParen) {
            loop {
                if self.ctx.arity == 255 {
                    self.error_at_current("Cannot have more than 255 parameters.");
                } else {
                    self.ctx.arity += 1;
                }
                let constant = self.parse_variable("Expect parameter name.");
                if self.match_token(TokenKind::Eq) {
                    // The default value compiles into the prologue; a call
                    // that omits this argument enters at offset 0 and runs
                    // it, one that supplies it skips past default_start.
                    self.ctx.def_arity = self.ctx.def_arity.saturating_add(1);
                    self.expression();
                } else if self.ctx.def_arity > 0 {
                    self.error("Cannot have a non-default parameter after a default parameter.");
                }
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expect ')' after parameters.");
        self.ctx.default_start = self.ctx.chunk.code.len();
        self.consume(TokenKind::LBrace, "Expect '{' before function body.");
        self.block();
        self.emit_return();

        let finished = mem::replace(&mut self.ctx, parent);
        tracing::debug!(name, bytes = finished.chunk.code.len(), "compiled function");
        let function = self.heap.alloc_function(finished.into_function());
        self.emit_constant(Value::Obj(function));
    }

    // ----- statements -----------------------------------------------------

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::Switch) {
            self.switch_statement();
        } else if self.match_token(TokenKind::Continue) {
            self.continue_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::LBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RBrace, "Expected '}' at end of block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semi, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semi, "Expected ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpFalseLong);
        self.emit_op(OpCode::Pop);
        self.statement();
        let else_jump = self.emit_jump(OpCode::JumpLong);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);
        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.ctx.chunk.code.len();
        let enclosing_start = self.ctx.inner_loop_start;
        let enclosing_depth = self.ctx.inner_loop_scope_depth;
        self.ctx.inner_loop_start = loop_start as i32;
        self.ctx.inner_loop_scope_depth = self.ctx.scope_depth;

        self.consume(TokenKind::LParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpFalseLong);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);
        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);

        self.ctx.inner_loop_start = enclosing_start;
        self.ctx.inner_loop_scope_depth = enclosing_depth;
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Semi) {
            // No initializer.
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.ctx.chunk.code.len();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semi) {
            self.expression();
            self.consume(TokenKind::Semi, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpFalseLong));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenKind::RParen) {
            // Run the body first, then the increment, by jumping over the
            // increment code on the way in and looping back to it after.
            let body_jump = self.emit_jump(OpCode::JumpLong);
            let increment_start = self.ctx.chunk.code.len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RParen, "Expect ')' after for clauses.");
            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        let enclosing_start = self.ctx.inner_loop_start;
        let enclosing_depth = self.ctx.inner_loop_scope_depth;
        self.ctx.inner_loop_start = loop_start as i32;
        self.ctx.inner_loop_scope_depth = self.ctx.scope_depth;

        self.statement();
        self.emit_loop(loop_start);
        if let Some(exit) = exit_jump {
            self.patch_jump(exit);
            self.emit_op(OpCode::Pop);
        }

        self.ctx.inner_loop_start = enclosing_start;
        self.ctx.inner_loop_scope_depth = enclosing_depth;
        self.end_scope();
    }

    fn switch_statement(&mut self) {
        self.consume(TokenKind::LParen, "Expect '(' after 'switch'.");
        self.expression();
        self.consume(TokenKind::RParen, "Expect ')' after switch value.");
        self.consume(TokenKind::LBrace, "Expect '{' before switch cases.");

        let mut end_jumps = Vec::new();
        while self.match_token(TokenKind::Case) {
            self.emit_op(OpCode::Dup);
            self.expression();
            self.consume(TokenKind::Colon, "Expect ':' after case value.");
            self.emit_op(OpCode::Equal);
            let miss_jump = self.emit_jump(OpCode::JumpFalseLong);
            self.emit_op(OpCode::Pop);
            while !self.check(TokenKind::Case)
                && !self.check(TokenKind::Default)
                && !self.check(TokenKind::RBrace)
                && !self.check(TokenKind::Eof)
            {
                self.statement();
            }
            end_jumps.push(self.emit_jump(OpCode::JumpLong));
            self.patch_jump(miss_jump);
            self.emit_op(OpCode::Pop);
        }

        if self.match_token(TokenKind::Default) {
            self.consume(TokenKind::Colon, "Expect ':' after 'default'.");
            while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
                self.statement();
            }
        }

        self.consume(TokenKind::RBrace, "Expect '}' after switch cases.");
        for jump in end_jumps {
            self.patch_jump(jump);
        }
        // Discard the dispatch value.
        self.emit_op(OpCode::Pop);
    }

    fn continue_statement(&mut self) {
        if self.ctx.inner_loop_start < 0 {
            self.error("Cannot use 'continue' outside of a loop.");
        }
        self.consume(TokenKind::Semi, "Expect ';' after 'continue'.");

        // Locals opened inside the loop body are still live; drop them
        // before transferring control. The slots stay declared for the
        // code after this statement.
        let depth = self.ctx.inner_loop_scope_depth;
        let pops = self
            .ctx
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth > depth)
            .count();
        for _ in 0..pops {
            self.emit_op(OpCode::Pop);
        }

        if self.ctx.inner_loop_start >= 0 {
            let start = self.ctx.inner_loop_start as usize;
            self.emit_loop(start);
        }
    }

    fn return_statement(&mut self) {
        if self.ctx.kind == FunctionKind::Script && !self.check(TokenKind::Semi) {
            self.error("Cannot return a value from top-level code.");
        }
        if self.match_token(TokenKind::Semi) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semi, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }
}
