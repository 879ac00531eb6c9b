//! The executable statement tree: blocks, control-flow statements and the
//! block-level compiler that matches `if`/`while`/`repeat`/`sub`/`function`
//! lines with their `end` terminators.

use crate::analysis::Optimizer;
use crate::compile::command::{self, Command};
use crate::error::{Location, ParseError, RuntimeError};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::invokeable::{Invokeable, InvokeableRegistry, UserRoutine};
use crate::runtime::value::Value;
use crate::surface::Host;
use crate::syntax::token;

/// What a statement hands back to its enclosing block. Anything other than
/// `Nothing`/`NewVariable` short-circuits the block and propagates until a
/// statement claims it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Nothing,
    NewVariable,
    Exit,
    ExitSub,
    ExitFunction,
    ExitWhile,
    ExitRepeat,
}

impl Signal {
    /// Message reported when an exit signal escapes to the top level.
    pub fn misplaced_message(self) -> Option<&'static str> {
        match self {
            Signal::ExitSub => Some("Exit Sub should be in a sub statement"),
            Signal::ExitFunction => Some("Exit Function should be in a function statement"),
            Signal::ExitWhile => Some("Exit While should be in a while statement"),
            Signal::ExitRepeat => Some("Exit Repeat should be in a repeat statement"),
            _ => None,
        }
    }
}

// ─── Statement tree ───────────────────────────────────────────────────────────

pub enum Executable {
    Block(Block),
    If(IfStatement),
    While(WhileStatement),
    Repeat(RepeatStatement),
    Command { cmd: Command, loc: Location },
}

pub struct Block {
    executables: Vec<Executable>,
    /// When set, variables declared directly in this block are popped when
    /// the block finishes — including on an early exit signal.
    remove_locals: bool,
}

pub struct IfStatement {
    condition: Value,
    body: Block,
    else_branch: Option<Box<Executable>>,
    loc: Location,
}

pub struct WhileStatement {
    condition: Value,
    body: Block,
    loc: Location,
}

pub struct RepeatStatement {
    count: Value,
    body: Block,
    loc: Location,
}

// ─── Execution ────────────────────────────────────────────────────────────────

impl Executable {
    pub fn execute(
        &self,
        host: &mut dyn Host,
        interp: &mut Interpreter,
    ) -> Result<Signal, RuntimeError> {
        match self {
            Executable::Block(b) => b.execute(host, interp),
            Executable::If(s) => s.execute(host, interp),
            Executable::While(s) => s.execute(host, interp),
            Executable::Repeat(s) => s.execute(host, interp),
            // the statement's own location annotates any error that escaped
            // without one
            Executable::Command { cmd, loc } => {
                cmd.execute(host, interp, *loc).map_err(|e| e.at(*loc))
            }
        }
    }

    pub fn optimize(&mut self, oo: &mut Optimizer) {
        match self {
            Executable::Block(b) => b.optimize(oo),
            Executable::If(s) => {
                s.condition.optimize(oo);
                s.body.optimize(oo);
                if let Some(e) = &mut s.else_branch {
                    e.optimize(oo);
                }
            }
            Executable::While(s) => {
                s.condition.optimize(oo);
                s.body.optimize(oo);
            }
            Executable::Repeat(s) => {
                s.count.optimize(oo);
                s.body.optimize(oo);
            }
            Executable::Command { cmd, .. } => cmd.optimize(oo),
        }
    }
}

impl Block {
    pub fn empty() -> Self {
        Self { executables: Vec::new(), remove_locals: true }
    }

    pub fn execute(
        &self,
        host: &mut dyn Host,
        interp: &mut Interpreter,
    ) -> Result<Signal, RuntimeError> {
        let mut created = 0usize;
        let mut out = Signal::Nothing;
        for ex in &self.executables {
            match ex.execute(host, interp)? {
                Signal::NewVariable => created += 1,
                Signal::Nothing => {}
                other => {
                    out = other;
                    break;
                }
            }
        }
        if self.remove_locals {
            for _ in 0..created {
                interp.pop_variable();
            }
        }
        Ok(out)
    }

    pub fn optimize(&mut self, oo: &mut Optimizer) {
        oo.push_state();
        for ex in &mut self.executables {
            ex.optimize(oo);
        }
        oo.pop_state();
    }
}

impl IfStatement {
    fn execute(&self, host: &mut dyn Host, interp: &mut Interpreter) -> Result<Signal, RuntimeError> {
        if self.condition.evaluate_bool(host, interp, self.loc)? {
            return filtered(self.body.execute(host, interp)?);
        }
        if let Some(branch) = &self.else_branch {
            return filtered(branch.execute(host, interp)?);
        }
        Ok(Signal::Nothing)
    }
}

fn filtered(sig: Signal) -> Result<Signal, RuntimeError> {
    match sig {
        Signal::Nothing | Signal::NewVariable => Ok(Signal::Nothing),
        other => Ok(other),
    }
}

impl WhileStatement {
    fn execute(&self, host: &mut dyn Host, interp: &mut Interpreter) -> Result<Signal, RuntimeError> {
        while self.condition.evaluate_bool(host, interp, self.loc)? {
            match self.body.execute(host, interp)? {
                Signal::ExitWhile => break,
                Signal::Nothing | Signal::NewVariable => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Nothing)
    }
}

impl RepeatStatement {
    fn execute(&self, host: &mut dyn Host, interp: &mut Interpreter) -> Result<Signal, RuntimeError> {
        // the count is read once per loop entry, not per iteration
        let count = self
            .count
            .evaluate(host, interp, self.loc)?
            .borrow()
            .as_i64()
            .map_err(|e| e.at(self.loc))?;
        for _ in 0..count.max(0) {
            match self.body.execute(host, interp)? {
                Signal::ExitRepeat => break,
                Signal::Nothing | Signal::NewVariable => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Nothing)
    }
}

// ─── Block compilation ────────────────────────────────────────────────────────

impl Block {
    /// Compiles a run of logical lines. `base` is the absolute line index of
    /// `lines[0]`. A stray `else` is an error here; `if` bodies use
    /// [`Block::compile_until_else`].
    pub fn compile(
        lines: &[String],
        base: usize,
        subs: &mut Option<&mut InvokeableRegistry>,
        remove_locals: bool,
    ) -> Result<Block, ParseError> {
        let (block, else_at) = compile_lines(lines, base, subs, remove_locals, false)?;
        debug_assert!(else_at.is_none(), "else rejected when not allowed");
        Ok(block)
    }

    /// Like [`Block::compile`], but stops at a top-level `else` line and
    /// returns its relative index for the enclosing `if` to consume.
    pub fn compile_until_else(
        lines: &[String],
        base: usize,
        subs: &mut Option<&mut InvokeableRegistry>,
    ) -> Result<(Block, Option<usize>), ParseError> {
        compile_lines(lines, base, subs, true, true)
    }
}

fn compile_lines(
    lines: &[String],
    base: usize,
    subs: &mut Option<&mut InvokeableRegistry>,
    remove_locals: bool,
    allow_else: bool,
) -> Result<(Block, Option<usize>), ParseError> {
    let mut executables = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].as_str();
        if line.is_empty() {
            i += 1;
            continue;
        }
        let tokens = token::tokenize(line).map_err(|e| e.with_line(base + i))?;
        if tokens.is_empty() {
            i += 1;
            continue;
        }

        if tokens.len() >= 2 && tokens[0].is_command("repeat") {
            let end = scan_block_end(lines, i, base, "repeat", "Repeat")?;
            executables.push(Executable::Repeat(RepeatStatement::compile(
                &lines[i..=end],
                base + i,
                subs,
            )?));
            i = end + 1;
        } else if tokens.len() >= 2 && tokens[0].is_command("if") {
            let end = scan_block_end(lines, i, base, "if", "If")?;
            executables.push(Executable::If(IfStatement::compile(
                &lines[i..=end],
                base + i,
                subs,
            )?));
            i = end + 1;
        } else if tokens.len() >= 2 && tokens[0].is_command("while") {
            let end = scan_block_end(lines, i, base, "while", "While")?;
            executables.push(Executable::While(WhileStatement::compile(
                &lines[i..=end],
                base + i,
                subs,
            )?));
            i = end + 1;
        } else if tokens.len() >= 2 && tokens[0].is_command("sub") {
            let end = scan_routine_end(lines, i, base, "sub", "Sub")?;
            let routine = parse_routine(&lines[i..=end], base + i, "sub")?;
            match subs.as_deref_mut() {
                Some(registry) => registry.add(Invokeable::Subroutine(routine)),
                None => {
                    return Err(ParseError::at(
                        format!("invalid definition of subroutine {}", routine_name(&lines[i])),
                        base + i,
                    ));
                }
            }
            i = end + 1;
        } else if tokens.len() >= 2 && tokens[0].is_command("function") {
            let end = scan_routine_end(lines, i, base, "function", "Function")?;
            let routine = parse_routine(&lines[i..=end], base + i, "function")?;
            match subs.as_deref_mut() {
                Some(registry) => registry.add(Invokeable::Function(routine)),
                None => {
                    return Err(ParseError::at(
                        format!("invalid definition of function {}", routine_name(&lines[i])),
                        base + i,
                    ));
                }
            }
            i = end + 1;
        } else if tokens[0].is_command("else") {
            if allow_else {
                return Ok((Block { executables, remove_locals }, Some(i)));
            }
            return Err(ParseError::at("Else without If", base + i));
        } else if tokens[0].is_command("end") {
            // block terminators are consumed by their statements; leftovers
            // (like the `end if` trailing an else branch) are skipped
            i += 1;
        } else {
            let loc = Location::new(base + i);
            let cmd = command::compile(&tokens, loc)?;
            executables.push(Executable::Command { cmd, loc });
            i += 1;
        }
    }
    Ok((Block { executables, remove_locals }, None))
}

/// Finds the `end <keyword>` matching the block opened at `start`, tracking
/// nesting depth within the keyword family.
fn scan_block_end(
    lines: &[String],
    start: usize,
    base: usize,
    keyword: &str,
    display: &str,
) -> Result<usize, ParseError> {
    let mut depth = 1usize;
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        if line.is_empty() {
            continue;
        }
        let tokens = token::tokenize(line).map_err(|e| e.with_line(base + j))?;
        if tokens.first().is_some_and(|t| t.is_command(keyword)) {
            depth += 1;
        } else if tokens.len() >= 2 && tokens[0].is_command("end") && tokens[1].is_command(keyword) {
            depth -= 1;
            if depth == 0 {
                return Ok(j);
            }
        }
    }
    Err(ParseError::at(
        format!("syntax error: \"{display}\" without matching \"End {display}\""),
        base + start,
    ))
}

/// Finds `end sub` / `end function`; routine declarations do not nest.
fn scan_routine_end(
    lines: &[String],
    start: usize,
    base: usize,
    keyword: &str,
    display: &str,
) -> Result<usize, ParseError> {
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        if line.is_empty() {
            continue;
        }
        let tokens = token::tokenize(line).map_err(|e| e.with_line(base + j))?;
        if tokens.len() >= 2 && tokens[0].is_command("end") && tokens[1].is_command(keyword) {
            return Ok(j);
        }
        if tokens.first().is_some_and(|t| t.is_command(keyword)) {
            return Err(ParseError::at(
                "syntax error: definition of subroutine inside of another subroutine",
                base + start,
            ));
        }
    }
    Err(ParseError::at(
        format!("syntax error: \"{display}\" without matching \"End {display}\""),
        base + start,
    ))
}

fn routine_name(first_line: &str) -> String {
    first_line.split_whitespace().nth(1).unwrap_or("?").to_ascii_lowercase()
}

/// Parses a `sub`/`function` declaration: `<keyword> name param param …` on
/// the first line, body until the matching end line.
fn parse_routine(lines: &[String], base: usize, keyword: &str) -> Result<UserRoutine, ParseError> {
    let words: Vec<&str> = lines[0].split_whitespace().collect();
    if words.len() < 2 || !words[0].eq_ignore_ascii_case(keyword) {
        return Err(ParseError::at(
            format!("check your use of the \"{keyword}\" statement"),
            base,
        ));
    }
    let name = words[1].to_ascii_lowercase();
    let params = words[2..].iter().map(|w| w.to_ascii_lowercase()).collect();
    // routine bodies may not declare further routines
    let body = Block::compile(&lines[1..], base + 1, &mut None, true)?;
    Ok(UserRoutine { name, params, body })
}

impl IfStatement {
    fn compile(
        lines: &[String],
        base: usize,
        subs: &mut Option<&mut InvokeableRegistry>,
    ) -> Result<IfStatement, ParseError> {
        let condition = header_condition(&lines[0], base, "if")?;
        let (body, else_at) = Block::compile_until_else(&lines[1..], base + 1, subs)?;
        let else_branch = match else_at {
            None => None,
            Some(rel) => {
                let abs = base + 1 + rel;
                let words: Vec<&str> = lines[1 + rel].split_whitespace().collect();
                let rest = &lines[1 + rel + 1..];
                if words.len() == 1 {
                    // a plain else; its block may not declare routines
                    Some(Box::new(Executable::Block(Block::compile(rest, abs + 1, &mut None, true)?)))
                } else if words.len() > 2 && words[1].eq_ignore_ascii_case("if") {
                    let mut chain = Vec::with_capacity(rest.len() + 1);
                    chain.push(words[1..].join(" "));
                    chain.extend(rest.iter().cloned());
                    Some(Box::new(Executable::If(IfStatement::compile(&chain, abs, &mut None)?)))
                } else {
                    return Err(ParseError::at("check your use of the else statement", abs));
                }
            }
        };
        Ok(IfStatement { condition, body, else_branch, loc: Location::new(base) })
    }
}

impl WhileStatement {
    fn compile(
        lines: &[String],
        base: usize,
        subs: &mut Option<&mut InvokeableRegistry>,
    ) -> Result<WhileStatement, ParseError> {
        let condition = header_condition(&lines[0], base, "while")?;
        let body = Block::compile(&lines[1..], base + 1, subs, true)?;
        Ok(WhileStatement { condition, body, loc: Location::new(base) })
    }
}

impl RepeatStatement {
    fn compile(
        lines: &[String],
        base: usize,
        subs: &mut Option<&mut InvokeableRegistry>,
    ) -> Result<RepeatStatement, ParseError> {
        let tokens = token::tokenize(&lines[0]).map_err(|e| e.with_line(base))?;
        if tokens.len() < 2 || !tokens[0].is_command("repeat") {
            return Err(ParseError::at("check your use of the repeat statement", base));
        }
        let count = Value::from_token(&tokens[1]).map_err(|e| e.with_line(base))?;
        let body = Block::compile(&lines[1..], base + 1, subs, true)?;
        Ok(RepeatStatement { count, body, loc: Location::new(base) })
    }
}

/// `if <term>` / `while <term>` headers: exactly one condition term.
fn header_condition(line: &str, base: usize, keyword: &str) -> Result<Value, ParseError> {
    let tokens = token::tokenize(line).map_err(|e| e.with_line(base))?;
    if tokens.len() != 2 || !tokens[0].is_command(keyword) {
        return Err(ParseError::at(
            format!("check your use of the {keyword} statement"),
            base,
        ));
    }
    Value::from_token(&tokens[1]).map_err(|e| e.with_line(base))
}
