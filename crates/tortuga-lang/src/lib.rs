//! Tortuga: an embeddable interpreter for a small turtle-graphics scripting
//! language — variables, arrays, references, subroutines and functions,
//! control flow, a native-function library and asynchronous UI callbacks
//! (`draw`, `mouseClicked`, …) dispatched against a shared drawing surface.
//!
//! Compilation is a two-pass pipeline: the source is tokenized and compiled
//! into an executable statement tree, then an optimizer pass assigns declared
//! variables stack slots and rewrites by-name lookups into index lookups.
//! Unoptimized trees stay runnable; the rewrite is purely an acceleration.

pub mod analysis;
pub mod compile;
pub mod console;
pub mod error;
pub mod natives;
pub mod runtime;
pub mod surface;
pub mod syntax;
pub mod types;

pub use error::{Location, ParseError, RuntimeError, RuntimeErrorKind};
pub use runtime::engine::{Engine, EngineConfig, MouseEvent};
pub use runtime::interpreter::Interpreter;
pub use surface::{Highlighter, Host, RenderSurface, TextSink};
pub use types::variable::{Kind, Rgb, VarCell, Variable};

use analysis::Optimizer;
use compile::block::{Block, Executable};
use compile::command;
use runtime::invokeable::InvokeableRegistry;

/// A compiled program: the optimized top-level block plus the registry of
/// natives and user subroutines/functions. Produced by [`compile`], executed
/// by [`Interpreter`].
pub struct Program {
    pub(crate) block: Block,
    pub(crate) registry: InvokeableRegistry,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program").finish_non_exhaustive()
    }
}

/// Compiles source text into a runnable [`Program`].
///
/// Comments are stripped and continuation lines joined first; the block
/// compiler collects `sub`/`function` declarations into the registry while
/// building the top-level block; finally the optimizer resolves variable
/// slots for the top level and for every user routine body.
pub fn compile(source: &str) -> Result<Program, ParseError> {
    let cleaned = syntax::lexer::strip_comments(source);
    let lines = syntax::lexer::lines(&cleaned);

    let mut registry = InvokeableRegistry::with_natives();
    let mut block = {
        let mut subs = Some(&mut registry);
        // the top level keeps its variables alive for callbacks
        Block::compile(&lines, 0, &mut subs, false)?
    };

    {
        let mut oo = Optimizer::new(&registry);
        block.optimize(&mut oo);
    }
    registry.optimize_user_bodies();

    Ok(Program { block, registry })
}

/// Compiles without the slot-resolution pass: every variable reference stays
/// a by-name lookup. Semantically identical to [`compile`], just slower —
/// useful for exercising the fallback path.
pub fn compile_unoptimized(source: &str) -> Result<Program, ParseError> {
    let cleaned = syntax::lexer::strip_comments(source);
    let lines = syntax::lexer::lines(&cleaned);
    let mut registry = InvokeableRegistry::with_natives();
    let block = {
        let mut subs = Some(&mut registry);
        Block::compile(&lines, 0, &mut subs, false)?
    };
    Ok(Program { block, registry })
}

/// Compiles a single console line into one statement, resolved against an
/// existing registry (invocations bind to the live program's routines).
pub fn compile_line(line: &str, registry: &InvokeableRegistry) -> Result<Executable, ParseError> {
    let tokens = syntax::token::tokenize(line)?;
    let loc = Location::default();
    let cmd = command::compile(&tokens, loc)?;
    let mut statement = Executable::Command { cmd, loc };
    let mut oo = Optimizer::new(registry);
    statement.optimize(&mut oo);
    Ok(statement)
}
