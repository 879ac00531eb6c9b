//! The execution engine state: one global variable stack, a call stack of
//! invocation frames, the invokeable registry and the constant table. An
//! empty call stack means global scope; declarations land in the innermost
//! frame otherwise, with by-name lookups falling back to the globals.

use std::collections::HashMap;
use std::rc::Rc;

use crate::Program;
use crate::compile::block::{Executable, Signal};
use crate::error::{Location, RuntimeError};
use crate::natives::ConstantTable;
use crate::runtime::invokeable::{Invokeable, UserRoutine};
use crate::surface::{Host, TextSink};
use crate::types::variable::{Variable, VarCell, cell};

/// One variable stack with a name→index side table for by-name lookup.
/// Used both for the globals and for each invocation frame.
pub struct Frame {
    entries: Vec<(String, VarCell)>,
    index: HashMap<String, usize>,
}

impl Frame {
    fn new() -> Self {
        Self { entries: Vec::new(), index: HashMap::new() }
    }

    fn push(&mut self, name: &str, var: VarCell) {
        let name = name.to_ascii_lowercase();
        self.entries.push((name.clone(), var));
        self.index.insert(name, self.entries.len() - 1);
    }

    fn pop(&mut self) {
        if let Some((name, _)) = self.entries.pop() {
            // popping a shadowing declaration reveals the outer one again
            match self.entries.iter().rposition(|(n, _)| *n == name) {
                Some(outer) => {
                    self.index.insert(name, outer);
                }
                None => {
                    self.index.remove(&name);
                }
            }
        }
    }

    fn get(&self, name: &str) -> Option<VarCell> {
        self.index.get(name).map(|&i| self.entries[i].1.clone())
    }

    fn from_top(&self, distance: usize) -> Option<VarCell> {
        if distance == 0 {
            return None;
        }
        self.entries
            .len()
            .checked_sub(distance)
            .map(|i| self.entries[i].1.clone())
    }

    fn depth(&self) -> usize {
        self.entries.len()
    }
}

pub struct Interpreter {
    program: Rc<Program>,
    globals: Frame,
    frames: Vec<Frame>,
    constants: ConstantTable,
}

impl Interpreter {
    pub fn new(program: Program) -> Self {
        Self::from_shared(Rc::new(program))
    }

    pub(crate) fn from_shared(program: Rc<Program>) -> Self {
        Self {
            program,
            globals: Frame::new(),
            frames: Vec::new(),
            constants: ConstantTable::standard(),
        }
    }

    /// Executes the top-level block once. An exit signal that escapes to the
    /// top level with a statement to name is an error; a bare `exit` simply
    /// ends the run.
    pub fn run(&mut self, host: &mut dyn Host) -> Result<(), RuntimeError> {
        let program = self.program.clone();
        let sig = program.block.execute(host, self)?;
        if let Some(msg) = sig.misplaced_message() {
            return Err(RuntimeError::invalid_operation(msg));
        }
        Ok(())
    }

    /// Whether the program declares any timer/input callback and should stay
    /// resident after the top-level block finishes.
    pub fn has_callbacks(&self) -> bool {
        self.program.registry.has_callbacks()
    }

    /// Invokes the callback `name` with the given arguments if the program
    /// declares it; returns whether it was present.
    pub fn invoke_callback(
        &mut self,
        host: &mut dyn Host,
        name: &str,
        args: &[Variable],
    ) -> Result<bool, RuntimeError> {
        let Some(idx) = self.find_invokeable(name, args.len()) else {
            return Ok(false);
        };
        let cells: Vec<VarCell> = args.iter().map(|v| cell(v.clone())).collect();
        self.invoke(host, idx, &cells, Location::default())?;
        Ok(true)
    }

    /// Runs a single pre-compiled statement in the current scope. Used by the
    /// console command line.
    pub fn execute_statement(
        &mut self,
        host: &mut dyn Host,
        statement: &Executable,
    ) -> Result<Signal, RuntimeError> {
        statement.execute(host, self)
    }

    // ─── Invocation ──────────────────────────────────────────────────────────

    pub(crate) fn find_invokeable(&self, name: &str, arity: usize) -> Option<usize> {
        self.program.registry.find(name, arity)
    }

    /// The program's invokeable registry; console statements compile against
    /// it so invocations resolve to the live program.
    pub fn registry(&self) -> &crate::runtime::invokeable::InvokeableRegistry {
        &self.program.registry
    }

    /// Invokes by registry index. Returns the produced value for functions
    /// and natives, `None` for subroutines.
    pub(crate) fn invoke(
        &mut self,
        host: &mut dyn Host,
        idx: usize,
        args: &[VarCell],
        loc: Location,
    ) -> Result<Option<VarCell>, RuntimeError> {
        let program = self.program.clone();
        match program.registry.get(idx) {
            Invokeable::Native(native) => {
                let v = native.call(host, self, args, loc).map_err(|e| e.at(loc))?;
                Ok(Some(cell(v)))
            }
            Invokeable::Subroutine(routine) => {
                self.call_user(host, routine, args, loc, false)?;
                Ok(None)
            }
            Invokeable::Function(routine) => self.call_user(host, routine, args, loc, true),
        }
    }

    fn call_user(
        &mut self,
        host: &mut dyn Host,
        routine: &UserRoutine,
        args: &[VarCell],
        loc: Location,
        is_function: bool,
    ) -> Result<Option<VarCell>, RuntimeError> {
        if routine.params.len() != args.len() {
            return Err(RuntimeError::lookup(format!(
                "subroutine {} called with {} arguments; {} required",
                routine.name,
                args.len(),
                routine.params.len()
            ))
            .at(loc));
        }

        // arguments are evaluated in the caller's scope and bound as copies;
        // reference copies keep aliasing the caller's variable
        let mut frame = Frame::new();
        for (param, arg) in routine.params.iter().zip(args) {
            frame.push(param, cell(arg.borrow().deep_copy()));
        }
        if is_function {
            // the implicit return slot, after the arguments, before any local
            frame.push(&routine.name, cell(Variable::Ref(None)));
        }

        self.frames.push(frame);
        let result = routine.body.execute(host, self);
        let frame = self.frames.pop().expect("frame pushed above");
        let sig = result?;

        if !is_function && sig == Signal::ExitRepeat {
            host.print_err_line("Exit Repeat without repeat");
        }

        if !is_function {
            return Ok(None);
        }
        let out = match frame.get(&routine.name) {
            Some(slot) => {
                let bound = match &*slot.borrow() {
                    Variable::Ref(Some(w)) => Some(w.clone()),
                    _ => None,
                };
                // an unbound slot is returned as-is; using it then fails the
                // way any unbound reference does
                bound.unwrap_or(slot)
            }
            None => cell(Variable::Ref(None)),
        };
        Ok(Some(out))
    }

    // ─── Variable stacks ─────────────────────────────────────────────────────

    /// By-name lookup: innermost frame, then globals, then named constants.
    pub(crate) fn lookup(&self, name: &str) -> Option<VarCell> {
        let name = name.to_ascii_lowercase();
        if let Some(frame) = self.frames.last() {
            if let Some(v) = frame.get(&name) {
                return Some(v);
            }
        }
        self.globals.get(&name).or_else(|| self.constants.get(&name))
    }

    pub(crate) fn constant(&self, name: &str) -> Option<VarCell> {
        self.constants.get(name)
    }

    /// Declares a variable in the current scope.
    pub(crate) fn push_variable(&mut self, name: &str, var: VarCell) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(name, var),
            None => self.globals.push(name, var),
        }
    }

    /// Removes the most recent declaration of the current scope.
    pub(crate) fn pop_variable(&mut self) {
        match self.frames.last_mut() {
            Some(frame) => frame.pop(),
            None => self.globals.pop(),
        }
    }

    pub(crate) fn local_from_top(&self, distance: usize) -> Result<VarCell, RuntimeError> {
        self.frames
            .last()
            .and_then(|f| f.from_top(distance))
            .ok_or_else(|| RuntimeError::lookup("variable stack access out of range"))
    }

    pub(crate) fn global_from_top(&self, distance: usize) -> Result<VarCell, RuntimeError> {
        self.globals
            .from_top(distance)
            .ok_or_else(|| RuntimeError::lookup("variable stack access out of range"))
    }

    /// Current global stack depth; useful for scope tests.
    pub fn global_depth(&self) -> usize {
        self.globals.depth()
    }
}
