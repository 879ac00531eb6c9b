//! The primitive command vocabulary and the per-line compiler that pattern
//! matches a tokenized line against it. Anything that matches no fixed shape
//! falls back to a named invocation with positional arguments.

use std::rc::Rc;

use crate::analysis::Optimizer;
use crate::compile::block::Signal;
use crate::error::{Location, ParseError, RuntimeError};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::Value;
use crate::surface::{Host, RenderSurface, TextSink};
use crate::syntax::token::Token;
use crate::types::variable::{self, Kind, Rgb, Variable, VarCell, cell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

pub enum Command {
    // turtle & pen
    Forward { distance: Value, forward: bool },
    Turn { angle: Value, right: bool },
    Rotate(Value),
    SetPosition(Value, Value),
    PushPosition,
    PopPosition,
    ResetRotation,
    SetPen(bool),
    PenColor(Value, Value, Value),
    SetTurtle(bool),
    SetAntialiasing(bool),
    // transform stack
    PushMatrix,
    PopMatrix,
    ResetMatrix,
    Translate(Value, Value),
    Scale(Value, Value),
    Skew(Value, Value),
    // drawing
    Point(Value, Value),
    Line([Value; 4]),
    Ellipse([Value; 4]),
    Triangle([Value; 6]),
    Polygon(Vec<Value>),
    Clear(Option<[Value; 3]>),
    Reset,
    // output & timing
    Print { args: Vec<Value>, newline: bool },
    ClearOutput,
    Sleep(Value),
    // variables
    NewVariable { name: String, template: Variable, init: Option<Value> },
    CreateArray { name: String, lengths: Vec<Value>, template: Variable },
    SetLength { target: Value, length: Value },
    Assign { op: AssignOp, target: Value, value: Value },
    // control
    Exit(Signal),
    // invocation
    Invoke { name: String, args: Vec<Value> },
    InvokeFast { index: usize, args: Vec<Value> },
}

// ─── Compilation ──────────────────────────────────────────────────────────────

/// Compiles one tokenized logical line into a command.
pub fn compile(tokens: &[Token], loc: Location) -> Result<Command, ParseError> {
    let err = |msg: &str| ParseError::at(msg, loc.line);
    let value = |tok: &Token| Value::from_token(tok).map_err(|e| e.with_line(loc.line));

    if tokens.is_empty() || (tokens.len() == 1 && matches!(tokens[0], Token::Term { .. })) {
        return Err(err("invalid command"));
    }
    let head = &tokens[0];

    if head.is_command("clear") {
        let rgb = if tokens.len() >= 4 {
            Some([value(&tokens[1])?, value(&tokens[2])?, value(&tokens[3])?])
        } else {
            None
        };
        return Ok(Command::Clear(rgb));
    }
    if head.is_command("clearOutput") {
        return Ok(Command::ClearOutput);
    }
    if head.is_command("penUp") || head.is_command("pu") {
        return Ok(Command::SetPen(false));
    }
    if head.is_command("penDown") || head.is_command("pd") {
        return Ok(Command::SetPen(true));
    }
    if head.is_command("antialiasingOn") {
        return Ok(Command::SetAntialiasing(true));
    }
    if head.is_command("antialiasingOff") {
        return Ok(Command::SetAntialiasing(false));
    }
    if head.is_command("hideTurtle") || head.is_command("ht") {
        return Ok(Command::SetTurtle(false));
    }
    if head.is_command("showTurtle") || head.is_command("st") {
        return Ok(Command::SetTurtle(true));
    }
    if head.is_command("pushPosition") {
        return Ok(Command::PushPosition);
    }
    if head.is_command("popPosition") {
        return Ok(Command::PopPosition);
    }
    if head.is_command("resetRotation") {
        return Ok(Command::ResetRotation);
    }
    if head.is_command("pushMatrix") {
        return Ok(Command::PushMatrix);
    }
    if head.is_command("popMatrix") {
        return Ok(Command::PopMatrix);
    }
    if head.is_command("resetMatrix") || head.is_command("loadIdentity") {
        return Ok(Command::ResetMatrix);
    }
    if head.is_command("reset") {
        return Ok(Command::Reset);
    }

    if head.is_command("exit") {
        if tokens.len() < 2 {
            return Ok(Command::Exit(Signal::Exit));
        }
        if tokens[1].is_command("sub") {
            return Ok(Command::Exit(Signal::ExitSub));
        }
        if tokens[1].is_command("function") {
            return Ok(Command::Exit(Signal::ExitFunction));
        }
        if tokens[1].is_command("repeat") {
            return Ok(Command::Exit(Signal::ExitRepeat));
        }
        if tokens[1].is_command("while") {
            return Ok(Command::Exit(Signal::ExitWhile));
        }
        // anything else falls through to the invocation fallback
    }

    if head.is_command("print") || head.is_command("println") {
        let args = tokens[1..].iter().map(value).collect::<Result<_, _>>()?;
        return Ok(Command::Print { args, newline: head.is_command("println") });
    }

    if tokens.len() == 2 && head.is_command("sleep") {
        return Ok(Command::Sleep(value(&tokens[1])?));
    }
    if tokens.len() == 2 && (head.is_command("forward") || head.is_command("fd")) {
        return Ok(Command::Forward { distance: value(&tokens[1])?, forward: true });
    }
    if tokens.len() == 2 && (head.is_command("backward") || head.is_command("bw")) {
        return Ok(Command::Forward { distance: value(&tokens[1])?, forward: false });
    }
    if tokens.len() == 2 && (head.is_command("right") || head.is_command("rt")) {
        return Ok(Command::Turn { angle: value(&tokens[1])?, right: true });
    }
    if tokens.len() == 2 && (head.is_command("left") || head.is_command("lt")) {
        return Ok(Command::Turn { angle: value(&tokens[1])?, right: false });
    }
    if tokens.len() == 2 && head.is_command("rotate") {
        return Ok(Command::Rotate(value(&tokens[1])?));
    }

    if tokens.len() == 3 && head.is_command("setLength") {
        return Ok(Command::SetLength { target: value(&tokens[1])?, length: value(&tokens[2])? });
    }

    // array declaration: `{int n} name`, `{int n m} grid`
    if tokens.len() >= 2 {
        if let Token::ArrayAccess { base, indices } = head.clone().simplify() {
            if let Some(template) = array_template(&base) {
                let lengths = indices.iter().map(value).collect::<Result<Vec<_>, _>>()?;
                if lengths.is_empty() {
                    return Err(err("array declaration needs at least one length"));
                }
                let name = tokens[1]
                    .text()
                    .ok_or_else(|| err("invalid array name"))?
                    .to_ascii_lowercase();
                return Ok(Command::CreateArray { name, lengths, template });
            }
        }
    }

    // scalar declaration: `int x`, `float y = 1.5`, …
    if tokens.len() >= 2 {
        if let Some(kind) = head.text().and_then(Kind::from_keyword) {
            let name = tokens[1]
                .text()
                .ok_or_else(|| err("invalid variable name"))?
                .to_ascii_lowercase();
            let init = if tokens.len() == 4 {
                if !tokens[2].is_command("=") {
                    return Err(err(&format!(
                        "invalid initialization of {} {name}",
                        kind.type_name()
                    )));
                }
                Some(value(&tokens[3])?)
            } else {
                None
            };
            return Ok(Command::NewVariable { name, template: kind.default_value(), init });
        }
    }

    if tokens.len() >= 3 && (head.is_command("setPosition") || head.is_command("setPos")) {
        return Ok(Command::SetPosition(value(&tokens[1])?, value(&tokens[2])?));
    }
    if tokens.len() >= 3 && head.is_command("skew") {
        return Ok(Command::Skew(value(&tokens[1])?, value(&tokens[2])?));
    }
    if tokens.len() >= 3 && head.is_command("translate") {
        return Ok(Command::Translate(value(&tokens[1])?, value(&tokens[2])?));
    }
    if tokens.len() >= 3 && head.is_command("scale") {
        return Ok(Command::Scale(value(&tokens[1])?, value(&tokens[2])?));
    }
    if tokens.len() >= 3 && head.is_command("point") {
        return Ok(Command::Point(value(&tokens[1])?, value(&tokens[2])?));
    }

    // assignment and compound assignment
    if tokens.len() >= 3 {
        let op = tokens[1].text().and_then(|t| match t {
            "=" => Some(AssignOp::Set),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Sub),
            "*=" => Some(AssignOp::Mul),
            "/=" => Some(AssignOp::Div),
            "^=" => Some(AssignOp::Pow),
            _ => None,
        });
        if let Some(op) = op {
            let target_tok = tokens[0].clone().simplify();
            let target = match &target_tok {
                Token::Text(t) => Value::ByName(t.to_ascii_lowercase()),
                Token::ArrayAccess { .. } => value(&target_tok)?,
                _ => return Err(err("left side of assignment is not a variable name")),
            };
            return Ok(Command::Assign { op, target, value: value(&tokens[2])? });
        }
    }

    if tokens.len() >= 4 && head.is_command("penColor") {
        return Ok(Command::PenColor(value(&tokens[1])?, value(&tokens[2])?, value(&tokens[3])?));
    }
    if tokens.len() >= 5 && head.is_command("line") {
        return Ok(Command::Line([
            value(&tokens[1])?,
            value(&tokens[2])?,
            value(&tokens[3])?,
            value(&tokens[4])?,
        ]));
    }
    if tokens.len() >= 5 && head.is_command("ellipse") {
        return Ok(Command::Ellipse([
            value(&tokens[1])?,
            value(&tokens[2])?,
            value(&tokens[3])?,
            value(&tokens[4])?,
        ]));
    }
    if tokens.len() >= 7 && head.is_command("triangle") {
        return Ok(Command::Triangle([
            value(&tokens[1])?,
            value(&tokens[2])?,
            value(&tokens[3])?,
            value(&tokens[4])?,
            value(&tokens[5])?,
            value(&tokens[6])?,
        ]));
    }
    if head.is_command("polygon") {
        if (tokens.len() - 1) % 2 != 0 {
            return Err(err("polygon must have an even amount of arguments"));
        }
        let args = tokens[1..].iter().map(value).collect::<Result<_, _>>()?;
        return Ok(Command::Polygon(args));
    }

    // fallback: a named invocation with positional arguments
    let name = head.text().ok_or_else(|| err("invalid command"))?.to_ascii_lowercase();
    let args = tokens[1..].iter().map(value).collect::<Result<_, _>>()?;
    Ok(Command::Invoke { name, args })
}

/// Element template for array declarations; `None` when the base token does
/// not name a type (e.g. an ordinary array access on the left of `=`).
fn array_template(tok: &Token) -> Option<Variable> {
    match tok {
        Token::Text(t) => Kind::from_keyword(t).map(Kind::default_value),
        Token::ArrayAccess { base, .. } => array_template(base).map(|inner| Variable::Array {
            elems: Vec::new(),
            elem_kind: inner.kind(),
        }),
        _ => None,
    }
}

// ─── Execution ────────────────────────────────────────────────────────────────

fn f64_arg(
    v: &Value,
    host: &mut dyn Host,
    interp: &mut Interpreter,
    loc: Location,
) -> Result<f64, RuntimeError> {
    let c = v.evaluate(host, interp, loc)?;
    let r = c.borrow().as_f64().map_err(|e| e.at(loc))?;
    Ok(r)
}

fn i64_arg(
    v: &Value,
    host: &mut dyn Host,
    interp: &mut Interpreter,
    loc: Location,
) -> Result<i64, RuntimeError> {
    let c = v.evaluate(host, interp, loc)?;
    let r = c.borrow().as_i64().map_err(|e| e.at(loc))?;
    Ok(r)
}

fn channel(v: f64) -> f64 {
    v.clamp(0.0, 255.0)
}

/// Assign `rhs` into `target`. An unbound reference target binds to the
/// right-hand cell itself, aliasing it; every other target takes a resolved
/// copy of the value.
fn assign_cell(target: &VarCell, rhs: &VarCell, loc: Location) -> Result<(), RuntimeError> {
    let unbound = matches!(&*target.borrow(), Variable::Ref(None));
    if unbound {
        if Rc::ptr_eq(target, rhs) {
            return Err(RuntimeError::invalid_operation("cannot bind a reference to itself").at(loc));
        }
        if let Variable::Ref(slot) = &mut *target.borrow_mut() {
            *slot = Some(rhs.clone());
        }
        return Ok(());
    }
    let resolved = variable::snapshot(rhs).map_err(|e| e.at(loc))?;
    target.borrow_mut().set(&resolved).map_err(|e| e.at(loc))
}

impl Command {
    pub fn execute(
        &self,
        host: &mut dyn Host,
        interp: &mut Interpreter,
        loc: Location,
    ) -> Result<Signal, RuntimeError> {
        match self {
            Command::Forward { distance, forward } => {
                let d = f64_arg(distance, host, interp, loc)?;
                if *forward {
                    host.forward(d);
                } else {
                    host.backward(d);
                }
            }
            Command::Turn { angle, right } => {
                let a = f64_arg(angle, host, interp, loc)?;
                if *right {
                    host.right(a);
                } else {
                    host.left(a);
                }
            }
            Command::Rotate(v) => {
                let a = f64_arg(v, host, interp, loc)?;
                host.rotate(a);
            }
            Command::SetPosition(x, y) => {
                let (x, y) = (f64_arg(x, host, interp, loc)?, f64_arg(y, host, interp, loc)?);
                host.set_position(x, y);
            }
            Command::PushPosition => host.push_position(),
            Command::PopPosition => host.pop_position(),
            Command::ResetRotation => host.reset_rotation(),
            Command::SetPen(down) => {
                if *down {
                    host.pen_down();
                } else {
                    host.pen_up();
                }
            }
            Command::PenColor(r, g, b) => {
                let r = channel(f64_arg(r, host, interp, loc)?);
                let g = channel(f64_arg(g, host, interp, loc)?);
                let b = channel(f64_arg(b, host, interp, loc)?);
                host.pen_color(r, g, b);
            }
            Command::SetTurtle(show) => host.set_show_turtle(*show),
            Command::SetAntialiasing(on) => host.set_antialiasing(*on),

            Command::PushMatrix => host.push_matrix(),
            Command::PopMatrix => host.pop_matrix(),
            Command::ResetMatrix => host.reset_matrix(),
            Command::Translate(x, y) => {
                let (x, y) = (f64_arg(x, host, interp, loc)?, f64_arg(y, host, interp, loc)?);
                host.translate(x, y);
            }
            Command::Scale(x, y) => {
                let (x, y) = (f64_arg(x, host, interp, loc)?, f64_arg(y, host, interp, loc)?);
                host.scale(x, y);
            }
            Command::Skew(x, y) => {
                let (x, y) = (f64_arg(x, host, interp, loc)?, f64_arg(y, host, interp, loc)?);
                host.skew(x, y);
            }

            Command::Point(x, y) => {
                let (x, y) = (f64_arg(x, host, interp, loc)?, f64_arg(y, host, interp, loc)?);
                host.point(x, y);
            }
            Command::Line(coords) => {
                let mut c = [0.0; 4];
                for (dst, v) in c.iter_mut().zip(coords) {
                    *dst = f64_arg(v, host, interp, loc)?;
                }
                host.line(c[0], c[1], c[2], c[3]);
            }
            Command::Ellipse(coords) => {
                let mut c = [0.0; 4];
                for (dst, v) in c.iter_mut().zip(coords) {
                    *dst = f64_arg(v, host, interp, loc)?;
                }
                host.ellipse(c[0], c[1], c[2], c[3]);
            }
            Command::Triangle(coords) => {
                let mut c = [0.0; 6];
                for (dst, v) in c.iter_mut().zip(coords) {
                    *dst = f64_arg(v, host, interp, loc)?;
                }
                host.triangle(c[0], c[1], c[2], c[3], c[4], c[5]);
            }
            Command::Polygon(args) => {
                let mut xs = Vec::with_capacity(args.len() / 2);
                let mut ys = Vec::with_capacity(args.len() / 2);
                for pair in args.chunks_exact(2) {
                    xs.push(i64_arg(&pair[0], host, interp, loc)? as f64);
                    ys.push(i64_arg(&pair[1], host, interp, loc)? as f64);
                }
                host.polygon(&xs, &ys);
            }
            Command::Clear(rgb) => {
                let color = match rgb {
                    Some([r, g, b]) => Rgb {
                        r: channel(f64_arg(r, host, interp, loc)?) as u8,
                        g: channel(f64_arg(g, host, interp, loc)?) as u8,
                        b: channel(f64_arg(b, host, interp, loc)?) as u8,
                    },
                    None => Rgb::BLACK,
                };
                host.clear(color);
            }
            Command::Reset => {
                host.reset();
                host.clear_output();
            }

            Command::Print { args, newline } => {
                let mut parts = Vec::with_capacity(args.len());
                for a in args {
                    parts.push(a.evaluate(host, interp, loc)?.borrow().as_string());
                }
                let text = parts.join(", ");
                if *newline {
                    host.println(&text);
                } else {
                    host.print(&text);
                }
            }
            Command::ClearOutput => host.clear_output(),
            Command::Sleep(ms) => {
                let ms = i64_arg(ms, host, interp, loc)?;
                if ms > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(ms as u64));
                }
            }

            Command::NewVariable { name, template, init } => {
                let var = cell(template.deep_copy());
                interp.push_variable(name, var.clone());
                if let Some(init) = init {
                    let rhs = init.evaluate(host, interp, loc)?;
                    assign_cell(&var, &rhs, loc)?;
                }
                return Ok(Signal::NewVariable);
            }
            Command::CreateArray { name, lengths, template } => {
                let elems = build_array(host, interp, loc, lengths, lengths.len() - 1, template)?;
                let elem_kind =
                    if lengths.len() == 1 { template.kind() } else { Kind::Array };
                interp.push_variable(name, cell(Variable::Array { elems, elem_kind }));
                return Ok(Signal::NewVariable);
            }
            Command::SetLength { .. } => {
                return Err(RuntimeError::invalid_operation(
                    "setLength command not yet implemented",
                )
                .at(loc));
            }
            Command::Assign { op, target, value } => {
                let target = target.evaluate(host, interp, loc)?;
                let rhs = value.evaluate(host, interp, loc)?;
                match op {
                    AssignOp::Set => assign_cell(&target, &rhs, loc)?,
                    _ => {
                        let resolved = variable::snapshot(&rhs).map_err(|e| e.at(loc))?;
                        let mut t = target.borrow_mut();
                        let r = match op {
                            AssignOp::Add => t.add(&resolved),
                            AssignOp::Sub => t.subtract(&resolved),
                            AssignOp::Mul => t.multiply(&resolved),
                            AssignOp::Div => t.divide(&resolved),
                            AssignOp::Pow => t.pow(&resolved),
                            AssignOp::Set => unreachable!("handled above"),
                        };
                        r.map_err(|e| e.at(loc))?;
                    }
                }
            }

            Command::Exit(signal) => return Ok(*signal),

            Command::Invoke { name, args } => {
                let idx = interp.find_invokeable(name, args.len()).ok_or_else(|| {
                    RuntimeError::lookup(format!(
                        "could not find subroutine {name} with {} arguments",
                        args.len()
                    ))
                    .at(loc)
                })?;
                let mut cells = Vec::with_capacity(args.len());
                for a in args {
                    cells.push(a.evaluate(host, interp, loc)?);
                }
                interp.invoke(host, idx, &cells, loc)?;
            }
            Command::InvokeFast { index, args } => {
                let mut cells = Vec::with_capacity(args.len());
                for a in args {
                    cells.push(a.evaluate(host, interp, loc)?);
                }
                interp.invoke(host, *index, &cells, loc)?;
            }
        }
        Ok(Signal::Nothing)
    }

    // ─── Optimization ────────────────────────────────────────────────────────

    pub fn optimize(&mut self, oo: &mut Optimizer) {
        match self {
            Command::NewVariable { name, init, .. } => {
                // registered before the initializer, matching execution order
                oo.push_name(name);
                if let Some(init) = init {
                    init.optimize(oo);
                }
            }
            Command::CreateArray { name, lengths, .. } => {
                for l in lengths.iter_mut() {
                    l.optimize(oo);
                }
                oo.push_name(name);
            }
            Command::Assign { target, value, .. } => {
                target.optimize(oo);
                value.optimize(oo);
            }
            Command::SetLength { target, length } => {
                target.optimize(oo);
                length.optimize(oo);
            }
            Command::Print { args, .. } => {
                // `print f x y` where f names a value-returning invokeable is
                // shorthand for `print [f x y]`
                if args.len() >= 2 {
                    if let Value::ByName(n) = &args[0] {
                        if oo.resolve(n).is_none() && !oo.is_constant(n) {
                            if let Some(idx) = oo.find_invokeable(n, args.len() - 1) {
                                if oo.registry().get(idx).returns_value() {
                                    let name = n.clone();
                                    let rest = args.split_off(1);
                                    *args = vec![Value::FunctionCall { name, args: rest }];
                                }
                            }
                        }
                    }
                }
                for a in args.iter_mut() {
                    a.optimize(oo);
                }
            }
            Command::Invoke { name, args } => {
                for a in args.iter_mut() {
                    a.optimize(oo);
                }
                if let Some(index) = oo.find_invokeable(name, args.len()) {
                    let args = std::mem::take(args);
                    *self = Command::InvokeFast { index, args };
                }
            }
            Command::InvokeFast { args, .. } | Command::Polygon(args) => {
                for a in args.iter_mut() {
                    a.optimize(oo);
                }
            }
            Command::Forward { distance: v, .. }
            | Command::Turn { angle: v, .. }
            | Command::Rotate(v)
            | Command::Sleep(v) => v.optimize(oo),
            Command::SetPosition(a, b)
            | Command::Translate(a, b)
            | Command::Scale(a, b)
            | Command::Skew(a, b)
            | Command::Point(a, b) => {
                a.optimize(oo);
                b.optimize(oo);
            }
            Command::PenColor(a, b, c) => {
                a.optimize(oo);
                b.optimize(oo);
                c.optimize(oo);
            }
            Command::Line(coords) | Command::Ellipse(coords) => {
                for c in coords.iter_mut() {
                    c.optimize(oo);
                }
            }
            Command::Triangle(coords) => {
                for c in coords.iter_mut() {
                    c.optimize(oo);
                }
            }
            Command::Clear(Some(rgb)) => {
                for c in rgb.iter_mut() {
                    c.optimize(oo);
                }
            }
            Command::Clear(None)
            | Command::Reset
            | Command::ClearOutput
            | Command::PushPosition
            | Command::PopPosition
            | Command::ResetRotation
            | Command::SetPen(_)
            | Command::SetTurtle(_)
            | Command::SetAntialiasing(_)
            | Command::PushMatrix
            | Command::PopMatrix
            | Command::ResetMatrix
            | Command::Exit(_) => {}
        }
    }
}

/// Builds the element cells for one array level; inner levels are built once
/// and copied per slot.
fn build_array(
    host: &mut dyn Host,
    interp: &mut Interpreter,
    loc: Location,
    lengths: &[Value],
    level: usize,
    template: &Variable,
) -> Result<Vec<VarCell>, RuntimeError> {
    let len = i64_arg(&lengths[level], host, interp, loc)?;
    let len = usize::try_from(len)
        .map_err(|_| RuntimeError::invalid_operation("array length cannot be negative").at(loc))?;

    if level == 0 {
        return Ok((0..len).map(|_| cell(template.deep_copy())).collect());
    }

    let inner = build_array(host, interp, loc, lengths, level - 1, template)?;
    let inner_kind = if level == 1 { template.kind() } else { Kind::Array };
    let mut elems = Vec::with_capacity(len);
    if len > 0 {
        let first = Variable::Array { elems: inner, elem_kind: inner_kind };
        for _ in 1..len {
            elems.push(cell(first.deep_copy()));
        }
        elems.insert(0, cell(first));
    }
    Ok(elems)
}
