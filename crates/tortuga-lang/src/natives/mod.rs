//! Built-in functions and named constants. Both tables are constructed
//! explicitly per interpreter — there are no process-wide singletons, so
//! isolated interpreter instances can run in parallel.

use crate::error::{Location, RuntimeError};
use crate::runtime::interpreter::Interpreter;
use crate::surface::{Host, RenderSurface, TextSink};
use crate::types::variable::{self, Kind, Variable, VarCell, cell};

use chrono::{Datelike, Local, Timelike};

// ─── Native functions ─────────────────────────────────────────────────────────

type GeneralFn =
    fn(&mut dyn Host, &mut Interpreter, &[VarCell], Location) -> Result<Variable, RuntimeError>;

enum NativeImpl {
    /// f64 → f64, the common math shape.
    Math1(fn(f64) -> f64),
    /// (f64, f64) → f64.
    Math2(fn(f64, f64) -> f64),
    General(GeneralFn),
}

pub struct NativeFn {
    pub name: &'static str,
    pub arity: usize,
    run: NativeImpl,
}

impl NativeFn {
    pub fn call(
        &self,
        host: &mut dyn Host,
        interp: &mut Interpreter,
        args: &[VarCell],
        loc: Location,
    ) -> Result<Variable, RuntimeError> {
        match self.run {
            NativeImpl::Math1(f) => Ok(Variable::Float(f(arg_f64(args, 0)?))),
            NativeImpl::Math2(f) => Ok(Variable::Float(f(arg_f64(args, 0)?, arg_f64(args, 1)?))),
            NativeImpl::General(f) => f(host, interp, args, loc),
        }
    }
}

fn arg_f64(args: &[VarCell], i: usize) -> Result<f64, RuntimeError> {
    args[i].borrow().as_f64()
}

fn arg_value(args: &[VarCell], i: usize) -> Result<Variable, RuntimeError> {
    variable::snapshot(&args[i])
}

/// Follows reference bindings without copying.
fn deref(mut c: VarCell) -> VarCell {
    loop {
        let next = match &*c.borrow() {
            Variable::Ref(Some(w)) => w.clone(),
            _ => break,
        };
        c = next;
    }
    c
}

/// The complete built-in library, in registration order.
pub fn standard_natives() -> Vec<NativeFn> {
    fn math1(name: &'static str, f: fn(f64) -> f64) -> NativeFn {
        NativeFn { name, arity: 1, run: NativeImpl::Math1(f) }
    }
    fn math2(name: &'static str, f: fn(f64, f64) -> f64) -> NativeFn {
        NativeFn { name, arity: 2, run: NativeImpl::Math2(f) }
    }
    fn general(name: &'static str, arity: usize, f: GeneralFn) -> NativeFn {
        NativeFn { name, arity, run: NativeImpl::General(f) }
    }

    vec![
        math1("sqrt", f64::sqrt),
        math1("sin", f64::sin),
        math1("cos", f64::cos),
        math1("tan", f64::tan),
        math1("cot", |x| 1.0 / x.tan()),
        math1("exp", f64::exp),
        math1("asin", f64::asin),
        math1("acos", f64::acos),
        math1("atan", f64::atan),
        math2("atan2", f64::atan2),
        math1("ln", f64::ln),
        math1("lg", f64::log10),
        // log base args[0] of args[1]
        math2("log", |base, x| x.ln() / base.ln()),
        math1("sinh", f64::sinh),
        math1("cosh", f64::cosh),
        math1("tanh", f64::tanh),
        general("max", 2, native_max),
        general("min", 2, native_min),
        general("round", 1, native_round),
        general("int", 1, native_int),
        general("rand", 0, |_, _, _, _| Ok(Variable::Float(rand::random::<f64>()))),
        math1("rand", |max| rand::random::<f64>() * max),
        math2("rand", |lo, hi| rand::random::<f64>() * (hi - lo) + lo),
        general("nanos", 0, native_nanos),
        general("year", 0, |_, _, _, _| Ok(Variable::Int(Local::now().year() as i64))),
        general("month", 0, |_, _, _, _| Ok(Variable::Int(Local::now().month() as i64))),
        general("day", 0, |_, _, _, _| Ok(Variable::Int(Local::now().day() as i64))),
        general("hour", 0, |_, _, _, _| Ok(Variable::Int(Local::now().hour() as i64))),
        general("minute", 0, |_, _, _, _| Ok(Variable::Int(Local::now().minute() as i64))),
        general("second", 0, |_, _, _, _| Ok(Variable::Int(Local::now().second() as i64))),
        general("millisecond", 0, |_, _, _, _| {
            Ok(Variable::Int(Local::now().timestamp_subsec_millis() as i64))
        }),
        general("typename", 1, |_, _, args, _| {
            Ok(Variable::Str(args[0].borrow().type_name()))
        }),
        general("input", 0, |host, _, _, _| Ok(Variable::Str(host.pop_input_string()))),
        general("isNumeric", 1, native_is_numeric),
        general("toCharArray", 1, native_to_char_array),
        general("length", 1, native_length),
        general("width", 0, |host, _, _, _| Ok(Variable::Int(host.width() as i64))),
        general("height", 0, |host, _, _, _| Ok(Variable::Int(host.height() as i64))),
    ]
}

fn native_max(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let a = arg_value(args, 0)?;
    let b = arg_value(args, 1)?;
    Ok(if a.less_than(&b)? { b } else { a })
}

fn native_min(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let a = arg_value(args, 0)?;
    let b = arg_value(args, 1)?;
    Ok(if a.less_than(&b)? { a } else { b })
}

fn native_round(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let v = arg_value(args, 0)?;
    if matches!(v, Variable::Int(_)) {
        return Ok(v);
    }
    // round half up, like the original host's rounding
    Ok(Variable::Int((v.as_f64()? + 0.5).floor() as i64))
}

fn native_int(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let v = arg_value(args, 0)?;
    if matches!(v, Variable::Int(_)) {
        return Ok(v);
    }
    Ok(Variable::Int(v.as_i64()?))
}

fn native_nanos(
    _: &mut dyn Host,
    _: &mut Interpreter,
    _: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    Ok(Variable::Int(nanos as i64))
}

fn native_is_numeric(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let c = deref(args[0].clone());
    let numeric = match &*c.borrow() {
        Variable::Int(_) | Variable::Float(_) => true,
        Variable::Str(s) => variable::is_numeric_literal(s),
        _ => false,
    };
    Ok(Variable::Bool(numeric))
}

fn native_to_char_array(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let s = match arg_value(args, 0)?.cast(Kind::Str)? {
        Variable::Str(s) => s,
        _ => unreachable!("cast to string yields string"),
    };
    Ok(Variable::Array {
        elems: s.chars().map(|c| cell(Variable::Char(c))).collect(),
        elem_kind: Kind::Char,
    })
}

fn native_length(
    _: &mut dyn Host,
    _: &mut Interpreter,
    args: &[VarCell],
    _: Location,
) -> Result<Variable, RuntimeError> {
    let c = deref(args[0].clone());
    let len = match &*c.borrow() {
        Variable::Array { elems, .. } => elems.len(),
        Variable::Str(s) => s.chars().count(),
        other => match other.cast(Kind::Str)? {
            Variable::Str(s) => s.chars().count(),
            _ => unreachable!("cast to string yields string"),
        },
    };
    Ok(Variable::Int(len as i64))
}

// ─── Named constants ──────────────────────────────────────────────────────────

const CONSTANT_NAMES: [&str; 10] = [
    "pi", "two_pi", "half_pi", "quarter_pi", "e", "sqrt2", "sqrt3", "goldenratio", "true", "false",
];

pub fn is_constant_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    CONSTANT_NAMES.contains(&lower.as_str())
}

/// The named immutable constants, one shared cell per name. Lookup falls
/// through here after the variable stacks; mutation attempts fail on the
/// constant wrapper.
pub struct ConstantTable {
    entries: Vec<(&'static str, VarCell)>,
}

impl ConstantTable {
    pub fn standard() -> Self {
        use std::f64::consts::{E, PI};
        fn float(v: f64) -> VarCell {
            cell(Variable::Const(Box::new(Variable::Float(v))))
        }
        fn boolean(v: bool) -> VarCell {
            cell(Variable::Const(Box::new(Variable::Bool(v))))
        }
        Self {
            entries: vec![
                ("pi", float(PI)),
                ("two_pi", float(PI + PI)),
                ("half_pi", float(PI * 0.5)),
                ("quarter_pi", float(PI * 0.25)),
                ("e", float(E)),
                ("sqrt2", float(2.0f64.sqrt())),
                ("sqrt3", float(3.0f64.sqrt())),
                ("goldenratio", float((1.0 + 5.0f64.sqrt()) * 0.5)),
                ("true", boolean(true)),
                ("false", boolean(false)),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<VarCell> {
        let lower = name.to_ascii_lowercase();
        self.entries.iter().find(|(n, _)| *n == lower).map(|(_, c)| c.clone())
    }
}
