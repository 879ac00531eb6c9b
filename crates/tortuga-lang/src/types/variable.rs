//! The run-time value representation and its operation table.
//!
//! `Variable` is a closed enum; every operation follows the same two-step
//! algorithm: handle the natively compatible kinds first, otherwise cast the
//! other operand to the receiver's kind and retry. References delegate to
//! their bound value; constants reject every mutation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::RuntimeError;

/// Shared handle to a variable. Stack slots, array elements and reference
/// bindings all alias through these cells.
pub type VarCell = Rc<RefCell<Variable>>;

pub fn cell(v: Variable) -> VarCell {
    Rc::new(RefCell::new(v))
}

// ─── Kinds ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Float,
    Bool,
    Char,
    Str,
    Color,
    Array,
    Ref,
}

impl Kind {
    pub fn type_name(self) -> &'static str {
        match self {
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Bool => "boolean",
            Kind::Char => "char",
            Kind::Str => "string",
            Kind::Color => "color",
            Kind::Array => "array",
            Kind::Ref => "ref",
        }
    }

    /// Declaration keyword → kind.
    pub fn from_keyword(word: &str) -> Option<Kind> {
        let k = match word.to_ascii_lowercase().as_str() {
            "int" => Kind::Int,
            "float" => Kind::Float,
            "boolean" => Kind::Bool,
            "char" => Kind::Char,
            "string" => Kind::Str,
            "ref" => Kind::Ref,
            _ => return None,
        };
        Some(k)
    }

    /// Zero value used as the template for declarations and array elements.
    pub fn default_value(self) -> Variable {
        match self {
            Kind::Int => Variable::Int(0),
            Kind::Float => Variable::Float(0.0),
            Kind::Bool => Variable::Bool(false),
            Kind::Char => Variable::Char('\0'),
            Kind::Str => Variable::Str(String::new()),
            Kind::Color => Variable::Color(Rgb::BLACK),
            Kind::Array => Variable::Array { elems: Vec::new(), elem_kind: Kind::Int },
            Kind::Ref => Variable::Ref(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    fn packed(self) -> i64 {
        // matches the original's packed value, alpha bits included and
        // sign-extended
        let argb = 0xFF00_0000u32 | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32;
        argb as i32 as i64
    }
}

// ─── Variable ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Variable {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Color(Rgb),
    /// Element kind and dimension sizes are fixed at construction.
    Array { elems: Vec<VarCell>, elem_kind: Kind },
    /// Unbound until the first `set`, which binds instead of assigning.
    Ref(Option<VarCell>),
    /// Wraps a value that rejects every mutation.
    Const(Box<Variable>),
}

fn invalid_cast(from: &Variable, to: Kind) -> RuntimeError {
    RuntimeError::invalid_typecast(format!(
        "cannot convert from {} to {}",
        from.type_name(),
        to.type_name()
    ))
}

fn unbound_ref() -> RuntimeError {
    RuntimeError::invalid_operation("reference must be initialized before use")
}

fn immutable() -> RuntimeError {
    RuntimeError::invalid_operation("cannot change a constant's value")
}

fn char_of(code: i64) -> Result<char, RuntimeError> {
    u32::try_from(code & 0xFFFF)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| RuntimeError::invalid_operation("char arithmetic produced an invalid character"))
}

impl Variable {
    pub fn kind(&self) -> Kind {
        match self {
            Variable::Int(_) => Kind::Int,
            Variable::Float(_) => Kind::Float,
            Variable::Bool(_) => Kind::Bool,
            Variable::Char(_) => Kind::Char,
            Variable::Str(_) => Kind::Str,
            Variable::Color(_) => Kind::Color,
            Variable::Array { .. } => Kind::Array,
            Variable::Ref(_) => Kind::Ref,
            Variable::Const(inner) => inner.kind(),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Variable::Ref(None) => "ref".to_string(),
            Variable::Ref(Some(w)) => format!("ref to {}", w.borrow().type_name()),
            Variable::Const(inner) => inner.type_name(),
            other => other.kind().type_name().to_string(),
        }
    }

    /// Deep copy: array elements get fresh cells, references keep sharing
    /// their binding (aliasing survives argument passing).
    pub fn deep_copy(&self) -> Variable {
        match self {
            Variable::Array { elems, elem_kind } => Variable::Array {
                elems: elems.iter().map(|c| cell(c.borrow().deep_copy())).collect(),
                elem_kind: *elem_kind,
            },
            Variable::Const(inner) => Variable::Const(Box::new(inner.deep_copy())),
            other => other.clone(),
        }
    }

    // ─── Casting ─────────────────────────────────────────────────────────────

    pub fn cast(&self, to: Kind) -> Result<Variable, RuntimeError> {
        match self {
            Variable::Ref(Some(w)) if to != Kind::Ref => return w.borrow().cast(to),
            Variable::Ref(None) if to != Kind::Ref => return Err(unbound_ref()),
            Variable::Const(inner) => return inner.cast(to),
            _ => {}
        }
        if self.kind() == to {
            return Ok(self.clone());
        }
        let v = match (self, to) {
            (Variable::Int(v), Kind::Float) => Variable::Float(*v as f64),
            (Variable::Int(v), Kind::Char) => Variable::Char(char_of(*v)?),
            (Variable::Int(v), Kind::Bool) => Variable::Bool(*v != 0),
            (Variable::Int(v), Kind::Str) => Variable::Str(v.to_string()),

            (Variable::Float(v), Kind::Int) => Variable::Int(*v as i64),
            (Variable::Float(v), Kind::Char) => Variable::Char(char_of(*v as i64)?),
            (Variable::Float(v), Kind::Str) => Variable::Str(format_float(*v)),

            (Variable::Bool(v), Kind::Str) => Variable::Str(v.to_string()),

            (Variable::Char(v), Kind::Int) => Variable::Int(*v as i64),
            (Variable::Char(v), Kind::Float) => Variable::Float(*v as u32 as f64),
            (Variable::Char(v), Kind::Bool) => Variable::Bool(*v != '\0'),
            (Variable::Char(v), Kind::Str) => Variable::Str(v.to_string()),

            (Variable::Str(s), Kind::Float) => Variable::Float(parse_text(s.trim())?),
            (Variable::Str(s), Kind::Int) => Variable::Int(
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| unparseable_string(s))?,
            ),
            (Variable::Str(s), Kind::Char) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Variable::Char(c),
                    _ => Variable::Char(char_of(
                        s.trim().parse::<i64>().map_err(|_| unparseable_string(s))?,
                    )?),
                }
            }

            (Variable::Color(c), Kind::Int) => Variable::Int(c.packed()),

            (from, to) => return Err(invalid_cast(from, to)),
        };
        Ok(v)
    }

    // ─── Assignment ──────────────────────────────────────────────────────────

    /// Assigns `other`'s value, casting if kinds differ. Binding of unbound
    /// references is handled at the cell level (see `assign_cell`); reaching
    /// an unbound reference here binds an owned copy.
    pub fn set(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        match self {
            Variable::Const(_) => Err(immutable()),
            Variable::Ref(Some(w)) => w.borrow_mut().set(other),
            Variable::Ref(None) => {
                *self = Variable::Ref(Some(cell(other.deep_copy())));
                Ok(())
            }
            Variable::Array { elems, elem_kind } => match other {
                Variable::Array { elems: src, elem_kind: src_kind } => {
                    if *src_kind != *elem_kind {
                        return Err(RuntimeError::invalid_operation(format!(
                            "cannot set array of {} from array of {}",
                            elem_kind.type_name(),
                            src_kind.type_name()
                        )));
                    }
                    if src.len() != elems.len() {
                        return Err(RuntimeError::invalid_operation(
                            "array length is fixed after construction",
                        ));
                    }
                    for (dst, s) in elems.iter().zip(src) {
                        *dst.borrow_mut() = s.borrow().deep_copy();
                    }
                    Ok(())
                }
                _ => Err(RuntimeError::invalid_operation("cannot set array to single value")),
            },
            _ => {
                let converted = other.cast(self.kind())?;
                *self = converted;
                Ok(())
            }
        }
    }

    // ─── Arithmetic ──────────────────────────────────────────────────────────

    pub fn add(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.numeric_op(other, "add", |a, b| Ok(a.wrapping_add(b)), |a, b| a + b)
    }

    pub fn subtract(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.numeric_op(other, "subtract", |a, b| Ok(a.wrapping_sub(b)), |a, b| a - b)
    }

    pub fn multiply(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.numeric_op(other, "multiply", |a, b| Ok(a.wrapping_mul(b)), |a, b| a * b)
    }

    pub fn divide(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.numeric_op(
            other,
            "divide",
            |a, b| {
                if b == 0 {
                    Err(RuntimeError::invalid_operation("division by zero"))
                } else {
                    Ok(a.wrapping_div(b))
                }
            },
            |a, b| a / b,
        )
    }

    /// Integer/float exponentiation; integers go through float math like the
    /// host language's `pow` and truncate back.
    pub fn pow(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        match self {
            Variable::Int(v) => {
                let e = exponent_of(other)?;
                *v = (*v as f64).powf(e) as i64;
                Ok(())
            }
            Variable::Float(v) => {
                let e = exponent_of(other)?;
                *v = v.powf(e);
                Ok(())
            }
            Variable::Ref(Some(w)) => w.borrow_mut().pow(other),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(_) => Err(immutable()),
            other_self => Err(RuntimeError::invalid_operation(format!(
                "can't exponentiate variables of type {}",
                other_self.type_name()
            ))),
        }
    }

    /// Shared fast-path/cast-retry skeleton for `+ - * /`. The `Str` and
    /// error cases diverge per operation and are handled inline.
    fn numeric_op(
        &mut self,
        other: &Variable,
        verb: &str,
        int_op: fn(i64, i64) -> Result<i64, RuntimeError>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<(), RuntimeError> {
        match self {
            Variable::Int(v) => match numeric_operand(other) {
                Some(Num::Int(b)) => {
                    *v = int_op(*v, b)?;
                    Ok(())
                }
                Some(Num::Float(b)) => {
                    // compound assignment onto an int truncates, it does not
                    // promote — promotion happens in expression evaluation
                    *v = float_op(*v as f64, b) as i64;
                    Ok(())
                }
                None => {
                    let converted = other.cast(Kind::Int)?;
                    self.numeric_op(&converted, verb, int_op, float_op)
                }
            },
            Variable::Float(v) => match numeric_operand(other) {
                Some(num) => {
                    *v = float_op(*v, num.as_f64());
                    Ok(())
                }
                None => {
                    let converted = other.cast(Kind::Float)?;
                    self.numeric_op(&converted, verb, int_op, float_op)
                }
            },
            Variable::Char(v) => match numeric_operand(other) {
                Some(num) => {
                    let r = int_op(*v as i64, num.as_i64())?;
                    *v = char_of(r)?;
                    Ok(())
                }
                None => {
                    let converted = other.cast(Kind::Char)?;
                    self.numeric_op(&converted, verb, int_op, float_op)
                }
            },
            Variable::Str(s) => {
                if verb == "add" {
                    let tail = match other {
                        Variable::Str(t) => t.clone(),
                        _ => match other.cast(Kind::Str)? {
                            Variable::Str(t) => t,
                            _ => unreachable!("cast to string yields string"),
                        },
                    };
                    s.push_str(&tail);
                    Ok(())
                } else {
                    Err(RuntimeError::invalid_operation(format!("cannot {verb} a string")))
                }
            }
            Variable::Ref(Some(w)) => w.borrow_mut().numeric_op(other, verb, int_op, float_op),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(_) => Err(immutable()),
            other_self => Err(RuntimeError::invalid_operation(format!(
                "can't {verb} variables of type {}",
                other_self.type_name()
            ))),
        }
    }

    // ─── Boolean / bitwise joins ─────────────────────────────────────────────

    pub fn join_or(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.join(other, "or", |a, b| a | b, |a, b| a | b)
    }

    pub fn join_and(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.join(other, "and", |a, b| a & b, |a, b| a & b)
    }

    pub fn join_xor(&mut self, other: &Variable) -> Result<(), RuntimeError> {
        self.join(other, "xor", |a, b| a ^ b, |a, b| a ^ b)
    }

    fn join(
        &mut self,
        other: &Variable,
        verb: &str,
        int_op: fn(i64, i64) -> i64,
        bool_op: fn(bool, bool) -> bool,
    ) -> Result<(), RuntimeError> {
        match self {
            Variable::Int(v) => match numeric_operand(other) {
                Some(num) => {
                    *v = int_op(*v, num.as_i64());
                    Ok(())
                }
                None => {
                    let converted = other.cast(Kind::Int)?;
                    self.join(&converted, verb, int_op, bool_op)
                }
            },
            Variable::Char(v) => match numeric_operand(other) {
                Some(num) => {
                    *v = char_of(int_op(*v as i64, num.as_i64()))?;
                    Ok(())
                }
                None => {
                    let converted = other.cast(Kind::Char)?;
                    self.join(&converted, verb, int_op, bool_op)
                }
            },
            Variable::Bool(v) => {
                let b = match other {
                    Variable::Bool(b) => *b,
                    _ => match other.cast(Kind::Bool)? {
                        Variable::Bool(b) => b,
                        _ => unreachable!("cast to boolean yields boolean"),
                    },
                };
                *v = bool_op(*v, b);
                Ok(())
            }
            Variable::Ref(Some(w)) => w.borrow_mut().join(other, verb, int_op, bool_op),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(_) => Err(immutable()),
            other_self => Err(RuntimeError::invalid_operation(format!(
                "cannot use logical operator '{verb}' on type {}",
                other_self.type_name()
            ))),
        }
    }

    // ─── Comparison ──────────────────────────────────────────────────────────

    pub fn equal_value(&self, other: &Variable) -> Result<bool, RuntimeError> {
        match self {
            Variable::Int(v) => match numeric_operand(other) {
                Some(Num::Int(b)) => Ok(*v == b),
                Some(Num::Float(b)) => Ok((*v as f64) == b),
                None => Ok(*v == as_int(&other.cast(Kind::Int)?)),
            },
            Variable::Float(v) => match numeric_operand(other) {
                Some(num) => Ok(*v == num.as_f64()),
                None => Ok(*v == as_float(&other.cast(Kind::Float)?)),
            },
            Variable::Char(v) => match numeric_operand(other) {
                Some(num) => Ok((*v as i64) == num.as_i64()),
                None => Ok(*v as i64 == as_int(&other.cast(Kind::Char)?.cast(Kind::Int)?)),
            },
            Variable::Str(s) => match other.cast(Kind::Str)? {
                Variable::Str(t) => Ok(*s == t),
                _ => unreachable!("cast to string yields string"),
            },
            Variable::Bool(v) => match other.cast(Kind::Bool)? {
                Variable::Bool(b) => Ok(*v == b),
                _ => unreachable!("cast to boolean yields boolean"),
            },
            Variable::Color(c) => match other {
                Variable::Color(o) => Ok(c == o),
                _ => Err(RuntimeError::invalid_operation(
                    "can't compare variables of type color with other types",
                )),
            },
            Variable::Array { .. } => {
                Err(RuntimeError::invalid_operation("cannot compare variables of array type"))
            }
            Variable::Ref(Some(w)) => w.borrow().equal_value(other),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(inner) => inner.equal_value(other),
        }
    }

    pub fn less_than(&self, other: &Variable) -> Result<bool, RuntimeError> {
        self.ordered(other, |o| o.is_lt())
    }

    pub fn less_equal(&self, other: &Variable) -> Result<bool, RuntimeError> {
        self.ordered(other, |o| o.is_le())
    }

    fn ordered(
        &self,
        other: &Variable,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> Result<bool, RuntimeError> {
        let ord = match self {
            Variable::Int(v) => match numeric_operand(other) {
                Some(Num::Int(b)) => v.cmp(&b),
                Some(Num::Float(b)) => total_cmp(*v as f64, b),
                None => v.cmp(&as_int(&other.cast(Kind::Int)?)),
            },
            Variable::Float(v) => match numeric_operand(other) {
                Some(num) => total_cmp(*v, num.as_f64()),
                None => total_cmp(*v, as_float(&other.cast(Kind::Float)?)),
            },
            Variable::Char(v) => match numeric_operand(other) {
                Some(num) => (*v as i64).cmp(&num.as_i64()),
                None => match other.cast(Kind::Char)? {
                    Variable::Char(c) => (*v).cmp(&c),
                    _ => unreachable!("cast to char yields char"),
                },
            },
            Variable::Str(s) => match other.cast(Kind::Str)? {
                Variable::Str(t) => s.as_str().cmp(t.as_str()),
                _ => unreachable!("cast to string yields string"),
            },
            Variable::Ref(Some(w)) => return w.borrow().ordered(other, accept),
            Variable::Ref(None) => return Err(unbound_ref()),
            Variable::Const(inner) => return inner.ordered(other, accept),
            other_self => {
                return Err(RuntimeError::invalid_operation(format!(
                    "can't compare variables of type {}",
                    other_self.type_name()
                )));
            }
        };
        Ok(accept(ord))
    }

    // ─── Negation ────────────────────────────────────────────────────────────

    pub fn negate(&mut self) -> Result<(), RuntimeError> {
        match self {
            Variable::Int(v) => {
                *v = v.wrapping_neg();
                Ok(())
            }
            Variable::Float(v) => {
                *v = -*v;
                Ok(())
            }
            Variable::Bool(v) => {
                *v = !*v;
                Ok(())
            }
            Variable::Char(v) => {
                *v = char_of(-(*v as i64))?;
                Ok(())
            }
            Variable::Color(c) => {
                *c = Rgb { r: 255 - c.r, g: 255 - c.g, b: 255 - c.b };
                Ok(())
            }
            Variable::Ref(Some(w)) => w.borrow_mut().negate(),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(_) => Err(immutable()),
            other_self => Err(RuntimeError::invalid_operation(format!(
                "cannot negate variables of type {}",
                other_self.type_name()
            ))),
        }
    }

    // ─── Conversions for output and drawing ──────────────────────────────────

    pub fn as_string(&self) -> String {
        match self {
            Variable::Int(v) => v.to_string(),
            Variable::Float(v) => format_float(*v),
            Variable::Bool(v) => v.to_string(),
            Variable::Char(v) => v.to_string(),
            Variable::Str(s) => s.clone(),
            Variable::Color(c) => format!("RGB({}, {}, {})", c.r, c.g, c.b),
            Variable::Array { elems, .. } => {
                let parts: Vec<String> = elems.iter().map(|e| e.borrow().as_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Variable::Ref(None) => "empty reference".to_string(),
            Variable::Ref(Some(w)) => format!("reference to -> {}", w.borrow().as_string()),
            Variable::Const(inner) => inner.as_string(),
        }
    }

    pub fn as_f64(&self) -> Result<f64, RuntimeError> {
        match self {
            Variable::Int(v) => Ok(*v as f64),
            Variable::Float(v) => Ok(*v),
            Variable::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Variable::Char(v) => Ok(*v as u32 as f64),
            Variable::Str(s) => parse_text(s),
            Variable::Array { .. } => Ok(0.0),
            Variable::Color(_) => Err(RuntimeError::invalid_typecast(
                "can't convert color to numerical value",
            )),
            Variable::Ref(Some(w)) => w.borrow().as_f64(),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(inner) => inner.as_f64(),
        }
    }

    pub fn as_i64(&self) -> Result<i64, RuntimeError> {
        match self {
            Variable::Int(v) => Ok(*v),
            Variable::Float(v) => Ok(*v as i64),
            Variable::Bool(v) => Ok(*v as i64),
            Variable::Char(v) => Ok(*v as i64),
            Variable::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| unparseable_string(s)),
            Variable::Array { .. } => Ok(0),
            Variable::Color(_) => Err(RuntimeError::invalid_typecast(
                "can't convert color to numerical value",
            )),
            Variable::Ref(Some(w)) => w.borrow().as_i64(),
            Variable::Ref(None) => Err(unbound_ref()),
            Variable::Const(inner) => inner.as_i64(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Variable::Bool(v) => Ok(*v),
            _ => match self.cast(Kind::Bool)? {
                Variable::Bool(v) => Ok(v),
                _ => unreachable!("cast to boolean yields boolean"),
            },
        }
    }

    // ─── Literal parsing ─────────────────────────────────────────────────────

    /// Creates a variable from constant text: integer, float (decimal point
    /// or exponent required) or single-quoted character literal.
    pub fn from_literal(text: &str) -> Option<Variable> {
        if text.len() == 3 && text.starts_with('\'') && text.ends_with('\'') {
            return text.chars().nth(1).map(Variable::Char);
        }
        if !is_numeric_literal(text) {
            return None;
        }
        if text.contains('.') {
            text.parse::<f64>().ok().map(Variable::Float)
        } else {
            text.parse::<i64>().ok().map(Variable::Int)
        }
    }
}

// ─── Free helpers ─────────────────────────────────────────────────────────────

enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(&self) -> f64 {
        match self {
            Num::Int(v) => *v as f64,
            Num::Float(v) => *v,
        }
    }

    fn as_i64(&self) -> i64 {
        match self {
            Num::Int(v) => *v,
            Num::Float(v) => *v as i64,
        }
    }
}

/// The natively compatible right-hand kinds: int, float, char, and whatever a
/// bound reference or constant wraps.
fn numeric_operand(v: &Variable) -> Option<Num> {
    match v {
        Variable::Int(b) => Some(Num::Int(*b)),
        Variable::Float(b) => Some(Num::Float(*b)),
        Variable::Char(b) => Some(Num::Int(*b as i64)),
        Variable::Ref(Some(w)) => numeric_operand(&w.borrow()),
        Variable::Const(inner) => numeric_operand(inner),
        _ => None,
    }
}

fn as_int(v: &Variable) -> i64 {
    match v {
        Variable::Int(b) => *b,
        _ => 0,
    }
}

fn as_float(v: &Variable) -> f64 {
    match v {
        Variable::Float(b) => *b,
        _ => 0.0,
    }
}

fn total_cmp(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Greater)
}

fn exponent_of(other: &Variable) -> Result<f64, RuntimeError> {
    match numeric_operand(other) {
        Some(num) => Ok(num.as_f64()),
        None => other.cast(Kind::Float)?.as_f64(),
    }
}

fn unparseable_string(s: &str) -> RuntimeError {
    RuntimeError::invalid_typecast(format!("string value {s} cannot be parsed"))
}

fn parse_text(s: &str) -> Result<f64, RuntimeError> {
    s.trim().parse::<f64>().map_err(|_| unparseable_string(s))
}

/// Integral floats keep one decimal so int and float output stay
/// distinguishable.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

/// Digits with an optional fraction and exponent; the exponent requires a
/// decimal point first.
pub fn is_numeric_literal(text: &str) -> bool {
    let mut chars = text.char_indices().peekable();
    let mut digits_before = 0usize;
    while let Some((_, c)) = chars.peek() {
        if c.is_ascii_digit() {
            digits_before += 1;
            chars.next();
        } else {
            break;
        }
    }
    match chars.next() {
        None => digits_before > 0,
        Some((_, '.')) => {
            let mut digits_after = 0usize;
            while let Some((_, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    digits_after += 1;
                    chars.next();
                } else {
                    break;
                }
            }
            if digits_before == 0 && digits_after == 0 {
                return false;
            }
            match chars.next() {
                None => true,
                Some((_, 'e' | 'E')) => {
                    if let Some((_, '+' | '-')) = chars.peek() {
                        chars.next();
                    }
                    chars.all(|(_, c)| c.is_ascii_digit())
                }
                Some(_) => false,
            }
        }
        Some(_) => false,
    }
}

/// Owned, fully dereferenced copy of a cell's value for use as an operand:
/// reference chains are followed (unbound fails), constants unwrap to their
/// inner value.
pub fn snapshot(c: &VarCell) -> Result<Variable, RuntimeError> {
    resolved(&c.borrow())
}

pub fn resolved(v: &Variable) -> Result<Variable, RuntimeError> {
    match v {
        Variable::Ref(Some(w)) => resolved(&w.borrow()),
        Variable::Ref(None) => Err(unbound_ref()),
        Variable::Const(inner) => Ok(inner.deep_copy()),
        other => Ok(other.clone()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_cast_is_noop() {
        let v = Variable::Int(42);
        assert!(matches!(v.cast(Kind::Int).unwrap(), Variable::Int(42)));
        let s = Variable::Str("abc".into());
        assert!(matches!(s.cast(Kind::Str).unwrap(), Variable::Str(t) if t == "abc"));
    }

    #[test]
    fn numeric_string_casts() {
        let s = Variable::Str("42".into());
        assert!(matches!(s.cast(Kind::Int).unwrap(), Variable::Int(42)));
        let s = Variable::Str(" 2.5 ".into());
        assert!(matches!(s.cast(Kind::Float).unwrap(), Variable::Float(f) if f == 2.5));
    }

    #[test]
    fn non_numeric_string_cast_fails() {
        let s = Variable::Str("abc".into());
        let e = s.cast(Kind::Int).unwrap_err();
        assert_eq!(e.kind, crate::error::RuntimeErrorKind::InvalidTypecast);
        assert!(s.cast(Kind::Float).is_err());
    }

    #[test]
    fn integer_division_truncates() {
        let mut v = Variable::Int(3);
        v.divide(&Variable::Int(2)).unwrap();
        assert!(matches!(v, Variable::Int(1)));
    }

    #[test]
    fn division_by_zero_fails() {
        let mut v = Variable::Int(3);
        assert!(v.divide(&Variable::Int(0)).is_err());
    }

    #[test]
    fn string_concatenation() {
        let mut v = Variable::Str("ab".into());
        v.add(&Variable::Int(3)).unwrap();
        assert!(matches!(v, Variable::Str(s) if s == "ab3"));
    }

    #[test]
    fn string_subtraction_fails() {
        let mut v = Variable::Str("ab".into());
        assert!(v.subtract(&Variable::Int(1)).is_err());
    }

    #[test]
    fn constant_rejects_all_mutation() {
        let mut c = Variable::Const(Box::new(Variable::Float(std::f64::consts::PI)));
        assert!(c.set(&Variable::Int(3)).is_err());
        assert!(c.add(&Variable::Int(1)).is_err());
        assert!(c.subtract(&Variable::Int(1)).is_err());
        assert!(c.multiply(&Variable::Int(2)).is_err());
        assert!(c.divide(&Variable::Int(2)).is_err());
        assert!(c.pow(&Variable::Int(2)).is_err());
    }

    #[test]
    fn constant_still_readable() {
        let c = Variable::Const(Box::new(Variable::Float(2.5)));
        assert_eq!(c.as_f64().unwrap(), 2.5);
        assert!(matches!(c.cast(Kind::Int).unwrap(), Variable::Int(2)));
    }

    #[test]
    fn unbound_reference_fails_everything_but_set() {
        let mut r = Variable::Ref(None);
        assert!(r.as_f64().is_err());
        assert!(r.add(&Variable::Int(1)).is_err());
        assert!(r.equal_value(&Variable::Int(1)).is_err());
        assert!(r.negate().is_err());
        r.set(&Variable::Int(7)).unwrap();
        assert_eq!(r.as_i64().unwrap(), 7);
    }

    #[test]
    fn bound_reference_delegates() {
        let target = cell(Variable::Int(10));
        let mut r = Variable::Ref(Some(target.clone()));
        r.add(&Variable::Int(5)).unwrap();
        assert!(matches!(&*target.borrow(), Variable::Int(15)));
    }

    #[test]
    fn reference_copy_shares_binding() {
        let target = cell(Variable::Int(1));
        let r = Variable::Ref(Some(target.clone()));
        let mut copy = r.deep_copy();
        copy.set(&Variable::Int(9)).unwrap();
        assert!(matches!(&*target.borrow(), Variable::Int(9)));
    }

    #[test]
    fn array_rejects_operations() {
        let mut a = Variable::Array { elems: vec![cell(Variable::Int(1))], elem_kind: Kind::Int };
        assert!(a.add(&Variable::Int(1)).is_err());
        assert!(a.equal_value(&Variable::Int(1)).is_err());
        assert!(a.less_than(&Variable::Int(1)).is_err());
        assert!(a.cast(Kind::Int).is_err());
    }

    #[test]
    fn array_set_fixed_length() {
        let mut a = Variable::Array {
            elems: vec![cell(Variable::Int(1)), cell(Variable::Int(2))],
            elem_kind: Kind::Int,
        };
        let longer = Variable::Array {
            elems: vec![cell(Variable::Int(1)); 3],
            elem_kind: Kind::Int,
        };
        assert!(a.set(&longer).is_err());
    }

    #[test]
    fn int_compares_across_kinds() {
        let v = Variable::Int(5);
        assert!(v.less_than(&Variable::Float(5.5)).unwrap());
        assert!(v.equal_value(&Variable::Char(5 as u8 as char)).unwrap());
        assert!(v.equal_value(&Variable::Str("5".into())).unwrap());
    }

    #[test]
    fn string_orders_lexicographically() {
        let v = Variable::Str("apple".into());
        assert!(v.less_than(&Variable::Str("banana".into())).unwrap());
        assert!(v.less_equal(&Variable::Str("apple".into())).unwrap());
    }

    #[test]
    fn bool_joins_are_logical() {
        let mut v = Variable::Bool(true);
        v.join_and(&Variable::Bool(false)).unwrap();
        assert!(matches!(v, Variable::Bool(false)));
        v.join_xor(&Variable::Bool(true)).unwrap();
        assert!(matches!(v, Variable::Bool(true)));
    }

    #[test]
    fn int_joins_are_bitwise() {
        let mut v = Variable::Int(0b1010);
        v.join_or(&Variable::Int(0b0101)).unwrap();
        assert!(matches!(v, Variable::Int(0b1111)));
    }

    #[test]
    fn float_joins_fail() {
        let mut v = Variable::Float(1.0);
        assert!(v.join_or(&Variable::Float(1.0)).is_err());
    }

    #[test]
    fn negate_inverts_bool() {
        let mut v = Variable::Bool(false);
        v.negate().unwrap();
        assert!(matches!(v, Variable::Bool(true)));
    }

    #[test]
    fn negate_string_fails() {
        assert!(Variable::Str("a".into()).negate().is_err());
    }

    #[test]
    fn literal_parsing() {
        assert!(matches!(Variable::from_literal("42"), Some(Variable::Int(42))));
        assert!(matches!(Variable::from_literal("4.5"), Some(Variable::Float(_))));
        assert!(matches!(Variable::from_literal("'x'"), Some(Variable::Char('x'))));
        assert!(Variable::from_literal("abc").is_none());
        // exponent requires a decimal point first
        assert!(Variable::from_literal("5e3").is_none());
        assert!(matches!(Variable::from_literal("5.0e3"), Some(Variable::Float(_))));
    }

    #[test]
    fn float_formatting_keeps_decimal() {
        assert_eq!(format_float(6.0), "6.0");
        assert_eq!(format_float(1.5), "1.5");
    }

    #[test]
    fn compound_int_float_truncates() {
        // x += 2.5 on an int variable truncates, matching compound assignment
        let mut v = Variable::Int(1);
        v.add(&Variable::Float(2.5)).unwrap();
        assert!(matches!(v, Variable::Int(3)));
    }
}
