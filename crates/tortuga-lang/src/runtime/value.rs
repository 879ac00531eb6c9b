//! Expression nodes: a tokenized `Term` is lowered here by splitting on
//! operator classes in strictly decreasing precedence (boolean join →
//! comparison → add/sub → mul/div → power → primary). Single-operand levels
//! collapse so evaluation never pays for identity operators.

use crate::analysis::Optimizer;
use crate::error::{Location, ParseError, RuntimeError};
use crate::runtime::interpreter::Interpreter;
use crate::surface::Host;
use crate::syntax::token::Token;
use crate::types::variable::{Variable, VarCell, cell, snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Or,
    And,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    Less,
    LessEqual,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone)]
pub enum Value {
    /// Parsed integer, float or character literal.
    Literal(Variable),
    StrLiteral(String),
    /// Named immutable constant resolved from the constant registry.
    ConstantName(String),
    /// By-name variable lookup; the optimizer rewrites these into slot
    /// lookups where it can, and they stay valid either way.
    ByName(String),
    /// Distance from the top of the current invocation's variable stack.
    StackSlot(usize),
    /// Distance from the top of the global variable stack.
    GlobalSlot(usize),
    ArrayAccess { base: Box<Value>, indices: Vec<Value> },
    Negate(Box<Value>),
    /// `add[i]` is true for `+`, false for `-`; `add[0]` is always true.
    AddSub { operands: Vec<Value>, add: Vec<bool> },
    /// `mul[i]` is true for `*`, false for `/`.
    MulDiv { operands: Vec<Value>, mul: Vec<bool> },
    Power(Vec<Value>),
    BoolTerm { operands: Vec<Value>, ops: Vec<BoolOp> },
    Comparison { kind: CmpKind, left: Box<Value>, right: Box<Value> },
    FunctionCall { name: String, args: Vec<Value> },
}

// ─── Building ─────────────────────────────────────────────────────────────────

impl Value {
    pub fn from_token(tok: &Token) -> Result<Value, ParseError> {
        match tok {
            Token::Text(t) => match Variable::from_literal(t) {
                Some(v) => Ok(Value::Literal(v)),
                None => Ok(Value::ByName(t.to_ascii_lowercase())),
            },
            Token::Str(s) => Ok(Value::StrLiteral(s.clone())),
            Token::Call(children) => {
                let name = children[0]
                    .text()
                    .ok_or_else(|| ParseError::new("invalid function call"))?
                    .to_ascii_lowercase();
                let args = children[1..].iter().map(Value::from_token).collect::<Result<_, _>>()?;
                Ok(Value::FunctionCall { name, args })
            }
            Token::ArrayAccess { base, indices } => {
                if indices.is_empty() {
                    return Value::from_token(base);
                }
                Ok(Value::ArrayAccess {
                    base: Box::new(Value::from_token(base)?),
                    indices: indices.iter().map(Value::from_token).collect::<Result<_, _>>()?,
                })
            }
            Token::Negative(Some(inner)) => Ok(Value::Negate(Box::new(Value::from_token(inner)?))),
            Token::Negative(None) => Err(ParseError::new("'-' without operand")),
            Token::Term { .. } => {
                let norm = tok.normalized();
                match norm {
                    Token::Term { tokens, .. } => build_bool(tokens),
                    other => Value::from_token(other),
                }
            }
        }
    }
}

fn is_bool_op(s: &str) -> bool {
    s.eq_ignore_ascii_case("and") || s.eq_ignore_ascii_case("or") || s.eq_ignore_ascii_case("xor")
}

fn is_cmp_op(s: &str) -> bool {
    matches!(s, "<" | "<=" | "==" | ">" | ">=" | "!=")
}

fn is_addsub_op(s: &str) -> bool {
    matches!(s, "+" | "-")
}

fn is_muldiv_op(s: &str) -> bool {
    matches!(s, "*" | "/")
}

/// Splits a token run on the separators of one precedence class. Each group
/// carries the operator that introduced it (`None` for the first).
fn split_on<'a>(
    tokens: &'a [Token],
    matches_op: fn(&str) -> bool,
) -> Vec<(Option<&'a str>, &'a [Token])> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut pending: Option<&str> = None;
    for (i, t) in tokens.iter().enumerate() {
        if let Some(txt) = t.text() {
            if matches_op(txt) && t.is_operator() {
                out.push((pending, &tokens[start..i]));
                pending = Some(txt);
                start = i + 1;
            }
        }
    }
    out.push((pending, &tokens[start..]));
    out
}

fn build_bool(tokens: &[Token]) -> Result<Value, ParseError> {
    let groups = split_on(tokens, is_bool_op);
    if groups.len() == 1 {
        return build_comparison(tokens);
    }
    let mut operands = Vec::with_capacity(groups.len());
    let mut ops = Vec::with_capacity(groups.len() - 1);
    for (op, group) in groups {
        if group.is_empty() {
            return Err(ParseError::new("invalid boolean expression"));
        }
        operands.push(build_comparison(group)?);
        if let Some(op) = op {
            ops.push(if op.eq_ignore_ascii_case("and") {
                BoolOp::And
            } else if op.eq_ignore_ascii_case("xor") {
                BoolOp::Xor
            } else {
                BoolOp::Or
            });
        }
    }
    Ok(Value::BoolTerm { operands, ops })
}

fn build_comparison(tokens: &[Token]) -> Result<Value, ParseError> {
    let groups = split_on(tokens, is_cmp_op);
    if groups.len() == 1 {
        return build_addsub(tokens);
    }
    if groups.len() > 2 {
        return Err(ParseError::new("at most one comparison operator per expression"));
    }
    let (_, left) = groups[0];
    let (op, right) = groups[1];
    let op = op.expect("non-first group carries its operator");
    if left.is_empty() || right.is_empty() {
        return Err(ParseError::new("invalid comparison"));
    }
    let l = Box::new(build_addsub(left)?);
    let r = Box::new(build_addsub(right)?);
    // > and >= swap operands into the canonical < / <= forms
    let v = match op {
        "<" => Value::Comparison { kind: CmpKind::Less, left: l, right: r },
        "<=" => Value::Comparison { kind: CmpKind::LessEqual, left: l, right: r },
        "==" => Value::Comparison { kind: CmpKind::Equal, left: l, right: r },
        ">" => Value::Comparison { kind: CmpKind::Less, left: r, right: l },
        ">=" => Value::Comparison { kind: CmpKind::LessEqual, left: r, right: l },
        "!=" => Value::Comparison { kind: CmpKind::NotEqual, left: r, right: l },
        _ => unreachable!("matched by is_cmp_op"),
    };
    Ok(v)
}

fn build_addsub(tokens: &[Token]) -> Result<Value, ParseError> {
    let groups = split_on(tokens, is_addsub_op);
    if groups.len() == 1 {
        return build_muldiv(tokens);
    }
    let mut operands = Vec::with_capacity(groups.len());
    let mut add = Vec::with_capacity(groups.len());
    for (op, group) in groups {
        if group.is_empty() {
            return Err(ParseError::new("invalid arithmetic expression"));
        }
        operands.push(build_muldiv(group)?);
        add.push(op != Some("-"));
    }
    Ok(Value::AddSub { operands, add })
}

fn build_muldiv(tokens: &[Token]) -> Result<Value, ParseError> {
    let groups = split_on(tokens, is_muldiv_op);
    if groups.len() == 1 {
        return build_power(tokens);
    }
    let mut operands = Vec::with_capacity(groups.len());
    let mut mul = Vec::with_capacity(groups.len());
    for (op, group) in groups {
        if group.is_empty() {
            return Err(ParseError::new("invalid arithmetic expression"));
        }
        operands.push(build_power(group)?);
        mul.push(op != Some("/"));
    }
    Ok(Value::MulDiv { operands, mul })
}

fn build_power(tokens: &[Token]) -> Result<Value, ParseError> {
    let groups = split_on(tokens, |s| s == "^");
    if groups.len() == 1 {
        return build_primary(tokens);
    }
    let operands = groups
        .into_iter()
        .map(|(_, group)| {
            if group.is_empty() {
                Err(ParseError::new("invalid exponentiation"))
            } else {
                build_primary(group)
            }
        })
        .collect::<Result<_, _>>()?;
    Ok(Value::Power(operands))
}

fn build_primary(tokens: &[Token]) -> Result<Value, ParseError> {
    match tokens {
        [single] => Value::from_token(single),
        _ => Err(ParseError::new("invalid expression")),
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────

fn deref_chain(mut c: VarCell) -> VarCell {
    loop {
        let next = match &*c.borrow() {
            Variable::Ref(Some(w)) => w.clone(),
            _ => break,
        };
        c = next;
    }
    c
}

fn out_of_bounds() -> RuntimeError {
    RuntimeError::lookup("array index out of bounds")
}

impl Value {
    pub fn evaluate(
        &self,
        host: &mut dyn Host,
        interp: &mut Interpreter,
        loc: Location,
    ) -> Result<VarCell, RuntimeError> {
        match self {
            Value::Literal(v) => Ok(cell(v.clone())),
            Value::StrLiteral(s) => Ok(cell(Variable::Str(s.clone()))),

            Value::ConstantName(name) => interp
                .constant(name)
                .ok_or_else(|| RuntimeError::lookup(format!("constant {name} not found")).at(loc)),

            Value::ByName(name) => interp
                .lookup(name)
                .ok_or_else(|| RuntimeError::lookup(format!("variable {name} not found")).at(loc)),

            Value::StackSlot(from_top) => interp.local_from_top(*from_top).map_err(|e| e.at(loc)),
            Value::GlobalSlot(from_top) => interp.global_from_top(*from_top).map_err(|e| e.at(loc)),

            Value::ArrayAccess { base, indices } => {
                let mut cur = base.evaluate(host, interp, loc)?;
                // trailing indices select into nested arrays first; the first
                // index is applied last and may also index a string
                for idx in indices[1..].iter().rev() {
                    let ind = idx.evaluate(host, interp, loc)?.borrow().as_i64()?;
                    let next = {
                        match &*cur.borrow() {
                            Variable::Array { elems, .. } => {
                                let i = usize::try_from(ind).map_err(|_| out_of_bounds().at(loc))?;
                                elems.get(i).cloned().ok_or_else(|| out_of_bounds().at(loc))?
                            }
                            _ => {
                                return Err(RuntimeError::invalid_operation(
                                    "invalid array access: variable is not an array",
                                )
                                .at(loc));
                            }
                        }
                    };
                    cur = next;
                }
                let ind = indices[0].evaluate(host, interp, loc)?.borrow().as_i64()?;
                let cur = deref_chain(cur);
                let result = match &*cur.borrow() {
                    Variable::Array { elems, .. } => {
                        let i = usize::try_from(ind).map_err(|_| out_of_bounds().at(loc))?;
                        elems.get(i).cloned().ok_or_else(|| out_of_bounds().at(loc))?
                    }
                    Variable::Str(s) => {
                        let i = usize::try_from(ind).map_err(|_| out_of_bounds().at(loc))?;
                        let c = s.chars().nth(i).ok_or_else(|| out_of_bounds().at(loc))?;
                        cell(Variable::Char(c))
                    }
                    _ => return Err(RuntimeError::invalid_operation("invalid array access").at(loc)),
                };
                Ok(result)
            }

            Value::Negate(inner) => {
                let mut v = snapshot(&inner.evaluate(host, interp, loc)?)?;
                v.negate().map_err(|e| e.at(loc))?;
                Ok(cell(v))
            }

            Value::AddSub { operands, add } => {
                let mut acc = snapshot(&operands[0].evaluate(host, interp, loc)?)?;
                for (operand, positive) in operands[1..].iter().zip(&add[1..]) {
                    let rhs = snapshot(&operand.evaluate(host, interp, loc)?)?;
                    promote(&mut acc, &rhs)?;
                    let r = if *positive { acc.add(&rhs) } else { acc.subtract(&rhs) };
                    r.map_err(|e| e.at(loc))?;
                }
                Ok(cell(acc))
            }

            Value::MulDiv { operands, mul } => {
                let mut acc = snapshot(&operands[0].evaluate(host, interp, loc)?)?;
                for (operand, multiply) in operands[1..].iter().zip(&mul[1..]) {
                    let rhs = snapshot(&operand.evaluate(host, interp, loc)?)?;
                    promote(&mut acc, &rhs)?;
                    let r = if *multiply { acc.multiply(&rhs) } else { acc.divide(&rhs) };
                    r.map_err(|e| e.at(loc))?;
                }
                Ok(cell(acc))
            }

            Value::Power(operands) => {
                let mut acc = snapshot(&operands[0].evaluate(host, interp, loc)?)?;
                for operand in &operands[1..] {
                    let rhs = snapshot(&operand.evaluate(host, interp, loc)?)?;
                    promote(&mut acc, &rhs)?;
                    acc.pow(&rhs).map_err(|e| e.at(loc))?;
                }
                Ok(cell(acc))
            }

            Value::BoolTerm { operands, ops } => {
                let mut acc = snapshot(&operands[0].evaluate(host, interp, loc)?)?;
                for (operand, op) in operands[1..].iter().zip(ops) {
                    let rhs = snapshot(&operand.evaluate(host, interp, loc)?)?;
                    promote(&mut acc, &rhs)?;
                    let r = match op {
                        BoolOp::Or => acc.join_or(&rhs),
                        BoolOp::And => acc.join_and(&rhs),
                        BoolOp::Xor => acc.join_xor(&rhs),
                    };
                    r.map_err(|e| e.at(loc))?;
                }
                Ok(cell(acc))
            }

            Value::Comparison { kind, left, right } => {
                let l = snapshot(&left.evaluate(host, interp, loc)?)?;
                let r = snapshot(&right.evaluate(host, interp, loc)?)?;
                let b = match kind {
                    CmpKind::Less => l.less_than(&r),
                    CmpKind::LessEqual => l.less_equal(&r),
                    CmpKind::Equal => l.equal_value(&r),
                    CmpKind::NotEqual => l.equal_value(&r).map(|b| !b),
                };
                Ok(cell(Variable::Bool(b.map_err(|e| e.at(loc))?)))
            }

            Value::FunctionCall { name, args } => {
                let idx = interp.find_invokeable(name, args.len()).ok_or_else(|| {
                    RuntimeError::lookup(format!(
                        "the function {name} with {} arguments doesn't exist",
                        args.len()
                    ))
                    .at(loc)
                })?;
                let mut cells = Vec::with_capacity(args.len());
                for a in args {
                    cells.push(a.evaluate(host, interp, loc)?);
                }
                interp.invoke(host, idx, &cells, loc)?.ok_or_else(|| {
                    RuntimeError::lookup(format!(
                        "the function {name} with {} arguments doesn't exist",
                        args.len()
                    ))
                    .at(loc)
                })
            }
        }
    }

    /// Condition helper: evaluates and coerces to boolean.
    pub fn evaluate_bool(
        &self,
        host: &mut dyn Host,
        interp: &mut Interpreter,
        loc: Location,
    ) -> Result<bool, RuntimeError> {
        let v = self.evaluate(host, interp, loc)?;
        let b = v.borrow().as_bool().map_err(|e| e.at(loc))?;
        Ok(b)
    }

    // ─── Optimization ────────────────────────────────────────────────────────

    /// Rewrites by-name lookups into slot lookups where the optimizer can
    /// place the name; unresolved names stay by-name and keep working.
    pub fn optimize(&mut self, oo: &Optimizer) {
        match self {
            Value::ByName(name) => {
                use crate::analysis::ScopeKind;
                match oo.resolve(name) {
                    Some((ScopeKind::Local, d)) => *self = Value::StackSlot(d),
                    Some((ScopeKind::Global, d)) => *self = Value::GlobalSlot(d),
                    None => {
                        if oo.is_constant(name) {
                            *self = Value::ConstantName(name.clone());
                        }
                    }
                }
            }
            Value::ArrayAccess { base, indices } => {
                base.optimize(oo);
                for i in indices {
                    i.optimize(oo);
                }
            }
            Value::Negate(inner) => inner.optimize(oo),
            Value::AddSub { operands, .. }
            | Value::MulDiv { operands, .. }
            | Value::Power(operands)
            | Value::BoolTerm { operands, .. } => {
                for o in operands {
                    o.optimize(oo);
                }
            }
            Value::Comparison { left, right, .. } => {
                left.optimize(oo);
                right.optimize(oo);
            }
            Value::FunctionCall { args, .. } => {
                for a in args {
                    a.optimize(oo);
                }
            }
            Value::Literal(_)
            | Value::StrLiteral(_)
            | Value::ConstantName(_)
            | Value::StackSlot(_)
            | Value::GlobalSlot(_) => {}
        }
    }
}

/// Whenever one side is an integer and the other a float, the integer side
/// converts to float before the operation.
fn promote(acc: &mut Variable, rhs: &Variable) -> Result<(), RuntimeError> {
    if matches!(acc, Variable::Int(_)) && matches!(rhs, Variable::Float(_)) {
        *acc = Variable::Float(acc.as_f64()?);
    }
    Ok(())
}
