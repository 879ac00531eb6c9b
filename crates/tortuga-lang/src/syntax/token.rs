//! Token tree construction: raw string tokens → structured `Token`s.
//!
//! The tokenizer resolves parenthesization, `[...]` function calls, `{...}`
//! array accesses, compound assignment operators and the unary-minus versus
//! binary-minus distinction. Operator precedence is NOT handled here — a
//! `Term` is a flat run of operands and operators that the expression builder
//! splits later.

use crate::error::ParseError;
use crate::syntax::lexer;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare word: command keyword, variable name, number, operator.
    Text(String),
    /// A double-quoted string literal, escapes already replaced.
    Str(String),
    /// `[name arg arg …]` — an inline invocation. First child is the callee.
    Call(Vec<Token>),
    /// `{base index index …}` — array (or string) element access.
    ArrayAccess { base: Box<Token>, indices: Vec<Token> },
    /// Unary minus. `None` only transiently during construction.
    Negative(Option<Box<Token>>),
    /// A run of operand/operator tokens forming one expression.
    Term { tokens: Vec<Token>, paren: bool },
}

/// True for every token the expression builder treats as a binary operator.
pub fn is_operator_text(s: &str) -> bool {
    matches!(s, "+" | "-" | "*" | "/" | "^" | "<" | ">" | "<=" | ">=" | "==" | "!=")
        || s.eq_ignore_ascii_case("and")
        || s.eq_ignore_ascii_case("or")
        || s.eq_ignore_ascii_case("xor")
}

/// A word with no assignment or arithmetic characters in it — something that
/// could be a command name or variable name.
fn is_plain_word(s: &str) -> bool {
    !s.contains(['=', '+', '-', '*', '/'])
}

impl Token {
    pub fn text(&self) -> Option<&str> {
        match self {
            Token::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Case-insensitive keyword test; only `Text` tokens can be commands.
    pub fn is_command(&self, keyword: &str) -> bool {
        matches!(self, Token::Text(t) if t.eq_ignore_ascii_case(keyword))
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Text(t) if is_operator_text(t))
    }

    /// A single-child term collapses to its child.
    pub fn simplify(self) -> Token {
        match self {
            Token::Term { mut tokens, .. } if tokens.len() == 1 => tokens.pop().expect("len checked"),
            other => other,
        }
    }

    /// Strips nested single-child term wrappers.
    pub fn normalized(&self) -> &Token {
        let mut tok = self;
        while let Token::Term { tokens, .. } = tok {
            match tokens.as_slice() {
                [inner @ Token::Term { .. }] => tok = inner,
                _ => break,
            }
        }
        tok
    }

    fn expects_operand(&self) -> bool {
        matches!(self, Token::Term { tokens, .. } if tokens.last().is_some_and(Token::is_operator))
    }

    fn is_unfilled_negative(&self) -> bool {
        matches!(self, Token::Negative(None))
    }
}

/// Tokenizes one logical line.
pub fn tokenize(line: &str) -> Result<Vec<Token>, ParseError> {
    let raw = lexer::split_raw(line)?;
    let tokens = build(&raw, false)?;
    for t in &tokens {
        ensure_filled(t)?;
    }
    Ok(tokens)
}

/// Builds a token buffer from a raw-token range.
fn build(raw: &[String], in_parens: bool) -> Result<Vec<Token>, ParseError> {
    let mut buf: Vec<Token> = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        i = add_token(&mut buf, raw, i, in_parens)? + 1;
    }
    Ok(buf)
}

/// Consumes the raw token at `i` (possibly a whole bracket group) into `buf`
/// and returns the index of the last raw token used.
fn add_token(buf: &mut Vec<Token>, raw: &[String], i: usize, in_parens: bool) -> Result<usize, ParseError> {
    let token = raw[i].as_str();

    let operand_expected = buf.last().is_some_and(Token::expects_operand);
    let val_expected = match buf.last() {
        Some(t) if t.is_unfilled_negative() => true,
        Some(Token::Term { tokens, .. }) => tokens.last().is_some_and(Token::is_unfilled_negative),
        _ => false,
    };
    // a minus here is a binary operator, not the sign of a value
    let minus_as_operator = match buf.last() {
        Some(Token::Term { .. }) if !operand_expected => true,
        _ => {
            (buf.len() == 1 && in_parens)
                || (buf.len() > 1
                    && matches!(buf.last(), Some(Token::Text(t)) if is_plain_word(t)))
                || (buf.len() > 1 && matches!(buf.last(), Some(Token::Negative(_))))
        }
    };
    let after_paren_group = matches!(buf.last(), Some(Token::Term { paren: true, .. }));

    match token {
        "[" => {
            let end = matching_index(raw, i)?;
            let children = build(&raw[i + 1..end], false)?;
            if children.is_empty() {
                return Err(ParseError::new("empty [] invocation"));
            }
            attach_operand(buf, Token::Call(children), operand_expected, val_expected)?;
            Ok(end)
        }
        "{" => {
            let end = matching_index(raw, i)?;
            let mut children = build(&raw[i + 1..end], false)?;
            if children.is_empty() {
                return Err(ParseError::new("empty {} access"));
            }
            let base = Box::new(children.remove(0));
            attach_operand(
                buf,
                Token::ArrayAccess { base, indices: children },
                operand_expected,
                val_expected,
            )?;
            Ok(end)
        }
        "(" => {
            let end = matching_index(raw, i)?;
            let mut children = build(&raw[i + 1..end], true)?;
            if children.len() != 1 {
                return Err(ParseError::new("invalid parenthesized expression"));
            }
            let group = Token::Term { tokens: flatten(children.pop().expect("len checked")), paren: true };
            if operand_expected || val_expected {
                attach_operand(buf, group, operand_expected, val_expected)?;
            } else {
                buf.push(Token::Term { tokens: vec![group], paren: false });
            }
            Ok(end)
        }
        _ => {
            // merge compound two-character operators: += -= *= /= ^= == != <= >=
            let (t, consumed) = if token.len() == 1
                && "+-*/^=!<>".contains(token)
                && raw.get(i + 1).is_some_and(|n| n == "=")
            {
                (Token::Text(format!("{token}=")), i + 1)
            } else {
                (plain_token(token), i)
            };

            let mut t = t;
            let mut minus_handled = false;
            if t.is_command("-") && !minus_as_operator && i < raw.len() - 1 {
                t = Token::Negative(None);
                minus_handled = true;
            }

            if t.is_operator() && !minus_handled && after_paren_group {
                // a paren group stays a nested child rather than re-flattening
                let last = buf.pop().ok_or_else(|| operator_at_start(&t))?;
                buf.push(Token::Term { tokens: vec![last, t], paren: false });
            } else if t.is_operator() && !minus_handled {
                let last = buf.pop().ok_or_else(|| operator_at_start(&t))?;
                let mut tokens = flatten(last);
                tokens.push(t);
                buf.push(Token::Term { tokens, paren: false });
            } else if operand_expected {
                match buf.last_mut() {
                    Some(Token::Term { tokens, .. }) => tokens.push(t),
                    _ => unreachable!("operand_expected implies trailing term"),
                }
            } else if val_expected {
                fill_negative(buf, t);
            } else {
                buf.push(t);
            }
            Ok(consumed)
        }
    }
}

fn plain_token(raw: &str) -> Token {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        Token::Str(lexer::unescape(&raw[1..raw.len() - 1]))
    } else {
        Token::Text(raw.to_string())
    }
}

fn operator_at_start(t: &Token) -> ParseError {
    ParseError::new(format!(
        "unexpected operator {} at the beginning of a line.",
        t.text().unwrap_or("?")
    ))
}

/// A non-paren term dissolves into its tokens; everything else stays whole.
fn flatten(t: Token) -> Vec<Token> {
    match t {
        Token::Term { tokens, paren: false } => tokens,
        other => vec![other],
    }
}

fn attach_operand(
    buf: &mut Vec<Token>,
    t: Token,
    operand_expected: bool,
    val_expected: bool,
) -> Result<(), ParseError> {
    if operand_expected {
        match buf.last_mut() {
            Some(Token::Term { tokens, .. }) => tokens.push(t),
            _ => unreachable!("operand_expected implies trailing term"),
        }
    } else if val_expected {
        fill_negative(buf, t);
    } else {
        buf.push(Token::Term { tokens: vec![t], paren: false });
    }
    Ok(())
}

/// Fills the pending unary minus, either at the buffer top or as the last
/// child of the trailing term.
fn fill_negative(buf: &mut Vec<Token>, t: Token) {
    match buf.last_mut() {
        Some(neg @ Token::Negative(None)) => *neg = Token::Negative(Some(Box::new(t))),
        Some(Token::Term { tokens, .. }) => match tokens.last_mut() {
            Some(neg @ Token::Negative(None)) => *neg = Token::Negative(Some(Box::new(t))),
            _ => unreachable!("val_expected implies pending negative"),
        },
        _ => unreachable!("val_expected implies pending negative"),
    }
}

/// Index of the bracket closing the one at `open_idx`.
fn matching_index(raw: &[String], open_idx: usize) -> Result<usize, ParseError> {
    let open = raw[open_idx].as_str();
    let close = match open {
        "[" => "]",
        "{" => "}",
        "(" => ")",
        _ => unreachable!("not an opening bracket"),
    };
    let mut level = 1usize;
    let mut i = open_idx + 1;
    loop {
        if i >= raw.len() {
            return Err(ParseError::new(format!("'{open}' without matching '{close}'")));
        }
        if raw[i] == open {
            level += 1;
        } else if raw[i] == close {
            level -= 1;
            if level == 0 {
                return Ok(i);
            }
        }
        i += 1;
    }
}

fn ensure_filled(t: &Token) -> Result<(), ParseError> {
    match t {
        Token::Negative(None) => Err(ParseError::new("'-' without operand")),
        Token::Negative(Some(inner)) => ensure_filled(inner),
        Token::Call(children) => children.iter().try_for_each(ensure_filled),
        Token::ArrayAccess { base, indices } => {
            ensure_filled(base)?;
            indices.iter().try_for_each(ensure_filled)
        }
        Token::Term { tokens, .. } => tokens.iter().try_for_each(ensure_filled),
        _ => Ok(()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<Token> {
        tokenize(line).unwrap()
    }

    fn text(s: &str) -> Token {
        Token::Text(s.into())
    }

    #[test]
    fn simple_command() {
        assert_eq!(toks("forward 100"), vec![text("forward"), text("100")]);
    }

    #[test]
    fn leading_minus_is_unary() {
        // "-5 + 3": negate applied to 5, then binary addition with 3
        let t = toks("-5 + 3");
        assert_eq!(
            t,
            vec![Token::Term {
                tokens: vec![
                    Token::Negative(Some(Box::new(text("5")))),
                    text("+"),
                    text("3"),
                ],
                paren: false,
            }]
        );
    }

    #[test]
    fn minus_after_operand_is_binary() {
        // inside parens, "a - 5" subtracts
        let t = toks("(a - 5)");
        let Token::Term { tokens, .. } = &t[0] else { panic!("expected term") };
        let Token::Term { tokens: inner, paren } = &tokens[0] else { panic!("expected group") };
        assert!(paren);
        assert_eq!(inner.as_slice(), &[text("a"), text("-"), text("5")]);
    }

    #[test]
    fn minus_in_argument_position_is_unary() {
        assert_eq!(
            toks("print -5"),
            vec![text("print"), Token::Negative(Some(Box::new(text("5"))))]
        );
    }

    #[test]
    fn minus_in_expression_tail_is_binary() {
        // third raw token onwards after a plain word: operator
        let t = toks("x = 5 - 3");
        assert_eq!(t[0], text("x"));
        assert_eq!(t[1], text("="));
        assert_eq!(
            t[2],
            Token::Term { tokens: vec![text("5"), text("-"), text("3")], paren: false }
        );
    }

    #[test]
    fn compound_assignment_merged() {
        assert_eq!(toks("x += 5")[1], text("+="));
        assert_eq!(toks("x ^= 2")[1], text("^="));
        assert_eq!(toks("x /= 2")[1], text("/="));
    }

    #[test]
    fn comparison_operators_merged() {
        let t = toks("x = a <= b");
        let Token::Term { tokens, .. } = &t[2] else { panic!("expected term") };
        assert_eq!(tokens.as_slice(), &[text("a"), text("<="), text("b")]);
    }

    #[test]
    fn function_call_brackets() {
        let t = toks("print [max 1 2]");
        assert_eq!(t[0], text("print"));
        let Token::Term { tokens, .. } = &t[1] else { panic!("expected term") };
        assert_eq!(
            tokens[0],
            Token::Call(vec![text("max"), text("1"), text("2")])
        );
    }

    #[test]
    fn array_access_braces() {
        let t = toks("x = {arr i}");
        let Token::Term { tokens, .. } = &t[2] else { panic!("expected term") };
        assert_eq!(
            tokens[0],
            Token::ArrayAccess { base: Box::new(text("arr")), indices: vec![text("i")] }
        );
    }

    #[test]
    fn operators_extend_trailing_term() {
        let t = toks("x = 1 + 2 * 3");
        let Token::Term { tokens, .. } = &t[2] else { panic!("expected term") };
        assert_eq!(
            tokens.as_slice(),
            &[text("1"), text("+"), text("2"), text("*"), text("3")]
        );
    }

    #[test]
    fn paren_group_stays_nested() {
        let t = toks("x = (1 + 2) * 3");
        let Token::Term { tokens, .. } = &t[2] else { panic!("expected term") };
        assert!(matches!(&tokens[0], Token::Term { paren: true, .. }));
        assert_eq!(tokens[1], text("*"));
        assert_eq!(tokens[2], text("3"));
    }

    #[test]
    fn operator_at_line_start_rejected() {
        assert!(tokenize("+ 5").is_err());
    }

    #[test]
    fn unmatched_bracket_rejected() {
        assert!(tokenize("print [max 1 2").is_err());
        assert!(tokenize("x = (1 + 2").is_err());
    }

    #[test]
    fn string_token_unescaped() {
        assert_eq!(toks(r#"print "a\nb""#)[1], Token::Str("a\nb".into()));
    }

    #[test]
    fn dangling_minus_rejected() {
        assert!(tokenize("x = - + 5").is_err());
    }
}
