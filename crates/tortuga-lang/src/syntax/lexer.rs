//! Raw lexical splitting: source text → raw string tokens and logical lines.
//! No token classification happens here; that is the tokenizer's job.

use crate::error::ParseError;

/// Characters that always form a token of their own.
const DELIMITERS: &[char] = &['+', '-', '*', '=', '/', '^', '[', ']', '(', ')', '{', '}'];

/// Splits one logical line into raw string tokens.
///
/// Whitespace separates tokens; every delimiter character is its own token.
/// Single-quoted character literals (`'x'`, exactly one interior character)
/// and double-quoted strings are kept whole, quotes included. Errors carry no
/// location — the caller attaches the line.
pub fn split_raw(line: &str) -> Result<Vec<String>, ParseError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if DELIMITERS.contains(&ch) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(ch.to_string());
        } else if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else if ch == '\'' {
            // 'x' — exactly one interior character
            if i + 2 >= chars.len() || chars[i + 2] != '\'' {
                return Err(ParseError::new("' without matching '"));
            }
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(chars[i..i + 3].iter().collect());
            i += 2;
        } else if ch == '"' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            // scan to the next unescaped quote, counting backslash run parity
            let mut j = i + 1;
            let mut backslashes = 0usize;
            loop {
                if j >= chars.len() {
                    return Err(ParseError::new("\" without matching \""));
                }
                let c = chars[j];
                if c == '"' && backslashes % 2 == 0 {
                    break;
                }
                if c == '\\' {
                    backslashes += 1;
                } else {
                    backslashes = 0;
                }
                j += 1;
            }
            tokens.push(chars[i..=j].iter().collect());
            i = j;
        } else {
            current.push(ch);
        }
        i += 1;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Replaces the escape sequences of a string literal body: `\n`, `\r`, `\t`,
/// `\"`, `\\`. Unknown escapes are kept verbatim.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ─── Logical lines ────────────────────────────────────────────────────────────

/// Strips `// …` comments up to end of line. Quote-aware: a `//` inside a
/// string or character literal is content, not a comment.
pub fn strip_comments(source: &str) -> String {
    source
        .lines()
        .map(|l| match comment_start(l) {
            Some(idx) => &l[..idx],
            None => l,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte index of the first `//` outside any literal, scanning with the same
/// quote rules as `split_raw`.
fn comment_start(line: &str) -> Option<usize> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i].1 {
            '/' if chars.get(i + 1).is_some_and(|c| c.1 == '/') => return Some(chars[i].0),
            // 'x' — the interior character may be anything, '/' and '"' included
            '\'' if i + 2 < chars.len() && chars[i + 2].1 == '\'' => i += 3,
            '"' => {
                // scan to the next unescaped quote, counting backslash run parity
                let mut backslashes = 0usize;
                i += 1;
                loop {
                    if i >= chars.len() {
                        // unterminated; leave the line for the lexer to report
                        return None;
                    }
                    let c = chars[i].1;
                    i += 1;
                    if c == '"' && backslashes % 2 == 0 {
                        break;
                    }
                    if c == '\\' {
                        backslashes += 1;
                    } else {
                        backslashes = 0;
                    }
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Splits a chunk into trimmed logical lines. A line whose trailing `_` is
/// preceded by whitespace continues on the next line.
pub fn lines(chunk: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut carry: Option<String> = None;
    for raw in chunk.split('\n') {
        let line = raw.trim_end_matches('\r');
        let merged = match carry.take() {
            Some(prev) => format!("{} {}", prev.trim_end(), line.trim_start()),
            None => line.to_string(),
        };
        match continuation_body(&merged) {
            Some(body) => carry = Some(body.to_string()),
            None => out.push(merged.trim().to_string()),
        }
    }
    if let Some(rest) = carry {
        out.push(rest.trim().to_string());
    }
    out
}

/// If the line ends in `_` preceded by whitespace, returns the line without
/// the continuation marker.
fn continuation_body(line: &str) -> Option<&str> {
    let stripped = line.strip_suffix('_')?;
    let last = stripped.chars().last()?;
    if last == ' ' || last == '\t' { Some(stripped) } else { None }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(line: &str) -> Vec<String> {
        split_raw(line).unwrap()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(raw("forward 100"), vec!["forward", "100"]);
    }

    #[test]
    fn delimiters_are_own_tokens() {
        assert_eq!(raw("x=a+b*2"), vec!["x", "=", "a", "+", "b", "*", "2"]);
        assert_eq!(raw("(1-2)"), vec!["(", "1", "-", "2", ")"]);
    }

    #[test]
    fn brackets_and_braces() {
        assert_eq!(raw("print [sqrt 2]"), vec!["print", "[", "sqrt", "2", "]"]);
        assert_eq!(raw("{arr i}"), vec!["{", "arr", "i", "}"]);
    }

    #[test]
    fn char_literal_kept_whole() {
        assert_eq!(raw("char c = 'x'"), vec!["char", "c", "=", "'x'"]);
    }

    #[test]
    fn char_literal_unterminated() {
        assert!(split_raw("'x").is_err());
        assert!(split_raw("'").is_err());
    }

    #[test]
    fn string_kept_whole() {
        assert_eq!(raw(r#"print "a b c""#), vec!["print", r#""a b c""#]);
    }

    #[test]
    fn string_with_escaped_quote() {
        assert_eq!(raw(r#""a\"b""#), vec![r#""a\"b""#]);
    }

    #[test]
    fn string_with_escaped_backslash_then_quote() {
        // the backslash is escaped, so the quote terminates
        assert_eq!(raw(r#""a\\""#), vec![r#""a\\""#]);
    }

    #[test]
    fn string_unterminated() {
        assert!(split_raw(r#""abc"#).is_err());
    }

    #[test]
    fn unescape_known_sequences() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"a\tb"), "a\tb");
        assert_eq!(unescape(r#"a\"b"#), "a\"b");
        assert_eq!(unescape(r"a\\n"), "a\\n");
    }

    #[test]
    fn unescape_unknown_kept() {
        assert_eq!(unescape(r"a\qb"), r"a\qb");
    }

    #[test]
    fn comments_stripped() {
        assert_eq!(strip_comments("fd 10 // go\nrt 90"), "fd 10 \nrt 90");
    }

    #[test]
    fn comment_marker_inside_string_preserved() {
        assert_eq!(
            strip_comments("print \"http://example.com\" // note"),
            "print \"http://example.com\" "
        );
    }

    #[test]
    fn comment_scan_honors_escaped_quotes() {
        assert_eq!(
            strip_comments(r#"print "a\"//b" // c"#),
            r#"print "a\"//b" "#
        );
    }

    #[test]
    fn comment_marker_inside_char_literal_preserved() {
        assert_eq!(strip_comments("char c = '/' // slash"), "char c = '/' ");
    }

    #[test]
    fn unterminated_string_leaves_line_for_the_lexer() {
        assert_eq!(strip_comments("print \"oops // not a comment"), "print \"oops // not a comment");
    }

    #[test]
    fn continuation_joined() {
        let ls = lines("print a _\n   b\nfd 10");
        assert_eq!(ls[0], "print a b");
        assert_eq!(ls[1], "fd 10");
    }

    #[test]
    fn underscore_without_space_is_not_continuation() {
        let ls = lines("x_\ny");
        assert_eq!(ls, vec!["x_", "y"]);
    }
}
