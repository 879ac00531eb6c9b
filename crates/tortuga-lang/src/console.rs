//! Console command-line routing. A single line is either program input, a
//! `/statement` executed against the running scope, or a `\directive`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `\clear` / `\cls` — clear the console output.
    Clear,
    /// `\stop` — stop the current execution (no-op when idle).
    Stop,
    /// `\help` — print the directive summary.
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput<'a> {
    /// `//…` or `\\…` — ignored.
    Ignored,
    /// `/stmt` — one statement, run against the active program's scope or a
    /// synthetic top-level scope when nothing is running.
    Statement(&'a str),
    Directive(Directive),
    /// An unrecognized backslash directive.
    Unknown(&'a str),
    /// Plain text: the next line for the blocking input source.
    Line(&'a str),
}

pub const HELP_TEXT: &str = "console commands:\n\
    \t/<statement>: executes a single statement\n\
    \t\\clear, \\cls: clears the console\n\
    \t\\stop: stops the current execution\n\
    \t\\help: shows this message";

pub fn route(line: &str) -> ConsoleInput<'_> {
    if line.starts_with("//") || line.starts_with("\\\\") {
        return ConsoleInput::Ignored;
    }
    if let Some(stmt) = line.strip_prefix('/') {
        return ConsoleInput::Statement(stmt);
    }
    if line.starts_with('\\') {
        let word = line.split_whitespace().next().unwrap_or(line);
        return match word.to_ascii_lowercase().as_str() {
            "\\clear" | "\\cls" => ConsoleInput::Directive(Directive::Clear),
            "\\stop" => ConsoleInput::Directive(Directive::Stop),
            "\\help" => ConsoleInput::Directive(Directive::Help),
            _ => ConsoleInput::Unknown(word),
        };
    }
    ConsoleInput::Line(line)
}
