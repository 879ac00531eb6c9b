//! Shared console buffer: program output, diagnostics, and the queue that
//! feeds the blocking `input` primitive. Clones share one buffer, so the UI
//! side can feed input while the engine worker reads.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tortuga_lang::TextSink;

/// How long the blocking reader sleeps between polls.
const INPUT_POLL: Duration = Duration::from_millis(30);

#[derive(Clone, Default)]
pub struct ConsoleBuffer {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    output: Mutex<String>,
    errors: Mutex<Vec<String>>,
    input: Mutex<VecDeque<String>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a line for the blocking reader. Called from the UI side.
    pub fn push_input(&self, line: impl Into<String>) {
        self.inner.input.lock().push_back(line.into());
    }

    pub fn output(&self) -> String {
        self.inner.output.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.inner.errors.lock().clone()
    }
}

impl TextSink for ConsoleBuffer {
    fn print(&mut self, text: &str) {
        self.inner.output.lock().push_str(text);
    }

    fn println(&mut self, text: &str) {
        let mut out = self.inner.output.lock();
        out.push_str(text);
        out.push('\n');
    }

    fn print_err_line(&mut self, text: &str) {
        self.inner.errors.lock().push(text.to_string());
    }

    fn clear_output(&mut self) {
        self.inner.output.lock().clear();
        self.inner.errors.lock().clear();
    }

    fn pop_input_string(&mut self) -> String {
        // spin with a short sleep until a line arrives; only ever called from
        // program-execution context
        loop {
            if let Some(line) = self.inner.input.lock().pop_front() {
                return line;
            }
            std::thread::sleep(INPUT_POLL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_accumulates() {
        let mut c = ConsoleBuffer::new();
        c.print("a");
        c.println("b");
        assert_eq!(c.output(), "ab\n");
        c.clear_output();
        assert_eq!(c.output(), "");
    }

    #[test]
    fn clones_share_the_buffer() {
        let mut c = ConsoleBuffer::new();
        let view = c.clone();
        c.println("hello");
        assert_eq!(view.output(), "hello\n");
    }

    #[test]
    fn queued_input_is_popped_in_order() {
        let mut c = ConsoleBuffer::new();
        c.push_input("one");
        c.push_input("two");
        assert_eq!(c.pop_input_string(), "one");
        assert_eq!(c.pop_input_string(), "two");
    }
}
