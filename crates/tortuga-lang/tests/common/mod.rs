//! Shared test host: records every surface call and captured output so tests
//! can assert on what a program actually did.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tortuga_lang::{Interpreter, Program, RenderSurface, Rgb, RuntimeError, TextSink};

#[derive(Default)]
pub struct HostState {
    pub prints: Vec<String>,
    pub errors: Vec<String>,
    pub calls: Vec<String>,
    pub input: VecDeque<String>,
    pub cleared_output: usize,
}

/// Clones share state, so a test can keep a view while the engine owns the
/// host.
#[derive(Clone, Default)]
pub struct TestHost {
    pub state: Arc<Mutex<HostState>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prints(&self) -> Vec<String> {
        self.state.lock().prints.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.state.lock().errors.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn queue_input(&self, line: &str) {
        self.state.lock().input.push_back(line.to_string());
    }

    fn record(&mut self, call: String) {
        self.state.lock().calls.push(call);
    }
}

impl RenderSurface for TestHost {
    fn forward(&mut self, d: f64) {
        self.record(format!("forward {d}"));
    }
    fn backward(&mut self, d: f64) {
        self.record(format!("backward {d}"));
    }
    fn left(&mut self, a: f64) {
        self.record(format!("left {a}"));
    }
    fn right(&mut self, a: f64) {
        self.record(format!("right {a}"));
    }
    fn reset_rotation(&mut self) {
        self.record("resetRotation".into());
    }
    fn rotate(&mut self, a: f64) {
        self.record(format!("rotate {a}"));
    }
    fn translate(&mut self, x: f64, y: f64) {
        self.record(format!("translate {x} {y}"));
    }
    fn scale(&mut self, x: f64, y: f64) {
        self.record(format!("scale {x} {y}"));
    }
    fn skew(&mut self, x: f64, y: f64) {
        self.record(format!("skew {x} {y}"));
    }
    fn push_matrix(&mut self) {
        self.record("pushMatrix".into());
    }
    fn pop_matrix(&mut self) {
        self.record("popMatrix".into());
    }
    fn reset_matrix(&mut self) {
        self.record("resetMatrix".into());
    }
    fn push_position(&mut self) {
        self.record("pushPosition".into());
    }
    fn pop_position(&mut self) {
        self.record("popPosition".into());
    }
    fn set_position(&mut self, x: f64, y: f64) {
        self.record(format!("setPosition {x} {y}"));
    }
    fn pen_up(&mut self) {
        self.record("penUp".into());
    }
    fn pen_down(&mut self) {
        self.record("penDown".into());
    }
    fn pen_color(&mut self, r: f64, g: f64, b: f64) {
        self.record(format!("penColor {r} {g} {b}"));
    }
    fn set_show_turtle(&mut self, show: bool) {
        self.record(format!("showTurtle {show}"));
    }
    fn set_antialiasing(&mut self, on: bool) {
        self.record(format!("antialiasing {on}"));
    }
    fn point(&mut self, x: f64, y: f64) {
        self.record(format!("point {x} {y}"));
    }
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.record(format!("line {x1} {y1} {x2} {y2}"));
    }
    fn triangle(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.record(format!("triangle {x1} {y1} {x2} {y2} {x3} {y3}"));
    }
    fn polygon(&mut self, xs: &[f64], ys: &[f64]) {
        self.record(format!("polygon {xs:?} {ys:?}"));
    }
    fn ellipse(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.record(format!("ellipse {x} {y} {w} {h}"));
    }
    fn clear(&mut self, color: Rgb) {
        self.record(format!("clear {} {} {}", color.r, color.g, color.b));
    }
    fn reset(&mut self) {
        self.record("reset".into());
    }
    fn width(&self) -> u32 {
        400
    }
    fn height(&self) -> u32 {
        300
    }
}

impl TextSink for TestHost {
    fn print(&mut self, text: &str) {
        self.state.lock().prints.push(text.to_string());
    }

    fn println(&mut self, text: &str) {
        self.state.lock().prints.push(text.to_string());
    }

    fn print_err_line(&mut self, text: &str) {
        self.state.lock().errors.push(text.to_string());
    }

    fn clear_output(&mut self) {
        let mut s = self.state.lock();
        s.prints.clear();
        s.cleared_output += 1;
    }

    fn pop_input_string(&mut self) -> String {
        loop {
            if let Some(line) = self.state.lock().input.pop_front() {
                return line;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}

// ─── Driver helpers ──────────────────────────────────────────────────────────

pub fn compile(src: &str) -> Program {
    tortuga_lang::compile(src).unwrap_or_else(|e| panic!("compile failed: {e:?}"))
}

pub fn run(src: &str) -> TestHost {
    let mut interp = Interpreter::new(compile(src));
    let host = TestHost::new();
    let mut h = host.clone();
    interp.run(&mut h).unwrap_or_else(|e| panic!("run failed: {e:?}"));
    host
}

pub fn run_err(src: &str) -> RuntimeError {
    let mut interp = Interpreter::new(compile(src));
    let mut host = TestHost::new();
    match interp.run(&mut host) {
        Ok(()) => panic!("expected a runtime error"),
        Err(e) => e,
    }
}

pub fn prints(src: &str) -> Vec<String> {
    run(src).prints()
}
