//! The execution engine: one worker thread owns the host surface and the
//! interpreter state and drains a message queue of run requests, frame ticks,
//! input events and console lines. The 60 Hz ticker and input events go
//! through bounded channels with `try_send`, so a busy worker skips the
//! frame or event instead of queueing behind a stalled callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use tracing::{debug, info, warn};

use crate::console::{self, ConsoleInput, Directive};
use crate::error::{ParseError, RuntimeError};
use crate::runtime::interpreter::Interpreter;
use crate::surface::{Highlighter, Host, TextSink};
use crate::types::variable::Variable;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Redraw cadence; the `draw` callback fires at most this often.
    pub frame_interval: Duration,
    /// How long error lines stay highlighted; negative means indefinitely.
    pub highlight_millis: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { frame_interval: Duration::from_millis(1000 / 60), highlight_millis: 10_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    Clicked,
    Pressed,
    Released,
    Dragged,
    Moved,
}

impl MouseEvent {
    fn callback_name(self) -> &'static str {
        match self {
            MouseEvent::Clicked => "mouseclicked",
            MouseEvent::Pressed => "mousepressed",
            MouseEvent::Released => "mousereleased",
            MouseEvent::Dragged => "mousedragged",
            MouseEvent::Moved => "mousemoved",
        }
    }
}

type FinishFn = Box<dyn FnOnce() + Send>;

enum Control {
    Run { source: String, on_finish: Option<FinishFn> },
    Console(String),
    Stop,
    Shutdown,
}

/// Handle to a running engine. Dropping it shuts the threads down; a worker
/// blocked in `pop_input_string` must be released (by feeding input or
/// stopping the program) before the handle is dropped.
pub struct Engine {
    control: Sender<Control>,
    events: Sender<(MouseEvent, i64, i64)>,
    running: Arc<AtomicBool>,
    ticker_stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn spawn<H: Host + Send + 'static>(host: H) -> Engine {
        Self::with_config(host, None, EngineConfig::default())
    }

    pub fn with_config<H: Host + Send + 'static>(
        host: H,
        highlighter: Option<Box<dyn Highlighter + Send>>,
        config: EngineConfig,
    ) -> Engine {
        let (control_tx, control_rx) = unbounded();
        let (event_tx, event_rx) = bounded(16);
        // capacity one: a tick that arrives while one is pending is dropped
        let (tick_tx, tick_rx) = bounded(1);

        let running = Arc::new(AtomicBool::new(false));
        let ticker_stop = Arc::new(AtomicBool::new(false));

        let interval = config.frame_interval;
        let stop_flag = ticker_stop.clone();
        let ticker = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                let _ = tick_tx.try_send(());
            }
        });

        let flag = running.clone();
        let worker = std::thread::spawn(move || {
            Worker { host, highlighter, config, interp: None, scratch: None, on_finish: None, running: flag }
                .run(control_rx, event_rx, tick_rx);
        });

        Engine {
            control: control_tx,
            events: event_tx,
            running,
            ticker_stop,
            worker: Some(worker),
            ticker: Some(ticker),
        }
    }

    /// Queues a program for compilation and execution. A program already
    /// running is stopped first.
    pub fn run_program(&self, source: impl Into<String>) {
        let _ = self.control.send(Control::Run { source: source.into(), on_finish: None });
    }

    /// Like [`Engine::run_program`], with a completion callback fired exactly
    /// once when the run finishes, stops or faults.
    pub fn run_program_with(&self, source: impl Into<String>, on_finish: impl FnOnce() + Send + 'static) {
        let _ = self
            .control
            .send(Control::Run { source: source.into(), on_finish: Some(Box::new(on_finish)) });
    }

    /// Routes a console command line (`/statement` or `\directive`). Plain
    /// input lines for the blocking reader go to the embedder's input buffer
    /// instead.
    pub fn console_line(&self, line: impl Into<String>) {
        let _ = self.control.send(Control::Console(line.into()));
    }

    /// Forwards an input event. Dropped, not queued, when the worker is busy.
    pub fn mouse_event(&self, event: MouseEvent, x: i64, y: i64) {
        let _ = self.events.try_send((event, x, y));
    }

    /// Requests a stop; idempotent, a no-op when nothing is running.
    pub fn stop(&self) {
        let _ = self.control.send(Control::Stop);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.ticker_stop.store(true, Ordering::Relaxed);
        let _ = self.control.send(Control::Shutdown);
        if let Some(t) = self.ticker.take() {
            let _ = t.join();
        }
        if let Some(w) = self.worker.take() {
            let _ = w.join();
        }
    }
}

// ─── Worker ───────────────────────────────────────────────────────────────────

struct Worker<H> {
    host: H,
    highlighter: Option<Box<dyn Highlighter + Send>>,
    config: EngineConfig,
    /// The resident program, kept alive while it has callbacks to serve.
    interp: Option<Interpreter>,
    /// Scope for console statements typed while nothing is running.
    scratch: Option<Interpreter>,
    on_finish: Option<FinishFn>,
    running: Arc<AtomicBool>,
}

impl<H: Host> Worker<H> {
    fn run(
        mut self,
        control: Receiver<Control>,
        events: Receiver<(MouseEvent, i64, i64)>,
        ticks: Receiver<()>,
    ) {
        loop {
            select! {
                recv(control) -> msg => match msg {
                    Ok(Control::Run { source, on_finish }) => self.start(source, on_finish),
                    Ok(Control::Console(line)) => self.console(&line),
                    Ok(Control::Stop) => self.finish_run(),
                    Ok(Control::Shutdown) | Err(_) => break,
                },
                recv(events) -> msg => {
                    if let Ok((event, x, y)) = msg {
                        self.dispatch_event(event, x, y);
                    }
                },
                recv(ticks) -> msg => {
                    if msg.is_ok() {
                        self.tick();
                    }
                },
            }
        }
        self.finish_run();
    }

    fn start(&mut self, source: String, on_finish: Option<FinishFn>) {
        // stop whatever was running; its completion callback fires now
        self.finish_run();
        self.on_finish = on_finish;

        info!(target: "tortuga::engine", "compiling program ({} bytes)", source.len());
        let program = match crate::compile(&source) {
            Ok(p) => p,
            Err(e) => {
                self.report_parse(&e);
                self.finish_run();
                return;
            }
        };

        let mut interp = Interpreter::new(program);
        self.running.store(true, Ordering::SeqCst);
        match interp.run(&mut self.host) {
            Err(e) => {
                self.report_runtime(&e);
                self.finish_run();
            }
            Ok(()) => {
                if interp.has_callbacks() {
                    debug!(target: "tortuga::engine", "program resident, dispatching callbacks");
                    self.interp = Some(interp);
                } else {
                    self.finish_run();
                }
            }
        }
    }

    fn tick(&mut self) {
        let Some(interp) = self.interp.as_mut() else { return };
        if let Err(e) = interp.invoke_callback(&mut self.host, "draw", &[]) {
            self.report_runtime(&e);
            self.finish_run();
        }
    }

    fn dispatch_event(&mut self, event: MouseEvent, x: i64, y: i64) {
        let Some(interp) = self.interp.as_mut() else { return };
        let args = [Variable::Int(x), Variable::Int(y)];
        match interp.invoke_callback(&mut self.host, event.callback_name(), &args) {
            Ok(_) => {}
            Err(e) => {
                self.report_runtime(&e);
                self.finish_run();
            }
        }
    }

    fn console(&mut self, line: &str) {
        match console::route(line) {
            ConsoleInput::Ignored | ConsoleInput::Line(_) => {}
            ConsoleInput::Statement(stmt) => self.console_statement(stmt),
            ConsoleInput::Directive(Directive::Clear) => self.host.clear_output(),
            ConsoleInput::Directive(Directive::Stop) => self.finish_run(),
            ConsoleInput::Directive(Directive::Help) => self.host.println(console::HELP_TEXT),
            ConsoleInput::Unknown(word) => {
                self.host.print_err_line(&format!("invalid console command: \"{word}\""));
            }
        }
    }

    fn console_statement(&mut self, stmt: &str) {
        if self.interp.is_none() && self.scratch.is_none() {
            match crate::compile("") {
                Ok(p) => self.scratch = Some(Interpreter::new(p)),
                Err(e) => {
                    self.report_parse(&e);
                    return;
                }
            }
        }
        let interp = match self.interp.as_mut() {
            Some(i) => i,
            None => self.scratch.as_mut().expect("scratch created above"),
        };
        let statement = match crate::compile_line(stmt, interp.registry()) {
            Ok(s) => s,
            Err(e) => {
                self.host.print_err_line(&e.to_string());
                return;
            }
        };
        if let Err(e) = interp.execute_statement(&mut self.host, &statement) {
            self.host.print_err_line(&e.to_string());
        }
    }

    /// Drops the program and fires the pending completion callback once.
    /// Safe to call when nothing is running.
    fn finish_run(&mut self) {
        if self.interp.take().is_some() {
            info!(target: "tortuga::engine", "execution finished");
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(f) = self.on_finish.take() {
            f();
        }
    }

    fn report_parse(&mut self, e: &ParseError) {
        warn!(target: "tortuga::engine", line = ?e.line, "parse error: {e}");
        self.host.print_err_line(&e.to_string());
        if let (Some(line), Some(h)) = (e.line, self.highlighter.as_mut()) {
            h.highlight_line(line, self.config.highlight_millis);
        }
    }

    fn report_runtime(&mut self, e: &RuntimeError) {
        warn!(target: "tortuga::engine", line = ?e.line, "runtime error: {e}");
        self.host.print_err_line(&e.to_string());
        if let (Some(line), Some(h)) = (e.line, self.highlighter.as_mut()) {
            h.highlight_line(line, self.config.highlight_millis);
        }
    }
}
