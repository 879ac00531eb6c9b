//! Software host for the tortuga interpreter: a pixel-buffer canvas with
//! turtle and transform state, and a shared console buffer for program
//! output and blocking line input. [`Canvas`] implements the full host
//! contract, so it can be handed straight to `tortuga_lang::Engine::spawn`.

pub mod canvas;
pub mod console;
pub mod mat;

pub use canvas::Canvas;
pub use console::ConsoleBuffer;
