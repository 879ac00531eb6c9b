//! Boundary contracts the interpreter runs against. Implementations live
//! outside the language core (see the `tortuga-canvas` crate); tests use
//! small recording fakes.

use crate::types::variable::Rgb;

/// The shared drawing surface: turtle movement, transform stack and raster
/// primitives. Angles are degrees; coordinates are surface pixels run through
/// the current transform.
pub trait RenderSurface {
    fn forward(&mut self, distance: f64);
    fn backward(&mut self, distance: f64);
    fn left(&mut self, angle_degrees: f64);
    fn right(&mut self, angle_degrees: f64);
    fn reset_rotation(&mut self);

    fn rotate(&mut self, angle_degrees: f64);
    fn translate(&mut self, dx: f64, dy: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    fn skew(&mut self, kx: f64, ky: f64);
    fn push_matrix(&mut self);
    fn pop_matrix(&mut self);
    fn reset_matrix(&mut self);

    fn push_position(&mut self);
    fn pop_position(&mut self);
    fn set_position(&mut self, x: f64, y: f64);

    fn pen_up(&mut self);
    fn pen_down(&mut self);
    /// Channels arrive clamped to `[0, 255]`.
    fn pen_color(&mut self, r: f64, g: f64, b: f64);
    fn set_show_turtle(&mut self, show: bool);
    fn set_antialiasing(&mut self, on: bool);

    fn point(&mut self, x: f64, y: f64);
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64);
    fn triangle(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64);
    fn polygon(&mut self, xs: &[f64], ys: &[f64]);
    fn ellipse(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn clear(&mut self, color: Rgb);
    /// Restores rotation, transform, pen (down, white), turtle visibility,
    /// clears to black and recenters.
    fn reset(&mut self);

    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Program and diagnostic text output plus the blocking line-input source.
pub trait TextSink {
    fn print(&mut self, text: &str);
    fn println(&mut self, text: &str);
    fn print_err_line(&mut self, text: &str);
    fn clear_output(&mut self);
    /// Blocks until the user types a line; never returns early. Must only be
    /// called from program-execution context, never from a UI thread.
    fn pop_input_string(&mut self) -> String;
}

/// Everything the interpreter needs from its embedder.
pub trait Host: RenderSurface + TextSink {}

impl<T: RenderSurface + TextSink + ?Sized> Host for T {}

/// Advisory error-location feedback: highlight `line` (zero-based) for
/// `millis` milliseconds, or indefinitely if `millis` is negative. Failures
/// to honor this must not affect program execution.
pub trait Highlighter {
    fn highlight_line(&mut self, line: usize, millis: i64);
}
