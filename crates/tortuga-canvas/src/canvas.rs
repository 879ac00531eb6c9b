//! Software render surface: an RGB pixel buffer, the turtle's position and
//! heading, a 2-D affine transform with push/pop stacks, and the raster
//! primitives. Implements both halves of the host contract — drawing through
//! [`RenderSurface`], console text through the attached [`ConsoleBuffer`].

use tortuga_lang::{RenderSurface, Rgb, TextSink};

use crate::console::ConsoleBuffer;
use crate::mat::{self, M3};

pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,

    pos: (f64, f64),
    heading_rad: f64,
    transform: M3,
    matrix_stack: Vec<M3>,
    position_stack: Vec<(f64, f64)>,

    pen_down: bool,
    pen: Rgb,
    show_turtle: bool,
    antialias: bool,

    console: ConsoleBuffer,
}

fn pack(c: Rgb) -> u32 {
    ((c.r as u32) << 16) | ((c.g as u32) << 8) | c.b as u32
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut canvas = Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
            pos: (0.0, 0.0),
            heading_rad: 0.0,
            transform: mat::identity(),
            matrix_stack: Vec::new(),
            position_stack: Vec::new(),
            pen_down: true,
            pen: Rgb::WHITE,
            show_turtle: true,
            antialias: false,
            console: ConsoleBuffer::new(),
        };
        // start centered: identity translated to the middle, saved so a
        // popMatrix returns here
        canvas.transform = mat::translation(width as f64 / 2.0, height as f64 / 2.0);
        canvas.matrix_stack.push(canvas.transform);
        canvas
    }

    /// Shared handle to this canvas's console; the embedder reads output and
    /// feeds input lines through it.
    pub fn console(&self) -> ConsoleBuffer {
        self.console.clone()
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    pub fn turtle_position(&self) -> (f64, f64) {
        self.pos
    }

    pub fn turtle_heading_degrees(&self) -> f64 {
        self.heading_rad.to_degrees()
    }

    pub fn is_turtle_shown(&self) -> bool {
        self.show_turtle
    }

    pub fn is_antialiasing(&self) -> bool {
        self.antialias
    }

    pub fn pen_rgb(&self) -> Rgb {
        self.pen
    }

    // ─── Raster primitives ───────────────────────────────────────────────────

    fn put(&mut self, x: i64, y: i64, color: u32) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            self.pixels[(y as u32 * self.width + x as u32) as usize] = color;
        }
    }

    fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64)) {
        let color = pack(self.pen);
        let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
        let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn transformed(&self, p: (f64, f64)) -> (f64, f64) {
        mat::apply(&self.transform, p)
    }

    fn fill(&mut self, color: Rgb) {
        let packed = pack(color);
        self.pixels.fill(packed);
    }
}

impl RenderSurface for Canvas {
    fn forward(&mut self, distance: f64) {
        let (s, c) = self.heading_rad.sin_cos();
        let next = (self.pos.0 + c * distance, self.pos.1 + s * distance);
        if self.pen_down {
            let a = self.transformed(self.pos);
            let b = self.transformed(next);
            self.draw_segment(a, b);
        }
        self.pos = next;
    }

    fn backward(&mut self, distance: f64) {
        self.forward(-distance);
    }

    fn left(&mut self, angle_degrees: f64) {
        self.heading_rad -= angle_degrees.to_radians();
    }

    fn right(&mut self, angle_degrees: f64) {
        self.heading_rad += angle_degrees.to_radians();
    }

    fn reset_rotation(&mut self) {
        self.heading_rad = 0.0;
    }

    fn rotate(&mut self, angle_degrees: f64) {
        self.transform = mat::mul(&self.transform, &mat::rotation(angle_degrees.to_radians()));
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.transform = mat::mul(&self.transform, &mat::translation(dx, dy));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.transform = mat::mul(&self.transform, &mat::scaling(sx, sy));
    }

    fn skew(&mut self, kx: f64, ky: f64) {
        self.transform = mat::mul(&self.transform, &mat::shear(kx, ky));
    }

    fn push_matrix(&mut self) {
        self.matrix_stack.push(self.transform);
    }

    fn pop_matrix(&mut self) {
        if let Some(m) = self.matrix_stack.pop() {
            self.transform = m;
        }
    }

    fn reset_matrix(&mut self) {
        self.transform = mat::identity();
    }

    fn push_position(&mut self) {
        self.position_stack.push(self.pos);
    }

    fn pop_position(&mut self) {
        if let Some(p) = self.position_stack.pop() {
            self.pos = p;
        }
    }

    fn set_position(&mut self, x: f64, y: f64) {
        self.pos = (x, y);
    }

    fn pen_up(&mut self) {
        self.pen_down = false;
    }

    fn pen_down(&mut self) {
        self.pen_down = true;
    }

    fn pen_color(&mut self, r: f64, g: f64, b: f64) {
        self.pen = Rgb {
            r: r.clamp(0.0, 255.0) as u8,
            g: g.clamp(0.0, 255.0) as u8,
            b: b.clamp(0.0, 255.0) as u8,
        };
    }

    fn set_show_turtle(&mut self, show: bool) {
        self.show_turtle = show;
    }

    fn set_antialiasing(&mut self, on: bool) {
        // stored as a rendering hint; the rasterizer itself is hard-edged
        self.antialias = on;
    }

    fn point(&mut self, x: f64, y: f64) {
        let (px, py) = self.transformed((x, y));
        let color = pack(self.pen);
        self.put(px.round() as i64, py.round() as i64, color);
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let a = self.transformed((x1, y1));
        let b = self.transformed((x2, y2));
        self.draw_segment(a, b);
    }

    fn triangle(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        let a = self.transformed((x1, y1));
        let b = self.transformed((x2, y2));
        let c = self.transformed((x3, y3));
        self.draw_segment(a, b);
        self.draw_segment(b, c);
        self.draw_segment(c, a);
    }

    fn polygon(&mut self, xs: &[f64], ys: &[f64]) {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return;
        }
        let pts: Vec<(f64, f64)> = (0..n).map(|i| self.transformed((xs[i], ys[i]))).collect();
        for i in 0..n {
            self.draw_segment(pts[i], pts[(i + 1) % n]);
        }
    }

    fn ellipse(&mut self, x: f64, y: f64, w: f64, h: f64) {
        // filled; the transform moves the bounding box, the radii stay in
        // surface units
        let (cx, cy) = self.transformed((x + w / 2.0, y + h / 2.0));
        let (rx, ry) = (w.abs() / 2.0, h.abs() / 2.0);
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let color = pack(self.pen);
        let top = (cy - ry).floor() as i64;
        let bottom = (cy + ry).ceil() as i64;
        for py in top..=bottom {
            let dy = (py as f64 - cy) / ry;
            let rest = 1.0 - dy * dy;
            if rest < 0.0 {
                continue;
            }
            let span = rest.sqrt() * rx;
            let from = (cx - span).round() as i64;
            let to = (cx + span).round() as i64;
            for px in from..=to {
                self.put(px, py, color);
            }
        }
    }

    fn clear(&mut self, color: Rgb) {
        self.fill(color);
    }

    fn reset(&mut self) {
        self.reset_rotation();
        self.reset_matrix();
        self.fill(Rgb::BLACK);
        self.set_position(self.width as f64 / 2.0, self.height as f64 / 2.0);
        self.pen_down = true;
        self.show_turtle = true;
        self.pen = Rgb::WHITE;
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl TextSink for Canvas {
    fn print(&mut self, text: &str) {
        self.console.print(text);
    }

    fn println(&mut self, text: &str) {
        self.console.println(text);
    }

    fn print_err_line(&mut self, text: &str) {
        self.console.print_err_line(text);
    }

    fn clear_output(&mut self) {
        self.console.clear_output();
    }

    fn pop_input_string(&mut self) -> String {
        self.console.pop_input_string()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
