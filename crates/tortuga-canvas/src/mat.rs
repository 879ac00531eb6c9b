//! Pure 2-D matrix helpers. Row-major storage: element at (row, col) =
//! data[row * 3 + col].

pub type M3 = [f64; 9];

pub fn identity() -> M3 {
    [1., 0., 0.,
     0., 1., 0.,
     0., 0., 1.]
}

pub fn mul(a: &M3, b: &M3) -> M3 {
    let mut c = [0.0f64; 9];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                c[i * 3 + j] += a[i * 3 + k] * b[k * 3 + j];
            }
        }
    }
    c
}

/// Applies the matrix to an affine point.
pub fn apply(m: &M3, (x, y): (f64, f64)) -> (f64, f64) {
    (
        m[0] * x + m[1] * y + m[2],
        m[3] * x + m[4] * y + m[5],
    )
}

pub fn translation(tx: f64, ty: f64) -> M3 {
    [1., 0., tx,
     0., 1., ty,
     0., 0.,  1.]
}

pub fn rotation(angle_rad: f64) -> M3 {
    let (s, c) = angle_rad.sin_cos();
    [ c, -s, 0.,
      s,  c, 0.,
      0., 0., 1.]
}

pub fn scaling(sx: f64, sy: f64) -> M3 {
    [sx,  0., 0.,
      0., sy, 0.,
      0., 0., 1.]
}

pub fn shear(kx: f64, ky: f64) -> M3 {
    [1., kx, 0.,
     ky, 1., 0.,
     0., 0., 1.]
}
