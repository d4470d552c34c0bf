use super::Vec2;

/// 4×4 transform, column-major (`m[col * 4 + row]`), applied to column vectors.
///
/// Entries are addressed with zero-based `(row, col)`; the journal's
/// translation test talks about the 1-based `a11 .. a44` of the usual notation,
/// which is `get(0, 0) .. get(3, 3)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Matrix {
    m: [f32; 16],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[inline]
    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    #[inline]
    pub const fn to_cols_array(&self) -> [f32; 16] {
        self.m
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.m[col * 4 + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: f32) {
        self.m[col * 4 + row] = v;
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.set(0, 3, x);
        m.set(1, 3, y);
        m.set(2, 3, z);
        m
    }

    pub fn scaling(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.set(0, 0, x);
        m.set(1, 1, y);
        m.set(2, 2, z);
        m
    }

    /// Rotation about +Z by `degrees` (counter-clockwise in a +Y-up frame).
    pub fn rotation_z(degrees: f32) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut m = Self::IDENTITY;
        m.set(0, 0, c);
        m.set(0, 1, -s);
        m.set(1, 0, s);
        m.set(1, 1, c);
        m
    }

    /// Orthographic projection mapping `[left, right] × [bottom, top]` to NDC.
    pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.set(0, 0, 2.0 / (right - left));
        m.set(1, 1, 2.0 / (top - bottom));
        m.set(2, 2, -2.0 / (far - near));
        m.set(0, 3, -(right + left) / (right - left));
        m.set(1, 3, -(top + bottom) / (top - bottom));
        m.set(2, 3, -(far + near) / (far - near));
        m
    }

    /// `self * rhs`: `rhs` is applied first.
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += self.get(row, k) * rhs.get(k, col);
                }
                out[col * 4 + row] = acc;
            }
        }
        Matrix { m: out }
    }

    /// Post-multiplies a translation (`self * T(x, y, z)`).
    #[inline]
    pub fn translate(&self, x: f32, y: f32, z: f32) -> Matrix {
        self.multiply(&Matrix::translation(x, y, z))
    }

    #[inline]
    pub fn scale(&self, x: f32, y: f32, z: f32) -> Matrix {
        self.multiply(&Matrix::scaling(x, y, z))
    }

    #[inline]
    pub fn rotate_z(&self, degrees: f32) -> Matrix {
        self.multiply(&Matrix::rotation_z(degrees))
    }

    #[inline]
    pub fn transform_point4(&self, p: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (row, o) in out.iter_mut().enumerate() {
            *o = self.get(row, 0) * p[0]
                + self.get(row, 1) * p[1]
                + self.get(row, 2) * p[2]
                + self.get(row, 3) * p[3];
        }
        out
    }

    /// Transforms 2D points (`z = 0`, `w = 1`) and returns `x, y, z` per point.
    ///
    /// The `w` row is ignored; callers only feed affine modelviews here.
    pub fn transform_points2<const N: usize>(&self, pts: &[Vec2; N]) -> [[f32; 3]; N] {
        let mut out = [[0.0f32; 3]; N];
        for (o, p) in out.iter_mut().zip(pts) {
            for (row, c) in o.iter_mut().enumerate() {
                *c = self.get(row, 0) * p.x + self.get(row, 1) * p.y + self.get(row, 3);
            }
        }
        out
    }

    pub fn is_identity(&self) -> bool {
        self.bit_eq(&Matrix::IDENTITY)
    }

    /// Bitwise equality (distinguishes `-0.0` from `0.0`, and equal NaNs compare equal).
    pub fn bit_eq(&self, other: &Matrix) -> bool {
        self.m.iter().zip(&other.m).all(|(a, b)| a.to_bits() == b.to_bits())
    }
}
