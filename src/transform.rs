//! # Transform Math
//!
//! Pure matrix builders for the camera. Everything here is recomputed from scalar state
//! every frame, so there is no caching and no shared state.
//!
//! All matrices are column-major (`nalgebra_glm::Mat4` storage order), and the indices
//! quoted in the docs below refer to that flat column-major layout, i.e. `m[12..15]`
//! is the fourth column.
//!
//! The projection built by [`projection`] is *not* the textbook OpenGL perspective
//! matrix. The sky's vertex stage only ever uses the rotation matrices, but any
//! shader reading `P` expects exactly this shape, so it is kept as is.

use nalgebra_glm::Mat4;

/// Vertical field of view of the projection, in radians.
pub const FIELD_OF_VIEW_Y: f32 = 1.0;

/// Distance to the near clipping plane.
pub const NEAR_PLANE: f32 = 1.0;

/// The two axes the camera can rotate about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    /// Pitch.
    X,
    /// Yaw.
    Y,
}

/// Width over height of a viewport.
///
/// A zero height (a minimised window) is clamped to one so the ratio stays finite.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

/// Builds the perspective-style projection for a `width` x `height` viewport.
///
/// With `t = tan(FIELD_OF_VIEW_Y / 2)` and `a = width / height` the column-major
/// entries are:
///
/// - `m[0] = 1 / (a * t)`
/// - `m[5] = 1 / t`
/// - `m[10] = -1`
/// - `m[11] = -1`
/// - `m[14] = -2 * NEAR_PLANE`
///
/// and every other entry is zero. The result depends only on the ratio of the two
/// dimensions, never on their absolute size.
pub fn projection(width: u32, height: u32) -> Mat4 {
    let tan_fov = (FIELD_OF_VIEW_Y * 0.5).tan();
    let aspect = aspect_ratio(width, height);

    let mut m = [0.0_f32; 16];
    m[0] = 1.0 / (aspect * tan_fov);
    m[5] = 1.0 / tan_fov;
    m[10] = -1.0;
    m[11] = -1.0;
    m[14] = -(2.0 * NEAR_PLANE);
    Mat4::from_column_slice(&m)
}

/// Builds a rotation of `angle` radians about `axis`.
///
/// Column-major layouts, with `c = cos(angle)` and `s = sin(angle)`:
///
/// - [`Axis::X`]: `m[0] = 1, m[5] = c, m[6] = -s, m[9] = s, m[10] = c, m[15] = 1`
/// - [`Axis::Y`]: `m[0] = c, m[2] = s, m[5] = 1, m[8] = -s, m[10] = c, m[15] = 1`
///
/// Angles are unbounded; sine and cosine take care of wrapping.
pub fn rotation(axis: Axis, angle: f32) -> Mat4 {
    let (s, c) = angle.sin_cos();

    let mut m = [0.0_f32; 16];
    match axis {
        Axis::X => {
            m[0] = 1.0;
            m[5] = c;
            m[6] = -s;
            m[9] = s;
            m[10] = c;
        }
        Axis::Y => {
            m[0] = c;
            m[2] = s;
            m[5] = 1.0;
            m[8] = -s;
            m[10] = c;
        }
    }
    m[15] = 1.0;
    Mat4::from_column_slice(&m)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_close(a: &Mat4, b: &Mat4) {
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < EPSILON, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn projection_layout() {
        let p = projection(800, 600);
        let m = p.as_slice();
        let tan_fov = 0.5_f32.tan();

        assert!((m[0] - 1.0 / ((800.0 / 600.0) * tan_fov)).abs() < EPSILON);
        assert!((m[5] - 1.0 / tan_fov).abs() < EPSILON);
        assert_eq!(m[10], -1.0);
        assert_eq!(m[11], -1.0);
        assert_eq!(m[14], -2.0);

        for (i, value) in m.iter().enumerate() {
            if ![0, 5, 10, 11, 14].contains(&i) {
                assert_eq!(*value, 0.0, "entry {i} should be zero");
            }
        }
    }

    #[test]
    fn projection_depends_only_on_ratio() {
        for (w, h) in [(800, 600), (1920, 1080), (3, 7), (1, 1)] {
            for k in [2, 3, 10] {
                assert_close(&projection(w, h), &projection(w * k, h * k));
            }
        }
    }

    #[test]
    fn zero_height_stays_finite() {
        let p = projection(640, 0);
        assert!(p.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_angle_is_identity() {
        assert_close(&rotation(Axis::X, 0.0), &Mat4::identity());
        assert_close(&rotation(Axis::Y, 0.0), &Mat4::identity());
    }

    #[test]
    fn opposite_rotations_cancel() {
        for angle in [0.1_f32, 1.0, -2.5, 7.0, 123.456] {
            assert_close(
                &(rotation(Axis::X, angle) * rotation(Axis::X, -angle)),
                &Mat4::identity(),
            );
            assert_close(
                &(rotation(Axis::Y, angle) * rotation(Axis::Y, -angle)),
                &Mat4::identity(),
            );
        }
    }

    #[test]
    fn rotation_layouts() {
        let angle = 0.3_f32;
        let (s, c) = angle.sin_cos();

        let x = rotation(Axis::X, angle);
        let m = x.as_slice();
        assert_eq!((m[0], m[5], m[6], m[9], m[10], m[15]), (1.0, c, -s, s, c, 1.0));

        let y = rotation(Axis::Y, angle);
        let m = y.as_slice();
        assert_eq!((m[0], m[2], m[5], m[8], m[10], m[15]), (c, s, 1.0, -s, c, 1.0));
    }
}
