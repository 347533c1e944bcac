use glam::{vec3, Mat3, Vec3};

use crate::BoundingBox;

/// Builds an orthonormal basis whose z axis is the (normalized) `z`,
/// returned in row form: multiplying a world-space point by the matrix takes
/// it into the frame.
pub fn frame(z: Vec3) -> Mat3 {
    let x = if z.x.abs() > z.y.abs() {
        vec3(-z.z, 0.0, z.x) / (z.x * z.x + z.z * z.z).sqrt()
    } else {
        vec3(0.0, z.z, -z.y) / (z.y * z.y + z.z * z.z).sqrt()
    };

    let y = z.cross(x);

    Mat3::from_cols(x, y, z).transpose()
}

/// An axis-aligned box expressed in an orthonormal frame.
///
/// `curve_area` is the summed half-area of the individual curve boxes that
/// went into `bounds`; it scores candidate frames against each other and is
/// never a geometric coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub space: Mat3,
    pub bounds: BoundingBox,
    pub curve_area: f32,
}

impl OrientedBox {
    pub fn new(space: Mat3, bounds: BoundingBox, curve_area: f32) -> Self {
        Self {
            space,
            bounds,
            curve_area,
        }
    }

    pub fn axis_aligned(bounds: BoundingBox, curve_area: f32) -> Self {
        Self::new(Mat3::IDENTITY, bounds, curve_area)
    }

    pub fn empty() -> Self {
        Self::axis_aligned(Default::default(), 0.0)
    }

    pub fn half_area(&self) -> f32 {
        self.bounds.half_area()
    }
}
