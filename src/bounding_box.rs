use std::ops::{Add, AddAssign};

use glam::{Mat3, Vec3};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    min: Option<Vec3>,
    max: Option<Vec3>,
}

impl BoundingBox {
    pub fn grow(&mut self, p: Vec3) {
        if let Some(min) = &mut self.min {
            *min = min.min(p);
        } else {
            self.min = Some(p);
        }

        if let Some(max) = &mut self.max {
            *max = max.max(p);
        } else {
            self.max = Some(p);
        }
    }

    pub fn is_set(&self) -> bool {
        self.min.is_some()
    }

    pub fn min(&self) -> Vec3 {
        self.min.expect("Bounding box is empty")
    }

    pub fn max(&self) -> Vec3 {
        self.max.expect("Bounding box is empty")
    }

    pub fn center(&self) -> Vec3 {
        (self.min() + self.max()) / 2.0
    }

    pub fn extent(&self) -> Vec3 {
        self.max() - self.min()
    }

    pub fn half_area(&self) -> f32 {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            let extent = max - min;

            extent.x * extent.y + extent.y * extent.z + extent.z * extent.x
        } else {
            0.0
        }
    }

    /// Grows the box by `r` on all sides; the empty box stays empty.
    pub fn inflate(mut self, r: f32) -> Self {
        if let Some(min) = &mut self.min {
            *min -= Vec3::splat(r);
        }

        if let Some(max) = &mut self.max {
            *max += Vec3::splat(r);
        }

        self
    }

    /// Conservative box of all eight corners taken through `mat`.
    pub fn transform(&self, mat: Mat3) -> Self {
        let mut out = Self::default();

        if !self.is_set() {
            return out;
        }

        let min = self.min();
        let max = self.max();

        for i in 0..8 {
            let point = {
                let x = if i & 1 == 0 { min.x } else { max.x };
                let y = if i & 2 == 0 { min.y } else { max.y };
                let z = if i & 4 == 0 { min.z } else { max.z };

                Vec3::new(x, y, z)
            };

            out.grow(mat * point);
        }

        out
    }
}

impl Add<Vec3> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Vec3) -> Self::Output {
        self.grow(rhs);
        self
    }
}

impl Add<Self> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        if let Some(min) = rhs.min {
            self.grow(min);
        }

        if let Some(max) = rhs.max {
            self.grow(max);
        }

        self
    }
}

impl AddAssign<Vec3> for BoundingBox {
    fn add_assign(&mut self, rhs: Vec3) {
        self.grow(rhs);
    }
}

impl AddAssign<Self> for BoundingBox {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl FromIterator<Vec3> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Vec3>,
    {
        iter.into_iter().fold(Self::default(), Self::add)
    }
}

impl FromIterator<BoundingBox> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = BoundingBox>,
    {
        iter.into_iter().fold(Self::default(), Self::add)
    }
}
