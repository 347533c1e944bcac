//! Builds 4-wide bounding-volume hierarchies over cubic Bézier hair
//! segments.
//!
//! Hair strands are long, thin and arbitrarily oriented, so a classic
//! axis-aligned BVH fits them poorly; this crate chooses per node between
//! binned object splits (in an axis-aligned or curve-aligned frame), strand
//! splits that cluster segments by tangent direction, optional subdivision
//! and spatial splits, and a median fallback. Inner nodes come in two
//! flavours: axis-aligned boxes and oriented boxes carrying their own
//! orthonormal frame.

mod bounding_box;
mod builder;
mod bvh;
mod curve;
mod error;
mod oriented_box;
mod ray;
mod scene;

pub use self::bounding_box::*;
pub use self::builder::*;
pub use self::bvh::*;
pub use self::curve::*;
pub use self::error::*;
pub use self::oriented_box::*;
pub use self::ray::*;
pub use self::scene::*;
