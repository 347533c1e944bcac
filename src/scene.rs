use glam::Vec4;

/// A set of cubic Bézier curves sharing one vertex table.
///
/// Vertices keep the position in xyz and the radius in w; each curve is four
/// consecutive control points starting at its offset. Disabled sets are
/// skipped during builds.
#[derive(Clone, Debug)]
pub struct CurveSet {
    vertices: Vec<Vec4>,
    curves: Vec<u32>,
    enabled: bool,
}

impl CurveSet {
    pub fn new() -> Self {
        Self {
            vertices: Default::default(),
            curves: Default::default(),
            enabled: true,
        }
    }

    /// Wraps an existing vertex table; `curves` are start offsets into it.
    pub fn from_raw(vertices: Vec<Vec4>, curves: Vec<u32>) -> Self {
        Self {
            vertices,
            curves,
            enabled: true,
        }
    }

    pub fn push_curve(&mut self, points: [Vec4; 4]) {
        self.curves.push(self.vertices.len() as u32);
        self.vertices.extend_from_slice(&points);
    }

    pub fn num_curves(&self) -> usize {
        self.curves.len()
    }

    /// Start offset of the `i`-th curve within the vertex table.
    pub fn curve(&self, i: usize) -> usize {
        self.curves[i] as usize
    }

    pub fn vertex(&self, i: usize) -> Vec4 {
        self.vertices[i]
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for CurveSet {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered collection of curve sets.
///
/// The position of a set within the scene is its geometry id; the position
/// of a curve within its set is its primitive id.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    sets: Vec<CurveSet>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, set: CurveSet) -> usize {
        self.sets.push(set);
        self.sets.len() - 1
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, i: usize) -> &CurveSet {
        &self.sets[i]
    }

    pub fn sets(&self) -> impl Iterator<Item = &CurveSet> {
        self.sets.iter()
    }

    /// Total curve count across enabled sets.
    pub fn num_curves(&self) -> usize {
        self.sets
            .iter()
            .filter(|set| set.is_enabled())
            .map(|set| set.num_curves())
            .sum()
    }
}
