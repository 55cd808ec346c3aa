//! Reconstructed secondary area lights and the primary light they come from.

use glam::{Affine3A, Vec3};

use crate::aggregate::Region;

/// Registry-wide identifier of a reconstructed light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u64);

/// How shading projects points onto the polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    #[default]
    Centered,
    Weighted,
}

/// The light whose bounce is being reconstructed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimaryLight {
    /// World transform; the light looks along its local `+Z`
    pub transform: Affine3A,
    /// Linear RGB color
    pub color: Vec3,
    pub intensity: f32,
    pub projection_mode: ProjectionMode,
}

impl PrimaryLight {
    pub fn new(transform: Affine3A, color: Vec3, intensity: f32) -> Self {
        Self {
            transform,
            color,
            intensity,
            projection_mode: ProjectionMode::default(),
        }
    }
}

/// Sphere enclosing every vertex of a polygon
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere around `center` reaching the farthest of `points`
    pub fn enclosing(center: Vec3, points: &[Vec3]) -> Self {
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        Self { center, radius }
    }
}

/// A planar polygonal light emitting the bounce of one surface region
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonalAreaLight {
    pub id: LightId,
    pub color: Vec3,
    pub intensity: f32,
    pub bias: f32,
    /// Unit normal of the emitting side
    pub normal: Vec3,
    /// Mean of the vertices
    pub centroid: Vec3,
    pub bounds: BoundingSphere,
    /// Closed loop, first vertex not repeated
    pub vertices: Vec<Vec3>,
    pub projection_mode: ProjectionMode,
    /// Slot in the last flushed batch, `None` when not batched
    pub batch_index: Option<usize>,
}

impl PolygonalAreaLight {
    /// Build a light from its vertex loop, computing centroid and bounds
    pub fn new(id: LightId, vertices: Vec<Vec3>, normal: Vec3) -> Self {
        let mut light = Self {
            id,
            color: Vec3::ONE,
            intensity: 1.0,
            bias: 0.0,
            normal,
            centroid: Vec3::ZERO,
            bounds: BoundingSphere::default(),
            vertices,
            projection_mode: ProjectionMode::default(),
            batch_index: None,
        };
        light.recompute_bounds();
        light
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Update centroid and bounding sphere after the vertices changed
    pub fn recompute_bounds(&mut self) {
        if self.vertices.is_empty() {
            self.centroid = Vec3::ZERO;
            self.bounds = BoundingSphere::default();
            return;
        }
        let sum: Vec3 = self.vertices.iter().copied().sum();
        self.centroid = sum / self.vertices.len() as f32;
        self.bounds = BoundingSphere::enclosing(self.centroid, &self.vertices);
    }
}

/// Parameters of the final light that do not come from the region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalizeParams {
    pub vertex_offset: f32,
    pub bias: f32,
    pub intensity_multiplier: f32,
}

/// Turn a simplified loop and its region into a light.
///
/// Vertices are lifted off the surface by `vertex_offset` along `normal`.
/// Color is the primary light color tinted by the region's mean albedo and
/// intensity is the region's mean illumination times the multiplier.
pub fn finalize_light(
    id: LightId,
    world: &[Vec3],
    normal: Vec3,
    region: &Region,
    primary: &PrimaryLight,
    params: &FinalizeParams,
) -> PolygonalAreaLight {
    let lift = normal * params.vertex_offset;
    let vertices = world.iter().map(|v| *v + lift).collect();

    let mut light = PolygonalAreaLight::new(id, vertices, normal);
    light.color = primary.color * region.average_albedo();
    light.intensity = region.average_illumination() * params.intensity_multiplier;
    light.bias = params.bias;
    light.projection_mode = primary.projection_mode;
    light
}
