//! Turning one aggregated region into a simplified world-space polygon.

use glam::{Vec2, Vec3};
use pal_config::TransferConfig;
use polygon::{PolygonPlane, SimplifiedLoop, SimplifyReport, VertexLoop, simplify};

use crate::aggregate::Region;
use crate::camera::ViewportCamera;
use crate::contour::ContourTracer;
use crate::error::RegionError;
use crate::labeling::LabelMap;

/// Working storage reused across regions and ticks
#[derive(Debug, Clone, Default)]
pub(crate) struct ReconstructionScratch {
    tracer: ContourTracer,
    vertex_loop: VertexLoop,
    local: Vec<Vec2>,
    world: Vec<Vec3>,
}

/// A region's polygon before it becomes a light
#[derive(Debug, Clone)]
pub(crate) struct RegionPolygon {
    pub plane: PolygonPlane,
    pub simplified: SimplifiedLoop,
    pub report: SimplifyReport,
}

/// Fit, trace, unproject and simplify one region.
///
/// `labels` must have its border cleared so the outline closes.
pub(crate) fn reconstruct_region<C: ViewportCamera + ?Sized>(
    scratch: &mut ReconstructionScratch,
    labels: &LabelMap,
    region: &Region,
    camera: &C,
    config: &TransferConfig,
) -> Result<RegionPolygon, RegionError> {
    let label = region.label;
    let samples = region
        .plane_sample_positions()
        .ok_or(RegionError::InsufficientPlaneSamples {
            label,
            found: region.plane_samples.len(),
        })?;

    let camera_position = camera.position();
    let plane = PolygonPlane::from_samples(samples, camera_position)
        .and_then(|plane| {
            plane.check_view_angle(camera_position, config.max_plane_normal_angle)?;
            Ok(plane)
        })
        .map_err(|source| RegionError::Plane { label, source })?;

    let outline = scratch
        .tracer
        .trace_region(labels, region, config.outline_offset)?;

    scratch.local.clear();
    scratch.world.clear();
    for (index, point) in outline.iter().enumerate() {
        let ray = camera.viewport_point_to_ray(*point);
        let hit = plane
            .intersect_ray(ray.origin, ray.direction)
            .filter(|hit| (*hit - ray.origin).dot(ray.direction) > 0.0)
            .ok_or(RegionError::MissedPlane { label, index })?;
        scratch.world.push(hit);
        scratch.local.push(plane.to_local(hit));
    }

    scratch
        .vertex_loop
        .rebuild(&scratch.local, &scratch.world)
        .map_err(|source| RegionError::Loop { label, source })?;
    let report = simplify(&mut scratch.vertex_loop, &config.simplify);
    let simplified = scratch.vertex_loop.compact();
    if simplified.len() < 3 {
        return Err(RegionError::TooFewVertices {
            label,
            count: simplified.len(),
        });
    }

    Ok(RegionPolygon {
        plane,
        simplified,
        report,
    })
}
