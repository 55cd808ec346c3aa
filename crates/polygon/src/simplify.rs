//! Statistical triplet-area reduction of a traced vertex loop.
//!
//! Each pass measures every alive vertex's triplet area (the triangle it
//! forms with its two alive neighbors) and removes the vertices that matter
//! least to the shape:
//!
//! ```text
//!        prev        next              prev ------- next
//!          \   v    /         ->
//!           `--*---'
//!      triplet area = area lost by removing v
//! ```
//!
//! A vertex is a candidate when its triplet area is below a fraction of the
//! polygon area and no larger than the lower-half average of all triplet
//! areas. Only convex or flat vertices are removed, so the area never grows,
//! and a removal is refused if it would take the area below the floor
//! fraction of the reference area or fold the new edge over another vertex.
//!
//! ## Determinism
//!
//! Candidates are visited by ascending triplet area, ties broken by slot id.
//! A vertex next to a removal is deferred to the following pass, when its
//! statistics are measured again. A finished run is a fixed point: running
//! again on the output (with its reference area) removes nothing.

use pal_config::SimplifyConfig;
use tracing::{debug, trace, warn};

use crate::vertex_loop::{VertexId, VertexLoop};

/// Why a simplification run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// A full pass found nothing to remove
    #[default]
    Converged,
    /// The vertex floor was reached
    VertexFloor,
    /// The pass budget ran out
    PassBudget,
}

/// Statistics from one simplification run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplifyReport {
    /// Passes executed
    pub passes: u32,
    /// Vertices removed
    pub removed: usize,
    /// Removals the loop refused (logged and skipped)
    pub refused: usize,
    /// Alive vertices before the run
    pub initial_vertices: usize,
    /// Alive vertices after the run
    pub final_vertices: usize,
    /// Loop area after the run
    pub final_area: f32,
    pub stop: StopReason,
}

/// Triplet-area statistics of one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripletStats {
    /// Mean of the absolute triplet areas
    pub mean: f32,
    /// Mean of the absolute triplet areas strictly below `mean`
    /// (equal to `mean` when none are below)
    pub lower_half_mean: f32,
}

/// Compute the mean and lower-half mean of absolute triplet areas.
pub fn triplet_stats(areas: impl Iterator<Item = f32> + Clone) -> Option<TripletStats> {
    let (sum, count) = areas
        .clone()
        .fold((0.0f32, 0usize), |(s, c), a| (s + a.abs(), c + 1));
    if count == 0 {
        return None;
    }
    let mean = sum / count as f32;

    let (lower_sum, lower_count) = areas
        .map(f32::abs)
        .filter(|&a| a < mean)
        .fold((0.0f32, 0usize), |(s, c), a| (s + a, c + 1));
    let lower_half_mean = if lower_count > 0 {
        lower_sum / lower_count as f32
    } else {
        mean
    };

    Some(TripletStats {
        mean,
        lower_half_mean,
    })
}

/// Simplify a vertex loop in place.
///
/// # Arguments
/// * `vertex_loop` - Loop to reduce; removed vertices stay as dead slots
/// * `config` - Pass budget, area thresholds and vertex floor
///
/// # Returns
/// A report of what the run did and why it stopped.
pub fn simplify(vertex_loop: &mut VertexLoop, config: &SimplifyConfig) -> SimplifyReport {
    let mut report = SimplifyReport {
        initial_vertices: vertex_loop.alive_count(),
        ..Default::default()
    };

    let floor_area = vertex_loop.reference_area() * config.area_floor;
    let mut deferred = vec![false; vertex_loop.slot_count()];
    let mut candidates: Vec<(VertexId, f32)> = Vec::new();

    report.stop = StopReason::PassBudget;
    'passes: for _ in 0..config.max_passes {
        if vertex_loop.alive_count() <= config.vertex_floor {
            report.stop = StopReason::VertexFloor;
            break;
        }
        report.passes += 1;

        let area = vertex_loop.area();
        let triplets = vertex_loop
            .alive_ids()
            .filter_map(|id| vertex_loop.vertex(id).map(|v| v.triplet_area));
        let Some(stats) = triplet_stats(triplets) else {
            report.stop = StopReason::Converged;
            break;
        };
        let max_triplet = config.area_fraction * area;

        candidates.clear();
        candidates.extend(vertex_loop.alive_ids().filter_map(|id| {
            let triplet = vertex_loop.vertex(id)?.triplet_area;
            // Inclusive: collinear runs have triplet 0 and a lower-half mean of 0
            let removable = triplet >= 0.0
                && triplet < max_triplet
                && triplet <= stats.lower_half_mean;
            removable.then_some((id, triplet))
        }));
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        trace!(
            "simplify pass {}: area {}, mean {}, lower half {}, {} candidates",
            report.passes,
            area,
            stats.mean,
            stats.lower_half_mean,
            candidates.len()
        );

        deferred.fill(false);
        let mut current_area = area;
        let mut removed_this_pass = 0;

        for &(id, triplet) in &candidates {
            if vertex_loop.alive_count() <= config.vertex_floor {
                report.removed += removed_this_pass;
                report.stop = StopReason::VertexFloor;
                break 'passes;
            }
            if deferred[id.0 as usize] {
                continue;
            }
            if current_area - triplet < floor_area {
                continue;
            }
            if vertex_loop.removal_crosses(id) {
                continue;
            }
            let Some((prev, next)) = vertex_loop.vertex(id).map(|v| (v.prev, v.next)) else {
                continue;
            };

            match vertex_loop.remove(id) {
                Ok(lost) => {
                    current_area -= lost;
                    deferred[prev.0 as usize] = true;
                    deferred[next.0 as usize] = true;
                    removed_this_pass += 1;
                }
                Err(e) => {
                    warn!("simplify: skipping removal of {:?}: {}", id, e);
                    report.refused += 1;
                }
            }
        }

        report.removed += removed_this_pass;
        if removed_this_pass == 0 {
            report.stop = StopReason::Converged;
            break;
        }
    }

    report.final_vertices = vertex_loop.alive_count();
    report.final_area = vertex_loop.area();
    debug!(
        "simplify: {} -> {} vertices in {} passes ({:?}), area {} of reference {}",
        report.initial_vertices,
        report.final_vertices,
        report.passes,
        report.stop,
        report.final_area,
        vertex_loop.reference_area()
    );
    report
}
