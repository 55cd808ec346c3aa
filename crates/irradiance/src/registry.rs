//! Registry of reconstructed lights shared by every transfer instance.
//!
//! Lights are kept sorted by vertex count so shading can batch polygons of
//! similar size. Each frame, every registered light must report an update
//! before the batch may be flushed to the renderer.

use std::collections::HashSet;

use pal_config::RegistryConfig;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(feature = "bevy")]
use bevy::prelude::Resource;

use crate::light::{LightId, PolygonalAreaLight};

/// Constant slots a light uses besides one per vertex
pub const LIGHT_HEADER_SLOTS: usize = 5;

/// Lights with fewer vertices than this are never batched
pub const MIN_BATCH_VERTICES: usize = 3;

/// Errors raised by registry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Light {0:?} is not registered")]
    UnknownLight(LightId),
    #[error("Light {0:?} already reported an update this frame")]
    DuplicateReport(LightId),
    #[error("Only {reported} of {registered} lights reported an update this frame")]
    BarrierNotSatisfied { reported: usize, registered: usize },
}

/// Result of a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub num_polygons: usize,
    pub num_vertices: usize,
    /// Constant slots used by the batch
    pub buffer_size: usize,
    /// Lights left out for having too few vertices or no room
    pub skipped: usize,
}

/// Ordered collection of all live polygonal lights
#[derive(Debug)]
#[cfg_attr(feature = "bevy", derive(Resource))]
pub struct PolygonRegistry {
    lights: Vec<PolygonalAreaLight>,
    next_id: u64,
    capacity: usize,
    frame: u64,
    reported: HashSet<LightId>,
}

impl Default for PolygonRegistry {
    fn default() -> Self {
        Self::with_config(&RegistryConfig::default())
    }
}

impl PolygonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the capacity of `config`. Check it with
    /// [`RegistryConfig::validate`] first when it comes from user input.
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            lights: Vec::new(),
            next_id: 0,
            capacity: config.capacity,
            frame: 0,
            reported: HashSet::new(),
        }
    }

    /// Allocate a fresh light id
    pub fn allocate_id(&mut self) -> LightId {
        let id = LightId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a light. Registering an id that is already present does nothing
    /// and keeps the existing record.
    ///
    /// # Returns
    /// `true` if the light was added.
    pub fn register(&mut self, light: PolygonalAreaLight) -> bool {
        if self.contains(light.id) {
            return false;
        }
        self.lights.push(light);
        self.lights.sort_by_key(PolygonalAreaLight::vertex_count);
        true
    }

    /// Remove a light; unknown ids are ignored
    pub fn unregister(&mut self, id: LightId) -> Option<PolygonalAreaLight> {
        let index = self.lights.iter().position(|l| l.id == id)?;
        self.reported.remove(&id);
        Some(self.lights.remove(index))
    }

    pub fn get(&self, id: LightId) -> Option<&PolygonalAreaLight> {
        self.lights.iter().find(|l| l.id == id)
    }

    pub fn contains(&self, id: LightId) -> bool {
        self.get(id).is_some()
    }

    /// All lights, fewest vertices first
    pub fn lights(&self) -> &[PolygonalAreaLight] {
        &self.lights
    }

    /// Lights that received a slot in the last flush, in slot order
    pub fn batched(&self) -> impl Iterator<Item = &PolygonalAreaLight> {
        self.lights.iter().filter(|l| l.batch_index.is_some())
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Start a new frame; every light has to report again
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.reported.clear();
    }

    /// Record that a light is up to date for this frame.
    ///
    /// # Returns
    /// Whether every registered light has now reported.
    pub fn report_update(&mut self, id: LightId) -> Result<bool, RegistryError> {
        if !self.contains(id) {
            return Err(RegistryError::UnknownLight(id));
        }
        if !self.reported.insert(id) {
            return Err(RegistryError::DuplicateReport(id));
        }
        Ok(self.is_barrier_satisfied())
    }

    pub fn is_barrier_satisfied(&self) -> bool {
        self.reported.len() == self.lights.len()
    }

    /// Assign batch slots to the lights once every light has reported.
    ///
    /// Lights are batched in vertex-count order until the slot capacity is
    /// reached; each uses [`LIGHT_HEADER_SLOTS`] plus one slot per vertex.
    pub fn flush(&mut self) -> Result<BatchSummary, RegistryError> {
        if !self.is_barrier_satisfied() {
            return Err(RegistryError::BarrierNotSatisfied {
                reported: self.reported.len(),
                registered: self.lights.len(),
            });
        }

        let mut summary = BatchSummary::default();
        let mut full = false;
        for light in &mut self.lights {
            light.batch_index = None;
            if light.vertex_count() < MIN_BATCH_VERTICES {
                summary.skipped += 1;
                continue;
            }
            let slots = LIGHT_HEADER_SLOTS + light.vertex_count();
            if full || summary.buffer_size + slots > self.capacity {
                full = true;
                summary.skipped += 1;
                continue;
            }
            light.batch_index = Some(summary.num_polygons);
            summary.num_polygons += 1;
            summary.num_vertices += light.vertex_count();
            summary.buffer_size += slots;
        }

        if full {
            warn!(
                "Light batch is full at {} of {} slots, {} lights left out",
                summary.buffer_size, self.capacity, summary.skipped
            );
        }
        debug!(
            "Flushed frame {}: {} polygons, {} vertices",
            self.frame, summary.num_polygons, summary.num_vertices
        );
        Ok(summary)
    }
}
