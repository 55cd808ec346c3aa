//! Arena-backed closed vertex loop with logical deletion.
//!
//! Vertices live in a flat array of slots addressed by [`VertexId`]. Each slot
//! keeps explicit `prev`/`next` links to its alive neighbors, so removing a
//! vertex is O(1): the slot is flagged dead and its neighbors are relinked.
//! Slots are never compacted until [`VertexLoop::compact`] produces the
//! output polygon.
//!
//! ```text
//!     slot:   0     1     2     3     4
//!     alive:  y     y     n     y     y
//!     next:   1  -> 3  ------->  4  -> 0
//! ```
//!
//! Links always follow increasing slot order (wrapping at the end), so
//! walking the links and scanning alive slots visit vertices in the same order.

use glam::{Vec2, Vec3};
use thiserror::Error;
use tracing::trace;

use crate::area::{shoelace_term, triangle_contains, triplet_signed_area};

/// Type-safe vertex slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

impl VertexId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A vertex slot in the loop
#[derive(Debug, Clone)]
pub struct LoopVertex {
    /// Position in plane-local 2D coordinates
    pub position: Vec2,
    /// World-space position the local position was projected from
    pub world: Vec3,
    /// False once the simplifier removed this vertex
    pub alive: bool,
    /// Previous alive vertex
    pub prev: VertexId,
    /// Next alive vertex
    pub next: VertexId,
    /// Vector to the next alive vertex
    pub edge: Vec2,
    /// Length of `edge`
    pub edge_length: f32,
    /// Oriented triplet area with its alive neighbors (positive = convex)
    pub triplet_area: f32,
}

/// Errors that can occur while building or editing a vertex loop
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopError {
    #[error("A loop needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("Got {positions} local positions but {world} world positions")]
    LengthMismatch { positions: usize, world: usize },
    #[error("Vertex {id:?} is outside the loop's {len} slots")]
    OutOfRange { id: VertexId, len: usize },
    #[error("Vertex {0:?} was already removed")]
    AlreadyRemoved(VertexId),
    #[error("Loop is exhausted with {0} alive vertices")]
    Exhausted(usize),
}

/// The alive vertices of a loop, in order, ready to become a polygon
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedLoop {
    /// Plane-local positions
    pub positions: Vec<Vec2>,
    /// Matching world positions
    pub world: Vec<Vec3>,
    /// Area of the loop as originally traced
    pub reference_area: f32,
}

impl SimplifiedLoop {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Closed loop of vertex slots
///
/// The loop is oriented on construction: `winding` is chosen so that the
/// initial area is non-negative, and all triplet and polygon areas are
/// reported in that orientation.
#[derive(Debug, Clone, Default)]
pub struct VertexLoop {
    vertices: Vec<LoopVertex>,
    alive_count: usize,
    winding: f32,
    reference_area: f32,
}

impl VertexLoop {
    /// Build a loop from matching local and world positions.
    ///
    /// The reference area is the area of the loop as given.
    pub fn new(positions: &[Vec2], world: &[Vec3]) -> Result<Self, LoopError> {
        let mut vertex_loop = Self::default();
        vertex_loop.rebuild(positions, world)?;
        Ok(vertex_loop)
    }

    /// Rebuild a previously simplified loop, keeping its original reference area.
    pub fn from_simplified(simplified: &SimplifiedLoop) -> Result<Self, LoopError> {
        let mut vertex_loop = Self::new(&simplified.positions, &simplified.world)?;
        vertex_loop.reference_area = simplified.reference_area;
        Ok(vertex_loop)
    }

    /// Refill this loop in place, reusing its slot storage.
    pub fn rebuild(&mut self, positions: &[Vec2], world: &[Vec3]) -> Result<(), LoopError> {
        if positions.len() != world.len() {
            return Err(LoopError::LengthMismatch {
                positions: positions.len(),
                world: world.len(),
            });
        }
        let count = positions.len();
        if count < 3 {
            return Err(LoopError::TooFewVertices(count));
        }

        self.vertices.clear();
        self.vertices.reserve(count);
        for (i, (&position, &world)) in positions.iter().zip(world).enumerate() {
            self.vertices.push(LoopVertex {
                position,
                world,
                alive: true,
                prev: VertexId(((i + count - 1) % count) as u32),
                next: VertexId(((i + 1) % count) as u32),
                edge: Vec2::ZERO,
                edge_length: 0.0,
                triplet_area: 0.0,
            });
        }
        self.alive_count = count;

        self.winding = 1.0;
        if self.area() < 0.0 {
            self.winding = -1.0;
        }
        for i in 0..count {
            self.refresh(VertexId(i as u32));
        }
        self.reference_area = self.area();
        Ok(())
    }

    /// Number of slots, alive or not
    pub fn slot_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of alive vertices
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Area measured when the loop was first traced
    pub fn reference_area(&self) -> f32 {
        self.reference_area
    }

    /// Get a vertex slot by id
    pub fn vertex(&self, id: VertexId) -> Option<&LoopVertex> {
        self.vertices.get(id.index())
    }

    /// Ids of the alive vertices in loop order
    pub fn alive_ids(&self) -> impl Iterator<Item = VertexId> + Clone + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.alive)
            .map(|(i, _)| VertexId(i as u32))
    }

    /// Oriented area of the alive loop (non-negative for the traced orientation)
    pub fn area(&self) -> f32 {
        let mut sum = 0.0;
        for v in self.vertices.iter().filter(|v| v.alive) {
            sum += shoelace_term(v.position, self.vertices[v.next.index()].position);
        }
        self.winding * sum
    }

    /// Whether removing `id` would let the new edge `prev -> next` pass over another vertex.
    pub fn removal_crosses(&self, id: VertexId) -> bool {
        let Some(v) = self.vertices.get(id.index()) else {
            return false;
        };
        let a = self.vertices[v.prev.index()].position;
        let c = self.vertices[v.next.index()].position;
        let b = v.position;

        self.vertices.iter().enumerate().any(|(i, other)| {
            let other_id = VertexId(i as u32);
            other.alive
                && other_id != id
                && other_id != v.prev
                && other_id != v.next
                && triangle_contains(a, b, c, other.position)
        })
    }

    /// Remove an alive vertex and relink its neighbors.
    ///
    /// Fails without touching the loop if the id is out of range, the vertex is
    /// already dead, or the loop would drop below 3 alive vertices.
    ///
    /// # Returns
    /// The oriented triplet area the loop lost.
    pub fn remove(&mut self, id: VertexId) -> Result<f32, LoopError> {
        let len = self.vertices.len();
        let Some(v) = self.vertices.get(id.index()) else {
            return Err(LoopError::OutOfRange { id, len });
        };
        if !v.alive {
            return Err(LoopError::AlreadyRemoved(id));
        }
        if self.alive_count <= 3 {
            return Err(LoopError::Exhausted(self.alive_count));
        }

        let (prev, next, lost) = (v.prev, v.next, v.triplet_area);
        self.vertices[prev.index()].next = next;
        self.vertices[next.index()].prev = prev;
        self.vertices[id.index()].alive = false;
        self.alive_count -= 1;

        self.refresh(prev);
        self.refresh(next);

        trace!("remove vertex {:?}: lost area {}", id, lost);
        Ok(lost)
    }

    /// Recompute the cached edge and triplet area of one slot.
    fn refresh(&mut self, id: VertexId) {
        let v = &self.vertices[id.index()];
        let prev = self.vertices[v.prev.index()].position;
        let next = self.vertices[v.next.index()].position;
        let position = v.position;

        let edge = next - position;
        let triplet = self.winding * triplet_signed_area(prev, position, next);

        let v = &mut self.vertices[id.index()];
        v.edge = edge;
        v.edge_length = edge.length();
        v.triplet_area = triplet;
    }

    /// Collect the alive vertices in order.
    pub fn compact(&self) -> SimplifiedLoop {
        let alive = self.vertices.iter().filter(|v| v.alive);
        SimplifiedLoop {
            positions: alive.clone().map(|v| v.position).collect(),
            world: alive.map(|v| v.world).collect(),
            reference_area: self.reference_area,
        }
    }
}
