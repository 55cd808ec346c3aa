//! Marching-squares outline tracing.
//!
//! Cell `(x, y)` spans the centers of pixels `(x, y)` to `(x + 1, y + 1)`.
//! Its code has one bit per corner pixel that belongs to the region:
//!
//! ```text
//!   8 ---- 4      8 = (x, y + 1)    4 = (x + 1, y + 1)
//!   |      |
//!   1 ---- 2      1 = (x, y)        2 = (x + 1, y)
//! ```
//!
//! The walk keeps the region on its right, so outlines wind clockwise in
//! viewport space. Each turning cell emits the pixel corner shared by its
//! four pixels, pushed diagonally away from the region by the outline offset.
//! Straight cells emit nothing, so a rectangle traces to four points.

use glam::Vec2;
use thiserror::Error;
use tracing::trace;

use crate::aggregate::Region;
use crate::labeling::LabelMap;
use crate::raster::PixelCoord;

/// Direction the walk entered or leaves a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// First cell of the walk
    Start,
    Left,
    Up,
    Right,
    Down,
}

impl Move {
    fn delta(self) -> (i64, i64) {
        match self {
            Move::Start => (0, 0),
            Move::Left => (-1, 0),
            Move::Up => (0, 1),
            Move::Right => (1, 0),
            Move::Down => (0, -1),
        }
    }
}

/// What the walk does in one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStep {
    pub exit: Move,
    /// Direction from the shared pixel corner away from the region
    pub outward: Vec2,
    /// Whether the outline turns here and the cell emits a point
    pub emits: bool,
}

const fn turn(exit: Move, x: f32, y: f32) -> Option<CellStep> {
    Some(CellStep {
        exit,
        outward: Vec2::new(x, y),
        emits: true,
    })
}

const fn straight(exit: Move, x: f32, y: f32) -> Option<CellStep> {
    Some(CellStep {
        exit,
        outward: Vec2::new(x, y),
        emits: false,
    })
}

/// Step for a cell code entered from `entry`.
///
/// Returns `None` for empty and full cells and for entries a code cannot be
/// reached from, both of which end the walk.
pub fn cell_step(code: u8, entry: Move) -> Option<CellStep> {
    use Move::*;
    match (code, entry) {
        (1, Right) => turn(Down, 1.0, 1.0),
        (2, Up | Start) => turn(Right, -1.0, 1.0),
        (3, Right) => straight(Right, 0.0, 1.0),
        (4, Left | Start) => turn(Up, -1.0, -1.0),
        (5, Right) => turn(Up, -1.0, 1.0),
        (5, Left) => turn(Down, 1.0, -1.0),
        (6, Up | Start) => straight(Up, -1.0, 0.0),
        (7, Right) => turn(Up, -1.0, 1.0),
        (8, Down) => turn(Left, 1.0, -1.0),
        (9, Down) => straight(Down, 1.0, 0.0),
        (10, Down) => turn(Right, 1.0, 1.0),
        (10, Up) => turn(Left, -1.0, -1.0),
        (11, Down) => turn(Right, 1.0, 1.0),
        (12, Left) => straight(Left, 0.0, -1.0),
        (13, Left) => turn(Down, 1.0, -1.0),
        (14, Up) => turn(Left, -1.0, -1.0),
        _ => None,
    }
}

/// Reasons an outline could not be traced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContourError {
    #[error("Region {0} has no boundary cell")]
    Empty(i32),
    #[error("Outline of region {label} left its bounding box at {cell:?}")]
    Escaped { label: i32, cell: (i64, i64) },
    #[error("Outline of region {label} broke at cell {cell:?} (code {code}, entered {entry:?})")]
    Broken {
        label: i32,
        cell: (i64, i64),
        code: u8,
        entry: Move,
    },
    #[error("Outline of region {label} did not close within {steps} steps")]
    Runaway { label: i32, steps: usize },
}

/// Reusable tracer; its cell-code table only ever grows
#[derive(Debug, Clone, Default)]
pub struct ContourTracer {
    codes: Vec<u8>,
    origin: (i64, i64),
    columns: i64,
    rows: i64,
}

impl ContourTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace the outline of a region.
    ///
    /// # Arguments
    /// * `labels` - Label map with the border already cleared
    /// * `region` - Region whose label and bounding box drive the walk
    /// * `outline_offset` - Outward push of every point, in pixels
    ///
    /// # Returns
    /// Outline points in viewport coordinates, clockwise, not repeating the
    /// first point.
    pub fn trace_region(
        &mut self,
        labels: &LabelMap,
        region: &Region,
        outline_offset: f32,
    ) -> Result<Vec<Vec2>, ContourError> {
        self.walk(
            labels,
            region.label,
            region.inf,
            region.sup,
            Some(region.leftmost),
            outline_offset,
        )
    }

    /// Trace the outline of `label` inside the pixel box `inf..=sup`.
    ///
    /// The box must contain a one-pixel margin of background around the region.
    pub fn trace(
        &mut self,
        labels: &LabelMap,
        label: i32,
        inf: PixelCoord,
        sup: PixelCoord,
        outline_offset: f32,
    ) -> Result<Vec<Vec2>, ContourError> {
        self.walk(labels, label, inf, sup, None, outline_offset)
    }

    fn walk(
        &mut self,
        labels: &LabelMap,
        label: i32,
        inf: PixelCoord,
        sup: PixelCoord,
        leftmost: Option<PixelCoord>,
        outline_offset: f32,
    ) -> Result<Vec<Vec2>, ContourError> {
        if sup.x <= inf.x || sup.y <= inf.y {
            return Err(ContourError::Empty(label));
        }
        self.build_codes(labels, label, inf, sup);
        let start = leftmost
            .and_then(|pixel| self.start_below_left_of(pixel))
            .or_else(|| self.find_start())
            .ok_or(ContourError::Empty(label))?;

        let scale = Vec2::new(labels.width() as f32, labels.height() as f32);
        let max_steps = 4 * self.codes.len() + 4;
        let mut points = Vec::new();
        let mut cell = start;
        let mut entry = Move::Start;

        for _ in 0..max_steps {
            let code = self.code(cell);
            let step = cell_step(code, entry).ok_or(ContourError::Broken {
                label,
                cell,
                code,
                entry,
            })?;

            if step.emits {
                let corner = Vec2::new(cell.0 as f32 + 1.0, cell.1 as f32 + 1.0);
                points.push((corner + step.outward * outline_offset) / scale);
            }

            let (dx, dy) = step.exit.delta();
            let next = (cell.0 + dx, cell.1 + dy);
            if !self.contains(next) {
                return Err(ContourError::Escaped { label, cell: next });
            }
            if next == start {
                trace!("Traced region {}: {} points", label, points.len());
                return Ok(points);
            }
            cell = next;
            entry = step.exit;
        }

        Err(ContourError::Runaway {
            label,
            steps: max_steps,
        })
    }

    fn build_codes(&mut self, labels: &LabelMap, label: i32, inf: PixelCoord, sup: PixelCoord) {
        self.origin = (inf.x as i64, inf.y as i64);
        self.columns = (sup.x - inf.x) as i64;
        self.rows = (sup.y - inf.y) as i64;
        self.codes.clear();

        let inside = |x: i64, y: i64| labels.get(x, y) == label;
        for row in 0..self.rows {
            let y = self.origin.1 + row;
            for column in 0..self.columns {
                let x = self.origin.0 + column;
                let code = (inside(x, y + 1) as u8) << 3
                    | (inside(x + 1, y + 1) as u8) << 2
                    | (inside(x + 1, y) as u8) << 1
                    | inside(x, y) as u8;
                self.codes.push(code);
            }
        }
    }

    /// Start cell taken from the region's leftmost pixel.
    ///
    /// The cell below and left of that pixel has only its upper-right corner
    /// inside, which makes it the cell `find_start` would pick. `None` when
    /// the pixel has since been cleared or sits on the box edge.
    fn start_below_left_of(&self, pixel: PixelCoord) -> Option<(i64, i64)> {
        let cell = (pixel.x as i64 - 1, pixel.y as i64 - 1);
        (self.contains(cell) && self.code(cell) == 4).then_some(cell)
    }

    /// Leftmost cell with a boundary, lowest row first on ties
    fn find_start(&self) -> Option<(i64, i64)> {
        let mut best: Option<(i64, i64)> = None;
        for row in 0..self.rows {
            for column in 0..self.columns {
                let code = self.codes[(row * self.columns + column) as usize];
                if code == 0 || code == 15 {
                    continue;
                }
                let cell = (self.origin.0 + column, self.origin.1 + row);
                if best.is_none_or(|b| cell.0 < b.0) {
                    best = Some(cell);
                }
            }
        }
        best
    }

    fn contains(&self, cell: (i64, i64)) -> bool {
        let column = cell.0 - self.origin.0;
        let row = cell.1 - self.origin.1;
        (0..self.columns).contains(&column) && (0..self.rows).contains(&row)
    }

    fn code(&self, cell: (i64, i64)) -> u8 {
        let column = cell.0 - self.origin.0;
        let row = cell.1 - self.origin.1;
        self.codes[(row * self.columns + column) as usize]
    }
}
