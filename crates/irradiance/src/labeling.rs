//! Connected-region labeling with union-find.
//!
//! Pixels are visited bottom-up, row by row. A pixel with geometry joins its
//! left and lower neighbors when the geometry buffer allows it; otherwise it
//! opens a new label. Merges are recorded in a parent table where a root
//! always has a smaller label than its children, so one forward sweep
//! flattens every chain.

use tracing::trace;

use crate::encoding::NO_GEOMETRY;
use crate::raster::{RasterBuffer, RasterError};

/// Label of pixels that belong to no region
pub const BACKGROUND: i32 = -1;

/// Per-pixel region labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<i32>,
}

impl LabelMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Label at `(x, y)`; coordinates outside the map read as background
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> i32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return BACKGROUND;
        }
        self.labels[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, label: i32) {
        if x < self.width && y < self.height {
            self.labels[y as usize * self.width as usize + x as usize] = label;
        }
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Set the outermost ring of pixels to background so every traced
    /// contour closes inside the map
    pub fn clear_border(&mut self) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        for x in 0..w {
            self.set(x, 0, BACKGROUND);
            self.set(x, h - 1, BACKGROUND);
        }
        for y in 0..h {
            self.set(0, y, BACKGROUND);
            self.set(w - 1, y, BACKGROUND);
        }
    }

    /// Number of distinct non-background labels
    pub fn region_count(&self) -> usize {
        let mut seen: Vec<i32> = self.labels.iter().copied().filter(|l| *l != BACKGROUND).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.labels.clear();
        self.labels
            .resize(width as usize * height as usize, BACKGROUND);
    }
}

/// Reusable labeler; its tables only ever grow
#[derive(Debug, Clone, Default)]
pub struct RegionLabeler {
    map: LabelMap,
    parents: Vec<i32>,
    sizes: Vec<u32>,
}

impl RegionLabeler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The labels produced by the last call to [`RegionLabeler::label`]
    pub fn labels(&self) -> &LabelMap {
        &self.map
    }

    /// Label the connected regions of a depth and geometry buffer pair.
    ///
    /// # Arguments
    /// * `depth` - Linear depth; [`NO_GEOMETRY`] pixels become background
    /// * `geometry` - Merge flags, `r > 0` joins left, `g > 0` joins lower
    ///
    /// # Returns
    /// The label map, where every label is the smallest provisional label of
    /// its region and regions with fewer than two pixels are background.
    pub fn label(
        &mut self,
        depth: &RasterBuffer,
        geometry: &RasterBuffer,
    ) -> Result<&mut LabelMap, RasterError> {
        let (width, height) = (depth.width(), depth.height());
        if geometry.width() != width || geometry.height() != height {
            return Err(RasterError::SizeMismatch {
                buffer: "geometry",
                width: geometry.width(),
                height: geometry.height(),
                expected: width,
            });
        }

        self.map.reset(width, height);
        self.parents.clear();

        let w = width as usize;
        let depth_pixels = depth.pixels();
        let geometry_pixels = geometry.pixels();

        for y in 0..height as usize {
            for x in 0..w {
                let index = y * w + x;
                if depth_pixels[index] == NO_GEOMETRY {
                    continue;
                }

                let flags = geometry_pixels[index];
                let left = if x > 0 && flags.r > 0 {
                    self.map.labels[index - 1]
                } else {
                    BACKGROUND
                };
                let lower = if y > 0 && flags.g > 0 {
                    self.map.labels[index - w]
                } else {
                    BACKGROUND
                };

                let label = match (left != BACKGROUND, lower != BACKGROUND) {
                    (true, true) => {
                        self.union(left, lower);
                        left
                    }
                    (true, false) => left,
                    (false, true) => lower,
                    (false, false) => {
                        let fresh = self.parents.len() as i32;
                        self.parents.push(fresh);
                        fresh
                    }
                };
                self.map.labels[index] = label;
            }
        }

        self.resolve();
        Ok(&mut self.map)
    }

    fn find(&self, mut label: i32) -> i32 {
        while self.parents[label as usize] != label {
            label = self.parents[label as usize];
        }
        label
    }

    fn union(&mut self, a: i32, b: i32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (root, child) = (root_a.min(root_b), root_a.max(root_b));
            self.parents[child as usize] = root;
        }
    }

    /// Flatten the parent table, rewrite pixels to their roots and drop
    /// single-pixel regions.
    fn resolve(&mut self) {
        // Parents are always smaller, so they are already flat when reached
        for label in 0..self.parents.len() {
            let parent = self.parents[label] as usize;
            self.parents[label] = self.parents[parent];
        }

        self.sizes.clear();
        self.sizes.resize(self.parents.len(), 0);
        for label in self.map.labels.iter_mut() {
            if *label != BACKGROUND {
                *label = self.parents[*label as usize];
                self.sizes[*label as usize] += 1;
            }
        }

        let mut dropped = 0usize;
        for label in self.map.labels.iter_mut() {
            if *label != BACKGROUND && self.sizes[*label as usize] < 2 {
                *label = BACKGROUND;
                dropped += 1;
            }
        }

        trace!(
            "Resolved {} provisional labels, {} single pixels dropped",
            self.parents.len(),
            dropped
        );
    }
}
