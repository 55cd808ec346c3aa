//! Per-region statistics gathered in one pass over the buffers.

use std::collections::BTreeMap;

use glam::{UVec3, Vec3};
use polygon::COLLINEAR_COSINE;

use crate::camera::{ViewportCamera, pixel_center_viewport};
use crate::encoding::{decode_depth, decode_illumination};
use crate::labeling::{BACKGROUND, LabelMap};
use crate::raster::{PixelCoord, RasterBuffers};

/// A pixel picked to fit the region's plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSample {
    pub pixel: PixelCoord,
    pub world: Vec3,
}

/// Accumulated data of one labeled region
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub label: i32,
    /// Pixels that passed the illumination threshold
    pub pixel_count: u32,
    /// Sum of albedo RGB over the region, 0..255 per channel
    pub albedo_sum: UVec3,
    /// Sum of decoded illumination
    pub illumination_sum: f32,
    /// Lower-left corner of the bounding box, grown by one pixel
    pub inf: PixelCoord,
    /// Upper-right corner of the bounding box, grown by one pixel
    pub sup: PixelCoord,
    /// Pixel with the smallest `x`, lowest row first
    pub leftmost: PixelCoord,
    /// Up to three well-separated surface samples
    pub plane_samples: Vec<PlaneSample>,
}

impl Region {
    fn new(label: i32, pixel: PixelCoord) -> Self {
        Self {
            label,
            pixel_count: 0,
            albedo_sum: UVec3::ZERO,
            illumination_sum: 0.0,
            inf: pixel,
            sup: pixel,
            leftmost: pixel,
            plane_samples: Vec::with_capacity(3),
        }
    }

    /// Mean albedo in 0..1
    pub fn average_albedo(&self) -> Vec3 {
        if self.pixel_count == 0 {
            return Vec3::ZERO;
        }
        self.albedo_sum.as_vec3() / (self.pixel_count as f32 * 255.0)
    }

    /// Mean decoded illumination
    pub fn average_illumination(&self) -> f32 {
        if self.pixel_count == 0 {
            return 0.0;
        }
        self.illumination_sum / self.pixel_count as f32
    }

    /// The three plane samples, if the region collected all of them
    pub fn plane_sample_positions(&self) -> Option<[Vec3; 3]> {
        match self.plane_samples.as_slice() {
            [a, b, c] => Some([a.world, b.world, c.world]),
            _ => None,
        }
    }

    fn add_pixel(&mut self, pixel: PixelCoord) {
        self.pixel_count += 1;
        self.inf.x = self.inf.x.min(pixel.x);
        self.inf.y = self.inf.y.min(pixel.y);
        self.sup.x = self.sup.x.max(pixel.x);
        self.sup.y = self.sup.y.max(pixel.y);
        if pixel.x < self.leftmost.x {
            self.leftmost = pixel;
        }
    }

    /// Whether `candidate` may join the samples collected so far.
    ///
    /// The first two are always taken. A third must not share a row or a
    /// column with both, and must not lie almost on the line through them.
    fn accepts_sample(&self, candidate: &PlaneSample) -> bool {
        let [a, b] = match self.plane_samples.as_slice() {
            [a, b] => [a, b],
            [_, _, _] => return false,
            _ => return true,
        };
        let c = candidate;
        if a.pixel.x == b.pixel.x && b.pixel.x == c.pixel.x {
            return false;
        }
        if a.pixel.y == b.pixel.y && b.pixel.y == c.pixel.y {
            return false;
        }
        let e0 = (b.world - a.world).normalize_or_zero();
        let e1 = (c.world - a.world).normalize_or_zero();
        e0.dot(e1).abs() <= COLLINEAR_COSINE
    }
}

/// Aggregate every labeled region of `labels`.
///
/// Pixels whose decoded illumination is below `threshold` are set to
/// background in `labels` and do not contribute.
///
/// # Arguments
/// * `labels` - Output of the labeler, updated in place
/// * `buffers` - The rendered buffers the labels were computed from
/// * `camera` - Camera the buffers were rendered with
/// * `threshold` - Minimum decoded illumination
/// * `intensity_scale` - Scale the renderer applied to illumination
///
/// # Returns
/// Regions ordered by label. Bounding boxes are grown by one pixel and
/// clamped to the buffer.
pub fn aggregate_regions<C: ViewportCamera + ?Sized>(
    labels: &mut LabelMap,
    buffers: &RasterBuffers,
    camera: &C,
    threshold: f32,
    intensity_scale: f32,
) -> Vec<Region> {
    let (width, height) = (labels.width(), labels.height());
    let far_clip = camera.far_clip();
    let mut regions: BTreeMap<i32, Region> = BTreeMap::new();

    for y in 0..height {
        for x in 0..width {
            let label = labels.get(x as i64, y as i64);
            if label == BACKGROUND {
                continue;
            }

            let index = buffers.illumination.index(x, y);
            let illumination = decode_illumination(buffers.illumination.pixels()[index], intensity_scale);
            if illumination < threshold {
                labels.set(x, y, BACKGROUND);
                continue;
            }

            let pixel = PixelCoord::new(x, y);
            let region = regions
                .entry(label)
                .or_insert_with(|| Region::new(label, pixel));
            region.add_pixel(pixel);

            let albedo = buffers.albedo.pixels()[index];
            region.albedo_sum += UVec3::new(albedo.r as u32, albedo.g as u32, albedo.b as u32);
            region.illumination_sum += illumination;

            if region.plane_samples.len() < 3 {
                let depth = decode_depth(buffers.depth.pixels()[index], far_clip);
                let viewport = pixel_center_viewport(x, y, width, height);
                let sample = PlaneSample {
                    pixel,
                    world: camera.viewport_to_world_point(viewport, depth),
                };
                if region.accepts_sample(&sample) {
                    region.plane_samples.push(sample);
                }
            }
        }
    }

    let max_x = width.saturating_sub(1);
    let max_y = height.saturating_sub(1);
    regions
        .into_values()
        .map(|mut region| {
            region.inf = PixelCoord::new(region.inf.x.saturating_sub(1), region.inf.y.saturating_sub(1));
            region.sup = PixelCoord::new((region.sup.x + 1).min(max_x), (region.sup.y + 1).min(max_y));
            region
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::encoding::{encode_depth, encode_illumination};
    use crate::labeling::RegionLabeler;
    use crate::raster::Rgba8;
    use glam::Affine3A;
    use pal_config::Resolution;

    const SCALE: f32 = 0.01;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::from_transform(&Affine3A::IDENTITY, 90.0, 0.1, 50.0)
    }

    /// 16x16 buffers with a lit, mergeable block at `x0..x1`, `y0..y1`
    fn block_buffers(x0: u32, x1: u32, y0: u32, y1: u32, illumination: f32) -> RasterBuffers {
        let mut buffers = RasterBuffers::new(Resolution::R16);
        buffers.depth.fill(crate::encoding::NO_GEOMETRY);
        for y in y0..y1 {
            for x in x0..x1 {
                buffers.depth.set(x, y, encode_depth(5.0, 50.0));
                buffers.albedo.set(x, y, Rgba8::new(200, 100, 50, 255));
                buffers.geometry.set(x, y, Rgba8::new(255, 255, 0, 0));
                buffers.illumination.set(x, y, encode_illumination(illumination, SCALE));
            }
        }
        buffers
    }

    fn aggregate(buffers: &RasterBuffers, threshold: f32) -> (LabelMap, Vec<Region>) {
        let mut labeler = RegionLabeler::new();
        let labels = labeler.label(&buffers.depth, &buffers.geometry).unwrap();
        let regions = aggregate_regions(labels, buffers, &camera(), threshold, SCALE);
        (labels.clone(), regions)
    }

    #[test]
    fn test_block_statistics() {
        let buffers = block_buffers(4, 8, 5, 8, 0.8);
        let (_, regions) = aggregate(&buffers, 0.5);
        assert_eq!(regions.len(), 1);

        let region = &regions[0];
        assert_eq!(region.pixel_count, 12);
        assert_eq!(region.inf, PixelCoord::new(3, 4));
        assert_eq!(region.sup, PixelCoord::new(8, 8));
        assert_eq!(region.leftmost, PixelCoord::new(4, 5));
        assert!((region.average_illumination() - 0.8).abs() < 1e-4);

        let albedo = region.average_albedo();
        assert!((albedo - Vec3::new(200.0, 100.0, 50.0) / 255.0).length() < 1e-5);
    }

    #[test]
    fn test_plane_samples_avoid_shared_rows() {
        let buffers = block_buffers(4, 8, 5, 8, 0.8);
        let (_, regions) = aggregate(&buffers, 0.5);
        let samples = &regions[0].plane_samples;
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].pixel, PixelCoord::new(4, 5));
        assert_eq!(samples[1].pixel, PixelCoord::new(5, 5));
        // Rest of the first row is rejected, first pixel of the next row taken
        assert_eq!(samples[2].pixel, PixelCoord::new(4, 6));
        for sample in samples {
            assert!((sample.world.z - 5.0).abs() < 1e-3);
        }
        assert!(regions[0].plane_sample_positions().is_some());
    }

    #[test]
    fn test_line_never_gets_three_samples() {
        let buffers = block_buffers(3, 12, 7, 8, 0.8);
        let (_, regions) = aggregate(&buffers, 0.5);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].plane_samples.len(), 2);
        assert!(regions[0].plane_sample_positions().is_none());
    }

    #[test]
    fn test_dim_pixels_become_background() {
        let buffers = block_buffers(4, 8, 5, 8, 0.3);
        let (labels, regions) = aggregate(&buffers, 0.5);
        assert!(regions.is_empty());
        assert!(labels.labels().iter().all(|&l| l == BACKGROUND));
    }

    #[test]
    fn test_bounding_box_is_clamped() {
        let buffers = block_buffers(0, 3, 0, 16, 0.8);
        let (_, regions) = aggregate(&buffers, 0.5);
        assert_eq!(regions[0].inf, PixelCoord::new(0, 0));
        assert_eq!(regions[0].sup, PixelCoord::new(3, 15));
    }
}
