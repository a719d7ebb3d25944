use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::config::AreaRange;
use super::segment::Point;

#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    m00: u64,
    m10: u64,
    m01: u64,
}

/// 连通域面积过滤 + 质心
#[derive(Debug, Clone)]
pub struct BlobExtractor {
    area: AreaRange,
}

impl BlobExtractor {
    pub fn new(area: AreaRange) -> Self {
        Self { area }
    }

    /// Centroids of 8-connected foreground regions whose pixel area is
    /// strictly inside the configured range, in label discovery order.
    pub fn extract(&self, mask: &GrayImage) -> Vec<Point> {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

        let mut moments: Vec<Moments> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if label > moments.len() {
                moments.resize(label, Moments::default());
            }
            let m = &mut moments[label - 1];
            m.m00 += 1;
            m.m10 += x as u64;
            m.m01 += y as u64;
        }

        moments
            .iter()
            .filter(|m| m.m00 > 0 && self.area.accepts(m.m00 as u32))
            .map(|m| Point {
                x: (m.m10 / m.m00) as u32,
                y: (m.m01 / m.m00) as u32,
            })
            .collect()
    }
}
