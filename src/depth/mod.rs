//! 深度帧解码与归一化
pub mod normalize;
pub mod pfm;

use ndarray::Array3;

pub use normalize::{normalize, to_plane, to_preview};
pub use pfm::{plane_to_raster, read_pfm, write_pfm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// 一帧解码后的深度数据，(height, width, channels)，channels 为 1 或 3。
#[derive(Debug, Clone, PartialEq)]
pub struct DepthRaster {
    pub data: Array3<f32>,
    /// scale 的绝对值
    pub scale: f32,
    pub endianness: Endianness,
}

impl DepthRaster {
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }
}
