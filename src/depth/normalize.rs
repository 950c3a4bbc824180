use ndarray::{Array, Array2, ArrayView, Axis, Dimension};
use opencv::core::{Mat, Scalar, CV_8UC1};
use opencv::prelude::*;

use super::DepthRaster;
use crate::error::{DatasetError, Result};

/// 去掉单通道维度并归一化到 [0,1]。
pub fn to_plane(raster: &DepthRaster) -> Result<Array2<f32>> {
    if raster.channels() != 1 {
        return Err(DatasetError::format(
            "",
            format!(
                "depth plane needs a single channel, raster has {}",
                raster.channels()
            ),
        ));
    }
    Ok(normalize(raster.data.index_axis(Axis(2), 0)))
}

/// Min-max 归一化。
///
/// NaN 和 ±inf 先替换为 0.0 再统计最值；所有值相同时返回全 0。
pub fn normalize<D: Dimension>(data: ArrayView<f32, D>) -> Array<f32, D> {
    let cleaned = data.mapv(|v| if v.is_finite() { v } else { 0.0 });
    // f64 统计，避免 max - min 超出 f32 范围
    let (min, max) = cleaned
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    let range = max - min;
    if range <= 0.0 {
        return Array::zeros(cleaned.raw_dim());
    }
    cleaned.mapv_into(|v| ((v as f64 - min) / range) as f32)
}

/// 8 位灰度预览图，`x * 255` 并截断。
pub fn to_preview(plane: &Array2<f32>) -> Result<Mat> {
    let (rows, cols) = plane.dim();
    let mut mat =
        Mat::new_rows_cols_with_default(rows as i32, cols as i32, CV_8UC1, Scalar::all(0.))?;
    let pixels = mat.data_typed_mut::<u8>()?;
    for (dst, &v) in pixels.iter_mut().zip(plane.iter()) {
        *dst = (v * 255.0).clamp(0.0, 255.0) as u8;
    }
    Ok(mat)
}
