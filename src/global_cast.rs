//! 全局类型转换
//!
//! [ndarray] 数组与 OpenCV [Mat] 之间的转换

use ndarray::Array2;
use opencv::core::{Mat, Scalar, CV_32FC1};
use opencv::prelude::*;

/// 单通道 f32 平面
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plane(pub Array2<f32>);

/// 将 [Plane] 转换为 `CV_32FC1` 的 [Mat]
impl TryFrom<&Plane> for Mat {
    type Error = opencv::Error;

    fn try_from(plane: &Plane) -> Result<Self, Self::Error> {
        let (rows, cols) = plane.0.dim();
        let mut mat =
            Mat::new_rows_cols_with_default(rows as i32, cols as i32, CV_32FC1, Scalar::all(0.))?;
        let data = mat.data_typed_mut::<f32>()?;
        for (dst, &src) in data.iter_mut().zip(plane.0.iter()) {
            *dst = src;
        }
        Ok(mat)
    }
}

/// 将 `CV_32FC1` 的 [Mat] 转换为 [Plane]
impl TryFrom<&Mat> for Plane {
    type Error = opencv::Error;

    fn try_from(mat: &Mat) -> Result<Self, Self::Error> {
        let rows = mat.rows() as usize;
        let cols = mat.cols() as usize;
        let continuous;
        let mat = if mat.is_continuous() {
            mat
        } else {
            continuous = mat.try_clone()?;
            &continuous
        };
        let data = mat.data_typed::<f32>()?;
        let array = Array2::from_shape_vec((rows, cols), data.to_vec()).map_err(|err| {
            opencv::Error::new(opencv::core::StsUnmatchedSizes, err.to_string())
        })?;
        Ok(Plane(array))
    }
}
