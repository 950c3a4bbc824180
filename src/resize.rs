//! 缩放到固定尺寸（不裁剪，不保持宽高比）

use ndarray::Array2;
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;

use crate::config::TargetSize;
use crate::error::Result;
use crate::global_cast::Plane;

pub fn resize_image(image: &Mat, size: TargetSize) -> Result<Mat> {
    let dsize = Size::new(size.width as i32, size.height as i32);
    if image.size()? == dsize {
        return Ok(image.try_clone()?);
    }
    let mut resized = Mat::default();
    imgproc::resize(image, &mut resized, dsize, 0.0, 0.0, imgproc::INTER_LINEAR)?;
    Ok(resized)
}

pub fn resize_plane(plane: Array2<f32>, size: TargetSize) -> Result<Array2<f32>> {
    if plane.dim() == (size.height, size.width) {
        return Ok(plane);
    }
    let mat = Mat::try_from(&Plane(plane))?;
    let resized = resize_image(&mat, size)?;
    Ok(Plane::try_from(&resized)?.0)
}
