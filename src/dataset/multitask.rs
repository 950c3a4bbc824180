use ndarray::Array2;
use nalgebra::DVector;
use opencv::core::Mat;
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;

use super::pairing::{build_index, FrameIndex, FrameRecord, PositionalPairing};
use super::DatasetTrait;
use crate::config::{DatasetConfig, MissingPosePolicy};
use crate::depth;
use crate::error::{DatasetError, Result};
use crate::pose::{AllowedVideos, PoseIndex};
use crate::resize::{resize_image, resize_plane};

/// 作用于彩色帧的变换，在缩放之后执行
pub trait ColorTransform: Send + Sync {
    fn apply(&self, image: Mat) -> Result<Mat>;
}

impl<F> ColorTransform for F
where
    F: Fn(Mat) -> Result<Mat> + Send + Sync,
{
    fn apply(&self, image: Mat) -> Result<Mat> {
        self(image)
    }
}

/// 一个样本，字段是否存在取决于配置
#[derive(Debug)]
pub struct Sample {
    /// RGB, `CV_8UC3`
    pub color: Option<Mat>,
    /// 归一化到 [0,1] 的深度
    pub depth: Option<Array2<f32>>,
    pub pose: Option<DVector<f32>>,
    pub label: String,
}

pub struct MultitaskDataset {
    config: DatasetConfig,
    index: FrameIndex,
    poses: Option<PoseIndex>,
    transform: Option<Box<dyn ColorTransform>>,
}

impl MultitaskDataset {
    /// 读取标注并遍历目录，构建完成后只读。
    pub fn open(config: DatasetConfig) -> Result<Self> {
        let allowed = AllowedVideos::from_path(&config.annotation_file, &config.video_column)?;
        let poses = if config.pose {
            Some(PoseIndex::from_path(
                config.pose_csv_path(),
                &config.identity_column,
                &config.coordinate_rules,
                &allowed,
            )?)
        } else {
            None
        };
        let index = build_index(
            &config.depth_dir(),
            &config.rgb_dir(),
            &allowed,
            &config.depth_ext,
            &PositionalPairing,
        )?;
        Ok(Self::from_parts(config, index, poses))
    }

    pub fn from_parts(config: DatasetConfig, index: FrameIndex, poses: Option<PoseIndex>) -> Self {
        Self {
            config,
            index,
            poses,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: impl ColorTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn index(&self) -> &FrameIndex {
        &self.index
    }

    pub fn poses(&self) -> Option<&PoseIndex> {
        self.poses.as_ref()
    }

    pub fn record(&self, index: usize) -> Result<&FrameRecord> {
        self.index.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.index.len(),
        })
    }

    /// 解码、归一化并缩放深度帧
    pub fn load_depth(&self, record: &FrameRecord) -> Result<Array2<f32>> {
        let raster = depth::read_pfm(&record.depth_path)?;
        let plane = depth::to_plane(&raster).map_err(|err| match err {
            DatasetError::Format { reason, .. } => {
                DatasetError::format(&record.depth_path, reason)
            }
            err => err,
        })?;
        resize_plane(plane, self.config.target_size)
    }

    /// 读取彩色帧，转为 RGB，缩放后执行变换
    pub fn load_color(&self, record: &FrameRecord) -> Result<Mat> {
        let path = record
            .color_path
            .to_str()
            .ok_or_else(|| DatasetError::ImageDecode(record.color_path.clone()))?;
        let bgr = imgcodecs::imread(path, imgcodecs::IMREAD_COLOR)?;
        if bgr.empty() {
            return Err(DatasetError::ImageDecode(record.color_path.clone()));
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let resized = resize_image(&rgb, self.config.target_size)?;
        match &self.transform {
            Some(transform) => transform.apply(resized),
            None => Ok(resized),
        }
    }

    pub fn load_pose(&self, record: &FrameRecord) -> Result<Option<DVector<f32>>> {
        let Some(poses) = &self.poses else {
            return Ok(None);
        };
        match (poses.get(&record.pose_key), self.config.missing_pose) {
            (Some(landmarks), _) => Ok(Some(landmarks.clone())),
            (None, MissingPosePolicy::Skip) => {
                log::debug!("no pose for {}", record.pose_key);
                Ok(None)
            }
            (None, MissingPosePolicy::Fail) => {
                Err(DatasetError::MissingPose(record.pose_key.clone()))
            }
        }
    }
}

impl DatasetTrait for MultitaskDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.index.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let record = self.record(index)?;
        log::debug!("sample {}: {:?}", index, record.depth_path);

        let depth = if self.config.depth {
            Some(self.load_depth(record)?)
        } else {
            None
        };
        let color = if self.config.rgb {
            Some(self.load_color(record)?)
        } else {
            None
        };
        let pose = if self.config.pose {
            self.load_pose(record)?
        } else {
            None
        };

        Ok(Sample {
            color,
            depth,
            pose,
            label: record.label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetSize;
    use crate::depth::{write_pfm, DepthRaster, Endianness};
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use opencv::core::{Scalar, Vec3b, Vector, CV_8UC3};
    use std::path::Path;

    const POSE_CSV: &str = "\
scorer,nose_x,nose_y,wrist_x,wrist_y
labeled-data/cls1/vidA/0.jpg,320,180,640,0
labeled-data/cls1/vidB/0.jpg,0,0,0,0
";

    fn write_depth(path: &Path, offset: f32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let data = Array3::from_shape_fn((6, 8, 1), |(r, c, _)| offset + (r * 8 + c) as f32);
        let raster = DepthRaster {
            data,
            scale: 1.0,
            endianness: Endianness::Little,
        };
        write_pfm(path, &raster).unwrap();
    }

    fn write_color(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        // BGR
        let image =
            Mat::new_rows_cols_with_default(6, 8, CV_8UC3, Scalar::new(0., 0., 255., 0.)).unwrap();
        imgcodecs::imwrite(path.to_str().unwrap(), &image, &Vector::new()).unwrap();
    }

    /// depth/cls1/vidA/{0,1}.pfm, rgb/cls1/vidA/{0,1}.jpg, vidX 不在标注中
    fn fixture(root: &Path) -> DatasetConfig {
        for i in 0..2 {
            write_depth(&root.join(format!("depth/cls1/vidA/{i}.pfm")), i as f32);
            write_color(&root.join(format!("rgb/cls1/vidA/{i}.jpg")));
            write_depth(&root.join(format!("depth/cls1/vidX/{i}.pfm")), 0.0);
            write_color(&root.join(format!("rgb/cls1/vidX/{i}.jpg")));
        }
        std::fs::write(root.join("annotations.csv"), "name,label\nvidA,cls1\n").unwrap();
        std::fs::write(root.join("landmarks.csv"), POSE_CSV).unwrap();

        DatasetConfig {
            depth_folder: "depth".to_string(),
            rgb_folder: "rgb".to_string(),
            pose_csv: "landmarks.csv".to_string(),
            target_size: TargetSize {
                height: 3,
                width: 4,
            },
            ..DatasetConfig::new(root, root.join("annotations.csv"))
        }
    }

    #[test]
    fn end_to_end() {
        let root = tempfile::tempdir().unwrap();
        let config = DatasetConfig {
            pose: true,
            missing_pose: MissingPosePolicy::Skip,
            ..fixture(root.path())
        };
        let dataset = MultitaskDataset::open(config).unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(!dataset.is_empty());

        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.label, "cls1");

        let depth = sample.depth.unwrap();
        assert_eq!(depth.dim(), (3, 4));
        assert!(depth.iter().all(|v| (0.0..=1.0).contains(v)));

        let color = sample.color.unwrap();
        assert_eq!((color.rows(), color.cols()), (3, 4));
        let pixel = color.at_2d::<Vec3b>(1, 1).unwrap();
        // RGB 顺序，JPEG 有损
        assert!(pixel[0] > 200 && pixel[2] < 50, "{pixel:?}");

        let pose = sample.pose.unwrap();
        assert_eq!(pose.len(), 4);
        assert_abs_diff_eq!(pose[0], 0.5);
        assert_abs_diff_eq!(pose[1], 0.5);
        assert_abs_diff_eq!(pose[2], 1.0);

        // 1.jpg 没有姿态标注
        let sample = dataset.get(1).unwrap();
        assert!(sample.pose.is_none());
    }

    #[test]
    fn missing_pose_fails_by_default() {
        let root = tempfile::tempdir().unwrap();
        let config = DatasetConfig {
            pose: true,
            ..fixture(root.path())
        };
        let dataset = MultitaskDataset::open(config).unwrap();
        assert!(dataset.get(0).is_ok());
        match dataset.get(1).unwrap_err() {
            DatasetError::MissingPose(key) => assert_eq!(key, "cls1/vidA/1.jpg"),
            err => panic!("unexpected error {err}"),
        }
    }

    #[test]
    fn modality_flags() {
        let root = tempfile::tempdir().unwrap();
        let config = DatasetConfig {
            rgb: false,
            ..fixture(root.path())
        };
        let dataset = MultitaskDataset::open(config).unwrap();
        assert!(dataset.poses().is_none());
        let sample = dataset.get(1).unwrap();
        assert!(sample.color.is_none());
        assert!(sample.pose.is_none());
        assert!(sample.depth.is_some());
        assert_eq!(sample.label, "cls1");
    }

    #[test]
    fn out_of_range() {
        let root = tempfile::tempdir().unwrap();
        let dataset = MultitaskDataset::open(fixture(root.path())).unwrap();
        assert!(matches!(
            dataset.get(2),
            Err(DatasetError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn transform_applies_to_color_only() {
        let root = tempfile::tempdir().unwrap();
        let dataset = MultitaskDataset::open(fixture(root.path()))
            .unwrap()
            .with_transform(|image: Mat| -> Result<Mat> {
                let mut flipped = Mat::default();
                opencv::core::flip(&image, &mut flipped, 1)?;
                let mut gray = Mat::default();
                imgproc::cvt_color(&flipped, &mut gray, imgproc::COLOR_RGB2GRAY, 0)?;
                Ok(gray)
            });
        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.color.unwrap().channels(), 1);
        assert_eq!(sample.depth.unwrap().dim(), (3, 4));
    }

    #[test]
    fn corrupt_depth_is_reported_lazily() {
        let root = tempfile::tempdir().unwrap();
        let config = fixture(root.path());
        let broken = root.path().join("depth/cls1/vidA/1.pfm");
        std::fs::write(&broken, b"Pf\n8 6\n-1.0\n").unwrap();

        let dataset = MultitaskDataset::open(config).unwrap();
        assert!(dataset.get(0).is_ok());
        match dataset.get(1).unwrap_err() {
            DatasetError::Format { path, .. } => assert_eq!(path, broken),
            err => panic!("unexpected error {err}"),
        }
    }
}
