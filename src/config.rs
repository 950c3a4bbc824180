use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEPTH_FOLDER: &str = "depth_poses";
pub const RGB_FOLDER: &str = "salient_poses";
pub const POSE_CSV: &str = "salient_landmarks.csv";
/// 深度帧文件后缀
pub const DEPTH_EXT: &str = "pfm";
/// 标注文件中视频名所在的列
pub const VIDEO_COLUMN: &str = "name";
/// 姿态表中帧路径所在的列
pub const IDENTITY_COLUMN: &str = "scorer";

pub const TARGET_HEIGHT: usize = 360;
pub const TARGET_WIDTH: usize = 640;

/// 输出帧尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub height: usize,
    pub width: usize,
}

impl Default for TargetSize {
    fn default() -> Self {
        Self {
            height: TARGET_HEIGHT,
            width: TARGET_WIDTH,
        }
    }
}

/// 坐标列规则：列名以 `suffix` 结尾时除以 `divisor` 并截断到 [0,1]。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRule {
    pub suffix: String,
    pub divisor: f32,
}

impl CoordinateRule {
    pub fn new(suffix: &str, divisor: f32) -> Self {
        Self {
            suffix: suffix.to_string(),
            divisor,
        }
    }
}

pub fn default_coordinate_rules() -> Vec<CoordinateRule> {
    vec![
        CoordinateRule::new("_x", TARGET_WIDTH as f32),
        CoordinateRule::new("_y", TARGET_HEIGHT as f32),
    ]
}

/// 帧在姿态表中缺失时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPosePolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub root_dir: PathBuf,
    pub annotation_file: PathBuf,
    pub rgb: bool,
    pub depth: bool,
    pub pose: bool,
    pub depth_folder: String,
    pub rgb_folder: String,
    /// 相对于 `root_dir`
    pub pose_csv: String,
    pub target_size: TargetSize,
    pub depth_ext: String,
    pub video_column: String,
    pub identity_column: String,
    pub coordinate_rules: Vec<CoordinateRule>,
    pub missing_pose: MissingPosePolicy,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::new(),
            annotation_file: PathBuf::new(),
            rgb: true,
            depth: true,
            pose: false,
            depth_folder: DEPTH_FOLDER.to_string(),
            rgb_folder: RGB_FOLDER.to_string(),
            pose_csv: POSE_CSV.to_string(),
            target_size: TargetSize::default(),
            depth_ext: DEPTH_EXT.to_string(),
            video_column: VIDEO_COLUMN.to_string(),
            identity_column: IDENTITY_COLUMN.to_string(),
            coordinate_rules: default_coordinate_rules(),
            missing_pose: MissingPosePolicy::default(),
        }
    }
}

impl DatasetConfig {
    pub fn new(root_dir: impl Into<PathBuf>, annotation_file: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            annotation_file: annotation_file.into(),
            ..Default::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    pub fn depth_dir(&self) -> PathBuf {
        self.root_dir.join(&self.depth_folder)
    }

    pub fn rgb_dir(&self) -> PathBuf {
        self.root_dir.join(&self.rgb_folder)
    }

    pub fn pose_csv_path(&self) -> PathBuf {
        self.root_dir.join(&self.pose_csv)
    }
}
