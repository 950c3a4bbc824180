//! 错误类型

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// 深度文件头或数据损坏
    #[error("malformed depth file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// 标注表中的非数值列
    #[error("invalid value in column `{column}` at row {row}: {reason}")]
    Value {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("missing column `{column}` in {path}")]
    MissingColumn { column: String, path: PathBuf },

    /// 帧没有对应的姿态标注
    #[error("no pose landmarks for frame `{0}`")]
    MissingPose(String),

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("failed to decode image {0}")]
    ImageDecode(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatasetError {
    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DatasetError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
