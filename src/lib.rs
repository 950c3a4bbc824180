//! RGB-D 多任务数据集
//!
//! opencv
//! https://docs.rs/opencv/latest/opencv/all.html
//!
//! nalgebra
//! https://docs.rs/nalgebra/latest/nalgebra/
//!
//! ndarray
//! https://docs.rs/ndarray/latest/ndarray/all.html
pub mod config;
pub mod dataset;
pub mod depth;
pub mod error;
pub mod global_cast;
pub mod pose;
pub mod resize;

pub use config::DatasetConfig;
pub use dataset::{DatasetTrait, DefaultDataset, MultitaskDataset, Sample};
pub use error::{DatasetError, Result};
