//! 数据集处理
//!
//! 深度帧 / 彩色帧 / 姿态标注对齐后的多任务数据集
mod multitask;
pub mod pairing;

pub use multitask::{ColorTransform, MultitaskDataset, Sample};
pub use pairing::{build_index, FrameIndex, FrameRecord, PairingPolicy, PositionalPairing};

use crate::error::Result;

pub type DefaultDataset = MultitaskDataset;

pub trait DatasetTrait {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按需读取一个样本，不做缓存
    fn get(&self, index: usize) -> Result<Self::Item>;
}
