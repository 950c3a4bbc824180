use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use opencv::core::Vector;
use opencv::imgcodecs;
use opencv::prelude::*;

use rgbd_multitask::config::{MissingPosePolicy, TargetSize};
use rgbd_multitask::depth;
use rgbd_multitask::{DatasetConfig, DatasetTrait, DefaultDataset};

/// 索引 RGB-D 数据集并读取样本
#[derive(Parser, Debug)]
#[command(name = "rgbd-multitask")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON 配置文件，命令行参数覆盖其中的字段
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 包含深度和彩色目录的根目录
    #[arg(long)]
    root_dir: Option<PathBuf>,

    /// 标注文件，`name` 列为允许的视频
    #[arg(long)]
    annotation_file: Option<PathBuf>,

    #[arg(long)]
    pose: bool,

    #[arg(long)]
    no_rgb: bool,

    #[arg(long)]
    no_depth: bool,

    /// 帧缺少姿态标注时返回空而不是报错
    #[arg(long)]
    skip_missing_pose: bool,

    /// 输出尺寸 HEIGHTxWIDTH
    #[arg(long, value_parser = parse_size)]
    size: Option<TargetSize>,

    /// 要读取的样本下标
    #[arg(short, long)]
    sample: Vec<usize>,

    /// 深度预览图输出目录
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// 缩放后的深度帧以 PFM 格式导出到该目录
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn parse_size(s: &str) -> Result<TargetSize, String> {
    let (height, width) = s
        .split_once('x')
        .ok_or_else(|| format!("expected HEIGHTxWIDTH, found {s:?}"))?;
    let height = height.trim().parse().map_err(|_| format!("invalid height {height:?}"))?;
    let width = width.trim().parse().map_err(|_| format!("invalid width {width:?}"))?;
    Ok(TargetSize { height, width })
}

impl Args {
    fn dataset_config(&self) -> anyhow::Result<DatasetConfig> {
        let mut config = match &self.config {
            Some(path) => DatasetConfig::from_json_file(path)
                .with_context(|| format!("failed to read config {:?}", path))?,
            None => DatasetConfig::default(),
        };
        if let Some(root_dir) = &self.root_dir {
            config.root_dir = root_dir.clone();
        }
        if let Some(annotation_file) = &self.annotation_file {
            config.annotation_file = annotation_file.clone();
        }
        if let Some(size) = self.size {
            config.target_size = size;
        }
        config.pose |= self.pose;
        config.rgb &= !self.no_rgb;
        config.depth &= !self.no_depth;
        if self.skip_missing_pose {
            config.missing_pose = MissingPosePolicy::Skip;
        }
        anyhow::ensure!(
            !config.root_dir.as_os_str().is_empty(),
            "root_dir is not set"
        );
        anyhow::ensure!(
            !config.annotation_file.as_os_str().is_empty(),
            "annotation_file is not set"
        );
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_nanos()
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = args.dataset_config()?;
    log::info!("root: {:?}", config.root_dir);

    let dataset = DefaultDataset::open(config).context("failed to index dataset")?;
    log::info!("{} samples", dataset.len());
    for (class, count) in dataset.index().class_counts() {
        log::info!("  {}: {}", class, count);
    }
    if let Some(poses) = dataset.poses() {
        log::info!(
            "{} annotated frames, {} landmark values",
            poses.len(),
            poses.columns().len()
        );
    }

    for dir in [&args.preview_dir, &args.export_dir].into_iter().flatten() {
        std::fs::create_dir_all(dir)?;
    }
    for &index in &args.sample {
        let sample = dataset
            .get(index)
            .with_context(|| format!("failed to load sample {}", index))?;
        log::info!("sample {}: label {}", index, sample.label);
        if let Some(color) = &sample.color {
            log::info!("  color: {}x{}x{}", color.rows(), color.cols(), color.channels());
        }
        if let Some(pose) = &sample.pose {
            log::info!("  pose: {} values", pose.len());
        }
        if let Some(plane) = &sample.depth {
            let (height, width) = plane.dim();
            log::info!("  depth: {}x{}", height, width);
            if let Some(dir) = &args.preview_dir {
                let path = dir.join(format!("depth_{index:06}.png"));
                let preview = depth::to_preview(plane)?;
                let path_str = path.to_str().context("preview path is not valid UTF-8")?;
                imgcodecs::imwrite(path_str, &preview, &Vector::new())?;
                log::info!("  preview: {:?}", path);
            }
            if let Some(dir) = &args.export_dir {
                let path = dir.join(format!("depth_{index:06}.pfm"));
                depth::write_pfm(&path, &depth::plane_to_raster(plane))?;
                log::info!("  export: {:?}", path);
            }
        }
    }
    Ok(())
}

#[test]
fn test_parse_size() {
    assert_eq!(
        parse_size("360x640"),
        Ok(TargetSize {
            height: 360,
            width: 640
        })
    );
    assert!(parse_size("360").is_err());
    assert!(parse_size("ax640").is_err());
}
