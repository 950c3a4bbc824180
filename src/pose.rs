//! 姿态标注
//!
//! - 标注文件：`video_column` 列给出允许的视频名
//! - 姿态表：`identity_column` 为 `.../class/video/frame` 路径，其余列为关键点坐标

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use nalgebra::DVector;

use crate::config::CoordinateRule;
use crate::error::{DatasetError, Result};

/// 有标注的视频名集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedVideos(HashSet<String>);

impl AllowedVideos {
    pub fn from_path(path: impl AsRef<Path>, video_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let column = reader
            .headers()?
            .iter()
            .position(|name| name == video_column)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: video_column.to_string(),
                path: path.to_path_buf(),
            })?;

        let mut videos = HashSet::new();
        for record in reader.records() {
            let record = record?;
            if let Some(name) = record.get(column) {
                videos.insert(name.to_string());
            }
        }
        log::info!("{} annotated videos in {:?}", videos.len(), path);
        Ok(Self(videos))
    }

    pub fn contains(&self, video: &str) -> bool {
        self.0.contains(video)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AllowedVideos {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// `class/video/frame` -> 关键点向量
#[derive(Debug, Clone, Default)]
pub struct PoseIndex {
    columns: Vec<String>,
    landmarks: HashMap<String, DVector<f32>>,
}

impl PoseIndex {
    pub fn from_path(
        path: impl AsRef<Path>,
        identity_column: &str,
        rules: &[CoordinateRule],
        allowed: &AllowedVideos,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, identity_column, rules, allowed).map_err(|err| match err {
            DatasetError::MissingColumn { column, .. } => DatasetError::MissingColumn {
                column,
                path: path.to_path_buf(),
            },
            err => err,
        })
    }

    pub fn from_reader<R: Read>(
        reader: R,
        identity_column: &str,
        rules: &[CoordinateRule],
        allowed: &AllowedVideos,
    ) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let identity = headers
            .iter()
            .position(|name| name == identity_column)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: identity_column.to_string(),
                path: Default::default(),
            })?;

        // (列号, 列名, 除数)
        let columns: Vec<(usize, &str, Option<f32>)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != identity)
            .map(|(i, name)| {
                let divisor = rules
                    .iter()
                    .find(|rule| name.ends_with(&rule.suffix))
                    .map(|rule| rule.divisor);
                (i, name, divisor)
            })
            .collect();

        let mut landmarks = HashMap::new();
        let mut skipped = 0usize;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let scorer = record.get(identity).unwrap_or_default();
            let key = FrameKey::parse(scorer).ok_or_else(|| DatasetError::Value {
                column: identity_column.to_string(),
                row,
                reason: format!("expected class/video/frame path, found {scorer:?}"),
            })?;
            if !allowed.contains(key.video) {
                skipped += 1;
                continue;
            }

            let values = columns
                .iter()
                .map(|&(i, name, divisor)| {
                    let cell = record.get(i).unwrap_or_default().trim();
                    let value = parse_cell(cell).ok_or_else(|| DatasetError::Value {
                        column: name.to_string(),
                        row,
                        reason: format!("{cell:?} is not a finite number"),
                    })?;
                    Ok(match divisor {
                        Some(divisor) => (value / divisor).clamp(0.0, 1.0),
                        None => value,
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            landmarks.insert(key.to_string(), DVector::from_vec(values));
        }
        log::info!(
            "pose index: {} frames, {} landmark values each, {} rows outside allowed videos",
            landmarks.len(),
            columns.len(),
            skipped
        );

        Ok(Self {
            columns: columns.iter().map(|(_, name, _)| name.to_string()).collect(),
            landmarks,
        })
    }

    pub fn get(&self, key: &str) -> Option<&DVector<f32>> {
        self.landmarks.get(key)
    }

    /// 关键点列名，顺序与向量一致
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

fn parse_cell(cell: &str) -> Option<f32> {
    cell.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// `scorer` 路径的最后三段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameKey<'a> {
    pub class: &'a str,
    pub video: &'a str,
    pub frame: &'a str,
}

impl<'a> FrameKey<'a> {
    pub fn parse(path: &'a str) -> Option<Self> {
        let mut segments = path.rsplit(|c: char| c == '/' || c == '\\');
        let frame = segments.next()?;
        let video = segments.next()?;
        let class = segments.next()?;
        Some(Self {
            class,
            video,
            frame,
        })
    }
}

impl std::fmt::Display for FrameKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.class, self.video, self.frame)
    }
}
