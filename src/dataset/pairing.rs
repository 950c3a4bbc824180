//! 深度帧与彩色帧配对
//!
//! 目录结构：`{depth_root}/{class}/{video}/*.{ext}` 与 `{color_root}/{class}/{video}/*`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pose::AllowedVideos;

/// 一个对齐的样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub depth_path: PathBuf,
    pub color_path: PathBuf,
    /// `class/video/color_frame_filename`
    pub pose_key: String,
    pub label: String,
}

/// 同一视频内深度帧和彩色帧的配对方式
pub trait PairingPolicy {
    /// 返回 `None` 表示整个视频被丢弃
    fn pair(&self, depth: Vec<PathBuf>, color: Vec<PathBuf>) -> Option<Vec<(PathBuf, PathBuf)>>;
}

/// 两个列表分别按文件名排序后按位置一一对应，长度不同则丢弃整个视频。
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalPairing;

impl PairingPolicy for PositionalPairing {
    fn pair(
        &self,
        mut depth: Vec<PathBuf>,
        mut color: Vec<PathBuf>,
    ) -> Option<Vec<(PathBuf, PathBuf)>> {
        if depth.len() != color.len() {
            return None;
        }
        depth.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        color.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Some(depth.into_iter().zip(color).collect())
    }
}

/// 构建后只读
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    records: Vec<FrameRecord>,
}

impl FrameIndex {
    pub fn new(records: Vec<FrameRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// 每个类别的样本数
    pub fn class_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.label.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// 遍历目录并配对。类别和视频按名称排序，结果与文件系统的列举顺序无关。
pub fn build_index(
    depth_root: &Path,
    color_root: &Path,
    allowed: &AllowedVideos,
    depth_ext: &str,
    policy: &impl PairingPolicy,
) -> Result<FrameIndex> {
    let mut records = Vec::new();
    let mut skipped_videos = 0usize;

    for class in list_dir_names(depth_root)? {
        let class_depth = depth_root.join(&class);
        let class_color = color_root.join(&class);
        if !class_color.is_dir() {
            log::debug!("class {} has no color directory, skipped", class);
            continue;
        }

        for video in list_dir_names(&class_depth)? {
            if !allowed.contains(&video) {
                continue;
            }
            let video_depth = class_depth.join(&video);
            let video_color = class_color.join(&video);

            let depth_suffix = format!(".{depth_ext}");
            let depth_frames = list_files(&video_depth)?
                .into_iter()
                .filter(|path| {
                    path.file_name()
                        .map_or(false, |name| name.to_string_lossy().ends_with(&depth_suffix))
                })
                .collect::<Vec<_>>();
            let color_frames = if video_color.is_dir() {
                list_files(&video_color)?
            } else {
                log::warn!("{:?} is missing", video_color);
                Vec::new()
            };
            let (n_depth, n_color) = (depth_frames.len(), color_frames.len());

            let Some(pairs) = policy.pair(depth_frames, color_frames) else {
                log::warn!(
                    "{}/{}: {} depth frames vs {} color frames, video skipped",
                    class,
                    video,
                    n_depth,
                    n_color
                );
                skipped_videos += 1;
                continue;
            };
            log::debug!("{}/{}: {} frames", class, video, pairs.len());

            for (depth_path, color_path) in pairs {
                let frame = color_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                records.push(FrameRecord {
                    depth_path,
                    color_path,
                    pose_key: format!("{}/{}/{}", class, video, frame),
                    label: class.clone(),
                });
            }
        }
    }

    log::info!(
        "indexed {} frames from {:?}, {} videos skipped",
        records.len(),
        depth_root,
        skipped_videos
    );
    Ok(FrameIndex::new(records))
}

/// 排序后的子目录名，跟随符号链接
fn list_dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: PathBuf) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    /// `{root}/{depth|rgb}/{class}/{video}/` 下创建指定数量的帧
    fn make_video(root: &Path, class: &str, video: &str, n_depth: usize, n_color: usize) {
        for i in 0..n_depth {
            touch(root.join("depth").join(class).join(video).join(format!("{i:03}.pfm")));
        }
        for i in 0..n_color {
            touch(root.join("rgb").join(class).join(video).join(format!("{i:03}.jpg")));
        }
    }

    fn build(root: &Path, videos: &[&str]) -> FrameIndex {
        let allowed: AllowedVideos = videos.iter().copied().collect();
        build_index(
            &root.join("depth"),
            &root.join("rgb"),
            &allowed,
            "pfm",
            &PositionalPairing,
        )
        .unwrap()
    }

    #[test]
    fn positional_pairing_sorts_each_list() {
        let depth = ["d/2.pfm", "d/10.pfm", "d/1.pfm"].map(PathBuf::from).to_vec();
        let color = ["c/b.jpg", "c/a.jpg", "c/c.jpg"].map(PathBuf::from).to_vec();
        let pairs = PositionalPairing.pair(depth, color).unwrap();
        assert_eq!(
            pairs,
            vec![
                (PathBuf::from("d/1.pfm"), PathBuf::from("c/a.jpg")),
                (PathBuf::from("d/10.pfm"), PathBuf::from("c/b.jpg")),
                (PathBuf::from("d/2.pfm"), PathBuf::from("c/c.jpg")),
            ]
        );

        let depth = vec![PathBuf::from("d/1.pfm")];
        assert!(PositionalPairing.pair(depth, vec![]).is_none());
    }

    #[test]
    fn allow_list_filters_videos() {
        let root = tempfile::tempdir().unwrap();
        make_video(root.path(), "cls1", "A", 2, 2);
        make_video(root.path(), "cls1", "B", 3, 3);
        make_video(root.path(), "cls2", "C", 4, 4);

        let index = build(root.path(), &["A", "B"]);
        assert_eq!(index.len(), 5);
        assert!(index.records().iter().all(|r| !r.pose_key.contains("/C/")));
        assert!(index
            .records()
            .iter()
            .all(|r| !r.depth_path.starts_with(root.path().join("depth/cls2/C"))));
    }

    #[test]
    fn mismatched_video_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        make_video(root.path(), "cls1", "short", 5, 4);
        make_video(root.path(), "cls1", "full", 5, 5);

        let index = build(root.path(), &["short", "full"]);
        assert_eq!(index.len(), 5);
        for (i, record) in index.records().iter().enumerate() {
            assert_eq!(record.label, "cls1");
            assert_eq!(record.pose_key, format!("cls1/full/{i:03}.jpg"));
            assert_eq!(record.depth_path.file_name().unwrap(), format!("{i:03}.pfm").as_str());
        }
    }

    #[test]
    fn depth_extension_filter_and_sorted_classes() {
        let root = tempfile::tempdir().unwrap();
        make_video(root.path(), "zeta", "v1", 1, 1);
        make_video(root.path(), "alpha", "v2", 2, 2);
        // 非 pfm 文件不计入深度帧
        touch(root.path().join("depth/alpha/v2/notes.txt"));
        // 只有深度目录的类别
        make_video(root.path(), "orphan", "v3", 1, 0);
        assert!(!root.path().join("rgb/orphan").exists());

        let index = build(root.path(), &["v1", "v2", "v3"]);
        assert_eq!(index.len(), 3);
        let labels: Vec<_> = index.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["alpha", "alpha", "zeta"]);
        assert_eq!(index.class_counts().get("alpha"), Some(&2));
    }

    #[test]
    fn depth_suffix_matches_file_name() {
        let root = tempfile::tempdir().unwrap();
        make_video(root.path(), "cls1", "A", 1, 2);
        // 文件名只有后缀
        touch(root.path().join("depth/cls1/A/.pfm"));
        touch(root.path().join("depth/cls1/A/frame.pfm.bak"));

        let index = build(root.path(), &["A"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.records()[0].depth_path.file_name().unwrap(), ".pfm");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_followed() {
        use std::os::unix::fs::symlink;

        let root = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        make_video(store.path(), "cls1", "A", 2, 2);
        make_video(store.path(), "cls2", "B", 1, 1);
        make_video(root.path(), "cls1", "C", 1, 0);

        // 链接到类别目录
        fs::create_dir_all(root.path().join("rgb")).unwrap();
        symlink(store.path().join("depth/cls2"), root.path().join("depth/cls2")).unwrap();
        symlink(store.path().join("rgb/cls2"), root.path().join("rgb/cls2")).unwrap();
        // 链接到视频目录
        symlink(store.path().join("depth/cls1/A"), root.path().join("depth/cls1/A")).unwrap();
        fs::create_dir_all(root.path().join("rgb/cls1")).unwrap();
        symlink(store.path().join("rgb/cls1/A"), root.path().join("rgb/cls1/A")).unwrap();
        // 链接到帧文件
        fs::create_dir_all(root.path().join("rgb/cls1/C")).unwrap();
        symlink(
            store.path().join("rgb/cls1/A/000.jpg"),
            root.path().join("rgb/cls1/C/000.jpg"),
        )
        .unwrap();

        let index = build(root.path(), &["A", "B", "C"]);
        let keys: Vec<_> = index.records().iter().map(|r| r.pose_key.as_str()).collect();
        assert_eq!(
            keys,
            ["cls1/A/000.jpg", "cls1/A/001.jpg", "cls1/C/000.jpg", "cls2/B/000.jpg"]
        );
    }

    #[test]
    fn missing_color_video_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        make_video(root.path(), "cls1", "A", 2, 2);
        make_video(root.path(), "cls1", "B", 2, 0);

        let index = build(root.path(), &["A", "B"]);
        assert_eq!(index.len(), 2);
        assert!(index.records().iter().all(|r| r.pose_key.starts_with("cls1/A/")));
    }

    #[test]
    fn missing_depth_root() {
        let root = tempfile::tempdir().unwrap();
        let allowed = AllowedVideos::default();
        assert!(build_index(
            &root.path().join("nope"),
            root.path(),
            &allowed,
            "pfm",
            &PositionalPairing
        )
        .is_err());
    }
}
