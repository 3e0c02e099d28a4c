//! 检测器 (Detector)
//! 职责: Frame → 原始检测框 (类别 + 置信度 + 边界框)
//!
//! 检测模型本身是外部黑盒, 这里只定义接口与一个离线回放实现.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::types::Detection;
use crate::input::Frame;

/// 默认检测置信度阈值 (过滤地砖反光等弱检测)
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.45;

/// 目标检测接口
///
/// 置信度过滤属于检测器自身配置, 在 `detect` 内部完成.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}

/// 离线回放检测器: 从JSON文件读取每帧检测结果
///
/// 文件格式为按帧序号排列的二维数组:
/// `[[{"class_id":0,"confidence":0.9,"bbox":{"x":..,"y":..,"width":..,"height":..}}], ...]`
pub struct ReplayDetector {
    frames: Vec<Vec<Detection>>,
    conf_threshold: f32,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<Detection>>, conf_threshold: f32) -> Self {
        Self {
            frames,
            conf_threshold,
        }
    }

    /// 从JSON文件加载
    pub fn load(path: impl AsRef<Path>, conf_threshold: f32) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("读取检测文件失败: {}", path.display()))?;
        let frames: Vec<Vec<Detection>> = serde_json::from_str(&json)
            .with_context(|| format!("解析检测文件失败: {}", path.display()))?;

        info!(
            "✅ 回放检测器: {} 帧, 置信度阈值 {:.2}",
            frames.len(),
            conf_threshold
        );
        Ok(Self::new(frames, conf_threshold))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let detections = self
            .frames
            .get(frame.index as usize)
            .map(|dets| {
                dets.iter()
                    .filter(|d| d.confidence >= self.conf_threshold)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(detections)
    }
}
