//! 图像序列解码器
//! 按文件名顺序读取目录中的帧图像

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::{Frame, FrameSource};

/// 支持的图像扩展名
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// 图像序列解码器
pub struct SequenceDecoder {
    files: Vec<PathBuf>,
    cursor: usize,
    /// 跳过的损坏帧数
    pub dropped_frames: usize,
}

impl SequenceDecoder {
    /// 打开图像目录, 目录不存在或为空视为配置错误
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("输入目录不存在: {}", dir.display());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("读取输入目录失败: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            bail!("输入目录中没有图像帧: {}", dir.display());
        }

        info!("📹 输入源: {} ({} 帧)", dir.display(), files.len());

        Ok(Self {
            files,
            cursor: 0,
            dropped_frames: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for SequenceDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while self.cursor < self.files.len() {
            let index = self.cursor as u64;
            let path = &self.files[self.cursor];
            self.cursor += 1;

            match image::open(path) {
                Ok(img) => return Ok(Some(Frame::new(index, img.to_rgb8()))),
                Err(e) => {
                    // 损坏帧跳过, 不中断流水线
                    self.dropped_frames += 1;
                    warn!("⚠️ 丢弃帧 #{} ({}): {}", index, path.display(), e);
                }
            }
        }

        Ok(None)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
