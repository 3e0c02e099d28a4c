/// 标注帧输出 (Frame Sink)
/// 按帧序号写出图像序列
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::input::Frame;

/// 有序帧输出
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// 收尾 (默认无操作)
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 图像序列输出: <dir>/frame_000000.jpg
pub struct SequenceWriter {
    dir: PathBuf,
    extension: String,
    written: u64,
}

impl SequenceWriter {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("创建输出目录失败: {}", dir.display()))?;
        Ok(Self {
            dir,
            extension: "jpg".to_string(),
            written: 0,
        })
    }

    /// 输出格式 (按扩展名推断编码)
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir
            .join(format!("frame_{:06}.{}", index, self.extension))
    }
}

impl FrameSink for SequenceWriter {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let path = self.path_for(frame.index);
        frame
            .image
            .save(&path)
            .with_context(|| format!("写出帧失败: {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("💾 已写出 {} 帧到 {}", self.written, self.dir.display());
        Ok(())
    }
}

/// 丢弃所有帧
pub struct NullSink;

impl FrameSink for NullSink {
    fn write(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}
