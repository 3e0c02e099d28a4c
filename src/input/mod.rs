/// 视频输入系统 (Video Input System)
///
/// - Frame:          带序号的单帧图像
/// - FrameSource:    有序帧来源 (返回 None 表示输入耗尽)
/// - SequenceDecoder: 图像序列目录解码器
pub mod decoder;

use anyhow::Result;
use image::RgbImage;

pub use decoder::SequenceDecoder;

/// 单帧 (解码器 → 流水线)
#[derive(Clone, Debug)]
pub struct Frame {
    /// 帧序号 (从0开始)
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }
}

/// 有序帧来源
pub trait FrameSource {
    /// 读取下一帧, 输入耗尽时返回 Ok(None)
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// 内存帧来源 (测试与回放)
impl FrameSource for std::vec::IntoIter<Frame> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.next())
    }
}
