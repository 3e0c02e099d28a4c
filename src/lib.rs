// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod caption; // 场景描述门控与生成器
pub mod config; // 命令行与流水线配置
pub mod detection; // 检测过滤与目标跟踪
pub mod input; // 帧输入
pub mod pipeline; // 逐帧处理流水线
pub mod recorder; // 标注帧输出
pub mod render; // 渲染适配
pub mod utils;

pub use crate::caption::{CaptionSession, Describer, GateOutcome, OllamaDescriber, SceneReport};
pub use crate::config::{Args, PipelineConfig};
pub use crate::detection::{
    BBox, Detection, DetectionFilter, Detector, ReplayDetector, Track, TrackManager, TrackState,
};
pub use crate::pipeline::{Captioner, Pipeline, RunSummary};
