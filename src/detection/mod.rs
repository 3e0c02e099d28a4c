/// 检测系统 (Detection System)
///
/// - Detector: 目标检测接口 (外部模型)
/// - Filter:   类别与尺寸过滤
/// - Tracker:  目标追踪与轨迹生命周期
pub mod detector;
pub mod filter;
pub mod tracker;
pub mod types;

pub use detector::{Detector, ReplayDetector};
pub use filter::DetectionFilter;
pub use tracker::{Track, TrackManager, TrackState, TrackerConfig};
pub use types::{BBox, Detection};
