/// 工具模块
/// Utility modules
pub mod clock;

pub use clock::{wall_time_string, Clock, ManualClock, WallClock};
