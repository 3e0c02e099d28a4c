//! 时钟
//!
//! 门控冷却按真实流逝时间计算 (与帧率无关), 时间戳为相对流水线启动的 Duration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send {
    /// 相对起点的流逝时间
    fn now(&self) -> Duration;
}

/// 墙钟 (单调时钟), 克隆体共享起点
#[derive(Clone, Copy)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// 手动时钟, 克隆体共享同一时间 (测试与离线回放)
#[derive(Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.micros.store(now.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Duration) {
        self.micros
            .fetch_add(delta.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// 当前本地时间 HH:MM:SS (报告抬头)
pub fn wall_time_string() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
