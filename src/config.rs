//! 流水线配置 - 命令行参数 + JSON配置文件

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::caption::{AnchorTable, CaptionSession, DescriberConfig};
use crate::detection::detector::DEFAULT_CONF_THRESHOLD;
use crate::detection::{DetectionFilter, TrackerConfig};

/// 场景哨兵参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "场景哨兵 - 目标跟踪 + 场景描述", long_about = None)]
pub struct Args {
    /// 输入图像序列目录
    #[arg(short, long, default_value = "input/frames")]
    pub input: PathBuf,

    /// 标注帧输出目录
    #[arg(short, long, default_value = "output/frames")]
    pub output: PathBuf,

    /// 每帧检测结果 (JSON, 回放检测器)
    #[arg(short, long, default_value = "input/detections.json")]
    pub detections: PathBuf,

    /// 流水线配置文件 (不存在时写入默认值)
    #[arg(short, long, default_value = "sentinel.json")]
    pub config: PathBuf,

    /// 标签字体 (TTF/OTF), 不指定则只画框
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 禁用场景描述生成
    #[arg(long)]
    pub no_caption: bool,

    /// 描述生成放到独立线程 (不阻塞帧循环)
    #[arg(long)]
    pub caption_worker: bool,
}

/// 描述门控参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// 冷却时间 (秒)
    pub cooldown_secs: f64,
    pub anchors: AnchorTable,
    pub describer: DescriberConfig,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: crate::caption::gate::DEFAULT_COOLDOWN_SECS,
            anchors: AnchorTable::default(),
            describer: DescriberConfig::default(),
        }
    }
}

impl CaptionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs.max(0.0))
    }

    /// 新建描述会话
    pub fn session(&self) -> CaptionSession {
        CaptionSession::new(self.cooldown(), self.anchors.clone())
    }
}

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 检测置信度阈值 (检测器内部过滤)
    pub detection_conf_threshold: f32,
    pub filter: DetectionFilter,
    pub tracker: TrackerConfig,
    pub caption: CaptionConfig,
    /// 统计日志间隔 (帧)
    pub stats_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_conf_threshold: DEFAULT_CONF_THRESHOLD,
            filter: DetectionFilter::default(),
            tracker: TrackerConfig::default(),
            caption: CaptionConfig::default(),
            stats_interval: 60,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => warn!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️ 当前配置:");
        info!("  检测置信度: {:.2}", self.detection_conf_threshold);
        info!(
            "  跟踪类别: {:?} | 最小面积: {:.0}",
            self.filter.allowed_classes, self.filter.min_area
        );
        info!(
            "  匹配IOU: {:.2} | 丢失缓冲: {}帧 | 确认命中: {}",
            self.tracker.match_threshold, self.tracker.lost_track_buffer, self.tracker.min_hits
        );
        info!(
            "  描述冷却: {:.1}s | 模型: {}",
            self.caption.cooldown_secs, self.caption.describer.model
        );
    }
}
