//! 描述生成门控 (Caption Gate)
//!
//! 每帧决定是否调用昂贵的场景描述生成器, 并构造种子短语:
//! 1. 当前帧至少观测到一个目标
//! 2. 距上次触发已超过冷却时间
//!
//! 调用结果去重 (忽略大小写与首尾空白), 失败只记录日志;
//! 两种情况都推进触发时间戳, 避免冷却窗口内反复重试.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::describer::Describer;
use crate::detection::Track;

/// 默认冷却时间 (秒)
pub const DEFAULT_COOLDOWN_SECS: f64 = 4.0;

// ========== 锚定短语 ==========

/// 优先级规则: 出现任一类别即选用该短语
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorRule {
    pub classes: Vec<u32>,
    pub phrase: String,
}

impl AnchorRule {
    pub fn new(classes: &[u32], phrase: impl Into<String>) -> Self {
        Self {
            classes: classes.to_vec(),
            phrase: phrase.into(),
        }
    }
}

/// 锚定短语优先级表
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorTable {
    pub rules: Vec<AnchorRule>,
    pub fallback: String,
}

impl AnchorTable {
    /// 按优先级顺序取第一个命中的短语
    pub fn select(&self, classes: &[u32]) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.classes.iter().any(|c| classes.contains(c)))
            .map(|rule| rule.phrase.as_str())
            .unwrap_or(&self.fallback)
    }
}

impl Default for AnchorTable {
    fn default() -> Self {
        Self {
            rules: vec![
                AnchorRule::new(&[0], "A person is"),
                AnchorRule::new(&[2, 3], "A vehicle is"),
            ],
            fallback: "A photo of".to_string(),
        }
    }
}

// ========== 会话状态 ==========

/// 描述会话 (进程内唯一)
#[derive(Clone, Debug)]
pub struct CaptionSession {
    /// 上次触发时间 (相对流水线启动)
    pub last_trigger: Option<Duration>,
    pub cooldown: Duration,
    /// 上次输出的描述 (用于去重)
    pub last_description: Option<String>,
    pub anchors: AnchorTable,
}

impl CaptionSession {
    pub fn new(cooldown: Duration, anchors: AnchorTable) -> Self {
        Self {
            last_trigger: None,
            cooldown,
            last_description: None,
            anchors,
        }
    }

    /// 是否仍在冷却窗口内
    pub fn is_cooling_down(&self, now: Duration) -> bool {
        match self.last_trigger {
            Some(last) => now.saturating_sub(last) < self.cooldown,
            None => false,
        }
    }

    /// 是否与上次输出重复 (忽略大小写与首尾空白)
    pub fn is_duplicate(&self, description: &str) -> bool {
        self.last_description
            .as_deref()
            .map(|last| normalize(last) == normalize(description))
            .unwrap_or(false)
    }
}

impl Default for CaptionSession {
    fn default() -> Self {
        Self::new(
            Duration::from_secs_f64(DEFAULT_COOLDOWN_SECS),
            AnchorTable::default(),
        )
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// ========== 决策结果 ==========

/// 未触发原因
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleReason {
    /// 当前帧没有目标
    NoSubject,
    /// 冷却中
    CoolingDown,
}

/// 触发请求
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionRequest {
    pub anchor: String,
    /// 当前帧目标的类别 (去重, 升序)
    pub classes: Vec<u32>,
    pub at: Duration,
}

/// 场景报告
#[derive(Clone, Debug, PartialEq)]
pub struct SceneReport {
    pub description: String,
    pub anchor: String,
    pub at: Duration,
}

impl fmt::Display for SceneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sentence = capitalize(self.description.trim().trim_end_matches('.'));
        write!(
            f,
            "OBSERVATION: {}.\nSTATUS: Activity Detected.",
            sentence
        )
    }
}

/// 首字母大写, 其余小写
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// 每帧门控结果
#[derive(Clone, Debug, PartialEq)]
pub enum GateOutcome {
    Idle(IdleReason),
    /// 新描述, 需要输出
    Reported(SceneReport),
    /// 与上次重复, 不输出
    Duplicate(String),
    /// 生成器调用失败
    Failed(String),
}

impl GateOutcome {
    pub fn report(&self) -> Option<&SceneReport> {
        match self {
            GateOutcome::Reported(report) => Some(report),
            _ => None,
        }
    }
}

// ========== 门控逻辑 ==========

/// 决策: 本帧是否触发, 以及种子短语
///
/// 只看当前帧观测到的轨迹 (新建或刚匹配).
pub fn decide(
    session: &CaptionSession,
    tracks: &[Track],
    now: Duration,
) -> std::result::Result<CaptionRequest, IdleReason> {
    let mut classes: Vec<u32> = tracks
        .iter()
        .filter(|t| t.is_visible())
        .map(|t| t.class_id)
        .collect();

    if classes.is_empty() {
        return Err(IdleReason::NoSubject);
    }
    if session.is_cooling_down(now) {
        return Err(IdleReason::CoolingDown);
    }

    classes.sort_unstable();
    classes.dedup();

    Ok(CaptionRequest {
        anchor: session.anchors.select(&classes).to_string(),
        classes,
        at: now,
    })
}

/// 记录一次调用结果, 返回更新后的会话
pub fn record(
    mut session: CaptionSession,
    request: &CaptionRequest,
    result: Result<String>,
) -> (CaptionSession, GateOutcome) {
    // 无论成功与否都推进触发时间
    session.last_trigger = Some(request.at);

    let outcome = match result {
        Err(e) => {
            warn!("⚠️ 场景描述生成失败: {:#}", e);
            GateOutcome::Failed(format!("{:#}", e))
        }
        Ok(description) if session.is_duplicate(&description) => {
            debug!("🔁 重复描述, 已忽略: {}", description.trim());
            GateOutcome::Duplicate(description)
        }
        Ok(description) => {
            session.last_description = Some(description.clone());
            GateOutcome::Reported(SceneReport {
                description,
                anchor: request.anchor.clone(),
                at: request.at,
            })
        }
    };

    (session, outcome)
}

/// 完整单帧门控: 决策 → 调用生成器 → 去重
pub fn step<D: Describer + ?Sized>(
    session: CaptionSession,
    image: &RgbImage,
    tracks: &[Track],
    now: Duration,
    describer: &mut D,
) -> (CaptionSession, GateOutcome) {
    let request = match decide(&session, tracks, now) {
        Ok(request) => request,
        Err(reason) => return (session, GateOutcome::Idle(reason)),
    };

    info!(
        "⚡ 场景分析中... (锚定: \"{}\", 类别: {:?})",
        request.anchor, request.classes
    );
    let result = describer.describe(image, &request.anchor);
    record(session, &request, result)
}
