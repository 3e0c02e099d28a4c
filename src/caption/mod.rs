/// 场景描述系统 (Caption System)
///
/// - Gate:      触发门控 (冷却 + 锚定短语 + 去重)
/// - Describer: 外部描述生成器接口
/// - Worker:    可选的独立描述线程
pub mod describer;
pub mod gate;
pub mod worker;

pub use describer::{Describer, DescriberConfig, OllamaDescriber};
pub use gate::{
    AnchorRule, AnchorTable, CaptionRequest, CaptionSession, GateOutcome, IdleReason, SceneReport,
};
pub use worker::{CaptionJob, CaptionWorker};
