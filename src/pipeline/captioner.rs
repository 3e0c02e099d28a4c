//! 描述调度: 禁用 / 帧循环内同步调用 / 独立线程

use std::time::Duration;

use image::RgbImage;
use tracing::info;

use crate::caption::{gate, CaptionJob, CaptionSession, CaptionWorker, Describer, GateOutcome};
use crate::detection::Track;

pub enum Captioner {
    Disabled,
    /// 同步调用, 描述请求期间帧循环阻塞
    Inline {
        session: CaptionSession,
        describer: Box<dyn Describer + Send>,
    },
    /// 独立线程, 帧循环只投递任务; 冷却由线程按自己的时钟计算
    Worker(CaptionWorker),
}

impl Captioner {
    pub fn inline(session: CaptionSession, describer: Box<dyn Describer + Send>) -> Self {
        Captioner::Inline { session, describer }
    }

    /// 本帧门控, 返回已完成的结果 (线程模式下可能是之前帧的结果)
    pub fn step(&mut self, image: &RgbImage, tracks: &[Track], now: Duration) -> Vec<GateOutcome> {
        match self {
            Captioner::Disabled => Vec::new(),
            Captioner::Inline { session, describer } => {
                let current = std::mem::take(session);
                let (next, outcome) = gate::step(current, image, tracks, now, describer);
                *session = next;
                vec![outcome]
            }
            Captioner::Worker(worker) => {
                // 没有可见目标时不复制帧
                if tracks.iter().any(|t| t.is_visible()) {
                    worker.submit(CaptionJob {
                        image: image.clone(),
                        tracks: tracks.to_vec(),
                    });
                }
                std::iter::from_fn(|| worker.try_recv()).collect()
            }
        }
    }

    /// 停止调度, 返回线程中尚未取走的结果
    pub fn shutdown(self) -> Vec<GateOutcome> {
        match self {
            Captioner::Worker(worker) => {
                let dropped = worker.dropped_jobs;
                let (_, pending) = worker.shutdown();
                if dropped > 0 {
                    info!("🧠 描述线程忙碌时丢弃 {} 个任务", dropped);
                }
                pending
            }
            _ => Vec::new(),
        }
    }
}
