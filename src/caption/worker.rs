//! 描述生成工作线程
//!
//! 把耗时的描述调用移出帧循环. 工作线程独占 `CaptionSession`,
//! 是 `last_trigger` / `last_description` 的唯一写者;
//! 主线程只投递任务 (队列满则丢弃) 并轮询结果.
//! 冷却时间按任务出队时的时钟计算, 排队等待的时间不计入.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use image::RgbImage;
use tracing::{info, warn};

use super::describer::Describer;
use super::gate::{self, CaptionSession, GateOutcome};
use crate::detection::Track;
use crate::utils::Clock;

/// 描述任务 (主线程 → 工作线程)
pub struct CaptionJob {
    pub image: RgbImage,
    pub tracks: Vec<Track>,
}

pub struct CaptionWorker {
    jobs: Option<Sender<CaptionJob>>,
    outcomes: Receiver<GateOutcome>,
    handle: Option<JoinHandle<CaptionSession>>,
    /// 因工作线程忙而丢弃的任务数
    pub dropped_jobs: u64,
}

impl CaptionWorker {
    pub fn spawn(
        session: CaptionSession,
        describer: Box<dyn Describer + Send>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<CaptionJob>(1);
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name("caption-worker".into())
            .spawn(move || run(session, describer, clock, job_rx, outcome_tx))
            .context("启动描述线程失败")?;

        info!("🧠 描述线程启动");

        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
            dropped_jobs: 0,
        })
    }

    /// 投递任务, 工作线程忙时丢弃并返回 false
    pub fn submit(&mut self, job: CaptionJob) -> bool {
        let Some(jobs) = &self.jobs else {
            return false;
        };
        match jobs.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_jobs += 1;
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("⚠️ 描述线程已退出, 任务丢弃");
                false
            }
        }
    }

    /// 非阻塞取结果
    pub fn try_recv(&self) -> Option<GateOutcome> {
        self.outcomes.try_recv().ok()
    }

    /// 阻塞等待结果 (超时返回 None)
    pub fn recv_timeout(&self, timeout: Duration) -> Option<GateOutcome> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// 关闭任务队列, 等待线程退出, 返回最终会话与未读结果
    pub fn shutdown(mut self) -> (Option<CaptionSession>, Vec<GateOutcome>) {
        let session = self.join();
        let pending = self.outcomes.try_iter().collect();
        (session, pending)
    }

    fn join(&mut self) -> Option<CaptionSession> {
        self.jobs.take();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(session) => Some(session),
            Err(_) => {
                warn!("⚠️ 描述线程异常退出");
                None
            }
        }
    }
}

impl Drop for CaptionWorker {
    fn drop(&mut self) {
        self.join();
    }
}

fn run(
    mut session: CaptionSession,
    mut describer: Box<dyn Describer + Send>,
    clock: Box<dyn Clock>,
    jobs: Receiver<CaptionJob>,
    outcomes: Sender<GateOutcome>,
) -> CaptionSession {
    for job in jobs {
        // 出队时取时间: 上一次调用可能已远超冷却窗口
        let now = clock.now();
        let (next, outcome) = gate::step(session, &job.image, &job.tracks, now, &mut describer);
        session = next;
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    info!("🧠 描述线程退出");
    session
}
