/// 视频处理流水线 (Frame Pipeline)
///
/// 单线程逐帧处理, 一帧完整处理后才读取下一帧:
/// 检测 → 过滤 → 跟踪 → 描述门控 → 渲染 → 输出
pub mod captioner;

use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

pub use captioner::Captioner;

use crate::caption::{GateOutcome, SceneReport};
use crate::config::PipelineConfig;
use crate::detection::{DetectionFilter, Detector, TrackManager};
use crate::input::{Frame, FrameSource};
use crate::recorder::FrameSink;
use crate::render::{annotations, FrameAnnotator};
use crate::utils::{wall_time_string, Clock};

/// 单帧处理结果
pub struct FrameResult {
    /// 已绘制标注的帧
    pub frame: Frame,
    pub detections: usize,
    pub kept: usize,
    /// 本帧存活轨迹 ID
    pub track_ids: Vec<u32>,
    pub outcomes: Vec<GateOutcome>,
}

impl FrameResult {
    pub fn reports(&self) -> impl Iterator<Item = &SceneReport> {
        self.outcomes.iter().filter_map(|o| o.report())
    }
}

/// 运行统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub reports: Vec<SceneReport>,
    pub ids_issued: u32,
}

pub struct Pipeline<D: Detector> {
    detector: D,
    filter: DetectionFilter,
    tracker: TrackManager,
    captioner: Captioner,
    annotator: FrameAnnotator,
    clock: Box<dyn Clock>,
    stats_interval: u64,

    // 统计
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl<D: Detector> Pipeline<D> {
    pub fn new(
        detector: D,
        config: &PipelineConfig,
        captioner: Captioner,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            detector,
            filter: config.filter.clone(),
            tracker: TrackManager::new(config.tracker.clone()),
            captioner,
            annotator: FrameAnnotator::new(),
            clock,
            stats_interval: config.stats_interval.max(1),
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn tracker(&self) -> &TrackManager {
        &self.tracker
    }

    /// 处理单帧
    pub fn process_frame(&mut self, mut frame: Frame) -> Result<FrameResult> {
        let start = Instant::now();

        // 1. 检测 (检测器失败按空帧处理, 轨迹照常老化)
        let detections = match self.detector.detect(&frame) {
            Ok(dets) => dets,
            Err(e) => {
                warn!("⚠️ 帧 #{} 检测失败: {:#}", frame.index, e);
                Vec::new()
            }
        };

        // 2. 过滤
        let kept = self.filter.apply(&detections);

        // 3. 跟踪
        let tracks = self.tracker.update(&kept);

        // 4. 描述门控
        let now = self.clock.now();
        let outcomes = self.captioner.step(&frame.image, tracks, now);

        // 5. 渲染
        let anns = annotations(tracks);
        let track_ids = tracks.iter().map(|t| t.id).collect();
        self.annotator.draw(&mut frame.image, &anns);

        let mut reported = false;
        for report in outcomes.iter().filter_map(|o| o.report()) {
            info!(
                "\n[AI REPORT @ {}]:\n{}\n{}",
                wall_time_string(),
                report,
                "-".repeat(50)
            );
            reported = true;
        }
        if reported {
            self.annotator.draw_banner(&mut frame.image);
        }

        self.update_stats(start, kept.len());

        Ok(FrameResult {
            frame,
            detections: detections.len(),
            kept: kept.len(),
            track_ids,
            outcomes,
        })
    }

    fn update_stats(&mut self, start: Instant, kept: usize) {
        self.count += 1;
        let now = Instant::now();
        if now.duration_since(self.last).as_secs() >= 1 {
            self.current_fps = self.count as f64 / now.duration_since(self.last).as_secs_f64();
            self.count = 0;
            self.last = now;
        }

        if self.tracker.frame_index() % self.stats_interval == 0 {
            info!(
                "🎯 检测+跟踪: {}个目标 | {} | {:.1}ms/帧 | {:.1}fps",
                kept,
                self.tracker.stats(),
                start.elapsed().as_secs_f64() * 1000.0,
                self.current_fps
            );
        }
    }

    /// 运行到输入耗尽
    pub fn run<S, K>(mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        info!("🚀 开始处理...");
        let mut summary = RunSummary::default();

        while let Some(frame) = source.next_frame()? {
            let result = self.process_frame(frame)?;
            sink.write(&result.frame)?;
            summary.frames += 1;
            summary.reports.extend(result.reports().cloned());
        }

        summary.ids_issued = self.tracker.ids_issued();

        // 线程模式下收尾时完成的描述
        for outcome in self.captioner.shutdown() {
            if let Some(report) = outcome.report() {
                info!("\n[AI REPORT @ {}]:\n{}\n{}", wall_time_string(), report, "-".repeat(50));
                summary.reports.push(report.clone());
            }
        }

        sink.finish()?;
        info!(
            "✅ 处理完成: {} 帧 | {} 条报告 | 总ID: {}",
            summary.frames,
            summary.reports.len(),
            summary.ids_issued
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{CaptionSession, CaptionWorker, Describer, IdleReason};
    use crate::detection::types::BBox;
    use crate::detection::{Detection, ReplayDetector, TrackState};
    use crate::recorder::NullSink;
    use crate::utils::ManualClock;
    use image::RgbImage;
    use std::time::Duration;

    /// 每次返回不同描述
    struct NumberedDescriber {
        calls: usize,
    }

    impl Describer for NumberedDescriber {
        fn describe(&mut self, _image: &RgbImage, seed: &str) -> Result<String> {
            self.calls += 1;
            Ok(format!("{} walking, take {}", seed, self.calls))
        }
    }

    fn person_at(x: f32) -> Detection {
        Detection::new(0, 0.9, BBox::new(x, 20.0, 40.0, 80.0))
    }

    fn frames(n: u64) -> Vec<Frame> {
        (0..n).map(|i| Frame::new(i, RgbImage::new(320, 240))).collect()
    }

    fn pipeline(per_frame: Vec<Vec<Detection>>, clock: &ManualClock) -> Pipeline<ReplayDetector> {
        let config = PipelineConfig::default();
        Pipeline::new(
            ReplayDetector::new(per_frame, config.detection_conf_threshold),
            &config,
            Captioner::inline(
                CaptionSession::default(),
                Box::new(NumberedDescriber { calls: 0 }),
            ),
            Box::new(clock.clone()),
        )
    }

    #[test]
    fn test_five_frame_scenario() {
        let clock = ManualClock::new();
        // 每帧移动1像素, IOU ≈ 0.95
        let per_frame = (0..5).map(|i| vec![person_at(100.0 + i as f32)]).collect();
        let mut pipeline = pipeline(per_frame, &clock);

        let mut states = Vec::new();
        let mut outcomes = Vec::new();
        for frame in frames(5) {
            let result = pipeline.process_frame(frame).unwrap();
            assert_eq!(result.track_ids, vec![1]);
            states.push(pipeline.tracker().tracks()[0].state);
            outcomes.push(result.outcomes[0].clone());
            clock.advance(Duration::from_secs(1));
        }

        assert_eq!(states[0], TrackState::Tentative);
        assert!(states[1..].iter().all(|s| *s == TrackState::Confirmed));

        assert!(outcomes[0].report().is_some());
        for outcome in &outcomes[1..4] {
            assert_eq!(*outcome, GateOutcome::Idle(IdleReason::CoolingDown));
        }
        // 第5帧 t=4s, 冷却结束
        let report = outcomes[4].report().unwrap();
        assert!(report.description.ends_with("take 2"));
    }

    #[test]
    fn test_filtered_classes_never_reach_gate() {
        let clock = ManualClock::new();
        // 盆栽 (58) 与过小的人
        let per_frame = vec![vec![
            Detection::new(58, 0.9, BBox::new(0.0, 0.0, 100.0, 100.0)),
            Detection::new(0, 0.9, BBox::new(200.0, 0.0, 10.0, 10.0)),
        ]];
        let mut pipeline = pipeline(per_frame, &clock);

        let result = pipeline.process_frame(Frame::new(0, RgbImage::new(320, 240))).unwrap();
        assert_eq!(result.detections, 2);
        assert_eq!(result.kept, 0);
        assert!(result.track_ids.is_empty());
        assert_eq!(result.outcomes, vec![GateOutcome::Idle(IdleReason::NoSubject)]);
    }

    #[test]
    fn test_run_until_exhausted() {
        let clock = ManualClock::new();
        let per_frame = (0..3).map(|i| vec![person_at(50.0 + i as f32)]).collect();
        let pipeline = pipeline(per_frame, &clock);

        let mut source = frames(3).into_iter();
        let summary = pipeline.run(&mut source, &mut NullSink).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.ids_issued, 1);
        // 时钟未推进: 只有第一帧触发
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].anchor, "A person is");
    }

    #[test]
    fn test_worker_captioner_reports_once_per_cooldown() {
        let clock = ManualClock::new();
        let config = PipelineConfig::default();
        let worker = CaptionWorker::spawn(
            CaptionSession::default(),
            Box::new(NumberedDescriber { calls: 0 }),
            Box::new(clock.clone()),
        )
        .unwrap();
        let per_frame = (0..4).map(|i| vec![person_at(60.0 + i as f32)]).collect();
        let pipeline = Pipeline::new(
            ReplayDetector::new(per_frame, config.detection_conf_threshold),
            &config,
            Captioner::Worker(worker),
            Box::new(clock.clone()),
        );

        let mut source = frames(4).into_iter();
        let summary = pipeline.run(&mut source, &mut NullSink).unwrap();
        assert_eq!(summary.frames, 4);
        // 时钟未推进: 后续任务要么冷却要么被丢弃
        assert_eq!(summary.reports.len(), 1);
        assert!(summary.reports[0].description.ends_with("take 1"));
    }

    #[test]
    fn test_disabled_captioner() {
        let config = PipelineConfig::default();
        let mut pipeline = Pipeline::new(
            ReplayDetector::new(vec![vec![person_at(10.0)]], config.detection_conf_threshold),
            &config,
            Captioner::Disabled,
            Box::new(ManualClock::new()),
        );
        let result = pipeline.process_frame(Frame::new(0, RgbImage::new(64, 64))).unwrap();
        assert!(result.outcomes.is_empty());
        assert_eq!(result.track_ids, vec![1]);
    }
}
