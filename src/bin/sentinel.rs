/// 场景哨兵 (Scene Sentinel)
///
/// 图像序列 → 检测过滤 → 目标跟踪 → 场景描述 → 标注帧输出
///
/// 运行: cargo run --bin sentinel --release -- --input input/frames
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scene_sentinel::caption::{CaptionWorker, OllamaDescriber};
use scene_sentinel::input::SequenceDecoder;
use scene_sentinel::recorder::SequenceWriter;
use scene_sentinel::render::FrameAnnotator;
use scene_sentinel::utils::WallClock;
use scene_sentinel::{Args, Captioner, Pipeline, PipelineConfig, ReplayDetector};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scene_sentinel=info,sentinel=info")),
        )
        .init();

    let args = Args::parse();

    info!("🚀 场景哨兵启动");

    // 配置错误在进入流水线前直接退出
    let mut source = SequenceDecoder::open(&args.input)
        .with_context(|| format!("请把视频帧放到 {} 目录", args.input.display()))?;

    let config = PipelineConfig::load(&args.config.to_string_lossy());
    config.log_summary();

    let detector = ReplayDetector::load(&args.detections, config.detection_conf_threshold)?;

    let annotator = match &args.font {
        Some(font) => FrameAnnotator::new().with_font_file(font)?,
        None => FrameAnnotator::new(),
    };

    let clock = WallClock::new();
    let captioner = if args.no_caption {
        info!("🧠 场景描述: 禁用");
        Captioner::Disabled
    } else {
        let describer = Box::new(OllamaDescriber::new(config.caption.describer.clone()));
        let session = config.caption.session();
        info!(
            "🧠 场景描述: {} @ {} (冷却 {:.1}s)",
            config.caption.describer.model, config.caption.describer.endpoint, config.caption.cooldown_secs
        );
        if args.caption_worker {
            Captioner::Worker(CaptionWorker::spawn(session, describer, Box::new(clock))?)
        } else {
            Captioner::inline(session, describer)
        }
    };

    let mut sink = SequenceWriter::create(&args.output)?;

    let pipeline = Pipeline::new(detector, &config, captioner, Box::new(clock))
        .with_annotator(annotator);
    let summary = pipeline.run(&mut source, &mut sink)?;

    info!(
        "🏁 输出已保存到 {} ({} 帧, 跳过损坏帧 {})",
        args.output.display(),
        summary.frames,
        source.dropped_frames
    );
    Ok(())
}
