//! 多目标跟踪 (Track Manager)
//! Multi-object tracking: IOU greedy matching + track lifecycle
//!
//! 核心流程:
//! 1. 同类别检测框与所有存活轨迹计算IOU
//! 2. 按IOU降序贪心匹配 (同分按轨迹ID升序)
//! 3. 未匹配检测 → 新建 Tentative 轨迹
//! 4. 未匹配轨迹 → 丢失计数 +1, 超过缓冲帧数后过期删除

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{BBox, Detection};

// ========== 公共数据结构 ==========

/// 轨迹生命周期: Tentative → Confirmed → Lost → Expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// 新建, 尚未确认
    #[default]
    Tentative,
    /// 稳定跟踪
    Confirmed,
    /// 暂时丢失, 仍可重新匹配
    Lost,
    /// 终态, 从存活集合中移除
    Expired,
}

impl TrackState {
    /// 下游可用的活跃状态 (Confirmed / Lost)
    pub fn is_active(&self) -> bool {
        matches!(self, TrackState::Confirmed | TrackState::Lost)
    }
}

/// 跟踪对象
#[derive(Clone, Debug)]
pub struct Track {
    /// 唯一跟踪ID (单调递增, 永不复用)
    pub id: u32,

    /// 类别ID (轨迹生命周期内不变)
    pub class_id: u32,

    /// 最近一次匹配的检测置信度
    pub confidence: f32,

    /// 当前边界框
    pub bbox: BBox,

    /// 连续丢失帧数
    pub frames_lost: u32,

    /// 创建后成功匹配次数
    pub hits: u32,

    pub state: TrackState,

    /// 最近一次匹配的帧序号
    pub last_updated: u64,

    /// 显示颜色 (每个ID不同颜色)
    pub color: (u8, u8, u8),
}

impl Track {
    fn new(id: u32, detection: &Detection, frame_index: u64, min_hits: u32) -> Self {
        let state = if min_hits == 0 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };

        Self {
            id,
            class_id: detection.class_id,
            confidence: detection.confidence,
            bbox: detection.bbox,
            frames_lost: 0,
            hits: 0,
            state,
            last_updated: frame_index,
            color: id_to_color(id),
        }
    }

    /// 本帧是否被观测到 (新建或刚匹配)
    pub fn is_visible(&self) -> bool {
        self.frames_lost == 0 && self.state != TrackState::Expired
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    fn mark_hit(&mut self, detection: &Detection, frame_index: u64, min_hits: u32) {
        self.bbox = detection.bbox;
        self.confidence = detection.confidence;
        self.frames_lost = 0;
        self.hits += 1;
        self.last_updated = frame_index;

        self.state = match self.state {
            TrackState::Tentative if self.hits >= min_hits => TrackState::Confirmed,
            TrackState::Tentative => TrackState::Tentative,
            _ => TrackState::Confirmed,
        };
    }

    fn mark_missed(&mut self, lost_track_buffer: u32) {
        self.frames_lost += 1;

        self.state = match self.state {
            // 未确认的轨迹一旦丢失直接过期
            TrackState::Tentative => TrackState::Expired,
            _ if self.frames_lost >= lost_track_buffer => TrackState::Expired,
            _ => TrackState::Lost,
        };
    }
}

/// 跟踪器参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 最小匹配IOU
    pub match_threshold: f32,
    /// 丢失缓冲帧数, 连续丢失达到该值后过期
    pub lost_track_buffer: u32,
    /// Tentative → Confirmed 所需的匹配次数
    pub min_hits: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.8,
            lost_track_buffer: 30,
            min_hits: 1,
        }
    }
}

/// 轨迹管理器
pub struct TrackManager {
    config: TrackerConfig,

    /// 存活轨迹 (按ID升序)
    tracks: Vec<Track>,

    /// 下一个分配的ID
    next_id: u32,

    /// 已处理帧数
    frame_index: u64,
}

/// 匹配候选
struct Candidate {
    iou: f32,
    track_id: u32,
    track_idx: usize,
    det_idx: usize,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// 活跃轨迹 (Confirmed / Lost)
    pub fn active(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_active())
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// 已分配的ID总数
    pub fn ids_issued(&self) -> u32 {
        self.next_id - 1
    }

    /// 清除所有轨迹 (ID继续递增)
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    /// 更新跟踪 (IOU贪心匹配)
    pub fn update(&mut self, detections: &[Detection]) -> &[Track] {
        self.frame_index += 1;
        let frame_index = self.frame_index;
        let min_hits = self.config.min_hits;

        // 1. 贪心匹配
        let (matched_track, matched_det) = self.match_detections(detections);

        for (track_idx, det_idx) in matched_track.iter().enumerate() {
            if let Some(det_idx) = det_idx {
                self.tracks[track_idx].mark_hit(&detections[*det_idx], frame_index, min_hits);
            }
        }

        // 2. 未匹配的轨迹 → 标记丢失
        for (track_idx, det_idx) in matched_track.iter().enumerate() {
            if det_idx.is_none() {
                self.tracks[track_idx].mark_missed(self.config.lost_track_buffer);
            }
        }

        // 3. 删除过期轨迹
        self.tracks.retain(|t| {
            if t.state == TrackState::Expired {
                debug!("🗑️ 轨迹 #{} 过期 (丢失{}帧)", t.id, t.frames_lost);
                false
            } else {
                true
            }
        });

        // 4. 未匹配的检测 → 新建轨迹 (按规范顺序分配ID, 与输入顺序无关)
        let mut unmatched: Vec<&Detection> = detections
            .iter()
            .enumerate()
            .filter(|(idx, _)| !matched_det[*idx])
            .map(|(_, det)| det)
            .collect();
        unmatched.sort_by(|a, b| a.canonical_cmp(b));

        for det in unmatched {
            let track = Track::new(self.next_id, det, frame_index, min_hits);
            debug!("🆕 新轨迹 #{} (类别{})", track.id, track.class_id);
            self.tracks.push(track);
            self.next_id += 1;
        }

        &self.tracks
    }

    /// IOU 匹配, 返回 (每条轨迹匹配到的检测下标, 每个检测是否已匹配)
    fn match_detections(&self, detections: &[Detection]) -> (Vec<Option<usize>>, Vec<bool>) {
        let mut matched_track = vec![None; self.tracks.len()];
        let mut matched_det = vec![false; detections.len()];

        if detections.is_empty() || self.tracks.is_empty() {
            return (matched_track, matched_det);
        }

        let mut candidates = Vec::new();
        for (track_idx, track) in self.tracks.iter().enumerate() {
            for (det_idx, det) in detections.iter().enumerate() {
                if det.class_id != track.class_id {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= self.config.match_threshold {
                    candidates.push(Candidate {
                        iou,
                        track_id: track.id,
                        track_idx,
                        det_idx,
                    });
                }
            }
        }

        // 贪心匹配: IOU降序, 同分按轨迹ID升序, 再按检测框规范顺序
        candidates.sort_by(|a, b| {
            b.iou
                .total_cmp(&a.iou)
                .then(a.track_id.cmp(&b.track_id))
                .then_with(|| detections[a.det_idx].canonical_cmp(&detections[b.det_idx]))
        });

        for c in candidates {
            if matched_track[c.track_idx].is_none() && !matched_det[c.det_idx] {
                matched_track[c.track_idx] = Some(c.det_idx);
                matched_det[c.det_idx] = true;
            }
        }

        (matched_track, matched_det)
    }

    /// 获取跟踪统计信息
    pub fn stats(&self) -> String {
        format!(
            "跟踪: {} 个 (活跃 {}) | 总ID: {}",
            self.tracks.len(),
            self.active().count(),
            self.ids_issued()
        )
    }
}

impl Default for TrackManager {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

// ========== 工具函数 ==========

/// 根据ID生成不同颜色
pub fn id_to_color(id: u32) -> (u8, u8, u8) {
    let hue = (id as f32 * 137.508) % 360.0; // 黄金角度采样
    hsv_to_rgb(hue, 0.8, 0.9)
}

/// HSV转RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, x: f32, y: f32) -> Detection {
        Detection::new(class_id, 0.9, BBox::new(x, y, 100.0, 200.0))
    }

    fn ids(tracks: &[Track]) -> Vec<u32> {
        tracks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_stable_identity_and_confirmation() {
        let mut manager = TrackManager::default();

        let tracks = manager.update(&[det(0, 100.0, 100.0)]);
        assert_eq!(ids(tracks), vec![1]);
        assert_eq!(tracks[0].state, TrackState::Tentative);

        // 每帧移动2像素, IOU 远高于 0.8
        for frame in 1..50 {
            let x = 100.0 + frame as f32 * 2.0;
            let tracks = manager.update(&[det(0, x, 100.0)]);
            assert_eq!(ids(tracks), vec![1]);
            assert_eq!(tracks[0].state, TrackState::Confirmed);
            assert_eq!(tracks[0].frames_lost, 0);
        }
        assert_eq!(manager.ids_issued(), 1);
    }

    #[test]
    fn test_low_iou_creates_new_track() {
        let mut manager = TrackManager::default();
        manager.update(&[det(0, 100.0, 100.0)]);
        // 平移30像素: IOU = 70/130 < 0.8
        let tracks = manager.update(&[det(0, 130.0, 100.0)]);
        // 原Tentative轨迹未匹配 → 过期; 新建 #2
        assert_eq!(ids(tracks), vec![2]);
    }

    #[test]
    fn test_class_must_match() {
        let mut manager = TrackManager::default();
        manager.update(&[det(0, 100.0, 100.0)]);
        let tracks = manager.update(&[det(2, 100.0, 100.0)]);
        assert_eq!(ids(tracks), vec![2]);
        assert_eq!(tracks[0].class_id, 2);
    }

    fn confirmed_manager() -> TrackManager {
        let mut manager = TrackManager::default();
        manager.update(&[det(0, 100.0, 100.0)]);
        manager.update(&[det(0, 100.0, 100.0)]);
        assert_eq!(manager.tracks()[0].state, TrackState::Confirmed);
        manager
    }

    #[test]
    fn test_expires_after_exact_buffer() {
        let mut manager = confirmed_manager();
        let buffer = manager.config().lost_track_buffer;

        for miss in 1..buffer {
            let tracks = manager.update(&[]);
            assert_eq!(tracks.len(), 1);
            assert_eq!(tracks[0].state, TrackState::Lost);
            assert_eq!(tracks[0].frames_lost, miss);
        }

        // 第 buffer 次丢失 → 过期删除
        let tracks = manager.update(&[]);
        assert!(tracks.is_empty());

        // ID 不复用
        let tracks = manager.update(&[det(0, 100.0, 100.0)]);
        assert_eq!(ids(tracks), vec![2]);
    }

    #[test]
    fn test_lost_track_recovers_one_frame_before_expiry() {
        let mut manager = confirmed_manager();
        let buffer = manager.config().lost_track_buffer;

        for _ in 1..buffer {
            manager.update(&[]);
        }
        assert_eq!(manager.tracks()[0].state, TrackState::Lost);

        let tracks = manager.update(&[det(0, 100.0, 100.0)]);
        assert_eq!(ids(tracks), vec![1]);
        assert_eq!(tracks[0].state, TrackState::Confirmed);
        assert_eq!(tracks[0].frames_lost, 0);
    }

    #[test]
    fn test_tentative_miss_expires() {
        let mut manager = TrackManager::default();
        manager.update(&[det(0, 100.0, 100.0)]);
        assert!(manager.update(&[]).is_empty());
    }

    #[test]
    fn test_min_hits_configurable() {
        let mut manager = TrackManager::new(TrackerConfig {
            min_hits: 3,
            ..TrackerConfig::default()
        });
        for _ in 0..3 {
            manager.update(&[det(0, 100.0, 100.0)]);
            assert_eq!(manager.tracks()[0].state, TrackState::Tentative);
        }
        manager.update(&[det(0, 100.0, 100.0)]);
        assert_eq!(manager.tracks()[0].state, TrackState::Confirmed);
        assert_eq!(manager.tracks()[0].hits, 3);
    }

    #[test]
    fn test_greedy_prefers_best_global_match() {
        let mut manager = TrackManager::new(TrackerConfig {
            match_threshold: 0.3,
            ..TrackerConfig::default()
        });
        manager.update(&[det(0, 100.0, 100.0), det(0, 160.0, 100.0)]);
        manager.update(&[det(0, 100.0, 100.0), det(0, 160.0, 100.0)]);
        assert_eq!(ids(manager.tracks()), vec![1, 2]);

        // x=110 与轨迹1(0.82)、轨迹2(0.33)都过阈值; x=160 与轨迹2完全重合 → 先提交
        let tracks = manager.update(&[det(0, 160.0, 100.0), det(0, 110.0, 100.0)]);
        assert_eq!(tracks[0].bbox.x, 110.0);
        assert_eq!(tracks[1].bbox.x, 160.0);
    }

    #[test]
    fn test_matching_independent_of_detection_order() {
        let frame1 = vec![
            det(0, 100.0, 100.0),
            det(0, 400.0, 100.0),
            det(2, 700.0, 300.0),
        ];
        let frame2 = vec![
            det(0, 102.0, 101.0),
            det(0, 398.0, 100.0),
            det(2, 703.0, 300.0),
            det(0, 1000.0, 50.0),
            det(3, 20.0, 20.0),
        ];

        let run = |f1: &[Detection], f2: &[Detection]| {
            let mut manager = TrackManager::default();
            manager.update(f1);
            manager
                .update(f2)
                .iter()
                .map(|t| (t.id, t.class_id, t.bbox.x.to_bits(), t.state))
                .collect::<Vec<_>>()
        };

        let expected = run(&frame1, &frame2);

        let mut f1_rev = frame1.clone();
        f1_rev.reverse();
        let mut f2_rev = frame2.clone();
        f2_rev.reverse();
        let mut f2_rot = frame2.clone();
        f2_rot.rotate_left(2);

        assert_eq!(run(&frame1, &f2_rev), expected);
        assert_eq!(run(&f1_rev, &f2_rot), expected);
    }

    #[test]
    fn test_reset_keeps_id_sequence() {
        let mut manager = TrackManager::default();
        manager.update(&[det(0, 100.0, 100.0)]);
        manager.reset();
        assert!(manager.tracks().is_empty());
        let tracks = manager.update(&[det(0, 100.0, 100.0)]);
        assert_eq!(ids(tracks), vec![2]);
    }

    #[test]
    fn test_id_to_color_distinct() {
        assert_ne!(id_to_color(1), id_to_color(2));
    }
}
