//! 检测过滤器 (Detection Filter)
//! 按类别白名单与最小面积丢弃检测框

use serde::{Deserialize, Serialize};

use super::types::Detection;

/// 默认跟踪类别: 0=人, 1=自行车, 2=汽车, 3=摩托车, 5=公交车, 7=卡车
/// 盆栽 (58) 不在其中
pub const DEFAULT_TARGET_CLASSES: [u32; 6] = [0, 1, 2, 3, 5, 7];

/// 默认最小面积 (像素²), 过滤地面纹理等噪声小框
pub const DEFAULT_MIN_AREA: f32 = 500.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionFilter {
    pub allowed_classes: Vec<u32>,
    pub min_area: f32,
}

impl DetectionFilter {
    pub fn new(allowed_classes: Vec<u32>, min_area: f32) -> Self {
        Self {
            allowed_classes,
            min_area,
        }
    }

    /// 单个检测是否通过 (类别在白名单内 且 面积严格大于阈值)
    pub fn accepts(&self, detection: &Detection) -> bool {
        self.allowed_classes.contains(&detection.class_id)
            && detection.bbox.area() > self.min_area
    }

    /// 过滤一帧检测结果, 保持原顺序
    pub fn apply(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| self.accepts(d))
            .copied()
            .collect()
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_CLASSES.to_vec(), DEFAULT_MIN_AREA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;

    fn det(class_id: u32, w: f32, h: f32) -> Detection {
        Detection::new(class_id, 0.9, BBox::new(0.0, 0.0, w, h))
    }

    #[test]
    fn test_area_threshold_is_strict() {
        let filter = DetectionFilter::default();
        // 20 x 25 = 500, 不大于阈值
        assert!(!filter.accepts(&det(0, 20.0, 25.0)));
        assert!(filter.accepts(&det(0, 20.0, 25.1)));
        assert!(!filter.accepts(&det(0, 1.0, 1.0)));
    }

    #[test]
    fn test_class_outside_allow_list() {
        let filter = DetectionFilter::default();
        // 盆栽: 面积再大也丢弃
        assert!(!filter.accepts(&det(58, 1000.0, 1000.0)));
        assert!(!filter.accepts(&det(4, 1000.0, 1000.0)));
        assert!(filter.accepts(&det(7, 1000.0, 1000.0)));
    }

    #[test]
    fn test_degenerate_boxes_fail_area() {
        let filter = DetectionFilter::new(vec![0], 0.0);
        assert!(!filter.accepts(&det(0, -50.0, 50.0)));
        assert!(!filter.accepts(&det(0, 50.0, 0.0)));
        assert!(filter.accepts(&det(0, 1.0, 1.0)));
    }

    #[test]
    fn test_apply_preserves_order() {
        let filter = DetectionFilter::default();
        let input = vec![
            det(2, 100.0, 100.0),
            det(58, 100.0, 100.0),
            det(0, 5.0, 5.0),
            det(0, 40.0, 80.0),
            det(3, 30.0, 30.0),
        ];
        let kept = filter.apply(&input);
        let classes: Vec<u32> = kept.iter().map(|d| d.class_id).collect();
        assert_eq!(classes, vec![2, 0, 3]);
        assert!(filter.apply(&[]).is_empty());
    }
}
