//! 渲染适配 (Render Adapter)
//! 轨迹 → 标注 (标签 + 边界框 + 颜色), 并绘制到帧图像上

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detection::types::{class_name, BBox};
use crate::detection::Track;

/// 报告提示横幅
pub const REPORT_BANNER: &str = "AI Analysis Active: See Console";

/// 单个标注
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub track_id: u32,
    pub label: String,
    pub bbox: BBox,
    pub color: (u8, u8, u8),
}

/// 标签: "#<id> <类别名>", 未知类别显示 object
pub fn label_for(track: &Track) -> String {
    format!("#{} {}", track.id, class_name(track.class_id).unwrap_or("object"))
}

/// 活跃轨迹 (Confirmed / Lost) → 标注列表
pub fn annotations(tracks: &[Track]) -> Vec<Annotation> {
    tracks
        .iter()
        .filter(|t| t.is_active())
        .map(|t| Annotation {
            track_id: t.id,
            label: label_for(t),
            bbox: t.bbox,
            color: t.color,
        })
        .collect()
}

/// 帧标注绘制器
pub struct FrameAnnotator {
    /// 标签字体 (未配置时只画框)
    font: Option<FontVec>,
    scale: PxScale,
    thickness: u32,
}

impl FrameAnnotator {
    pub fn new() -> Self {
        Self {
            font: None,
            scale: PxScale::from(20.0),
            thickness: 3,
        }
    }

    /// 加载 TTF/OTF 字体
    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data =
            std::fs::read(path).with_context(|| format!("读取字体失败: {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| anyhow::anyhow!("字体解析失败 {}: {}", path.display(), e))?;
        self.font = Some(font);
        Ok(self)
    }

    /// 绘制所有标注
    pub fn draw(&self, image: &mut RgbImage, annotations: &[Annotation]) {
        for annotation in annotations {
            self.draw_one(image, annotation);
        }
    }

    fn draw_one(&self, image: &mut RgbImage, annotation: &Annotation) {
        let Some(rect) = clip_rect(&annotation.bbox, image.width(), image.height()) else {
            return;
        };
        let (r, g, b) = annotation.color;
        let color = Rgb([r, g, b]);

        // 边框 (向内加粗)
        for i in 0..self.thickness {
            let w = rect.width().saturating_sub(2 * i);
            let h = rect.height().saturating_sub(2 * i);
            if w == 0 || h == 0 {
                break;
            }
            let inner = Rect::at(rect.left() + i as i32, rect.top() + i as i32).of_size(w, h);
            draw_hollow_rect_mut(image, inner, color);
        }

        // 标签 (框上方, 放不下则放框内)
        if let Some(font) = &self.font {
            let (tw, th) = text_size(self.scale, font, &annotation.label);
            let y = if rect.top() >= th as i32 + 4 {
                rect.top() - th as i32 - 4
            } else {
                rect.top()
            };
            if tw > 0 && th > 0 {
                draw_filled_rect_mut(image, Rect::at(rect.left(), y).of_size(tw + 4, th + 4), color);
            }
            draw_text_mut(
                image,
                Rgb([255, 255, 255]),
                rect.left() + 2,
                y + 2,
                self.scale,
                font,
                &annotation.label,
            );
        }
    }

    /// 报告输出提示
    pub fn draw_banner(&self, image: &mut RgbImage) {
        let red = Rgb([255, 0, 0]);
        match &self.font {
            Some(font) => draw_text_mut(image, red, 10, 10, self.scale, font, REPORT_BANNER),
            None => {
                // 无字体时左上角画红色方块
                let size = 16.min(image.width()).min(image.height());
                if size > 0 {
                    draw_filled_rect_mut(image, Rect::at(0, 0).of_size(size, size), red);
                }
            }
        }
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

/// 边界框裁剪到图像范围, 完全在外或退化返回 None
fn clip_rect(bbox: &BBox, width: u32, height: u32) -> Option<Rect> {
    if bbox.is_degenerate() || width == 0 || height == 0 {
        return None;
    }
    let x1 = bbox.x.max(0.0).floor() as i64;
    let y1 = bbox.y.max(0.0).floor() as i64;
    let x2 = (bbox.x2().min(width as f32)).ceil() as i64;
    let y2 = (bbox.y2().min(height as f32)).ceil() as i64;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}
