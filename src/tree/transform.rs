use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::element::{Element, FramePoint};
use crate::tree::value::find_rect;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelSize {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SafeArea {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Point <-> pixel mapping for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub screen: ScreenSize,
    pub screenshot: PixelSize,
    /// Pixels per point.
    pub scale: f64,
    #[serde(default)]
    pub safe_area: SafeArea,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            screen: ScreenSize::default(),
            screenshot: PixelSize::default(),
            scale: 1.0,
            safe_area: SafeArea::default(),
        }
    }
}

impl Transform {
    pub fn px_to_pt(&self, x: f64, y: f64) -> Option<FramePoint> {
        if self.scale <= 0.0 {
            return None;
        }
        Some(FramePoint {
            x: x / self.scale,
            y: y / self.scale,
        })
    }

    pub fn screen_center(&self) -> Option<FramePoint> {
        if self.screen.w <= 0.0 || self.screen.h <= 0.0 {
            return None;
        }
        Some(FramePoint {
            x: self.screen.w / 2.0,
            y: self.screen.h / 2.0,
        })
    }
}

/// Screen size comes from the furthest element extents, then the root rect,
/// then the screenshot itself.
pub fn derive_transform(raw: &Value, elements: &[Element], screenshot: Option<PixelSize>) -> Transform {
    let mut t = Transform::default();
    if let Some(px) = screenshot {
        t.screenshot = px;
    }

    let mut max_w: f64 = 0.0;
    let mut max_h: f64 = 0.0;
    for e in elements {
        max_w = max_w.max(e.frame.right());
        max_h = max_h.max(e.frame.bottom());
    }

    if max_w == 0.0 || max_h == 0.0 {
        if let Some(rect) = raw.as_object().and_then(find_rect) {
            if max_w == 0.0 {
                max_w = rect.w;
            }
            if max_h == 0.0 {
                max_h = rect.h;
            }
        }
    }

    if max_w == 0.0 && t.screenshot.w > 0 {
        max_w = f64::from(t.screenshot.w);
    }
    if max_h == 0.0 && t.screenshot.h > 0 {
        max_h = f64::from(t.screenshot.h);
    }

    t.screen = ScreenSize { w: max_w, h: max_h };

    if t.screen.w > 0.0 && t.screenshot.w > 0 {
        t.scale = f64::from(t.screenshot.w) / t.screen.w;
    } else if t.screen.h > 0.0 && t.screenshot.h > 0 {
        t.scale = f64::from(t.screenshot.h) / t.screen.h;
    }

    t
}
