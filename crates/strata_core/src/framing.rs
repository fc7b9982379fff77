//! Viewports and scene framing
//!
//! Framing decides how a scene's design aspect ratio maps onto the area it is
//! given on screen.

use serde::{Deserialize, Serialize};

/// Integer pixel rectangle, inclusive of `left`/`bottom`, exclusive of `right`/`top`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub top: i32,
}

impl Viewport {
    pub fn new(left: i32, bottom: i32, right: i32, top: i32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Viewport covering `width x height` from the origin
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.top - self.bottom
    }

    /// Width over height, 1.0 for degenerate rectangles
    pub fn aspect(&self) -> f32 {
        if self.height() <= 0 {
            1.0
        } else {
            self.width() as f32 / self.height() as f32
        }
    }

    /// `[x, y, width, height]`
    pub fn to_array(&self) -> [i32; 4] {
        [self.left, self.bottom, self.width(), self.height()]
    }
}

/// How the design aspect is fitted into an area
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramingKind {
    /// Keep the aspect, fill the rest with bars
    Bars,
    /// Use the whole area, field of view grows on the long axis
    Extend,
    /// Use the whole area, image is stretched
    #[default]
    Scale,
}

/// Per-scene framing
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameSettings {
    pub framing: FramingKind,
    pub design_width: u32,
    pub design_height: u32,
    /// Color of the bars and of the cleared screen
    pub bar_color: [f32; 3],
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            framing: FramingKind::Scale,
            design_width: 1280,
            design_height: 720,
            bar_color: [0.0, 0.0, 0.0],
        }
    }
}

impl FrameSettings {
    pub fn design_aspect(&self) -> f32 {
        if self.design_height == 0 {
            1.0
        } else {
            self.design_width as f32 / self.design_height as f32
        }
    }

    /// Viewport for this framing inside `area`
    pub fn compute_viewport(&self, area: &Viewport) -> Viewport {
        match self.framing {
            FramingKind::Extend | FramingKind::Scale => *area,
            FramingKind::Bars => {
                let design = self.design_aspect();
                let width = area.width();
                let height = area.height();
                if width <= 0 || height <= 0 {
                    return *area;
                }
                if area.aspect() > design {
                    let fitted = (height as f32 * design).round() as i32;
                    let margin = (width - fitted) / 2;
                    Viewport::new(area.left + margin, area.bottom, area.left + margin + fitted, area.top)
                } else {
                    let fitted = (width as f32 / design).round() as i32;
                    let margin = (height - fitted) / 2;
                    Viewport::new(area.left, area.bottom + margin, area.right, area.bottom + margin + fitted)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_dimensions() {
        let vp = Viewport::new(10, 20, 110, 70);
        assert_eq!(vp.width(), 100);
        assert_eq!(vp.height(), 50);
        assert_eq!(vp.aspect(), 2.0);
        assert_eq!(vp.to_array(), [10, 20, 100, 50]);
    }

    #[test]
    fn test_scale_uses_whole_area() {
        let settings = FrameSettings::default();
        let area = Viewport::full(800, 800);
        assert_eq!(settings.compute_viewport(&area), area);
    }

    #[test]
    fn test_bars_pillarbox() {
        let settings = FrameSettings {
            framing: FramingKind::Bars,
            design_width: 4,
            design_height: 3,
            ..FrameSettings::default()
        };
        let vp = settings.compute_viewport(&Viewport::full(1600, 900));
        assert_eq!(vp.height(), 900);
        assert_eq!(vp.width(), 1200);
        assert_eq!(vp.left, 200);
    }

    #[test]
    fn test_bars_letterbox() {
        let settings = FrameSettings {
            framing: FramingKind::Bars,
            design_width: 16,
            design_height: 9,
            ..FrameSettings::default()
        };
        let vp = settings.compute_viewport(&Viewport::full(1600, 1600));
        assert_eq!(vp.width(), 1600);
        assert_eq!(vp.height(), 900);
        assert_eq!(vp.bottom, 350);
    }
}
