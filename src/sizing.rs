use crate::config::ViewportFloor;
use crate::types::{Rect, Viewport};

/// Turns a bounding box into the viewport the page is resized to before the final pass.
///
/// Resizing can reflow responsive layouts, so the viewport only has to be large enough
/// to render the content; the clip itself comes from a second measurement.
#[derive(Debug, Clone, Copy)]
pub struct ViewportSizer {
    floor: ViewportFloor,
    device_scale_factor: f64,
}

impl ViewportSizer {
    pub fn new(floor: ViewportFloor) -> Self {
        Self {
            floor,
            device_scale_factor: 1.0,
        }
    }

    pub fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }

    pub fn size(&self, bbox: &Rect) -> Viewport {
        Viewport::new(
            axis(bbox.width, self.floor.width),
            axis(bbox.height, self.floor.height),
        )
        .with_device_scale_factor(self.device_scale_factor)
    }
}

fn axis(extent: f64, floor: u32) -> u32 {
    if !extent.is_finite() || extent <= 0.0 {
        return floor;
    }
    // `as` saturates at u32::MAX for absurdly large extents.
    (extent.ceil() as u32).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer() -> ViewportSizer {
        ViewportSizer::new(ViewportFloor::default())
    }

    #[test]
    fn small_content_gets_the_floor() {
        let viewport = sizer().size(&Rect::new(0.0, 0.0, 50.0, 40.0));
        assert_eq!((viewport.width, viewport.height), (1000, 800));
    }

    #[test]
    fn large_content_is_rounded_up() {
        let viewport = sizer().size(&Rect::new(-10.0, 5.0, 1200.2, 1999.0));
        assert_eq!((viewport.width, viewport.height), (1201, 1999));
    }

    #[test]
    fn axes_are_clamped_independently() {
        let viewport = sizer().size(&Rect::new(0.0, 0.0, 1500.5, 300.0));
        assert_eq!((viewport.width, viewport.height), (1501, 800));
    }

    #[test]
    fn default_rect_sizes_to_the_floor() {
        let viewport = sizer().size(&Rect::DEFAULT);
        assert_eq!((viewport.width, viewport.height), (1000, 800));
    }

    #[test]
    fn non_finite_sizes_fall_back_to_floor() {
        let viewport = sizer().size(&Rect::new(0.0, 0.0, f64::NAN, f64::INFINITY));
        assert_eq!((viewport.width, viewport.height), (1000, 800));
    }

    #[test]
    fn custom_floor_and_scale() {
        let viewport = ViewportSizer::new(ViewportFloor { width: 320, height: 240 })
            .with_device_scale_factor(2.0)
            .size(&Rect::new(0.0, 0.0, 400.0, 100.0));
        assert_eq!(viewport, Viewport::new(400, 240).with_device_scale_factor(2.0));
    }
}
