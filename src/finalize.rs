use crate::measure::{BoundingBoxComputer, Bounds};
use crate::session::ElementQuery;
use crate::types::Rect;
use log::warn;

/// Derives the clip from the measurement taken after the viewport resize.
///
/// Only the origin is clamped to the page. Width and height are kept as measured, so
/// the clip may extend past the viewport when the content does.
#[derive(Debug, Clone, Copy)]
pub struct ClipFinalizer {
    computer: BoundingBoxComputer,
}

impl ClipFinalizer {
    /// `padding` is the final-pass padding, independent of the initial one.
    pub fn new(padding: f64) -> Self {
        Self {
            computer: BoundingBoxComputer::new(padding),
        }
    }

    pub async fn measure<Q>(&self, query: &Q, selector: &str) -> Bounds
    where
        Q: ElementQuery + ?Sized,
    {
        self.computer.measure(query, selector).await
    }

    /// Resolves the final measurement, falling back to the first-pass rectangle when it
    /// did not produce one.
    pub fn finalize(&self, bounds: Bounds, initial: Rect) -> Rect {
        match bounds {
            Bounds::Measured(rect) => rect.clamp_origin(),
            Bounds::ContainerMissing | Bounds::Degenerate => {
                warn!(
                    "Final measurement unavailable ({:?}), reusing the initial box {:?}",
                    bounds, initial
                );
                initial.clamp_origin()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementRect;

    #[test]
    fn clamps_origin_only() {
        let finalizer = ClipFinalizer::new(20.0);
        let bounds = BoundingBoxComputer::new(20.0)
            .compute(Some(&[ElementRect::new(8.0, 12.0, 1508.0, 2012.0)]));
        let clip = finalizer.finalize(bounds, Rect::DEFAULT);
        assert_eq!(clip, Rect::new(0.0, 0.0, 1540.0, 2040.0));
    }

    #[test]
    fn size_may_exceed_viewport() {
        let finalizer = ClipFinalizer::new(20.0);
        let bounds = BoundingBoxComputer::new(20.0)
            .compute(Some(&[ElementRect::new(100.0, 100.0, 5100.0, 9100.0)]));
        let clip = finalizer.finalize(bounds, Rect::DEFAULT);
        assert_eq!(clip, Rect::new(80.0, 80.0, 5040.0, 9040.0));
    }

    #[test]
    fn falls_back_to_initial_box() {
        let finalizer = ClipFinalizer::new(20.0);
        let initial = Rect::new(85.0, 35.0, 230.0, 130.0);
        assert_eq!(finalizer.finalize(Bounds::Degenerate, initial), initial);
        assert_eq!(finalizer.finalize(Bounds::ContainerMissing, initial), initial);
    }

    #[test]
    fn fallback_origin_is_clamped() {
        let finalizer = ClipFinalizer::new(20.0);
        let initial = Rect::new(-10.0, -15.0, 75.0, 50.0);
        let clip = finalizer.finalize(Bounds::Degenerate, initial);
        assert_eq!(clip, Rect::new(0.0, 0.0, 75.0, 50.0));
    }

    #[test]
    fn origin_is_never_negative() {
        let finalizer = ClipFinalizer::new(20.0);
        for (left, top) in [(-300.0, -1.0), (0.0, 0.0), (19.9, 20.1), (1e6, -1e6)] {
            let bounds = BoundingBoxComputer::new(20.0)
                .compute(Some(&[ElementRect::new(left, top, left + 10.0, top + 10.0)]));
            let clip = finalizer.finalize(bounds, Rect::new(-5.0, -5.0, 1.0, 1.0));
            assert!(clip.x >= 0.0 && clip.y >= 0.0, "{:?}", clip);
        }
    }
}
