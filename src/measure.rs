use crate::session::ElementQuery;
use crate::types::{ElementRect, Rect};
use log::warn;

/// Outcome of one bounding-box measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    /// Union of every visible descendant, padded.
    Measured(Rect),
    /// The container selector matched nothing.
    ContainerMissing,
    /// The container exists but no descendant has a finite, positive-area rectangle.
    Degenerate,
}

impl Bounds {
    pub fn rect(&self) -> Option<Rect> {
        match self {
            Bounds::Measured(rect) => Some(*rect),
            _ => None,
        }
    }

    /// Resolves a first-pass measurement into the rectangle used to size the viewport.
    pub fn or_default(self) -> Rect {
        self.rect().unwrap_or(Rect::DEFAULT)
    }

    pub fn approx_eq(&self, other: &Bounds, tolerance: f64) -> bool {
        match (self, other) {
            (Bounds::Measured(a), Bounds::Measured(b)) => a.approx_eq(b, tolerance),
            (a, b) => a == b,
        }
    }
}

/// Running extent of the qualifying elements.
#[derive(Debug, Clone, Copy)]
struct Extent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Extent {
    fn of(rect: &ElementRect) -> Self {
        Self {
            min_x: rect.left,
            min_y: rect.top,
            max_x: rect.right,
            max_y: rect.bottom,
        }
    }

    fn include(mut self, rect: &ElementRect) -> Self {
        self.min_x = self.min_x.min(rect.left);
        self.min_y = self.min_y.min(rect.top);
        self.max_x = self.max_x.max(rect.right);
        self.max_y = self.max_y.max(rect.bottom);
        self
    }
}

/// Unions the rendered rectangles of a container's descendants into one padded rectangle.
///
/// Descendants with a zero or negative width or height are skipped. That drops hidden and
/// collapsed elements, and also zero-height markers such as an empty `<div>` used as a
/// spacer; their position never widens the box.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBoxComputer {
    padding: f64,
}

impl BoundingBoxComputer {
    pub fn new(padding: f64) -> Self {
        Self { padding }
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// `rects` is `None` when the container itself is absent.
    pub fn compute(&self, rects: Option<&[ElementRect]>) -> Bounds {
        let Some(rects) = rects else {
            return Bounds::ContainerMissing;
        };

        let extent = rects
            .iter()
            .filter(|r| r.is_visible())
            .fold(None, |acc: Option<Extent>, r| {
                Some(acc.map_or_else(|| Extent::of(r), |e| e.include(r)))
            });

        let Some(extent) = extent else {
            return Bounds::Degenerate;
        };

        let rect = Rect::new(
            extent.min_x - self.padding,
            extent.min_y - self.padding,
            (extent.max_x - extent.min_x) + 2.0 * self.padding,
            (extent.max_y - extent.min_y) + 2.0 * self.padding,
        );
        if !rect.is_finite() || rect.width < 0.0 || rect.height < 0.0 {
            return Bounds::Degenerate;
        }
        Bounds::Measured(rect)
    }

    /// Reads the container's descendants through `query` and computes their bounds.
    ///
    /// A failing query is logged and reported as [`Bounds::Degenerate`].
    pub async fn measure<Q>(&self, query: &Q, selector: &str) -> Bounds
    where
        Q: ElementQuery + ?Sized,
    {
        match query.descendant_rects(selector).await {
            Ok(rects) => self.compute(rects.as_deref()),
            Err(e) => {
                warn!("Failed to read element rects for `{}`: {:#}", selector, e);
                Bounds::Degenerate
            }
        }
    }
}
