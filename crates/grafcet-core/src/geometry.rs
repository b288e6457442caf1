//! Chart-space geometry.
//!
//! Coordinates follow the usual screen convention: the origin is the top-left
//! corner, `x` grows to the right and `y` grows downward, which is also the
//! direction of forward flow in a chart.
//!
//! ```text
//!   (0,0) ────────► +x
//!     │
//!     ▼
//!    +y   forward flow
//! ```

use serde::{Deserialize, Serialize};

/// A position in chart space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(self) -> f32 {
        self.x
    }

    pub fn y(self) -> f32 {
        self.y
    }

    /// The same point moved horizontally to `x`.
    pub fn with_x(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    /// The same point moved vertically to `y`.
    pub fn with_y(mut self, y: f32) -> Self {
        self.y = y;
        self
    }
}

/// Width and height of a placed element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }
}

/// An axis-aligned box. Degenerate boxes describe connection segments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        }
    }

    /// The smallest box containing both points, in any order.
    pub fn new_from_points(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn min_x(self) -> f32 {
        self.min_x
    }

    pub fn min_y(self) -> f32 {
        self.min_y
    }

    pub fn max_x(self) -> f32 {
        self.max_x
    }

    pub fn max_y(self) -> f32 {
        self.max_y
    }

    /// Where an incoming vertical connection enters the box.
    pub fn top_center(self) -> Point {
        Point::new((self.min_x + self.max_x) / 2.0, self.min_y)
    }

    /// The box grown by `margin` on every side.
    pub fn inflate(self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Whether `point` lies strictly inside the box; points on an edge do not.
    pub fn contains(self, point: Point) -> bool {
        self.min_x < point.x && point.x < self.max_x && self.min_y < point.y && point.y < self.max_y
    }

    /// The smallest box containing both boxes.
    ///
    /// ```
    /// # use grafcet_core::geometry::{Bounds, Point, Size};
    /// let step = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(40.0, 40.0));
    /// let action = Bounds::new_from_top_left(Point::new(60.0, 5.0), Size::new(100.0, 30.0));
    ///
    /// let row = step.merge(&action);
    /// assert_eq!(row.max_x(), 160.0);
    /// assert_eq!(row.max_y(), 40.0);
    /// ```
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Whether the two boxes share interior points.
    ///
    /// Touching edges do not count, so a segment running along the edge of a
    /// step does not intersect it, while a segment crossing it does.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_point_moves_along_one_axis() {
        let point = Point::new(1.0, 2.0);
        assert_eq!(point.with_x(10.0), Point::new(10.0, 2.0));
        assert_eq!(point.with_y(20.0), Point::new(1.0, 20.0));
    }

    #[test]
    fn test_top_center() {
        let bounds = Bounds::new_from_top_left(Point::new(10.0, 20.0), Size::new(40.0, 30.0));
        assert_eq!(bounds.top_center(), Point::new(30.0, 20.0));
    }

    #[test]
    fn test_bounds_from_points_normalizes() {
        let bounds = Bounds::new_from_points(Point::new(50.0, 10.0), Point::new(10.0, 50.0));
        assert_eq!(bounds.min_x(), 10.0);
        assert_eq!(bounds.min_y(), 10.0);
        assert_eq!(bounds.max_x(), 50.0);
        assert_eq!(bounds.max_y(), 50.0);
    }

    #[test]
    fn test_inflate() {
        let bounds = Bounds::new_from_top_left(Point::new(10.0, 20.0), Size::new(40.0, 4.0)).inflate(2.5);
        assert!(approx_eq!(f32, bounds.min_x(), 7.5, ulps = 2));
        assert!(approx_eq!(f32, bounds.max_y(), 26.5, ulps = 2));
    }

    #[test]
    fn test_contains_excludes_edges() {
        let step = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(40.0, 40.0));
        assert!(step.contains(Point::new(20.0, 20.0)));
        assert!(!step.contains(Point::new(40.0, 20.0)));
        assert!(!step.contains(Point::new(20.0, 0.0)));
    }

    #[test]
    fn test_bounds_intersects() {
        let a = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let b = Bounds::new_from_top_left(Point::new(5.0, 5.0), Size::new(10.0, 10.0));
        let c = Bounds::new_from_top_left(Point::new(10.0, 0.0), Size::new(10.0, 10.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c), "touching edges must not intersect");
    }

    #[test]
    fn test_vertical_line_crossing_box() {
        let step = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(40.0, 40.0));
        let line = Bounds::new_from_points(Point::new(20.0, -10.0), Point::new(20.0, 50.0));
        assert!(step.intersects(&line));

        let beside = Bounds::new_from_points(Point::new(-20.0, -10.0), Point::new(-20.0, 50.0));
        assert!(!step.intersects(&beside));
    }

    #[test]
    fn test_point_serializes_as_object() {
        let json = serde_json::to_string(&Point::new(1.5, 2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.5,"y":2.0}"#);
    }
}
