//! Shared types for the gridvec engine: geometry, shape records,
//! vectorization configuration and errors.

use serde::{Deserialize, Serialize};

/// A 2D point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Easting.
    pub x: f64,
    /// Northing (grows upward, rows are stored bottom to top).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Extent {
    /// Create an extent from its corner coordinates.
    #[must_use]
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Bounding rectangle of a point sequence, `None` when empty.
    #[must_use]
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut extent = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            extent.x_min = extent.x_min.min(p.x);
            extent.y_min = extent.y_min.min(p.y);
            extent.x_max = extent.x_max.max(p.x);
            extent.y_max = extent.y_max.max(p.y);
        }
        Some(extent)
    }

    /// Smallest extent covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Whether the two rectangles overlap. Touching edges count.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x_min <= other.x_max
            && other.x_min <= self.x_max
            && self.y_min <= other.y_max
            && other.y_min <= self.y_max
    }

    /// Whether `p` lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        (self.x_min..=self.x_max).contains(&p.x) && (self.y_min..=self.y_max).contains(&p.y)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// A sequence of connected points forming an open path (contour lines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Append a point.
    pub fn push(&mut self, p: Point) {
        self.0.push(p);
    }

    /// Sum of segment lengths.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// A closed ring of vertices. Closure is implicit: the first point is
/// not repeated at the end (an explicitly repeated point is tolerated).
///
/// Rings produced by the boundary tracer wind counter-clockwise for
/// outer boundaries (positive [`signed_area`](Self::signed_area)) and
/// clockwise for holes (negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring(Vec<Point>);

impl Ring {
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of stored vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Iterate the ring's edges `(a, b)`, including the closing edge
    /// from the last vertex back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let closing = self.0.last().copied().into_iter().zip(self.0.first().copied());
        closing.chain(self.0.windows(2).map(|w| (w[0], w[1])))
    }

    /// Shoelace area, positive for counter-clockwise rings.
    ///
    /// Coordinates are taken relative to the first vertex to keep
    /// precision for rings far from the origin.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        let Some(&origin) = self.0.first() else {
            return 0.0;
        };
        let twice: f64 = self
            .edges()
            .map(|(a, b)| {
                let (ax, ay) = (a.x - origin.x, a.y - origin.y);
                let (bx, by) = (b.x - origin.x, b.y - origin.y);
                ax.mul_add(by, -(bx * ay))
            })
            .sum();
        twice / 2.0
    }

    /// Absolute enclosed area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// `true` for outer rings (positive signed area).
    #[must_use]
    pub fn is_outer(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Whether `p` lies inside the ring or on its boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        use geo::Intersects;

        if self.0.len() < 3 {
            return false;
        }
        let exterior: geo::LineString<f64> = self.0.iter().map(|&q| geo::Coord::from(q)).collect();
        geo::Polygon::new(exterior, Vec::new()).intersects(&geo::Coord::from(p))
    }

    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        Extent::from_points(&self.0)
    }

    /// Reverse the winding order in place.
    pub fn reverse(&mut self) {
        self.0.reverse();
    }
}

/// A polygon feature: one region id plus its rings and attributes.
///
/// Parts are interpreted with even-odd fill semantics; holes need no
/// explicit flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Sequential identifier (region id for vectorized output).
    pub id: u32,
    /// Source value the shape represents.
    pub value: f64,
    /// Display name.
    pub name: String,
    /// Rings in discovery order.
    pub parts: Vec<Ring>,
    /// Selection flag honoured by the rasterizer's selection filter.
    #[serde(default)]
    pub selected: bool,
}

impl Shape {
    /// Create a shape without parts.
    #[must_use]
    pub fn new(id: u32, value: f64, name: impl Into<String>) -> Self {
        Self {
            id,
            value,
            name: name.into(),
            parts: Vec::new(),
            selected: false,
        }
    }

    /// Builder-style helper to attach a ring.
    #[must_use]
    pub fn with_part(mut self, ring: Ring) -> Self {
        self.parts.push(ring);
        self
    }

    /// Copy of the attribute fields with no parts.
    #[must_use]
    pub fn attributes_only(&self) -> Self {
        Self {
            id: self.id,
            value: self.value,
            name: self.name.clone(),
            parts: Vec::new(),
            selected: self.selected,
        }
    }

    /// Bounding rectangle over all parts.
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        self.parts
            .iter()
            .filter_map(Ring::extent)
            .reduce(Extent::union)
    }

    /// Total vertex count across parts.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.parts.iter().map(Ring::len).sum()
    }

    /// Net area: outer rings minus holes.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.parts.iter().map(Ring::signed_area).sum()
    }
}

/// Bounding rectangle of a whole shape set.
#[must_use]
pub fn shapes_extent(shapes: &[Shape]) -> Option<Extent> {
    shapes.iter().filter_map(Shape::extent).reduce(Extent::union)
}

/// Isoline record: every line traced at one contour value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourLine {
    /// One plus the level's position in the sorted level list.
    pub id: u32,
    /// Contour value.
    pub value: f64,
    pub parts: Vec<Polyline>,
}

impl ContourLine {
    /// Number of vertices over all parts.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.parts.iter().map(Polyline::len).sum()
    }

    /// Extent over all parts.
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        self.parts
            .iter()
            .filter_map(|p| Extent::from_points(p.points()))
            .reduce(Extent::union)
    }
}

/// Which raster values are vectorized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ClassSelection {
    /// Only cells equal to this value (region id 0).
    Single(f64),
    /// One region per distinct value.
    #[default]
    All,
}

/// How rings are grouped into shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    /// One multi-part shape per class.
    #[default]
    Multipart,
    /// One shape per outer ring, with its holes attached.
    SplitIslands,
}

/// Configuration for [`crate::classes_to_polygons`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeConfig {
    /// Which classes to vectorize.
    pub class_selection: ClassSelection,

    /// Multi-part shapes per class, or one shape per island.
    pub output_mode: OutputMode,

    /// Keep vertices on straight boundary runs instead of only at turns.
    pub keep_all_vertices: bool,

    /// Build the edge lattice on the rayon pool.
    pub parallel: bool,
}

impl VectorizeConfig {
    pub const DEFAULT_KEEP_ALL_VERTICES: bool = false;
    pub const DEFAULT_PARALLEL: bool = false;
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            class_selection: ClassSelection::default(),
            output_mode: OutputMode::default(),
            keep_all_vertices: Self::DEFAULT_KEEP_ALL_VERTICES,
            parallel: Self::DEFAULT_PARALLEL,
        }
    }
}

/// Errors that can occur while vectorizing a raster.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum VectorizeError {
    /// Configuration is unusable.
    #[error("invalid vectorization configuration: {0}")]
    InvalidConfig(String),

    /// The source holds no distinguishable classes.
    #[error("no classes found in the raster")]
    NoClasses,

    /// Every cell belongs to the same region (or none).
    #[error("no edges found")]
    NoEdges,

    /// Tracing finished without producing a single shape.
    #[error("no shapes were produced")]
    NoShapes,
}
