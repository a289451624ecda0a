//! SVG preview serializer.
//!
//! Shapes become filled `<path>` elements, one per shape with all of its
//! rings as subpaths under `fill-rule="evenodd"`, so holes render as
//! holes without any winding bookkeeping. Contour lines become stroked
//! paths.
//!
//! World coordinates have y growing north while SVG's y grows down, so
//! every point is mapped to `(x - x_min, y_max - y)` and the `viewBox`
//! spans the supplied extent in map units.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use gridvec_core::{ContourLine, Extent, Point, Polyline, Ring, Shape};

/// Fill colours cycled over shapes in output order.
pub const FILL_COLORS: [&str; 8] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
];

/// Metadata to embed in the SVG document.
///
/// When present, `<title>` and `<desc>` are emitted right after the
/// opening `<svg>` tag. Text is XML-escaped by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, typically the source file stem.
    pub title: Option<&'a str>,

    /// Human-readable description of how the file was produced.
    pub description: Option<&'a str>,

    /// Serialized configuration, embedded inside `<metadata>` so the
    /// output can be reproduced.
    pub config_json: Option<&'a str>,
}

/// Maps world coordinates into the SVG coordinate space.
#[derive(Debug, Clone, Copy)]
struct Flip {
    x_min: f64,
    y_max: f64,
}

impl Flip {
    const fn new(extent: &Extent) -> Self {
        Self {
            x_min: extent.x_min,
            y_max: extent.y_max,
        }
    }

    fn apply(self, p: Point) -> (f64, f64) {
        (p.x - self.x_min, self.y_max - p.y)
    }
}

/// Build an SVG path `d` attribute string from a polyline, untransformed.
///
/// Returns an empty string for polylines with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use gridvec_core::{Point, Polyline};
/// use gridvec_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// assert_eq!(build_path_data(&polyline), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

fn polyline_data(polyline: &Polyline, flip: Flip) -> Option<Data> {
    let points = polyline.points();
    if points.len() < 2 {
        return None;
    }
    let mut data = Data::new().move_to(flip.apply(points[0]));
    for &p in &points[1..] {
        data = data.line_to(flip.apply(p));
    }
    Some(data)
}

/// Append `ring` as a closed subpath. Rings with fewer than 3 vertices
/// are skipped.
fn append_ring(data: Data, ring: &Ring, flip: Flip) -> Data {
    let points = ring.points();
    if points.len() < 3 {
        return data;
    }
    let mut data = data.move_to(flip.apply(points[0]));
    for &p in &points[1..] {
        data = data.line_to(flip.apply(p));
    }
    data.close()
}

fn document(extent: &Extent, metadata: &SvgMetadata<'_>) -> Document {
    let (w, h) = (extent.width(), extent.height());
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", format!("0 0 {w} {h}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("gridvec:config");
        config_el.assign("xmlns:gridvec", "urn:gridvec:config:1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }
    doc
}

/// The svg crate omits the XML declaration, so it is prepended here.
fn finish(doc: &Document) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// Serialize polygon shapes into an SVG document covering `extent`.
///
/// Each shape with at least one drawable ring becomes a `<path>` with
/// `data-id`, `data-value` and a `<title>` child holding its name.
///
/// # Examples
///
/// ```
/// use gridvec_core::{Extent, Point, Ring, Shape};
/// use gridvec_export::{SvgMetadata, shapes_to_svg};
///
/// let square = Ring::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(2.0, 0.0),
///     Point::new(2.0, 2.0),
///     Point::new(0.0, 2.0),
/// ]);
/// let shapes = vec![Shape::new(0, 1.0, "forest").with_part(square)];
/// let extent = Extent::new(0.0, 0.0, 2.0, 2.0);
/// let svg = shapes_to_svg(&shapes, &extent, &SvgMetadata::default());
/// assert!(svg.contains(r#"fill-rule="evenodd""#));
/// assert!(svg.contains("M0,2 L2,2 L2,0 L0,0 z"));
/// ```
#[must_use]
pub fn shapes_to_svg(shapes: &[Shape], extent: &Extent, metadata: &SvgMetadata<'_>) -> String {
    let flip = Flip::new(extent);
    let mut group =
        Group::new().set("id", "shapes").set("stroke", "black").set("stroke-width", 0.1);

    for (i, shape) in shapes.iter().enumerate() {
        let data = shape
            .parts
            .iter()
            .fold(Data::new(), |data, ring| append_ring(data, ring, flip));
        if data.is_empty() {
            continue;
        }
        let path = Path::new()
            .set("d", data)
            .set("fill", FILL_COLORS[i % FILL_COLORS.len()])
            .set("fill-rule", "evenodd")
            .set("data-id", shape.id)
            .set("data-value", shape.value)
            .add(Title::new(shape.name.as_str()));
        group = group.add(path);
    }

    finish(&document(extent, metadata).add(group))
}

/// Serialize contour lines into an SVG document covering `extent`.
///
/// Every part of every line becomes a stroked `<path>` carrying the
/// line's `data-id` and `data-value`.
#[must_use]
pub fn contours_to_svg(
    lines: &[ContourLine],
    extent: &Extent,
    metadata: &SvgMetadata<'_>,
) -> String {
    let flip = Flip::new(extent);
    let mut group = Group::new()
        .set("id", "contours")
        .set("fill", "none")
        .set("stroke", "black")
        .set("stroke-width", 0.1);

    for line in lines {
        for part in &line.parts {
            let Some(data) = polyline_data(part, flip) else {
                continue;
            };
            group = group.add(
                Path::new()
                    .set("d", data)
                    .set("data-id", line.id)
                    .set("data-value", line.value),
            );
        }
    }

    finish(&document(extent, metadata).add(group))
}
