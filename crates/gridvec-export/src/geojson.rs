//! GeoJSON (RFC 7946) serializers and a polygon reader.
//!
//! Shapes are written as `Polygon` or `MultiPolygon` features. Each
//! outer ring collects the holes it directly encloses, and rings are
//! closed explicitly as GeoJSON requires. Contour lines are
//! written as `LineString` or `MultiLineString` features.

use serde_json::{Map, Value, json};

use gridvec_core::{ContourLine, Point, Polyline, Ring, Shape};

/// Errors from reading GeoJSON polygons.
#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a FeatureCollection")]
    NotFeatureCollection,

    #[error("feature {index}: unsupported geometry type {kind:?}")]
    UnsupportedGeometry { index: usize, kind: String },

    #[error("feature {index}: malformed coordinates")]
    InvalidCoordinates { index: usize },
}

fn position(p: Point) -> Value {
    json!([p.x, p.y])
}

/// Ring coordinates with the first vertex repeated at the end.
fn closed_ring(ring: &Ring) -> Value {
    let points = ring.points();
    let mut coords: Vec<Value> = points.iter().copied().map(position).collect();
    if let (Some(&first), Some(&last)) = (points.first(), points.last())
        && first != last
    {
        coords.push(position(first));
    }
    Value::Array(coords)
}

fn line_coords(line: &Polyline) -> Value {
    Value::Array(line.points().iter().copied().map(position).collect())
}

/// Group `parts` into polygons: every outer ring followed by its holes.
///
/// A hole belongs to the smallest outer ring holding all of its
/// vertices, so the hole of an island inside a lake stays with the
/// island. Holes without an enclosing ring are dropped.
fn polygons(parts: &[Ring]) -> Vec<Vec<&Ring>> {
    let mut polygons: Vec<Vec<&Ring>> =
        parts.iter().filter(|r| r.is_outer()).map(|r| vec![r]).collect();
    for hole in parts.iter().filter(|r| !r.is_outer()) {
        let owner = polygons
            .iter_mut()
            .filter(|p| !hole.is_empty() && hole.points().iter().all(|&v| p[0].contains(v)))
            .min_by(|a, b| a[0].area().total_cmp(&b[0].area()));
        if let Some(polygon) = owner {
            polygon.push(hole);
        }
    }
    polygons
}

fn shape_geometry(shape: &Shape) -> Value {
    let polygons: Vec<Value> = polygons(&shape.parts)
        .into_iter()
        .map(|rings| Value::Array(rings.into_iter().map(closed_ring).collect()))
        .collect();
    match polygons.as_slice() {
        [] => Value::Null,
        [single] => json!({ "type": "Polygon", "coordinates": single }),
        _ => json!({ "type": "MultiPolygon", "coordinates": polygons }),
    }
}

fn feature(geometry: Value, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    })
}

/// Serialize shapes into a `FeatureCollection`.
///
/// Properties carry the shape's `id`, `value` and `name`. Shapes without
/// rings get a `null` geometry.
#[must_use]
pub fn shapes_to_geojson(shapes: &[Shape]) -> Value {
    let features: Vec<Value> = shapes
        .iter()
        .map(|shape| {
            feature(
                shape_geometry(shape),
                json!({ "id": shape.id, "value": shape.value, "name": shape.name }),
            )
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Serialize contour lines into a `FeatureCollection`.
#[must_use]
pub fn contours_to_geojson(lines: &[ContourLine]) -> Value {
    let features: Vec<Value> = lines
        .iter()
        .map(|line| {
            let geometry = match line.parts.as_slice() {
                [] => Value::Null,
                [single] => json!({ "type": "LineString", "coordinates": line_coords(single) }),
                parts => json!({
                    "type": "MultiLineString",
                    "coordinates": parts.iter().map(line_coords).collect::<Vec<_>>(),
                }),
            };
            feature(geometry, json!({ "id": line.id, "value": line.value }))
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

fn parse_ring(value: &Value) -> Option<Ring> {
    let mut points = value
        .as_array()?
        .iter()
        .map(|pos| {
            let pos = pos.as_array()?;
            Some(Point::new(pos.first()?.as_f64()?, pos.get(1)?.as_f64()?))
        })
        .collect::<Option<Vec<Point>>>()?;
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Some(Ring::new(points))
}

fn parse_polygon(value: &Value) -> Option<Vec<Ring>> {
    value.as_array()?.iter().map(parse_ring).collect()
}

fn number_property(properties: Option<&Map<String, Value>>, key: &str) -> Option<f64> {
    properties?.get(key)?.as_f64()
}

/// Read `Polygon` and `MultiPolygon` features from a `FeatureCollection`.
///
/// Attributes come from the `id`, `value` and `name` properties when
/// present; otherwise the id is the feature's position, the value zero
/// and the name empty. A boolean `selected` property sets the selection
/// flag. Features with a `null` geometry are skipped.
///
/// # Errors
///
/// Returns [`GeoJsonError`] for invalid JSON, a document that is not a
/// feature collection, or a feature with another geometry type or
/// malformed coordinates.
pub fn shapes_from_geojson(text: &str) -> Result<Vec<Shape>, GeoJsonError> {
    let doc: Value = serde_json::from_str(text)?;
    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(GeoJsonError::NotFeatureCollection);
    }
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or(GeoJsonError::NotFeatureCollection)?;

    let mut shapes = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
            continue;
        };
        let kind = geometry.get("type").and_then(Value::as_str).unwrap_or_default();
        let coords = geometry.get("coordinates");
        let parts = match kind {
            "Polygon" => coords.and_then(parse_polygon),
            "MultiPolygon" => coords.and_then(Value::as_array).and_then(|polys| {
                polys
                    .iter()
                    .map(parse_polygon)
                    .collect::<Option<Vec<_>>>()
                    .map(|p| p.into_iter().flatten().collect())
            }),
            other => {
                return Err(GeoJsonError::UnsupportedGeometry {
                    index,
                    kind: other.to_string(),
                });
            }
        }
        .ok_or(GeoJsonError::InvalidCoordinates { index })?;

        let properties = feature.get("properties").and_then(Value::as_object);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let id = number_property(properties, "id")
            .map_or_else(|| u32::try_from(index).unwrap_or(u32::MAX), |v| v as u32);
        let name = properties
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut shape = Shape::new(id, number_property(properties, "value").unwrap_or(0.0), name);
        shape.parts = parts;
        shape.selected = properties
            .and_then(|p| p.get("selected"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        shapes.push(shape);
    }
    Ok(shapes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        Ring::new(vec![
            Point::new(x0, y0),
            Point::new(x0 + size, y0),
            Point::new(x0 + size, y0 + size),
            Point::new(x0, y0 + size),
        ])
    }

    fn hole(x0: f64, y0: f64, size: f64) -> Ring {
        let mut ring = square(x0, y0, size);
        ring.reverse();
        ring
    }

    #[test]
    fn polygon_with_hole() {
        let shapes = vec![
            Shape::new(4, 1.5, "lake")
                .with_part(square(0.0, 0.0, 4.0))
                .with_part(hole(1.0, 1.0, 1.0)),
        ];
        let doc = shapes_to_geojson(&shapes);
        let feature = &doc["features"][0];
        assert_eq!(feature["geometry"]["type"], "Polygon");
        let rings = feature["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 2);
        // Closed explicitly.
        assert_eq!(rings[0].as_array().unwrap().len(), 5);
        assert_eq!(rings[0][0], rings[0][4]);
        assert_eq!(feature["properties"]["id"], 4);
        assert_eq!(feature["properties"]["name"], "lake");
    }

    #[test]
    fn holes_follow_their_outer_ring() {
        let shapes = vec![
            Shape::new(0, 1.0, "a")
                .with_part(square(0.0, 0.0, 3.0))
                .with_part(square(10.0, 0.0, 3.0))
                .with_part(hole(11.0, 1.0, 1.0)),
        ];
        let doc = shapes_to_geojson(&shapes);
        let geometry = &doc["features"][0]["geometry"];
        assert_eq!(geometry["type"], "MultiPolygon");
        assert_eq!(geometry["coordinates"][0].as_array().unwrap().len(), 1);
        assert_eq!(geometry["coordinates"][1].as_array().unwrap().len(), 2);
    }

    #[test]
    fn island_hole_stays_with_the_island() {
        // Frame with a lake, an island in the lake and a pond on the island.
        let shapes = vec![
            Shape::new(0, 1.0, "land")
                .with_part(square(0.0, 0.0, 7.0))
                .with_part(hole(1.0, 1.0, 5.0))
                .with_part(square(2.0, 2.0, 3.0))
                .with_part(hole(3.0, 3.0, 1.0)),
        ];
        let doc = shapes_to_geojson(&shapes);
        let geometry = &doc["features"][0]["geometry"];
        assert_eq!(geometry["type"], "MultiPolygon");
        let polygons = geometry["coordinates"].as_array().unwrap();
        assert_eq!(polygons.len(), 2);

        let frame = polygons[0].as_array().unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1][0], json!([1.0, 6.0]));

        let island = polygons[1].as_array().unwrap();
        assert_eq!(island.len(), 2);
        assert_eq!(island[0][0], json!([2.0, 2.0]));
        assert_eq!(island[1][0], json!([3.0, 4.0]));
    }

    #[test]
    fn contours_as_line_strings() {
        let lines = vec![
            ContourLine {
                id: 1,
                value: 5.0,
                parts: vec![Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)])],
            },
            ContourLine {
                id: 2,
                value: 10.0,
                parts: vec![
                    Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
                    Polyline::new(vec![Point::new(2.0, 0.0), Point::new(3.0, 0.0)]),
                ],
            },
        ];
        let doc = contours_to_geojson(&lines);
        assert_eq!(doc["features"][0]["geometry"]["type"], "LineString");
        assert_eq!(doc["features"][1]["geometry"]["type"], "MultiLineString");
        assert_eq!(doc["features"][1]["properties"]["value"], 10.0);
    }

    #[test]
    fn written_shapes_read_back() {
        let shapes = vec![
            Shape::new(7, 2.0, "b")
                .with_part(square(0.0, 0.0, 4.0))
                .with_part(hole(1.0, 1.0, 1.0)),
        ];
        let text = shapes_to_geojson(&shapes).to_string();
        let read = shapes_from_geojson(&text).unwrap();
        assert_eq!(read, shapes);
    }

    #[test]
    fn reader_defaults_and_selection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": null, "properties": {} },
                {
                    "type": "Feature",
                    "properties": { "selected": true },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
                    }
                }
            ]
        }"#;
        let shapes = shapes_from_geojson(text).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].id, 1);
        assert!(shapes[0].selected);
        assert_eq!(shapes[0].parts[0].len(), 3);
    }

    #[test]
    fn reader_rejects_other_documents() {
        assert!(matches!(
            shapes_from_geojson(r#"{"type": "Feature"}"#),
            Err(GeoJsonError::NotFeatureCollection),
        ));
        let points = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Point", "coordinates": [0, 0]}}
        ]}"#;
        assert!(matches!(
            shapes_from_geojson(points),
            Err(GeoJsonError::UnsupportedGeometry { index: 0, .. }),
        ));
        assert!(matches!(shapes_from_geojson("not json"), Err(GeoJsonError::Json(_))));
    }
}
