//! Planar geometry over WKT strings: overlap ratios, containment classes,
//! point-in-polygon and the search circle enclosing a block group.
//!
//! Coordinates follow WKT order, so `x` is longitude and `y` latitude.

use geo::{
    Area, BooleanOps, Centroid, Contains, Geometry, HaversineDistance, Intersects, MultiPolygon,
    Point,
};
use thiserror::Error;
use wkt::TryFromWkt;

/// Overlap ratio strictly above this is full containment.
pub const FULL_CONTAINMENT_THRESHOLD: f64 = 0.95;

/// Upper bound on a place-search radius, in meters.
pub const MAX_SEARCH_RADIUS_M: f64 = 50_000.0;

const METERS_PER_DEGREE: f64 = 111_000.0;
const SEARCH_CELL_PRECISION: usize = 7;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid WKT: {0}")]
    Parse(String),

    #[error("expected a polygon, found {0}")]
    NotPolygonal(&'static str),

    #[error("geometry has zero area")]
    ZeroArea,
}

/// A parsed layer geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Area(MultiPolygon<f64>),
    Point(Point<f64>),
}

impl Shape {
    pub fn intersects(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Area(a), Shape::Area(b)) => a.intersects(b),
            (Shape::Area(a), Shape::Point(p)) | (Shape::Point(p), Shape::Area(a)) => a.intersects(p),
            (Shape::Point(a), Shape::Point(b)) => a == b,
        }
    }

    /// Great-circle distance in kilometers from `point` to this shape.
    /// Zero when an area contains the point; otherwise measured to the centroid.
    pub fn distance_km(&self, point: &Point<f64>) -> f64 {
        let target = match self {
            Shape::Point(p) => *p,
            Shape::Area(area) => {
                if area.contains(point) {
                    return 0.0;
                }
                match area.centroid() {
                    Some(c) => c,
                    None => return f64::INFINITY,
                }
            }
        };
        target.haversine_distance(point) / 1000.0
    }
}

fn kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) => "LINE",
        Geometry::LineString(_) => "LINESTRING",
        Geometry::Polygon(_) => "POLYGON",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        Geometry::Rect(_) => "RECT",
        Geometry::Triangle(_) => "TRIANGLE",
    }
}

pub fn parse_shape(raw: &str) -> Result<Shape, GeometryError> {
    let geometry = Geometry::<f64>::try_from_wkt_str(raw.trim())
        .map_err(|e| GeometryError::Parse(e.to_string()))?;
    match geometry {
        Geometry::Point(p) => Ok(Shape::Point(p)),
        Geometry::Polygon(p) => Ok(Shape::Area(MultiPolygon(vec![p]))),
        Geometry::MultiPolygon(mp) => Ok(Shape::Area(mp)),
        other => Err(GeometryError::NotPolygonal(kind(&other))),
    }
}

/// Parse a WKT polygon or multipolygon.
pub fn parse_area(raw: &str) -> Result<MultiPolygon<f64>, GeometryError> {
    match parse_shape(raw)? {
        Shape::Area(area) => Ok(area),
        Shape::Point(_) => Err(GeometryError::NotPolygonal("POINT")),
    }
}

/// `area(inner ∩ outer) / area(inner)`, clamped to `[0, 1]`.
pub fn overlap_ratio(
    inner: &MultiPolygon<f64>,
    outer: &MultiPolygon<f64>,
) -> Result<f64, GeometryError> {
    let inner_area = inner.unsigned_area();
    if inner_area <= 0.0 || !inner_area.is_finite() {
        return Err(GeometryError::ZeroArea);
    }
    let shared = inner.intersection(outer).unsigned_area();
    Ok((shared / inner_area).clamp(0.0, 1.0))
}

/// How much of a block group lies inside a zipcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Containment {
    Partial,
    Full,
}

impl Containment {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > FULL_CONTAINMENT_THRESHOLD {
            Containment::Full
        } else {
            Containment::Partial
        }
    }

    /// Administrative containment: full only when exactly one zipcode is listed.
    pub fn from_listed_zipcodes(count: usize) -> Self {
        if count == 1 {
            Containment::Full
        } else {
            Containment::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Containment::Full => "Full",
            Containment::Partial => "Partial",
        }
    }
}

/// Circle covering a polygon, for radius-based place search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCircle {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    /// Geohash of the center; identifies the cell in logs.
    pub cell: String,
}

/// Centroid plus the farthest exterior vertex, converted from degrees at
/// 111 km per degree and capped at [`MAX_SEARCH_RADIUS_M`].
pub fn enclosing_circle(area: &MultiPolygon<f64>) -> Option<SearchCircle> {
    let center = area.centroid()?;
    let farthest = area
        .0
        .iter()
        .flat_map(|polygon| polygon.exterior().coords())
        .map(|c| ((c.x - center.x()).powi(2) + (c.y - center.y()).powi(2)).sqrt())
        .fold(0.0_f64, f64::max);

    let cell = geohash::encode(
        geohash::Coord {
            x: center.x(),
            y: center.y(),
        },
        SEARCH_CELL_PRECISION,
    )
    .unwrap_or_default();

    Some(SearchCircle {
        latitude: center.y(),
        longitude: center.x(),
        radius_m: (farthest * METERS_PER_DEGREE).min(MAX_SEARCH_RADIUS_M),
        cell,
    })
}

/// Strict interior test; points on the boundary are outside.
pub fn contains_point(area: &MultiPolygon<f64>, latitude: f64, longitude: f64) -> bool {
    area.contains(&Point::new(longitude, latitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: &str = "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))";

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        parse_area(&format!(
            "POLYGON(({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))"
        ))
        .unwrap()
    }

    #[test]
    fn full_overlap_is_one() {
        let bg = parse_area(UNIT).unwrap();
        let zip = square(-1.0, -1.0, 2.0, 2.0);
        assert!((overlap_ratio(&bg, &zip).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn half_overlap_is_half() {
        let bg = parse_area(UNIT).unwrap();
        let zip = square(0.5, -1.0, 2.0, 2.0);
        assert!((overlap_ratio(&bg, &zip).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn disjoint_overlap_is_zero() {
        let bg = parse_area(UNIT).unwrap();
        let zip = square(5.0, 5.0, 6.0, 6.0);
        assert_eq!(overlap_ratio(&bg, &zip).unwrap(), 0.0);
    }

    #[test]
    fn degenerate_block_group_is_rejected() {
        let flat = parse_area("POLYGON((0 0, 1 0, 2 0, 0 0))").unwrap();
        let zip = square(-1.0, -1.0, 2.0, 2.0);
        assert_eq!(overlap_ratio(&flat, &zip), Err(GeometryError::ZeroArea));
    }

    #[test]
    fn containment_threshold_is_strict() {
        assert_eq!(Containment::from_ratio(0.9501), Containment::Full);
        assert_eq!(Containment::from_ratio(0.95), Containment::Partial);
        assert_eq!(Containment::from_ratio(0.0), Containment::Partial);
    }

    #[test]
    fn single_listed_zipcode_is_full() {
        assert_eq!(Containment::from_listed_zipcodes(1), Containment::Full);
        assert_eq!(Containment::from_listed_zipcodes(2), Containment::Partial);
        assert_eq!(Containment::from_listed_zipcodes(0), Containment::Partial);
    }

    #[test]
    fn linestring_is_not_an_area() {
        let err = parse_area("LINESTRING(0 0, 1 1)").unwrap_err();
        assert_eq!(err, GeometryError::NotPolygonal("LINESTRING"));
        assert!(matches!(parse_area("not wkt"), Err(GeometryError::Parse(_))));
    }

    #[test]
    fn enclosing_circle_reaches_the_corners() {
        let circle = enclosing_circle(&parse_area(UNIT).unwrap()).unwrap();
        assert!((circle.latitude - 0.5).abs() < 1e-9);
        assert!((circle.longitude - 0.5).abs() < 1e-9);
        let expected = (0.5_f64.powi(2) * 2.0).sqrt() * METERS_PER_DEGREE;
        assert!((circle.radius_m - expected).abs() < 1e-6);
        assert_eq!(circle.cell.len(), SEARCH_CELL_PRECISION);
    }

    #[test]
    fn enclosing_circle_radius_is_capped() {
        let circle = enclosing_circle(&square(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(circle.radius_m, MAX_SEARCH_RADIUS_M);
    }

    #[test]
    fn point_in_polygon_uses_lat_lon_order() {
        let area = square(-117.2, 32.7, -117.1, 32.8);
        assert!(contains_point(&area, 32.75, -117.15));
        assert!(!contains_point(&area, -117.15, 32.75));
    }

    #[test]
    fn distance_to_point_is_haversine() {
        let shape = Shape::Point(Point::new(0.0, 0.0));
        let km = shape.distance_km(&Point::new(1.0, 0.0));
        assert!((km - 111.19).abs() < 0.5);
    }

    #[test]
    fn distance_inside_area_is_zero() {
        let shape = Shape::Area(parse_area(UNIT).unwrap());
        assert_eq!(shape.distance_km(&Point::new(0.5, 0.5)), 0.0);
    }
}
