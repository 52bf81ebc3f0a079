use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use geo::{Geometry, GeometryCollection, MultiPolygon, Polygon};
use geojson::GeoJson;
use tracing::{info, instrument, warn};

/// Reads a GeoJSON file and merges every polygon in it into one
/// multi-polygon. GeoJSON coordinates are WGS84 degrees, so nothing is
/// reprojected.
#[instrument]
pub fn load_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read boundary file {}", path.display()))?;
    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("invalid GeoJSON in {}", path.display()))?;
    let collection = GeometryCollection::<f64>::try_from(&geojson)
        .with_context(|| format!("unsupported geometry in {}", path.display()))?;

    let mut polygons = Vec::new();
    for geometry in collection {
        collect_polygons(geometry, &mut polygons);
    }
    if polygons.is_empty() {
        return Err(anyhow!(
            "boundary file {} contains no polygons",
            path.display()
        ));
    }
    info!(polygons = polygons.len(), "loaded boundary");
    Ok(MultiPolygon(polygons))
}

fn collect_polygons(geometry: Geometry<f64>, polygons: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => polygons.push(polygon),
        Geometry::MultiPolygon(multi) => polygons.extend(multi),
        Geometry::Rect(rect) => polygons.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => polygons.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for geometry in collection {
                collect_polygons(geometry, polygons);
            }
        }
        other => warn!(geometry = ?other, "skipping boundary geometry without area"),
    }
}
