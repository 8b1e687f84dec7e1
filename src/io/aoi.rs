//! Area-of-interest readers.
//!
//! Readers return one result per feature so a malformed feature can be
//! skipped without losing the rest of the file. Coordinates are expected in
//! geographic longitude/latitude.

use crate::types::{AoiFeature, BasemapError, BasemapResult};
use geojson::GeoJson;
use std::path::Path;

/// Per-feature results of reading an AOI source, in source order
pub type AoiFeatures = Vec<BasemapResult<AoiFeature>>;

/// Read an AOI file, choosing the reader from the file extension
pub fn read_aoi<P: AsRef<Path>>(path: P) -> BasemapResult<AoiFeatures> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "geojson" | "json" => read_geojson(path),
        #[cfg(feature = "gdal")]
        _ => read_vector(path),
        #[cfg(not(feature = "gdal"))]
        other => Err(BasemapError::InvalidGeometry(format!(
            "Unsupported AOI format '{}' for {} (build with the `gdal` feature for OGR formats)",
            other,
            path.display()
        ))),
    }
}

/// Read a GeoJSON file
pub fn read_geojson<P: AsRef<Path>>(path: P) -> BasemapResult<AoiFeatures> {
    log::info!("Reading AOI file: {}", path.as_ref().display());
    let content = std::fs::read_to_string(&path)?;
    parse_geojson(&content)
}

/// Parse a GeoJSON FeatureCollection, Feature or bare Geometry
pub fn parse_geojson(content: &str) -> BasemapResult<AoiFeatures> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| BasemapError::InvalidGeometry(format!("Invalid GeoJSON: {}", e)))?;

    let geometries: Vec<Option<geojson::Geometry>> = match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .map(|feature| feature.geometry)
            .collect(),
        GeoJson::Feature(feature) => vec![feature.geometry],
        GeoJson::Geometry(geometry) => vec![Some(geometry)],
    };

    let features: AoiFeatures = geometries
        .into_iter()
        .enumerate()
        .map(|(index, geometry)| convert_geometry(index, geometry))
        .collect();

    log::info!("Read {} AOI feature(s)", features.len());
    Ok(features)
}

fn convert_geometry(
    index: usize,
    geometry: Option<geojson::Geometry>,
) -> BasemapResult<AoiFeature> {
    let geometry = geometry.ok_or_else(|| {
        BasemapError::InvalidGeometry(format!("feature {} has no geometry", index))
    })?;
    let geometry = geo_types::Geometry::<f64>::try_from(geometry)
        .map_err(|e| BasemapError::InvalidGeometry(format!("feature {}: {}", index, e)))?;
    Ok(AoiFeature::new(index, geometry))
}

/// Read the first layer of any OGR-supported vector file
#[cfg(feature = "gdal")]
pub fn read_vector<P: AsRef<Path>>(path: P) -> BasemapResult<AoiFeatures> {
    use gdal::vector::LayerAccess;

    log::info!("Reading AOI file with GDAL: {}", path.as_ref().display());
    let dataset = gdal::Dataset::open(path.as_ref())?;
    let mut layer = dataset.layer(0)?;

    if let Some(srs) = layer.spatial_ref() {
        match srs.auth_code() {
            Ok(4326) => {}
            Ok(code) => log::warn!("AOI layer is in EPSG:{}, expected EPSG:4326", code),
            Err(_) => log::warn!("AOI layer CRS has no EPSG code, assuming EPSG:4326"),
        }
    }

    let features: AoiFeatures = layer
        .features()
        .enumerate()
        .map(|(index, feature)| -> BasemapResult<AoiFeature> {
            let geometry = feature.geometry().ok_or_else(|| {
                BasemapError::InvalidGeometry(format!("feature {} has no geometry", index))
            })?;
            Ok(AoiFeature::new(index, geometry.to_geo()?))
        })
        .collect();

    log::info!("Read {} AOI feature(s)", features.len());
    Ok(features)
}
