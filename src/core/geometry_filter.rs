//! Spatial and temporal admission tests.
//!
//! Bounding boxes arrive in geographic degrees (EPSG:4326) and are compared in
//! Web Mercator meters (EPSG:3857). Boxes are always reprojected first and
//! intersected second.

use crate::types::{BasemapError, BasemapResult, BoundingBox, DateWindow};
use chrono::NaiveDate;
use geo::{Coord, Intersects, Rect};
use proj4rs::proj::Proj;

/// Geographic source CRS
pub const SOURCE_EPSG: u16 = 4326;

/// Metric comparison CRS
pub const TARGET_EPSG: u16 = 3857;

/// Latitude limit of the Web Mercator square; the projection diverges at the poles
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Reprojects bounding boxes and tests them for intersection
pub struct GeometryFilter {
    source: Proj,
    target: Proj,
}

impl GeometryFilter {
    /// Build the EPSG:4326 -> EPSG:3857 transform
    pub fn new() -> BasemapResult<Self> {
        Ok(Self {
            source: Self::proj_for(SOURCE_EPSG)?,
            target: Self::proj_for(TARGET_EPSG)?,
        })
    }

    fn proj_for(epsg: u16) -> BasemapResult<Proj> {
        let proj_str = crs_definitions::from_code(epsg)
            .map(|def| def.proj4)
            .ok_or_else(|| {
                BasemapError::Projection(format!("EPSG:{} is not in the CRS database", epsg))
            })?;

        Proj::from_proj_string(proj_str).map_err(|e| {
            BasemapError::Projection(format!("Invalid projection EPSG:{}: {:?}", epsg, e))
        })
    }

    /// Project one lon/lat pair into Web Mercator meters.
    ///
    /// Latitudes beyond the Web Mercator limit are clamped to it.
    pub fn project_point(&self, lon: f64, lat: f64) -> BasemapResult<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(BasemapError::Projection(format!(
                "Non-finite coordinate ({}, {})",
                lon, lat
            )));
        }

        let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        // proj4rs takes geographic input in radians
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.source, &self.target, &mut point).map_err(|e| {
            BasemapError::Projection(format!(
                "Transform of ({}, {}) to EPSG:{} failed: {:?}",
                lon, lat, TARGET_EPSG, e
            ))
        })?;

        Ok((point.0, point.1))
    }

    /// Reproject a geographic bounding box into a metric rectangle
    pub fn project_bbox(&self, bbox: &BoundingBox) -> BasemapResult<Rect<f64>> {
        let (min_x, min_y) = self.project_point(bbox.min_lon, bbox.min_lat)?;
        let (max_x, max_y) = self.project_point(bbox.max_lon, bbox.max_lat)?;
        Ok(Rect::new(
            Coord { x: min_x, y: min_y },
            Coord { x: max_x, y: max_y },
        ))
    }

    /// True when the projected boxes share at least one point.
    ///
    /// Boxes that only touch along an edge or corner count as intersecting.
    pub fn intersects(&self, a: &BoundingBox, b: &BoundingBox) -> BasemapResult<bool> {
        let rect_a = self.project_bbox(a)?;
        let rect_b = self.project_bbox(b)?;
        Ok(rect_a.intersects(&rect_b))
    }
}

/// Inclusive date containment
pub fn in_range(date: NaiveDate, window: &DateWindow) -> bool {
    window.contains(date)
}
