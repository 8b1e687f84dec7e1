use chrono::NaiveDate;
use geo::BoundingRect;
use geo_types::Geometry;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Environment variable consulted for the catalog credential
pub const API_KEY_ENV: &str = "PL_API_KEY";

/// Geographic bounding box (WGS84 degrees), always ordered (min_lon, min_lat, max_lon, max_lat)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Bounds as a `[minX, minY, maxX, maxY]` array
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Comma-joined bounds, the form the quad listing endpoint expects
    pub fn to_query_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query_param())
    }
}

/// One feature read from an AOI source, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct AoiFeature {
    pub index: usize,
    pub geometry: Geometry<f64>,
}

impl AoiFeature {
    pub fn new(index: usize, geometry: Geometry<f64>) -> Self {
        Self { index, geometry }
    }
}

/// A validated area of interest with its geographic bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    pub index: usize,
    pub geometry: Geometry<f64>,
    pub bbox: BoundingBox,
}

impl AreaOfInterest {
    /// Compute the bounding box of a feature.
    ///
    /// Fails on empty geometries and on non-finite bounds.
    pub fn from_feature(feature: AoiFeature) -> BasemapResult<Self> {
        let rect = feature.geometry.bounding_rect().ok_or_else(|| {
            BasemapError::InvalidGeometry(format!("feature {} has no coordinates", feature.index))
        })?;
        let bbox = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);
        if !bbox.is_finite() {
            return Err(BasemapError::InvalidGeometry(format!(
                "feature {} has non-finite bounds {}",
                feature.index, bbox
            )));
        }

        Ok(Self {
            index: feature.index,
            geometry: feature.geometry,
            bbox,
        })
    }
}

/// Inclusive calendar date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `start <= end` is the caller's responsibility and is not checked here.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Tiling grid of a mosaic
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MosaicGrid {
    /// Ground resolution in meters per pixel
    pub resolution: f64,
}

/// One record of the mosaic catalog, as served
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MosaicEntry {
    pub id: String,
    pub name: String,
    pub bbox: BoundingBox,
    #[serde(deserialize_with = "deserialize_acquired")]
    pub first_acquired: NaiveDate,
    #[serde(deserialize_with = "deserialize_acquired")]
    pub last_acquired: NaiveDate,
    pub grid: MosaicGrid,
    /// `None` when the catalog omits the field entirely
    #[serde(default)]
    pub quad_download: Option<bool>,
}

impl MosaicEntry {
    pub fn resolution(&self) -> f64 {
        self.grid.resolution
    }
}

fn deserialize_acquired<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_acquisition_date(&raw).map_err(serde::de::Error::custom)
}

/// Parse a calendar date out of a plain date or an RFC 3339 timestamp.
///
/// Time of day is discarded: `2022-02-01T13:45:00Z` yields `2022-02-01`.
pub fn parse_acquisition_date(raw: &str) -> BasemapResult<NaiveDate> {
    let date_part = raw.trim().split('T').next().unwrap_or_default();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| BasemapError::InvalidDate(format!("'{}': {}", raw, e)))
}

/// Where to fetch a catalog page from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLocator {
    /// The catalog listing endpoint itself
    First,
    /// An opaque next-page link handed out by the previous page
    Next(String),
}

impl fmt::Display for PageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLocator::First => write!(f, "<first page>"),
            PageLocator::Next(url) => write!(f, "{}", url),
        }
    }
}

/// One page of the catalog listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPage {
    pub entries: Vec<MosaicEntry>,
    /// Absent on the terminal page
    pub next: Option<String>,
    /// `quad_download` of the first entry as served, before any entry is
    /// dropped for failing to decode. `None` when the page has no entries.
    pub first_entry_permission: Option<Option<bool>>,
}

impl CatalogPage {
    /// Build a page whose first served entry is `entries[0]`
    pub fn new(entries: Vec<MosaicEntry>, next: Option<String>) -> Self {
        let first_entry_permission = entries.first().map(|entry| entry.quad_download);
        Self {
            entries,
            next,
            first_entry_permission,
        }
    }

    pub fn next_locator(&self) -> Option<PageLocator> {
        self.next.clone().map(PageLocator::Next)
    }
}

/// Quad listing response; only the emptiness of `items` matters here
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuadListing {
    pub items: Vec<serde_json::Value>,
}

impl QuadListing {
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}

/// A mosaic admitted for an area of interest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MosaicResult {
    pub id: String,
    pub name: String,
    pub first_acquired: NaiveDate,
    pub last_acquired: NaiveDate,
    pub resolution: f64,
}

impl From<&MosaicEntry> for MosaicResult {
    fn from(entry: &MosaicEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            first_acquired: entry.first_acquired,
            last_acquired: entry.last_acquired,
            resolution: entry.resolution(),
        }
    }
}

/// Append-only result table with a fixed column set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MosaicTable {
    rows: Vec<MosaicResult>,
}

impl MosaicTable {
    pub const COLUMNS: [&'static str; 5] =
        ["id", "name", "first_acquired", "last_acquired", "resolution"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: MosaicResult) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[MosaicResult] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<MosaicResult> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<MosaicResult>> for MosaicTable {
    fn from(rows: Vec<MosaicResult>) -> Self {
        Self { rows }
    }
}

/// Catalog credential, sent as the basic-auth user name
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> BasemapResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(BasemapError::Credential("API key is empty".to_string()));
        }
        Ok(Self(key))
    }

    /// Resolve the key from the `PL_API_KEY` environment variable
    pub fn from_env() -> BasemapResult<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| {
            BasemapError::Credential(format!("{} is not set", API_KEY_ENV))
        })?;
        Self::new(key)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Error types for mosaic discovery
#[derive(Debug, thiserror::Error)]
pub enum BasemapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Cancelled by user")]
    Cancelled,
}

impl From<serde_json::Error> for BasemapError {
    fn from(e: serde_json::Error) -> Self {
        BasemapError::Decode(e.to_string())
    }
}

/// Result type for mosaic discovery operations
pub type BasemapResult<T> = Result<T, BasemapError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_window_is_inclusive() {
        let window = DateWindow::new(date(2022, 1, 1), date(2022, 3, 1));
        assert!(window.contains(date(2022, 1, 1)));
        assert!(window.contains(date(2022, 3, 1)));
        assert!(window.contains(date(2022, 2, 15)));
        assert!(!window.contains(date(2021, 12, 31)));
        assert!(!window.contains(date(2022, 3, 2)));
    }

    #[test]
    fn test_acquisition_date_drops_time_of_day() {
        assert_eq!(
            parse_acquisition_date("2022-02-01T23:59:59.000Z").unwrap(),
            date(2022, 2, 1)
        );
        assert_eq!(parse_acquisition_date("2022-02-15").unwrap(), date(2022, 2, 15));
        assert!(matches!(
            parse_acquisition_date("02/15/2022"),
            Err(BasemapError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_mosaic_entry_decoding() {
        let json = serde_json::json!({
            "id": "abc-123",
            "name": "global_monthly_2022_02_mosaic",
            "bbox": [-180.0, -85.0511, 180.0, 85.0511],
            "first_acquired": "2022-02-01T00:00:00.000Z",
            "last_acquired": "2022-03-01T00:00:00.000Z",
            "grid": { "quad_size": 4096, "resolution": 4.77 },
            "quad_download": true,
            "product_type": "timelapse"
        });

        let entry: MosaicEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.id, "abc-123");
        assert_eq!(entry.bbox, BoundingBox::new(-180.0, -85.0511, 180.0, 85.0511));
        assert_eq!(entry.first_acquired, date(2022, 2, 1));
        assert_eq!(entry.last_acquired, date(2022, 3, 1));
        assert_eq!(entry.resolution(), 4.77);
        assert_eq!(entry.quad_download, Some(true));
    }

    #[test]
    fn test_missing_permission_is_none() {
        let json = serde_json::json!({
            "id": "x",
            "name": "x",
            "bbox": [0.0, 0.0, 1.0, 1.0],
            "first_acquired": "2022-02-01",
            "last_acquired": "2022-02-02",
            "grid": { "resolution": 4.77 }
        });
        let entry: MosaicEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.quad_download, None);
    }

    #[test]
    fn test_api_key_rejects_blank_and_hides_secret() {
        assert!(matches!(ApiKey::new("   "), Err(BasemapError::Credential(_))));
        let key = ApiKey::new("super-secret").unwrap();
        assert_eq!(key.secret(), "super-secret");
        assert!(!format!("{:?}", key).contains("super-secret"));
    }

    #[test]
    fn test_area_of_interest_bounds() {
        use geo_types::{polygon, MultiPolygon};

        let poly = polygon![
            (x: 10.0, y: 45.0),
            (x: 10.5, y: 45.0),
            (x: 10.5, y: 45.5),
            (x: 10.0, y: 45.2),
            (x: 10.0, y: 45.0),
        ];
        let aoi = AreaOfInterest::from_feature(AoiFeature::new(0, poly.into())).unwrap();
        assert_eq!(aoi.bbox, BoundingBox::new(10.0, 45.0, 10.5, 45.5));

        let empty = AoiFeature::new(1, MultiPolygon::<f64>::new(vec![]).into());
        assert!(matches!(
            AreaOfInterest::from_feature(empty),
            Err(BasemapError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_bbox_query_param_order() {
        let bbox = BoundingBox::new(10.0, 45.0, 10.5, 45.5);
        assert_eq!(bbox.to_query_param(), "10,45,10.5,45.5");
        assert_eq!(bbox.to_array(), [10.0, 45.0, 10.5, 45.5]);
    }
}
