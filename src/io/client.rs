use crate::config::ApiSettings;
use crate::types::{
    ApiKey, BasemapError, BasemapResult, BoundingBox, CatalogPage, MosaicEntry, PageLocator,
    QuadListing,
};
use serde::Deserialize;

/// Remote mosaic catalog operations the discovery pipeline depends on
pub trait MosaicApi {
    /// Fetch one page of the mosaic listing
    fn fetch_catalog_page(
        &self,
        key: &ApiKey,
        locator: &PageLocator,
    ) -> BasemapResult<CatalogPage>;

    /// List the quads of `mosaic_id` that fall inside `bbox`
    fn list_quads(
        &self,
        key: &ApiKey,
        mosaic_id: &str,
        bbox: &BoundingBox,
    ) -> BasemapResult<QuadListing>;
}

impl<T: MosaicApi + ?Sized> MosaicApi for &T {
    fn fetch_catalog_page(
        &self,
        key: &ApiKey,
        locator: &PageLocator,
    ) -> BasemapResult<CatalogPage> {
        (**self).fetch_catalog_page(key, locator)
    }

    fn list_quads(
        &self,
        key: &ApiKey,
        mosaic_id: &str,
        bbox: &BoundingBox,
    ) -> BasemapResult<QuadListing> {
        (**self).list_quads(key, mosaic_id, bbox)
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalogPage {
    mosaics: Vec<serde_json::Value>,
    #[serde(default, rename = "_links")]
    links: RawLinks,
}

#[derive(Debug, Default, Deserialize)]
struct RawLinks {
    #[serde(default, rename = "_next")]
    next: Option<String>,
}

/// Decode a catalog listing body.
///
/// Entries are decoded one at a time; an entry missing required fields is
/// logged and dropped without failing the page.
pub fn decode_catalog_page(body: &str) -> BasemapResult<CatalogPage> {
    let raw: RawCatalogPage = serde_json::from_str(body)
        .map_err(|e| BasemapError::Decode(format!("catalog page: {}", e)))?;

    let first_entry_permission = raw
        .mosaics
        .first()
        .map(|value| value.get("quad_download").and_then(|v| v.as_bool()));

    let mut entries = Vec::with_capacity(raw.mosaics.len());
    for (i, value) in raw.mosaics.into_iter().enumerate() {
        let label = value
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", i));
        match serde_json::from_value::<MosaicEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("Skipping undecodable mosaic entry {}: {}", label, e),
        }
    }

    let next = raw.links.next.filter(|url| !url.trim().is_empty());
    Ok(CatalogPage {
        entries,
        next,
        first_entry_permission,
    })
}

/// Blocking HTTP client for the basemaps API
pub struct PlanetClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl PlanetClient {
    pub fn new(settings: &ApiSettings) -> BasemapResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Catalog listing endpoint
    pub fn catalog_url(&self) -> String {
        format!("{}/mosaics", self.base_url)
    }

    /// Quad listing endpoint of one mosaic
    pub fn quads_url(&self, mosaic_id: &str) -> String {
        format!("{}/mosaics/{}/quads", self.base_url, mosaic_id)
    }

    fn get_text(&self, key: &ApiKey, url: &str, query: &[(&str, String)]) -> BasemapResult<String> {
        log::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .basic_auth(key.secret(), Some(""))
            .query(query)
            .send()?;

        if !response.status().is_success() {
            return Err(BasemapError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.text()?)
    }
}

impl MosaicApi for PlanetClient {
    fn fetch_catalog_page(
        &self,
        key: &ApiKey,
        locator: &PageLocator,
    ) -> BasemapResult<CatalogPage> {
        let url = match locator {
            PageLocator::First => self.catalog_url(),
            PageLocator::Next(url) => url.clone(),
        };
        let body = self.get_text(key, &url, &[])?;
        decode_catalog_page(&body)
    }

    fn list_quads(
        &self,
        key: &ApiKey,
        mosaic_id: &str,
        bbox: &BoundingBox,
    ) -> BasemapResult<QuadListing> {
        let url = self.quads_url(mosaic_id);
        let body = self.get_text(key, &url, &[("bbox", bbox.to_query_param())])?;
        serde_json::from_str(&body)
            .map_err(|e| BasemapError::Decode(format!("quad listing for {}: {}", mosaic_id, e)))
    }
}
