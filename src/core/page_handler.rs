use crate::core::cancel::CancelFlag;
use crate::core::geometry_filter::{in_range, GeometryFilter};
use crate::io::client::MosaicApi;
use crate::types::{
    ApiKey, BasemapError, BasemapResult, BoundingBox, CatalogPage, DateWindow, MosaicEntry,
    MosaicResult,
};

/// Why an entry did or did not produce a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    NoIntersection,
    OutOfWindow,
    NoQuads,
    NoPermission,
    ProbeFailed,
    GeometryError,
}

/// Evaluates the mosaic entries of one catalog page against an AOI
pub struct PageHandler<'a, A: MosaicApi> {
    api: &'a A,
    key: &'a ApiKey,
    filter: GeometryFilter,
    per_entry_permission: bool,
    cancel: CancelFlag,
}

impl<'a, A: MosaicApi> PageHandler<'a, A> {
    pub fn new(api: &'a A, key: &'a ApiKey, cancel: CancelFlag) -> BasemapResult<Self> {
        Ok(Self {
            api,
            key,
            filter: GeometryFilter::new()?,
            per_entry_permission: false,
            cancel,
        })
    }

    /// Gate every entry on its own download-permission flag
    pub fn with_per_entry_permission(mut self, enabled: bool) -> Self {
        self.per_entry_permission = enabled;
        self
    }

    /// Evaluate every entry of `page` in page order.
    ///
    /// Per-entry failures are logged and skipped. The only error returned is
    /// [`BasemapError::Cancelled`].
    pub fn handle_page(
        &self,
        page: &CatalogPage,
        aoi: &BoundingBox,
        window: &DateWindow,
    ) -> BasemapResult<Vec<MosaicResult>> {
        log::info!("Found {} mosaics on page", page.entries.len());

        let mut rows = Vec::new();
        for entry in &page.entries {
            if self.cancel.is_cancelled() {
                return Err(BasemapError::Cancelled);
            }
            if self.evaluate(entry, aoi, window) == Admission::Admitted {
                rows.push(MosaicResult::from(entry));
            }
        }

        Ok(rows)
    }

    /// Decide admission for a single entry, probing quads when it qualifies
    pub fn evaluate(
        &self,
        entry: &MosaicEntry,
        aoi: &BoundingBox,
        window: &DateWindow,
    ) -> Admission {
        log::debug!("Evaluating mosaic {}", entry.id);

        if self.per_entry_permission && entry.quad_download != Some(true) {
            log::info!("No download permission for: {}", entry.name);
            return Admission::NoPermission;
        }

        let intersects = match self.filter.intersects(aoi, &entry.bbox) {
            Ok(intersects) => intersects,
            Err(e) => {
                log::warn!("Skipping mosaic {}: {}", entry.id, e);
                return Admission::GeometryError;
            }
        };
        let in_window =
            in_range(entry.first_acquired, window) && in_range(entry.last_acquired, window);
        log::debug!(
            "Mosaic {}: intersects={} in_window={} ({}..{})",
            entry.id,
            intersects,
            in_window,
            entry.first_acquired,
            entry.last_acquired
        );

        if !intersects {
            log::info!("Empty bounding box intersection for mosaic {}", entry.id);
            return Admission::NoIntersection;
        }
        if !in_window {
            return Admission::OutOfWindow;
        }

        match self.api.list_quads(self.key, &entry.id, aoi) {
            Ok(listing) if listing.has_items() => {
                log::info!(
                    "Mosaic name: {} resolution: {} id: {}",
                    entry.name,
                    entry.resolution(),
                    entry.id
                );
                Admission::Admitted
            }
            Ok(_) => {
                log::debug!("Mosaic {} has no quads inside {}", entry.id, aoi);
                Admission::NoQuads
            }
            Err(e) => {
                log::warn!("Quad listing failed for mosaic {}: {}", entry.id, e);
                Admission::ProbeFailed
            }
        }
    }
}
