//! Paginated walk over the mosaic catalog.
//!
//! ```text
//! Start -> FetchingPage -(next link)-> FetchingPage -(no next link)-> Exhausted
//!                       \-(fetch error)-> Truncated   \-(interrupt)-> Cancelled
//! ```
//!
//! A failure on the first page is returned as an error; later failures keep
//! whatever rows were already collected.

use crate::config::{FilterSettings, PermissionGate};
use crate::core::cancel::CancelFlag;
use crate::core::page_handler::PageHandler;
use crate::io::client::MosaicApi;
use crate::types::{
    ApiKey, BasemapError, BasemapResult, BoundingBox, CatalogPage, DateWindow, MosaicResult,
    PageLocator,
};
use std::collections::HashSet;

/// How a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkStatus {
    /// The last page carried no next link
    Exhausted,
    /// A later page failed or pagination looped; rows so far are kept
    Truncated { reason: String },
    /// User interrupt
    Cancelled,
}

/// Rows collected by a walk, in page-arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome {
    pub rows: Vec<MosaicResult>,
    pub pages_fetched: usize,
    pub status: WalkStatus,
}

impl WalkOutcome {
    pub fn is_exhausted(&self) -> bool {
        self.status == WalkStatus::Exhausted
    }
}

/// Drives catalog pagination for one area of interest
pub struct CatalogWalker<'a, A: MosaicApi> {
    api: &'a A,
    key: &'a ApiKey,
    handler: PageHandler<'a, A>,
    gate: PermissionGate,
    cancel: CancelFlag,
}

impl<'a, A: MosaicApi> CatalogWalker<'a, A> {
    pub fn new(
        api: &'a A,
        key: &'a ApiKey,
        settings: &FilterSettings,
        cancel: CancelFlag,
    ) -> BasemapResult<Self> {
        let handler = PageHandler::new(api, key, cancel.clone())?
            .with_per_entry_permission(settings.permission_gate == PermissionGate::PerEntry);

        Ok(Self {
            api,
            key,
            handler,
            gate: settings.permission_gate,
            cancel,
        })
    }

    /// Walk every catalog page, admitting mosaics for `aoi` within `window`
    pub fn walk(&self, aoi: &BoundingBox, window: &DateWindow) -> BasemapResult<WalkOutcome> {
        let mut rows = Vec::new();
        let mut pages_fetched = 0;
        let mut locator = PageLocator::First;
        let mut visited = HashSet::new();

        let status = loop {
            if self.cancel.is_cancelled() {
                break WalkStatus::Cancelled;
            }

            let page = match self.api.fetch_catalog_page(self.key, &locator) {
                Ok(page) => page,
                Err(e) if pages_fetched == 0 => return Err(e),
                Err(e) => {
                    log::warn!("Stopping pagination at {}: {}", locator, e);
                    break WalkStatus::Truncated {
                        reason: e.to_string(),
                    };
                }
            };
            pages_fetched += 1;
            log::debug!("Fetched catalog page {} ({})", pages_fetched, locator);

            if self.page_admissible(&page, &locator) {
                match self.handler.handle_page(&page, aoi, window) {
                    Ok(page_rows) => rows.extend(page_rows),
                    Err(BasemapError::Cancelled) => break WalkStatus::Cancelled,
                    Err(e) => {
                        break WalkStatus::Truncated {
                            reason: e.to_string(),
                        }
                    }
                }
            }

            match page.next {
                Some(next) if !visited.insert(next.clone()) => {
                    log::warn!("Next-page link revisits an earlier page: {}", next);
                    break WalkStatus::Truncated {
                        reason: format!("pagination loop at {}", next),
                    };
                }
                Some(next) => locator = PageLocator::Next(next),
                None => break WalkStatus::Exhausted,
            }
        };

        log::info!(
            "Catalog walk for {} finished after {} page(s) with {} admitted mosaic(s): {:?}",
            aoi,
            pages_fetched,
            rows.len(),
            status
        );

        Ok(WalkOutcome {
            rows,
            pages_fetched,
            status,
        })
    }

    /// Page-level permission gate.
    ///
    /// Only the flag of the first entry the catalog served is inspected, even
    /// when that entry itself failed to decode. An explicit `false` is
    /// advisory and the page is still evaluated; an absent flag skips the page.
    fn page_admissible(&self, page: &CatalogPage, locator: &PageLocator) -> bool {
        if self.gate == PermissionGate::PerEntry {
            return true;
        }

        match page.first_entry_permission {
            None => {
                log::debug!("Catalog page has no mosaics");
                false
            }
            Some(Some(true)) => true,
            Some(Some(false)) => {
                log::info!("Download permission flag is false on page {}", locator);
                true
            }
            Some(None) => {
                log::warn!("No download permission for page {}", locator);
                false
            }
        }
    }
}
