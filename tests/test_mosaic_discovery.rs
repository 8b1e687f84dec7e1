use chrono::NaiveDate;
use pbasemap::config::FilterSettings;
use pbasemap::types::{MosaicGrid, PageLocator, QuadListing};
use pbasemap::{
    ApiKey, BasemapError, BasemapResult, BoundingBox, CancelFlag, CatalogPage, CatalogWalker,
    DateWindow, MosaicApi, MosaicEntry, WalkStatus,
};
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory catalog: pages keyed by locator, quad counts keyed by mosaic id
#[derive(Default)]
struct FakeCatalog {
    pages: HashMap<String, CatalogPage>,
    quads: HashMap<String, usize>,
    page_requests: RefCell<Vec<String>>,
    quad_requests: RefCell<Vec<(String, String)>>,
}

impl FakeCatalog {
    fn locator_key(locator: &PageLocator) -> String {
        match locator {
            PageLocator::First => "first".to_string(),
            PageLocator::Next(url) => url.clone(),
        }
    }

    fn with_page(mut self, key: &str, page: CatalogPage) -> Self {
        self.pages.insert(key.to_string(), page);
        self
    }

    fn with_quads(mut self, id: &str, count: usize) -> Self {
        self.quads.insert(id.to_string(), count);
        self
    }
}

impl MosaicApi for FakeCatalog {
    fn fetch_catalog_page(
        &self,
        key: &ApiKey,
        locator: &PageLocator,
    ) -> BasemapResult<CatalogPage> {
        assert_eq!(key.secret(), "integration-key");
        let page_key = Self::locator_key(locator);
        self.page_requests.borrow_mut().push(page_key.clone());
        self.pages.get(&page_key).cloned().ok_or(BasemapError::Status {
            url: page_key,
            status: 500,
        })
    }

    fn list_quads(
        &self,
        key: &ApiKey,
        mosaic_id: &str,
        bbox: &BoundingBox,
    ) -> BasemapResult<QuadListing> {
        assert_eq!(key.secret(), "integration-key");
        self.quad_requests
            .borrow_mut()
            .push((mosaic_id.to_string(), bbox.to_query_param()));
        let count = self.quads.get(mosaic_id).copied().unwrap_or(0);
        Ok(QuadListing {
            items: (0..count)
                .map(|i| serde_json::json!({ "id": format!("{}-quad-{}", mosaic_id, i) }))
                .collect(),
        })
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn mosaic(id: &str, bbox: [f64; 4], first: &str, last: &str) -> MosaicEntry {
    MosaicEntry {
        id: id.to_string(),
        name: format!("global_monthly_{}", id),
        bbox: bbox.into(),
        first_acquired: date(first),
        last_acquired: date(last),
        grid: MosaicGrid { resolution: 4.777 },
        quad_download: Some(true),
    }
}

fn aoi() -> BoundingBox {
    BoundingBox::new(10.0, 45.0, 10.5, 45.5)
}

fn window() -> DateWindow {
    DateWindow::new(date("2022-01-01"), date("2022-03-01"))
}

fn walk(catalog: &FakeCatalog) -> pbasemap::WalkOutcome {
    let _ = env_logger::builder().is_test(true).try_init();
    let key = ApiKey::new("integration-key").unwrap();
    let walker = CatalogWalker::new(catalog, &key, &FilterSettings::default(), CancelFlag::new())
        .expect("Failed to create walker");
    walker.walk(&aoi(), &window()).expect("Walk failed")
}

#[test]
fn test_single_mosaic_with_quads_is_admitted() {
    let catalog = FakeCatalog::default()
        .with_page(
            "first",
            CatalogPage::new(
                vec![mosaic("feb", [9.0, 44.0, 11.0, 46.0], "2022-02-01", "2022-02-15")],
                None,
            ),
        )
        .with_quads("feb", 1);

    let outcome = walk(&catalog);
    println!("Walk outcome: {:?}", outcome);

    assert_eq!(outcome.status, WalkStatus::Exhausted);
    assert_eq!(outcome.rows.len(), 1);
    let row = &outcome.rows[0];
    assert_eq!(row.id, "feb");
    assert_eq!(row.name, "global_monthly_feb");
    assert_eq!(row.first_acquired, date("2022-02-01"));
    assert_eq!(row.last_acquired, date("2022-02-15"));
    assert_eq!(row.resolution, 4.777);

    // The probe is scoped to the AOI box, not the mosaic box
    assert_eq!(
        *catalog.quad_requests.borrow(),
        vec![("feb".to_string(), "10,45,10.5,45.5".to_string())]
    );
}

#[test]
fn test_mosaic_without_quads_is_not_admitted() {
    let catalog = FakeCatalog::default().with_page(
        "first",
        CatalogPage::new(
            vec![mosaic("feb", [9.0, 44.0, 11.0, 46.0], "2022-02-01", "2022-02-15")],
            None,
        ),
    );

    let outcome = walk(&catalog);
    assert!(outcome.rows.is_empty());
    assert_eq!(catalog.quad_requests.borrow().len(), 1);
}

#[test]
fn test_mosaic_outside_window_is_never_probed() {
    let catalog = FakeCatalog::default()
        .with_page(
            "first",
            CatalogPage::new(
                vec![mosaic("dec", [9.0, 44.0, 11.0, 46.0], "2021-12-01", "2021-12-31")],
                None,
            ),
        )
        .with_quads("dec", 5);

    let outcome = walk(&catalog);
    assert!(outcome.rows.is_empty());
    assert!(catalog.quad_requests.borrow().is_empty());
}

#[test]
fn test_non_intersecting_mosaics_never_produce_rows() {
    let far_away = [
        [100.0, -10.0, 101.0, -9.0],
        [-75.0, 40.0, -73.0, 41.0],
        [10.6, 45.0, 11.0, 45.5],
        [10.0, 45.6, 10.5, 46.0],
    ];
    let entries: Vec<_> = far_away
        .iter()
        .enumerate()
        .map(|(i, bbox)| mosaic(&format!("far{}", i), *bbox, "2022-02-01", "2022-02-15"))
        .collect();
    let mut catalog = FakeCatalog::default().with_page("first", CatalogPage::new(entries, None));
    for i in 0..far_away.len() {
        catalog = catalog.with_quads(&format!("far{}", i), 10);
    }

    let outcome = walk(&catalog);
    assert!(outcome.rows.is_empty());
    assert!(catalog.quad_requests.borrow().is_empty());
}

#[test]
fn test_pagination_performs_exactly_n_fetches() {
    let catalog = FakeCatalog::default()
        .with_page(
            "first",
            CatalogPage::new(
                vec![mosaic("jan", [9.0, 44.0, 11.0, 46.0], "2022-01-01", "2022-01-31")],
                Some("page-2".to_string()),
            ),
        )
        .with_page(
            "page-2",
            CatalogPage::new(
                vec![mosaic("feb", [9.0, 44.0, 11.0, 46.0], "2022-02-01", "2022-02-28")],
                Some("page-3".to_string()),
            ),
        )
        .with_page(
            "page-3",
            CatalogPage::new(
                vec![mosaic("mar", [9.0, 44.0, 11.0, 46.0], "2022-03-01", "2022-03-31")],
                None,
            ),
        )
        .with_quads("jan", 2)
        .with_quads("feb", 2)
        .with_quads("mar", 2);

    let outcome = walk(&catalog);
    assert!(outcome.is_exhausted());
    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(*catalog.page_requests.borrow(), vec!["first", "page-2", "page-3"]);

    // "mar" ends after the window and is rejected
    let ids: Vec<_> = outcome.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["jan", "feb"]);
}

#[test]
fn test_failed_later_page_returns_partial_rows() {
    let catalog = FakeCatalog::default()
        .with_page(
            "first",
            CatalogPage::new(
                vec![mosaic("jan", [9.0, 44.0, 11.0, 46.0], "2022-01-01", "2022-01-31")],
                Some("missing-page".to_string()),
            ),
        )
        .with_quads("jan", 1);

    let outcome = walk(&catalog);
    assert!(matches!(outcome.status, WalkStatus::Truncated { .. }));
    assert_eq!(outcome.rows.len(), 1);
}

#[test]
fn test_identical_inputs_give_identical_tables() {
    let build = || {
        FakeCatalog::default()
            .with_page(
                "first",
                CatalogPage::new(
                    vec![
                        mosaic("a", [9.0, 44.0, 11.0, 46.0], "2022-01-05", "2022-01-20"),
                        mosaic("b", [9.0, 44.0, 11.0, 46.0], "2022-02-05", "2022-02-20"),
                    ],
                    Some("p2".to_string()),
                ),
            )
            .with_page(
                "p2",
                CatalogPage::new(
                    vec![mosaic("c", [9.0, 44.0, 11.0, 46.0], "2022-01-10", "2022-02-10")],
                    None,
                ),
            )
            .with_quads("a", 1)
            .with_quads("c", 1)
    };

    let first = walk(&build());
    let second = walk(&build());
    assert_eq!(first, second);
    let ids: Vec<_> = first.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}
