//! pbasemap: basemap mosaic discovery
//!
//! Walks a paginated mosaic catalog, admits the mosaics whose footprint
//! intersects an area of interest and whose acquisitions fall inside a date
//! window, and keeps those that actually have quads over the area.

use std::path::Path;

pub mod config;
pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use config::{BasemapConfig, PermissionGate};
pub use self::core::{
    BatchOrchestrator, CancelFlag, CatalogWalker, GeometryFilter, PageHandler, WalkOutcome,
    WalkStatus,
};
pub use io::{MosaicApi, PlanetClient};
pub use types::{
    AoiFeature, ApiKey, AreaOfInterest, BasemapError, BasemapResult, BoundingBox, CatalogPage,
    DateWindow, MosaicEntry, MosaicResult, MosaicTable,
};

/// Find the mosaics available for every feature of an AOI file.
///
/// Unreadable files are an error; unreadable features are skipped.
pub fn get_file_mosaic_metadata<P: AsRef<Path>>(
    path: P,
    window: &DateWindow,
    key: &ApiKey,
    config: &BasemapConfig,
    cancel: CancelFlag,
) -> BasemapResult<MosaicTable> {
    config.validate()?;
    let features = io::read_aoi(path)?;
    let client = PlanetClient::new(&config.api)?;
    let orchestrator = BatchOrchestrator::new(&client, key, config, cancel);
    run_batch(&orchestrator, features, window, config.batch.max_concurrency)
}

#[cfg(feature = "parallel")]
fn run_batch<A: MosaicApi + Sync>(
    orchestrator: &BatchOrchestrator<'_, A>,
    features: io::AoiFeatures,
    window: &DateWindow,
    max_concurrency: usize,
) -> BasemapResult<MosaicTable> {
    if max_concurrency > 1 {
        orchestrator.run_parallel(features, window)
    } else {
        orchestrator.run(features, window)
    }
}

#[cfg(not(feature = "parallel"))]
fn run_batch<A: MosaicApi>(
    orchestrator: &BatchOrchestrator<'_, A>,
    features: io::AoiFeatures,
    window: &DateWindow,
    _max_concurrency: usize,
) -> BasemapResult<MosaicTable> {
    orchestrator.run(features, window)
}

#[cfg(feature = "python")]
mod python {
    use super::*;
    use pyo3::exceptions::{PyKeyboardInterrupt, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    fn to_py_err(e: BasemapError) -> PyErr {
        match e {
            BasemapError::Cancelled => PyKeyboardInterrupt::new_err(e.to_string()),
            BasemapError::InvalidDate(_)
            | BasemapError::Credential(_)
            | BasemapError::Config(_) => PyValueError::new_err(e.to_string()),
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyMosaicResult>()?;
        m.add_function(wrap_pyfunction!(get_file_mosaic_metadata, m)?)?;
        Ok(())
    }

    /// Python wrapper for MosaicResult
    #[pyclass(name = "MosaicResult")]
    struct PyMosaicResult {
        inner: MosaicResult,
    }

    #[pymethods]
    impl PyMosaicResult {
        #[getter]
        fn id(&self) -> String {
            self.inner.id.clone()
        }

        #[getter]
        fn name(&self) -> String {
            self.inner.name.clone()
        }

        #[getter]
        fn first_acquired(&self) -> String {
            self.inner.first_acquired.to_string()
        }

        #[getter]
        fn last_acquired(&self) -> String {
            self.inner.last_acquired.to_string()
        }

        #[getter]
        fn resolution(&self) -> f64 {
            self.inner.resolution
        }

        fn __repr__(&self) -> String {
            format!(
                "MosaicResult(id='{}', name='{}', first_acquired={}, last_acquired={}, resolution={})",
                self.inner.id,
                self.inner.name,
                self.inner.first_acquired,
                self.inner.last_acquired,
                self.inner.resolution
            )
        }
    }

    /// Mosaics with quads over each feature of `path` between `start` and `end` (YYYY-MM-DD)
    #[pyfunction]
    #[pyo3(signature = (path, start, end, api_key = None))]
    fn get_file_mosaic_metadata(
        py: Python<'_>,
        path: String,
        start: String,
        end: String,
        api_key: Option<String>,
    ) -> PyResult<Vec<PyMosaicResult>> {
        let key = match api_key {
            Some(key) => ApiKey::new(key),
            None => ApiKey::from_env(),
        }
        .map_err(to_py_err)?;
        let window = DateWindow::new(
            types::parse_acquisition_date(&start).map_err(to_py_err)?,
            types::parse_acquisition_date(&end).map_err(to_py_err)?,
        );
        let config = BasemapConfig::default();

        let table = py
            .allow_threads(|| {
                super::get_file_mosaic_metadata(&path, &window, &key, &config, CancelFlag::new())
            })
            .map_err(to_py_err)?;

        Ok(table
            .into_rows()
            .into_iter()
            .map(|inner| PyMosaicResult { inner })
            .collect())
    }
}
