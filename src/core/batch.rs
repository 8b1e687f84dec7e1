use crate::config::BasemapConfig;
use crate::core::cancel::CancelFlag;
use crate::core::catalog_walker::{CatalogWalker, WalkStatus};
use crate::io::client::MosaicApi;
use crate::types::{
    AoiFeature, ApiKey, AreaOfInterest, BasemapError, BasemapResult, DateWindow, MosaicResult,
    MosaicTable,
};

/// Per-run counters, logged when the batch finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub features: usize,
    pub failed: usize,
    pub truncated: usize,
    pub rows: usize,
}

/// Runs the catalog walk for every AOI feature and unions the rows
pub struct BatchOrchestrator<'a, A: MosaicApi> {
    api: &'a A,
    key: &'a ApiKey,
    config: &'a BasemapConfig,
    cancel: CancelFlag,
}

enum FeatureOutcome {
    Rows(Vec<MosaicResult>),
    Truncated(Vec<MosaicResult>),
}

impl<'a, A: MosaicApi> BatchOrchestrator<'a, A> {
    pub fn new(api: &'a A, key: &'a ApiKey, config: &'a BasemapConfig, cancel: CancelFlag) -> Self {
        Self {
            api,
            key,
            config,
            cancel,
        }
    }

    /// Process features one at a time in source order.
    ///
    /// A failing feature is logged and skipped. Cancellation aborts the whole
    /// batch with [`BasemapError::Cancelled`].
    pub fn run<I>(&self, features: I, window: &DateWindow) -> BasemapResult<MosaicTable>
    where
        I: IntoIterator<Item = BasemapResult<AoiFeature>>,
    {
        let mut results = Vec::new();
        for feature in features {
            let result = self.process_feature(feature, window);
            let cancelled = matches!(result, Err(BasemapError::Cancelled));
            results.push(result);
            if cancelled {
                break;
            }
        }
        self.collect(results)
    }

    fn process_feature(
        &self,
        feature: BasemapResult<AoiFeature>,
        window: &DateWindow,
    ) -> BasemapResult<FeatureOutcome> {
        if self.cancel.is_cancelled() {
            return Err(BasemapError::Cancelled);
        }

        let aoi = AreaOfInterest::from_feature(feature?)?;
        log::info!("AOI feature {} rbox: {}", aoi.index, aoi.bbox);

        let walker = CatalogWalker::new(
            self.api,
            self.key,
            &self.config.filter,
            self.cancel.clone(),
        )?;
        let outcome = walker.walk(&aoi.bbox, window)?;

        match outcome.status {
            WalkStatus::Exhausted => Ok(FeatureOutcome::Rows(outcome.rows)),
            WalkStatus::Truncated { reason } => {
                log::warn!(
                    "AOI feature {}: catalog walk stopped early ({}), keeping {} row(s)",
                    aoi.index,
                    reason,
                    outcome.rows.len()
                );
                Ok(FeatureOutcome::Truncated(outcome.rows))
            }
            WalkStatus::Cancelled => Err(BasemapError::Cancelled),
        }
    }

    /// Fold per-feature results, in feature order, into one table
    fn collect(&self, results: Vec<BasemapResult<FeatureOutcome>>) -> BasemapResult<MosaicTable> {
        let mut rows = Vec::new();
        let mut summary = BatchSummary::default();

        for (i, result) in results.into_iter().enumerate() {
            summary.features += 1;
            match result {
                Ok(FeatureOutcome::Rows(feature_rows)) => rows.extend(feature_rows),
                Ok(FeatureOutcome::Truncated(feature_rows)) => {
                    summary.truncated += 1;
                    rows.extend(feature_rows);
                }
                Err(BasemapError::Cancelled) => {
                    log::warn!("Program escaped by user after {} feature(s)", i);
                    return Err(BasemapError::Cancelled);
                }
                Err(e) => {
                    summary.failed += 1;
                    log::warn!("Skipping AOI feature {}: {}", i, e);
                }
            }
        }

        summary.rows = rows.len();
        log::info!(
            "Processed {} AOI feature(s): {} failed, {} truncated, {} row(s)",
            summary.features,
            summary.failed,
            summary.truncated,
            summary.rows
        );
        Ok(MosaicTable::from(rows))
    }
}

#[cfg(feature = "parallel")]
impl<'a, A: MosaicApi + Sync> BatchOrchestrator<'a, A> {
    /// Walk up to `batch.max_concurrency` features at once.
    ///
    /// Rows come back in the same order as [`BatchOrchestrator::run`].
    pub fn run_parallel<I>(&self, features: I, window: &DateWindow) -> BasemapResult<MosaicTable>
    where
        I: IntoIterator<Item = BasemapResult<AoiFeature>>,
    {
        use rayon::prelude::*;

        let features: Vec<_> = features.into_iter().collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.batch.max_concurrency.max(1))
            .build()
            .map_err(|e| BasemapError::Config(format!("Failed to build worker pool: {}", e)))?;

        log::info!(
            "Walking {} AOI feature(s) with up to {} worker(s)",
            features.len(),
            self.config.batch.max_concurrency
        );

        let results: Vec<_> = pool.install(|| {
            features
                .into_par_iter()
                .map(|feature| self.process_feature(feature, window))
                .collect()
        });
        self.collect(results)
    }
}
