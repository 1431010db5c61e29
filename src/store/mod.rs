use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{GradeRecord, HistoricalDataset, LiveTotals, PeriodStatistic};

#[cfg(test)]
pub mod memory;

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage of grade records, historical datasets and opt-outs.
///
/// Live reads (`read_live_period_stats`, `read_live_totals`) must leave out
/// every period for which a historical dataset of the same module and
/// institution exists. Rounded values use two decimals; a grade of at least
/// `PASSING_GRADE` counts as passed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_live_period_stats(
        &self,
        module: &str,
        institution: &str,
    ) -> StoreResult<Vec<PeriodStatistic>>;

    async fn read_live_totals(&self, module: &str, institution: &str) -> StoreResult<LiveTotals>;

    async fn read_historical_datasets(
        &self,
        module: &str,
        institution: &str,
    ) -> StoreResult<Vec<HistoricalDataset>>;

    async fn read_raw_grades(&self, module: &str, institution: &str) -> StoreResult<Vec<f64>>;

    /// Inserts records, silently skipping duplicates of
    /// (identity, module, period, is_repeat, institution). Returns the number
    /// of rows written.
    async fn insert_grades(&self, records: &[GradeRecord]) -> StoreResult<u64>;

    async fn delete_identity(&self, identity: &str, institution: &str) -> StoreResult<u64>;

    /// Deletes every record of `identity` at `institution` and inserts
    /// `records` as one atomic write; on failure the old records remain.
    /// Returns (deleted, inserted).
    async fn replace_identity(
        &self,
        identity: &str,
        institution: &str,
        records: &[GradeRecord],
    ) -> StoreResult<(u64, u64)>;

    async fn is_opted_in(&self, identity: &str, institution: &str) -> StoreResult<bool>;

    async fn opt_out_count(&self, identity: &str, institution: &str) -> StoreResult<i64>;

    async fn record_opt_out(&self, identity: &str, institution: &str) -> StoreResult<()>;

    /// Returns `false` when a dataset for the same (module, period,
    /// institution) already exists.
    async fn insert_dataset(&self, dataset: &HistoricalDataset) -> StoreResult<bool>;
}
