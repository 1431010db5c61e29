use std::collections::HashSet;

use tracing::warn;

use crate::models::{HistoricalDataset, PeriodStatistic};
use crate::period::PeriodOrder;

/// Live and historical per-period rows merged into one detail list.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDetails {
    /// Newest period first.
    pub detailed: Vec<PeriodStatistic>,
    /// Live rows kept after removing periods that a historical dataset covers.
    pub live: Vec<PeriodStatistic>,
    /// Periods the store returned live rows for although a historical
    /// dataset covers them. Empty when the store honours its contract.
    pub overlapping: Vec<String>,
}

impl MergedDetails {
    pub fn has_overlap(&self) -> bool {
        !self.overlapping.is_empty()
    }
}

/// Merges live period rows with historical datasets of the same module and
/// institution.
///
/// The store must already exclude historically covered periods from the
/// live rows. That precondition is checked here again: any live row whose
/// period has a historical dataset is dropped in favour of the dataset.
pub fn merge_details(
    live: Vec<PeriodStatistic>,
    historical: &[HistoricalDataset],
    order: &dyn PeriodOrder,
) -> MergedDetails {
    let covered: HashSet<&str> = historical.iter().map(|d| d.period.as_str()).collect();

    let (live, dropped): (Vec<PeriodStatistic>, Vec<PeriodStatistic>) = live
        .into_iter()
        .partition(|row| !covered.contains(row.period.as_str()));

    let overlapping: Vec<String> = dropped.into_iter().map(|row| row.period).collect();
    if !overlapping.is_empty() {
        warn!(
            periods = ?overlapping,
            "live statistics returned for periods covered by historical datasets; using datasets"
        );
    }

    let mut detailed: Vec<PeriodStatistic> = live
        .iter()
        .cloned()
        .chain(historical.iter().map(HistoricalDataset::to_period_statistic))
        .collect();
    sort_newest_first(&mut detailed, order);

    MergedDetails {
        detailed,
        live,
        overlapping,
    }
}

pub fn sort_newest_first(rows: &mut [PeriodStatistic], order: &dyn PeriodOrder) {
    rows.sort_by(|a, b| order.compare(&b.period, &a.period));
}
