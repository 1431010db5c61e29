use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::combiner::{combine, Tally};
use crate::error::EngineError;
use crate::histogram::build_histogram;
use crate::merger::merge_details;
use crate::models::{ModuleStatistics, StatsKey};
use crate::period::PeriodOrder;
use crate::store::RecordStore;

type FlightResult = Result<Arc<ModuleStatistics>, EngineError>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;
type Registry = Arc<Mutex<HashMap<StatsKey, Flight>>>;

/// Entry point for module statistics.
///
/// Concurrent requests for the same (module, institution) share a single
/// computation. Nothing is cached once that computation has finished.
pub struct AggregationCoordinator {
    store: Arc<dyn RecordStore>,
    order: Arc<dyn PeriodOrder>,
    in_flight: Registry,
}

impl AggregationCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, order: Arc<dyn PeriodOrder>) -> Self {
        Self {
            store,
            order,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys currently being computed.
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Must be called from within a tokio runtime.
    pub async fn get_statistics(
        &self,
        module: &str,
        institution: &str,
    ) -> Result<ModuleStatistics, EngineError> {
        let key = StatsKey::new(module, institution);

        let flight = {
            let mut in_flight = self.in_flight.lock();
            if let Some(flight) = in_flight.get(&key).cloned() {
                debug!(%key, "joining in-flight aggregation");
                flight
            } else {
                let flight = self.launch(key.clone());
                in_flight.insert(key, flight.clone());
                flight
            }
        };

        flight.await.map(|stats| stats.as_ref().clone())
    }

    /// Builds the shared flight for `key`. The computation is spawned on the
    /// first poll, so it runs to completion even if every waiter goes away.
    fn launch(&self, key: StatsKey) -> Flight {
        let store = Arc::clone(&self.store);
        let order = Arc::clone(&self.order);
        let registry = Arc::clone(&self.in_flight);

        async move {
            let label = key.to_string();
            let deregister = Deregister {
                registry,
                key: key.clone(),
            };
            let task = tokio::spawn(async move {
                let _deregister = deregister;
                compute_statistics(store.as_ref(), order.as_ref(), &key)
                    .await
                    .map(Arc::new)
            });

            task.await.unwrap_or_else(|err| {
                Err(EngineError::Aborted {
                    key: label,
                    reason: err.to_string(),
                })
            })
        }
        .boxed()
        .shared()
    }
}

/// Removes a key from the registry when its computation ends, including by
/// panic, so the next request starts fresh.
struct Deregister {
    registry: Registry,
    key: StatsKey,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

/// Reads everything needed for one key and assembles the statistics.
pub async fn compute_statistics(
    store: &dyn RecordStore,
    order: &dyn PeriodOrder,
    key: &StatsKey,
) -> Result<ModuleStatistics, EngineError> {
    let (module, institution) = (key.module.as_str(), key.institution.as_str());

    let (historical, live_periods, live_totals, grades) = tokio::try_join!(
        store.read_historical_datasets(module, institution),
        store.read_live_period_stats(module, institution),
        store.read_live_totals(module, institution),
        store.read_raw_grades(module, institution),
    )
    .map_err(|err| {
        warn!(%key, error = %err, "record store read failed");
        EngineError::from(err)
    })?;

    let merged = merge_details(live_periods, &historical, order);

    let historical_tallies = historical.iter().map(Tally::from);
    let (combined, median, stddev) = if merged.has_overlap() {
        // The store's totals cover the overlapping periods too; rebuild the
        // counts from the filtered period rows. Median and deviation cannot
        // be rebuilt without per-period raw grades, so they are left unset.
        warn!(
            %key,
            periods = ?merged.overlapping,
            "median and standard deviation unavailable for overlapping live periods"
        );
        let combined = combine(historical_tallies.chain(merged.live.iter().map(Tally::from)));
        (combined, None, None)
    } else {
        let combined = combine(historical_tallies.chain(std::iter::once(Tally::from(&live_totals))));
        (combined, live_totals.median, live_totals.stddev)
    };

    let distribution = build_histogram(&grades);

    info!(
        %key,
        periods = merged.detailed.len(),
        historical = historical.len(),
        count = combined.count,
        "computed module statistics"
    );

    Ok(ModuleStatistics {
        total: combined.into_total(median, stddev),
        detailed: merged.detailed,
        distribution,
    })
}
