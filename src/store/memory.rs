use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{RecordStore, StoreResult};
use crate::combiner::round2;
use crate::config::PASSING_GRADE;
use crate::error::StoreError;
use crate::models::{GradeRecord, HistoricalDataset, LiveTotals, PeriodStatistic};

#[derive(Default)]
struct State {
    grades: Vec<GradeRecord>,
    datasets: Vec<HistoricalDataset>,
    opt_outs: Vec<(String, String)>,
}

/// Record store kept in process memory, computing aggregates the way the
/// Postgres queries do.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    failing_writes: AtomicBool,
    ignore_exclusion: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes every grade insert fail after the rows have been staged.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    /// Returns live rows for periods covered by historical datasets, the
    /// way a store with a broken exclusion query would.
    pub fn set_ignore_exclusion(&self, ignore: bool) {
        self.ignore_exclusion.store(ignore, Ordering::SeqCst);
    }

    pub fn grades(&self) -> Vec<GradeRecord> {
        self.state.lock().grades.clone()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidRecord("insert rejected".to_string()));
        }
        Ok(())
    }

    fn live_grades(&self, module: &str, institution: &str) -> Vec<GradeRecord> {
        let state = self.state.lock();
        let ignore_exclusion = self.ignore_exclusion.load(Ordering::SeqCst);
        let covered: HashSet<&str> = state
            .datasets
            .iter()
            .filter(|d| !ignore_exclusion && d.module == module && d.institution == institution)
            .map(|d| d.period.as_str())
            .collect();
        state
            .grades
            .iter()
            .filter(|g| g.module == module && g.institution == institution)
            .filter(|g| !covered.contains(g.period.as_str()))
            .cloned()
            .collect()
    }
}

fn insert_unique(grades: &mut Vec<GradeRecord>, records: &[GradeRecord]) -> u64 {
    let mut inserted = 0;
    for record in records {
        let duplicate = grades.iter().any(|g| {
            g.identity == record.identity
                && g.module == record.module
                && g.period == record.period
                && g.is_repeat == record.is_repeat
                && g.institution == record.institution
        });
        if !duplicate {
            grades.push(record.clone());
            inserted += 1;
        }
    }
    inserted
}

fn remove_identity(grades: &mut Vec<GradeRecord>, identity: &str, institution: &str) -> u64 {
    let before = grades.len();
    grades.retain(|g| !(g.identity == identity && g.institution == institution));
    (before - grades.len()) as u64
}

fn passed_failed(grades: &[f64]) -> (i64, i64) {
    let passed = grades.iter().filter(|g| **g >= PASSING_GRADE).count() as i64;
    (passed, grades.len() as i64 - passed)
}

fn mean(grades: &[f64]) -> Option<f64> {
    if grades.is_empty() {
        return None;
    }
    Some(grades.iter().sum::<f64>() / grades.len() as f64)
}

fn median(grades: &[f64]) -> Option<f64> {
    if grades.is_empty() {
        return None;
    }
    let mut sorted = grades.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn sample_stddev(grades: &[f64]) -> Option<f64> {
    if grades.len() < 2 {
        return None;
    }
    let mean = mean(grades)?;
    let variance =
        grades.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / (grades.len() - 1) as f64;
    Some(variance.sqrt())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn read_live_period_stats(
        &self,
        module: &str,
        institution: &str,
    ) -> StoreResult<Vec<PeriodStatistic>> {
        self.check_available()?;
        let live = self.live_grades(module, institution);

        let mut periods: Vec<String> = Vec::new();
        for record in &live {
            if !periods.contains(&record.period) {
                periods.push(record.period.clone());
            }
        }

        Ok(periods
            .into_iter()
            .map(|period| {
                let grades: Vec<f64> = live
                    .iter()
                    .filter(|g| g.period == period)
                    .map(|g| g.grade)
                    .collect();
                let (passed, failed) = passed_failed(&grades);
                PeriodStatistic {
                    average: mean(&grades).map(round2).unwrap_or_default(),
                    passed,
                    failed,
                    count: grades.len() as i64,
                    stddev: None,
                    provenance: None,
                    period,
                }
            })
            .collect())
    }

    async fn read_live_totals(&self, module: &str, institution: &str) -> StoreResult<LiveTotals> {
        self.check_available()?;
        let grades: Vec<f64> = self
            .live_grades(module, institution)
            .iter()
            .map(|g| g.grade)
            .collect();
        let (passed, failed) = passed_failed(&grades);
        Ok(LiveTotals {
            average: mean(&grades).map(round2),
            median: median(&grades).map(round2),
            stddev: sample_stddev(&grades).map(round2),
            passed,
            failed,
            count: grades.len() as i64,
        })
    }

    async fn read_historical_datasets(
        &self,
        module: &str,
        institution: &str,
    ) -> StoreResult<Vec<HistoricalDataset>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .datasets
            .iter()
            .filter(|d| d.module == module && d.institution == institution)
            .cloned()
            .collect())
    }

    async fn read_raw_grades(&self, module: &str, institution: &str) -> StoreResult<Vec<f64>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .grades
            .iter()
            .filter(|g| g.module == module && g.institution == institution)
            .map(|g| g.grade)
            .collect())
    }

    async fn insert_grades(&self, records: &[GradeRecord]) -> StoreResult<u64> {
        self.check_available()?;
        let mut state = self.state.lock();
        let mut grades = state.grades.clone();
        let inserted = insert_unique(&mut grades, records);
        self.check_write()?;
        state.grades = grades;
        Ok(inserted)
    }

    async fn delete_identity(&self, identity: &str, institution: &str) -> StoreResult<u64> {
        self.check_available()?;
        let mut state = self.state.lock();
        Ok(remove_identity(&mut state.grades, identity, institution))
    }

    async fn replace_identity(
        &self,
        identity: &str,
        institution: &str,
        records: &[GradeRecord],
    ) -> StoreResult<(u64, u64)> {
        self.check_available()?;
        let mut state = self.state.lock();
        let mut grades = state.grades.clone();
        let deleted = remove_identity(&mut grades, identity, institution);
        let inserted = insert_unique(&mut grades, records);
        self.check_write()?;
        state.grades = grades;
        Ok((deleted, inserted))
    }

    async fn is_opted_in(&self, identity: &str, institution: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .grades
            .iter()
            .any(|g| g.identity == identity && g.institution == institution))
    }

    async fn opt_out_count(&self, identity: &str, institution: &str) -> StoreResult<i64> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .opt_outs
            .iter()
            .filter(|(i, inst)| i == identity && inst == institution)
            .count() as i64)
    }

    async fn record_opt_out(&self, identity: &str, institution: &str) -> StoreResult<()> {
        self.check_available()?;
        self.state
            .lock()
            .opt_outs
            .push((identity.to_string(), institution.to_string()));
        Ok(())
    }

    async fn insert_dataset(&self, dataset: &HistoricalDataset) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.lock();
        let exists = state.datasets.iter().any(|d| {
            d.module == dataset.module
                && d.period == dataset.period
                && d.institution == dataset.institution
        });
        if exists {
            return Ok(false);
        }
        state.datasets.push(dataset.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identity: &str, module: &str, period: &str, grade: f64) -> GradeRecord {
        GradeRecord {
            identity: identity.to_string(),
            module: module.to_string(),
            period: period.to_string(),
            institution: "UZH".to_string(),
            grade,
            is_repeat: false,
        }
    }

    #[tokio::test]
    async fn computes_period_rows_like_the_database() {
        let store = MemoryRecordStore::new();
        store
            .insert_grades(&[
                record("a", "50314925", "HS15", 4.0),
                record("b", "50314925", "HS15", 4.5),
                record("c", "50314925", "HS15", 3.0),
                record("d", "50314925", "HS14", 6.0),
                record("e", "50314922", "HS15", 5.0),
            ])
            .await
            .unwrap();

        let rows = store.read_live_period_stats("50314925", "UZH").await.unwrap();
        let hs15 = rows.iter().find(|r| r.period == "HS15").unwrap();
        assert_eq!(hs15.average, 3.83);
        assert_eq!((hs15.passed, hs15.failed, hs15.count), (2, 1, 3));

        let totals = store.read_live_totals("50314925", "UZH").await.unwrap();
        assert_eq!(totals.count, 4);
        assert_eq!(totals.median, Some(4.25));
    }

    #[tokio::test]
    async fn skips_duplicate_grades() {
        let store = MemoryRecordStore::new();
        let first = store
            .insert_grades(&[record("a", "M", "HS15", 4.0), record("a", "N", "HS15", 4.0)])
            .await
            .unwrap();
        let second = store
            .insert_grades(&[record("a", "M", "HS15", 4.0), record("a", "O", "HS15", 4.0)])
            .await
            .unwrap();
        assert_eq!((first, second), (2, 1));
        assert_eq!(store.grades().len(), 3);
    }

    #[test]
    fn sample_stddev_needs_two_values() {
        assert_eq!(sample_stddev(&[4.0]), None);
        assert_eq!(sample_stddev(&[4.0, 6.0]).map(round2), Some(1.41));
    }
}
