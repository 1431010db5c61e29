use crate::models::{HistoricalDataset, LiveTotals, PeriodStatistic, TotalStatistics};

/// Pass/fail counts and mean of one contributing row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tally {
    pub passed: i64,
    pub failed: i64,
    pub average: Option<f64>,
}

impl Tally {
    pub fn count(&self) -> i64 {
        self.passed + self.failed
    }
}

impl From<&PeriodStatistic> for Tally {
    fn from(row: &PeriodStatistic) -> Self {
        Tally {
            passed: row.passed,
            failed: row.failed,
            average: Some(row.average),
        }
    }
}

impl From<&HistoricalDataset> for Tally {
    fn from(dataset: &HistoricalDataset) -> Self {
        Tally {
            passed: dataset.passed,
            failed: dataset.failed,
            average: Some(dataset.average),
        }
    }
}

impl From<&LiveTotals> for Tally {
    fn from(totals: &LiveTotals) -> Self {
        Tally {
            passed: totals.passed,
            failed: totals.failed,
            average: totals.average,
        }
    }
}

/// Combined pass/fail counts and count-weighted average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combined {
    pub passed: i64,
    pub failed: i64,
    pub count: i64,
    /// NaN when no row contributed any outcome.
    pub average: f64,
}

impl Combined {
    pub fn into_total(self, median: Option<f64>, stddev: Option<f64>) -> TotalStatistics {
        TotalStatistics {
            average: self.average,
            passed: self.passed,
            failed: self.failed,
            count: self.count,
            median: median.unwrap_or(0.0),
            stddev,
        }
    }
}

pub fn combine<I>(rows: I) -> Combined
where
    I: IntoIterator<Item = Tally>,
{
    let mut passed = 0;
    let mut failed = 0;
    let mut count = 0;
    let mut weighted = 0.0;

    for row in rows {
        passed += row.passed;
        failed += row.failed;
        count += row.count();
        if row.count() > 0 {
            weighted += row.average.unwrap_or(0.0) * row.count() as f64;
        }
    }

    let average = if count == 0 {
        f64::NAN
    } else {
        round2(weighted / count as f64)
    };

    Combined {
        passed,
        failed,
        count,
        average,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
