use serde::{Deserialize, Serialize};

/// One exam outcome as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub identity: String,
    pub module: String,
    pub period: String,
    pub institution: String,
    pub grade: f64,
    pub is_repeat: bool,
}

/// A single grade as submitted, before outcome resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub module: String,
    pub period: String,
    pub grade: f64,
}

impl GradeEntry {
    pub fn into_record(self, identity: &str, institution: &str) -> GradeRecord {
        GradeRecord {
            identity: identity.to_string(),
            module: self.module,
            period: self.period,
            institution: institution.to_string(),
            grade: self.grade,
            is_repeat: false,
        }
    }
}

/// Where a historical dataset was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Externally sourced aggregate for one (module, period, institution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDataset {
    pub module: String,
    pub period: String,
    #[serde(default = "crate::config::default_institution")]
    pub institution: String,
    pub average: f64,
    pub passed: i64,
    pub failed: i64,
    #[serde(default)]
    pub stddev: Option<f64>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl HistoricalDataset {
    pub fn count(&self) -> i64 {
        self.passed + self.failed
    }

    pub fn to_period_statistic(&self) -> PeriodStatistic {
        PeriodStatistic {
            period: self.period.clone(),
            average: self.average,
            passed: self.passed,
            failed: self.failed,
            count: self.count(),
            stddev: self.stddev,
            provenance: Some(self.provenance.clone()),
        }
    }
}

/// Statistics for one grading period, either computed live or taken from a
/// historical dataset (in which case `provenance` is set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStatistic {
    pub period: String,
    pub average: f64,
    pub passed: i64,
    pub failed: i64,
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl PeriodStatistic {
    #[cfg(test)]
    pub fn is_historical(&self) -> bool {
        self.provenance.is_some()
    }
}

/// Aggregate over all live records of a module outside historical periods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTotals {
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub stddev: Option<f64>,
    pub passed: i64,
    pub failed: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalStatistics {
    /// NaN when there is no data at all; serialized as `null`.
    pub average: f64,
    pub passed: i64,
    pub failed: i64,
    pub count: i64,
    pub median: f64,
    pub stddev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStatistics {
    pub total: TotalStatistics,
    /// Newest period first.
    pub detailed: Vec<PeriodStatistic>,
    pub distribution: Vec<u64>,
}

/// Key of one aggregation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatsKey {
    pub module: String,
    pub institution: String,
}

impl StatsKey {
    pub fn new(module: &str, institution: &str) -> Self {
        Self {
            module: module.to_string(),
            institution: institution.to_string(),
        }
    }
}

impl std::fmt::Display for StatsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.institution, self.module)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptOutStatus {
    pub opted_in: bool,
    pub opt_outs: i64,
}
