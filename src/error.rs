use thiserror::Error;

/// Failures reported by a record store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// Errors surfaced by the aggregation engine.
///
/// Cloneable so a single coalesced outcome can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("aggregation for {key} aborted: {reason}")]
    Aborted { key: String, reason: String },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::DataSourceUnavailable(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("identity should be an md5 hash, got {0:?}")]
    MalformedIdentity(String),

    #[error("the demo account cannot perform this action")]
    DemoIdentity,

    #[error("identity is the hash of an empty user name")]
    EmptyIdentity,

    #[error("grade {grade} for module {module} is outside 1..=6")]
    GradeOutOfRange { module: String, grade: f64 },

    #[error("invalid period code {0:?}")]
    InvalidPeriod(String),

    #[error("module code must not be empty")]
    EmptyModule,

    #[error("unknown institution {0:?}")]
    UnknownInstitution(String),

    #[error("submission contains no grades")]
    EmptySubmission,
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("opt-out limit of {limit} reached")]
    OptOutQuotaExceeded { limit: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
