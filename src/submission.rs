use tracing::info;

use crate::error::SubmissionError;
use crate::models::{GradeEntry, GradeRecord, OptOutStatus};
use crate::period::PeriodOrder;
use crate::resolver::resolve_outcomes;
use crate::store::RecordStore;
use crate::validation::{validate_identity, validate_institution, validate_submission};

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub replaced: u64,
    pub inserted: u64,
    pub repeats: usize,
}

/// Replaces all records of `identity` at `institution` with `entries`.
///
/// Repeated attempts inside the batch are resolved before the write; rows
/// that collide with the store's uniqueness key are skipped.
pub async fn submit(
    store: &dyn RecordStore,
    order: &dyn PeriodOrder,
    identity: &str,
    institution: &str,
    entries: Vec<GradeEntry>,
) -> Result<SubmissionReceipt, SubmissionError> {
    validate_submission(identity, institution, &entries, order)?;

    let records: Vec<GradeRecord> = entries
        .into_iter()
        .map(|entry| entry.into_record(identity, institution))
        .collect();
    let records = resolve_outcomes(records);
    let repeats = records.iter().filter(|r| r.is_repeat).count();

    let (replaced, inserted) = store
        .replace_identity(identity, institution, &records)
        .await?;

    info!(
        institution,
        submitted = records.len(),
        inserted,
        repeats,
        "stored grade submission"
    );

    Ok(SubmissionReceipt {
        replaced,
        inserted,
        repeats,
    })
}

/// Deletes the records of an opted-in identity and counts the opt-out.
/// Does nothing for identities without records.
pub async fn withdraw(
    store: &dyn RecordStore,
    identity: &str,
    institution: &str,
    max_opt_outs: i64,
) -> Result<bool, SubmissionError> {
    validate_identity(identity)?;
    validate_institution(institution)?;

    if !store.is_opted_in(identity, institution).await? {
        return Ok(false);
    }
    if store.opt_out_count(identity, institution).await? >= max_opt_outs {
        return Err(SubmissionError::OptOutQuotaExceeded {
            limit: max_opt_outs,
        });
    }

    let deleted = store.delete_identity(identity, institution).await?;
    store.record_opt_out(identity, institution).await?;
    info!(institution, deleted, "withdrew grades");
    Ok(true)
}

pub async fn opt_out_status(
    store: &dyn RecordStore,
    identity: &str,
    institution: &str,
) -> Result<OptOutStatus, SubmissionError> {
    validate_identity(identity)?;
    validate_institution(institution)?;

    Ok(OptOutStatus {
        opted_in: store.is_opted_in(identity, institution).await?,
        opt_outs: store.opt_out_count(identity, institution).await?,
    })
}
