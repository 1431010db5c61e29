use crate::config::{self, DEMO_IDENTITY, EMPTY_IDENTITY, MAX_GRADE, MIN_GRADE};
use crate::error::ValidationError;
use crate::models::GradeEntry;
use crate::period::PeriodOrder;

/// Identities are md5 hex digests of the user name.
pub fn validate_identity(identity: &str) -> Result<(), ValidationError> {
    let is_md5 = identity.len() == 32
        && identity
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !is_md5 {
        return Err(ValidationError::MalformedIdentity(identity.to_string()));
    }
    if identity == DEMO_IDENTITY {
        return Err(ValidationError::DemoIdentity);
    }
    if identity == EMPTY_IDENTITY {
        return Err(ValidationError::EmptyIdentity);
    }
    Ok(())
}

pub fn validate_institution(institution: &str) -> Result<(), ValidationError> {
    if config::is_known_institution(institution) {
        Ok(())
    } else {
        Err(ValidationError::UnknownInstitution(institution.to_string()))
    }
}

pub fn validate_entry(entry: &GradeEntry, order: &dyn PeriodOrder) -> Result<(), ValidationError> {
    if entry.module.trim().is_empty() {
        return Err(ValidationError::EmptyModule);
    }
    if !(MIN_GRADE..=MAX_GRADE).contains(&entry.grade) {
        return Err(ValidationError::GradeOutOfRange {
            module: entry.module.clone(),
            grade: entry.grade,
        });
    }
    if !order.is_valid(&entry.period) {
        return Err(ValidationError::InvalidPeriod(entry.period.clone()));
    }
    Ok(())
}

pub fn validate_submission(
    identity: &str,
    institution: &str,
    entries: &[GradeEntry],
    order: &dyn PeriodOrder,
) -> Result<(), ValidationError> {
    validate_identity(identity)?;
    validate_institution(institution)?;
    if entries.is_empty() {
        return Err(ValidationError::EmptySubmission);
    }
    for entry in entries {
        validate_entry(entry, order)?;
    }
    Ok(())
}
