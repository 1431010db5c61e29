use std::cmp::Ordering;

/// Total order over grading-period codes.
///
/// Codes the order does not recognise must collate before every known
/// period.
pub trait PeriodOrder: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Ordering;

    fn is_valid(&self, period: &str) -> bool;
}

/// Swiss university semester codes: `FS` (spring) or `HS` (autumn) followed
/// by a two-digit year, e.g. `FS15` < `HS15` < `FS16`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemesterOrder;

impl SemesterOrder {
    /// Position of a semester on the timeline, `None` when unrecognised.
    pub fn rank(period: &str) -> Option<u32> {
        if period.len() != 4 || !period.is_ascii() {
            return None;
        }
        let (term, year) = period.split_at(2);
        let offset = match term {
            "FS" => 0,
            "HS" => 1,
            _ => return None,
        };
        if !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: u32 = year.parse().ok()?;
        Some(year * 2 + offset)
    }
}

impl PeriodOrder for SemesterOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        // Option orders None before Some, which is the not-found sentinel.
        Self::rank(a).cmp(&Self::rank(b))
    }

    fn is_valid(&self, period: &str) -> bool {
        Self::rank(period).is_some()
    }
}
