use std::collections::HashMap;

use crate::models::GradeRecord;

/// Flags repeated attempts within one identity's submission batch.
///
/// Per (period, module) only the best grade stays the primary outcome; every
/// other attempt is marked `is_repeat`. Equal grades keep the earlier
/// attempt as primary. Each new attempt is only compared against the record
/// currently holding the primary slot for its key.
pub fn resolve_outcomes(mut records: Vec<GradeRecord>) -> Vec<GradeRecord> {
    let mut primary: HashMap<(String, String), usize> = HashMap::new();

    for index in 0..records.len() {
        let key = (records[index].period.clone(), records[index].module.clone());
        match primary.get(&key).copied() {
            None => {
                records[index].is_repeat = false;
                primary.insert(key, index);
            }
            Some(current) => {
                if records[index].grade > records[current].grade {
                    records[current].is_repeat = true;
                    records[index].is_repeat = false;
                    primary.insert(key, index);
                } else {
                    records[index].is_repeat = true;
                }
            }
        }
    }

    records
}
