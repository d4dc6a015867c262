use crate::snapshot::StatRecord;

/// Most-affected-first ordering by cumulative cases.
///
/// Returns a new vector; the input keeps its fetch order. Ties keep their
/// relative input order (`sort_by` is stable) and there is no secondary key.
pub fn rank_by_cases(records: &[StatRecord]) -> Vec<StatRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(|a, b| b.cumulative.cases.cmp(&a.cumulative.cases));
    ranked
}
