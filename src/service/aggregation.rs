use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{
    db::EpidemiologicalRecord,
    models::{DiseaseTotalType, WeeklyCaseRangeType},
};

/**
 * Orders records by period start, then IBGE code, then disease.
 */
pub fn sort_records(records: &mut [EpidemiologicalRecord]) {
    records.sort_by(|a, b| a.period_start.cmp(&b.period_start).then(a.ibge_code.cmp(&b.ibge_code)).then_with(|| a.disease.cmp(&b.disease)));
}

/**
 * Groups records by period start and computes the largest and smallest confirmed case count of each group.
 *
 * # Returns
 * One entry per distinct period start, ascending. Empty input gives an empty result.
 */
pub fn weekly_case_ranges(records: &[EpidemiologicalRecord]) -> Vec<WeeklyCaseRangeType> {
    let mut ranges: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for record in records {
        ranges
            .entry(record.period_start)
            .and_modify(|(max_cases, min_cases)| {
                *max_cases = (*max_cases).max(record.confirmed_cases);
                *min_cases = (*min_cases).min(record.confirmed_cases);
            })
            .or_insert((record.confirmed_cases, record.confirmed_cases));
    }
    ranges.into_iter().map(|(period_start, (max_cases, min_cases))| WeeklyCaseRangeType { period_start, max_cases, min_cases }).collect()
}

/**
 * Sums confirmed cases per disease.
 *
 * # Returns
 * One entry per disease, ascending by disease name.
 */
pub fn disease_totals(records: &[EpidemiologicalRecord]) -> Vec<DiseaseTotalType> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for record in records {
        let total = totals.entry(record.disease.as_str()).or_insert(0);
        *total = total.saturating_add(record.confirmed_cases);
    }
    totals.into_iter().map(|(disease, total_cases)| DiseaseTotalType { disease: disease.to_string(), total_cases }).collect()
}
