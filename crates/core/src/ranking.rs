//! Sort and filter policy applied to an aggregated result set.
//!
//! Relevance follows the similarity-distance convention: lower is closer, and
//! the relevance filter keeps `distance <= threshold`. Records from keyword or
//! hybrid queries carry a score instead of a distance and are therefore left
//! in place by the relevance sort and dropped by the relevance filter.

use crate::models::{ResultRecord, SortFilterCriteria, SortKey};
use std::cmp::Ordering;

pub fn rank(records: &mut Vec<ResultRecord>, criteria: &SortFilterCriteria) {
    sort_records(records, criteria.sort_key);
    filter_records(records, criteria);
}

pub fn sort_records(records: &mut [ResultRecord], key: SortKey) {
    match key {
        SortKey::Relevance => sort_by_distance(records),
        SortKey::Date => records.sort_by(|left, right| right.modified_at.cmp(&left.modified_at)),
    }
}

/// Sorts ranked records among the slots they already occupy, so unranked
/// records keep their exact position.
fn sort_by_distance(records: &mut [ResultRecord]) {
    let slots = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.distance.is_some())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let mut ranked = slots
        .iter()
        .map(|&index| std::mem::take(&mut records[index]))
        .collect::<Vec<_>>();
    ranked.sort_by(|left, right| compare_distance(left.distance, right.distance));

    for (slot, record) in slots.into_iter().zip(ranked) {
        records[slot] = record;
    }
}

fn compare_distance(left: Option<f64>, right: Option<f64>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        _ => Ordering::Equal,
    }
}

pub fn filter_records(records: &mut Vec<ResultRecord>, criteria: &SortFilterCriteria) {
    if let Some(threshold) = criteria.relevance_filter {
        records.retain(|record| record.distance.is_some_and(|distance| distance <= threshold));
    }

    if let Some(range) = criteria.date_range {
        records.retain(|record| record.modified_at.is_some_and(|modified| range.contains(modified)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, Modality, PropertyBag};
    use chrono::NaiveDate;
    use serde_json::Value;

    fn record(name: &str, distance: Option<f64>, modified: Option<&str>) -> ResultRecord {
        let mut properties = PropertyBag::new();
        properties.insert("filename".to_string(), Value::String(name.to_string()));
        if let Some(modified) = modified {
            properties.insert("date_modified".to_string(), Value::String(modified.to_string()));
        }
        ResultRecord::new("pdf", Modality::Pdf, properties).with_distance(distance)
    }

    fn names(records: &[ResultRecord]) -> Vec<&str> {
        records.iter().map(ResultRecord::display_name).collect()
    }

    #[test]
    fn relevance_sort_orders_distances_ascending() {
        let mut records = vec![
            record("c", Some(0.9), None),
            record("a", Some(0.1), None),
            record("b", Some(0.5), None),
        ];
        sort_records(&mut records, SortKey::Relevance);
        assert_eq!(names(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn relevance_sort_is_stable_and_keeps_unranked_in_place() {
        let mut records = vec![
            record("tie-1", Some(0.4), None),
            record("unranked-1", None, None),
            record("best", Some(0.1), None),
            record("tie-2", Some(0.4), None),
            record("unranked-2", None, None),
        ];
        sort_records(&mut records, SortKey::Relevance);
        assert_eq!(
            names(&records),
            vec!["best", "unranked-1", "tie-1", "tie-2", "unranked-2"]
        );
    }

    #[test]
    fn date_sort_puts_undated_records_last() {
        let mut records = vec![
            record("undated", Some(0.1), None),
            record("old", None, Some("2020-01-01T00:00:00Z")),
            record("new", None, Some("2024-06-01T00:00:00Z")),
            record("undated-2", None, None),
        ];
        sort_records(&mut records, SortKey::Date);
        assert_eq!(names(&records), vec!["new", "old", "undated", "undated-2"]);
    }

    #[test]
    fn relevance_filter_keeps_distances_within_threshold() {
        let mut records = vec![
            record("a", Some(0.2), None),
            record("b", Some(0.6), None),
            record("c", None, None),
            record("d", Some(0.5), None),
        ];
        let criteria = SortFilterCriteria {
            relevance_filter: Some(0.5),
            ..Default::default()
        };
        filter_records(&mut records, &criteria);
        assert_eq!(names(&records), vec!["a", "d"]);
    }

    #[test]
    fn date_filter_drops_undated_records() {
        let mut records = vec![
            record("inside", None, Some("2024-03-15T12:00:00Z")),
            record("outside", None, Some("2023-12-31T23:00:00Z")),
            record("undated", Some(0.1), None),
            record("edge", None, Some("2024-03-31T23:59:59Z")),
        ];
        let criteria = SortFilterCriteria {
            date_range: Some(
                DateRange::new(
                    NaiveDate::from_ymd_opt(2024, 1, 1),
                    NaiveDate::from_ymd_opt(2024, 3, 31),
                )
                .expect("valid range"),
            ),
            ..Default::default()
        };
        filter_records(&mut records, &criteria);
        assert_eq!(names(&records), vec!["inside", "edge"]);
    }

    #[test]
    fn rank_sorts_then_filters() {
        let mut records = vec![
            record("far", Some(0.8), None),
            record("near", Some(0.2), None),
            record("mid", Some(0.4), None),
        ];
        let criteria = SortFilterCriteria {
            sort_key: SortKey::Relevance,
            relevance_filter: Some(0.5),
            date_range: None,
        };
        rank(&mut records, &criteria);
        assert_eq!(names(&records), vec!["near", "mid"]);
    }
}
