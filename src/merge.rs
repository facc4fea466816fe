//! Folding a resolved batch into an existing corpus.
use std::collections::HashMap;

use crate::model::{Corpus, IdentityKey, ResolvedListing};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub corpus: Corpus,
    pub net_new: usize,
}

/// Concatenate `existing` and `batch`, keep the last entry of every identity
/// tuple, and sort by date descending.
///
/// Later entries win, so a listing re-scraped in `batch` replaces the stored
/// copy. Survivors keep their relative order among equal dates.
pub fn merge(existing: Corpus, batch: Vec<ResolvedListing>) -> MergeOutcome {
    let before = existing.len();
    let combined: Vec<ResolvedListing> = existing.into_entries().into_iter().chain(batch).collect();

    let mut last_index: HashMap<IdentityKey, usize> = HashMap::with_capacity(combined.len());
    for (i, entry) in combined.iter().enumerate() {
        last_index.insert(entry.identity(), i);
    }

    let mut merged: Vec<ResolvedListing> = combined
        .into_iter()
        .enumerate()
        .filter(|(i, entry)| last_index.get(&entry.identity()) == Some(i))
        .map(|(_, entry)| entry)
        .collect();
    merged.sort_by(|a, b| b.date.cmp(&a.date));

    let net_new = merged.len().saturating_sub(before);
    MergeOutcome {
        corpus: Corpus::from_entries(merged),
        net_new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Listing;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn entry(title: &str, desc: &str, day: u32) -> ResolvedListing {
        Listing {
            title: Some(title.into()),
            company: Some("Acme".into()),
            location: Some("Austin, TX".into()),
            job_link: Some(format!("https://example.com/{title}")),
            job_description: Some(desc.into()),
            post_age: Some("Today".into()),
            company_rating: None,
        }
        .resolved(NaiveDate::from_ymd_opt(2020, 9, day).unwrap())
    }

    #[test]
    fn merge_into_empty_counts_everything() {
        let out = merge(Corpus::new(), vec![entry("a", "x", 1), entry("b", "y", 3)]);
        assert_eq!(out.net_new, 2);
        assert_eq!(out.corpus.entries()[0].listing.title.as_deref(), Some("b"));
        assert!(out.corpus.is_sorted_by_date_desc());
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![entry("a", "x", 1), entry("b", "y", 3), entry("c", "z", 2)];
        let first = merge(Corpus::new(), batch.clone());
        let second = merge(first.corpus.clone(), batch);
        assert_eq!(second.net_new, 0);
        assert_eq!(second.corpus, first.corpus);
    }

    #[test]
    fn new_entry_wins_on_identity_collision() {
        let existing = merge(Corpus::new(), vec![entry("a", "x", 1)]).corpus;
        let mut rescraped = entry("a", "x", 5);
        rescraped.listing.company_rating = Some("4.5".into());
        rescraped.listing.post_age = Some("2 days ago".into());

        let out = merge(existing, vec![rescraped.clone()]);
        assert_eq!(out.net_new, 0);
        assert_eq!(out.corpus.entries(), &[rescraped]);
    }

    #[test]
    fn different_description_is_a_different_listing() {
        let existing = merge(Corpus::new(), vec![entry("a", "x", 1)]).corpus;
        let out = merge(existing, vec![entry("a", "updated", 1)]);
        assert_eq!(out.net_new, 1);
    }

    #[test]
    fn duplicates_inside_a_batch_collapse() {
        let out = merge(
            Corpus::new(),
            vec![entry("a", "x", 1), entry("a", "x", 1), entry("b", "y", 2)],
        );
        assert_eq!(out.net_new, 2);
        let keys: HashSet<_> = out.corpus.iter().map(|e| e.identity()).collect();
        assert_eq!(keys.len(), out.corpus.len());
    }

    #[test]
    fn absent_fields_compare_equal() {
        let mut a = entry("a", "x", 1);
        a.listing.job_description = None;
        let out = merge(Corpus::new(), vec![a.clone(), a]);
        assert_eq!(out.corpus.len(), 1);
    }

    #[test]
    fn equal_dates_keep_relative_order() {
        let out = merge(
            Corpus::new(),
            vec![entry("first", "x", 2), entry("second", "y", 2), entry("old", "z", 1)],
        );
        let titles: Vec<_> = out
            .corpus
            .iter()
            .map(|e| e.listing.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["first", "second", "old"]);
    }
}
