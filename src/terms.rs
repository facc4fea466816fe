//! Term frequencies over job descriptions.
use std::collections::HashMap;

use crate::model::Corpus;

/// Lowercase and keep only characters that can appear in a skill name.
pub fn clean(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '+' | '#') {
                c
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count every n-gram of length `1..=max_len`.
pub fn everygram_frequency<'a, I>(docs: I, max_len: usize) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = HashMap::new();
    for doc in docs {
        let words: Vec<&str> = doc.split_whitespace().collect();
        for n in 1..=max_len.max(1) {
            for gram in words.windows(n) {
                *counts.entry(gram.join(" ")).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// The `k` skills of `library` mentioned most often in the corpus
/// descriptions. Skills never mentioned are left out; ties order by name.
pub fn top_skills(corpus: &Corpus, library: &[String], k: usize) -> Vec<(String, usize)> {
    let cleaned: Vec<String> = corpus
        .iter()
        .filter_map(|e| e.listing.job_description.as_deref())
        .map(clean)
        .collect();
    let max_len = library
        .iter()
        .map(|s| clean(s).split_whitespace().count())
        .max()
        .unwrap_or(1);
    let counts = everygram_frequency(cleaned.iter().map(String::as_str), max_len);

    let mut ranked: Vec<(String, usize)> = library
        .iter()
        .map(|skill| clean(skill))
        .filter_map(|skill| counts.get(&skill).map(|&n| (skill, n)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.dedup_by(|a, b| a.0 == b.0);
    ranked.truncate(k);
    ranked
}
