use std::io::{self, Write};

use compact_str::CompactString;
use dashmap::DashMap;

use crate::tokenize::Dictionary;

/// The shared item-to-count table. Increment-only while the pipeline runs;
/// the dictionary sweep happens after every producer has finished.
pub struct FreqTable {
    counts: DashMap<CompactString, usize>,
}

impl FreqTable {
    pub fn new() -> Self {
        FreqTable {
            counts: DashMap::new(),
        }
    }

    pub fn increment(&self, key: &str) {
        if let Some(mut count) = self.counts.get_mut(key) {
            *count += 1;
        } else {
            self.counts.insert(CompactString::from(key), 1);
        }
    }

    pub fn count(&self, key: &str) -> usize {
        self.counts.get(key).map(|count| *count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Drops every key that is not itself a dictionary word.
    pub fn retain_dictionary(&self, dict: &Dictionary) {
        self.counts.retain(|key, _| dict.contains(key));
    }

    /// Keys in strictly descending count order; equal counts order
    /// lexicographically so repeated runs print identically.
    pub fn ranked(&self) -> Vec<(CompactString, usize)> {
        let mut items: Vec<_> = self
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items
    }

    /// One line per key, `<count> <key>` when `show_count` is set, skipping
    /// keys whose count is below `minimum`.
    pub fn write_ranked<W: Write>(
        &self,
        out: &mut W,
        show_count: bool,
        minimum: usize,
    ) -> io::Result<()> {
        for (key, count) in self.ranked() {
            if count < minimum {
                continue;
            }
            if show_count {
                writeln!(out, "{} {}", count, key)?;
            } else {
                writeln!(out, "{}", key)?;
            }
        }
        Ok(())
    }
}

#[test]
fn ranking_is_strictly_descending_by_count() {
    let table = FreqTable::new();
    let counts = [
        ("quick", 10),
        ("the", 9),
        ("brown", 7),
        ("fox", 6),
        ("jumps", 5),
        ("over", 4),
        ("lazy", 3),
        ("dog", 2),
        ("the quick brown fox jumps over the lazy dog", 1),
    ];
    for (key, n) in counts {
        for _ in 0..n {
            table.increment(key);
        }
    }
    let ranked: Vec<_> = table.ranked().into_iter().map(|(key, _)| key).collect();
    assert_eq!(
        ranked,
        vec![
            "quick",
            "the",
            "brown",
            "fox",
            "jumps",
            "over",
            "lazy",
            "dog",
            "the quick brown fox jumps over the lazy dog",
        ]
    );
}

#[test]
fn equal_counts_rank_lexicographically() {
    let table = FreqTable::new();
    for key in ["delta", "alpha", "charlie", "bravo"] {
        table.increment(key);
    }
    let ranked: Vec<_> = table.ranked().into_iter().map(|(key, _)| key).collect();
    assert_eq!(ranked, vec!["alpha", "bravo", "charlie", "delta"]);
}

#[test]
fn write_ranked_applies_the_minimum_count() {
    let table = FreqTable::new();
    for _ in 0..3 {
        table.increment("common");
    }
    table.increment("rare");
    let mut out = Vec::new();
    table.write_ranked(&mut out, true, 2).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "3 common\n");
}

#[test]
fn write_ranked_without_counts_prints_bare_keys() {
    let table = FreqTable::new();
    table.increment("only");
    let mut out = Vec::new();
    table.write_ranked(&mut out, false, 0).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "only\n");
}

#[test]
fn dictionary_sweep_drops_foreign_keys() {
    let table = FreqTable::new();
    table.increment("kept");
    table.increment("dropped");
    let dict = Dictionary::from_words(vec!["kept".into()]);
    table.retain_dictionary(&dict);
    assert_eq!(table.count("kept"), 1);
    assert_eq!(table.count("dropped"), 0);
    assert_eq!(table.len(), 1);
}
