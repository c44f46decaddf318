use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use compact_str::CompactString;
use fnv::FnvHashSet;

use crate::BoxError;

/// Per-item admission check applied before any counting: a length exclusion
/// plus optional allow/deny membership. Rejection is a skip, not an error.
pub struct ListFilter {
    exclude: usize,
    retain: FnvHashSet<CompactString>,
    remove: FnvHashSet<CompactString>,
}

impl ListFilter {
    pub fn new(
        exclude: usize,
        retain: FnvHashSet<CompactString>,
        remove: FnvHashSet<CompactString>,
    ) -> Self {
        ListFilter {
            exclude,
            retain,
            remove,
        }
    }

    pub fn accepts(&self, item: &str) -> bool {
        if item.len() <= self.exclude {
            return false;
        }
        if self.retain.is_empty() && self.remove.is_empty() {
            return true;
        }
        (self.retain.is_empty() || self.retain.contains(item))
            && (self.remove.is_empty() || !self.remove.contains(item))
    }
}

/// Loads every line of the named files into one set. Unreadable files are
/// fatal for the whole run.
pub fn load_word_set(paths: &[PathBuf]) -> Result<FnvHashSet<CompactString>, BoxError> {
    let mut set = FnvHashSet::default();
    for path in paths {
        let file = File::open(path)
            .map_err(|err| format!("cannot read list file {}: {}", path.display(), err))?;
        for line in BufReader::new(file).lines() {
            set.insert(CompactString::from(line?));
        }
    }
    Ok(set)
}

#[cfg(test)]
fn set_of(words: &[&str]) -> FnvHashSet<CompactString> {
    words.iter().map(|w| CompactString::from(*w)).collect()
}

#[test]
fn items_at_or_below_the_exclusion_length_are_rejected() {
    let filter = ListFilter::new(3, FnvHashSet::default(), FnvHashSet::default());
    assert!(!filter.accepts("hi"));
    assert!(filter.accepts("hello"));
}

#[test]
fn retain_set_admits_members_only() {
    let filter = ListFilter::new(3, set_of(&["hello"]), FnvHashSet::default());
    assert!(filter.accepts("hello"));
    assert!(!filter.accepts("world"));
}

#[test]
fn remove_set_rejects_members() {
    let filter = ListFilter::new(3, FnvHashSet::default(), set_of(&["hello"]));
    assert!(!filter.accepts("hello"));
    assert!(filter.accepts("world"));
}

#[test]
fn both_sets_must_agree() {
    let filter = ListFilter::new(0, set_of(&["hello", "world"]), set_of(&["world"]));
    assert!(filter.accepts("hello"));
    assert!(!filter.accepts("world"));
    assert!(!filter.accepts("other"));
}
