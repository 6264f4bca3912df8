//! Label table
//!
//! Maps label names to instruction positions. Buckets are chosen by the
//! sum of the name's bytes modulo the bucket count; names that land in the
//! same bucket are chained. Lookups walk the whole chain and only succeed
//! on an exact name match, so two colliding labels never resolve to each
//! other's target.

use thiserror::Error;

/// Default number of buckets for a program's label table.
pub const DEFAULT_BUCKETS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),
}

#[derive(Debug, Clone)]
struct LabelEntry {
    name: String,
    target: usize,
    next: Option<Box<LabelEntry>>,
}

/// Chained hash table from label name to instruction position
#[derive(Debug, Clone)]
pub struct LabelTable {
    /// Every bucket exists up front; `None` is an empty bucket
    buckets: Vec<Option<Box<LabelEntry>>>,
    len: usize,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Create a table with a fixed bucket count (at least one).
    pub fn with_buckets(count: usize) -> Self {
        let count = count.max(1);
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, || None);
        Self { buckets, len: 0 }
    }

    fn hash(name: &str) -> u64 {
        name.bytes()
            .fold(0u64, |acc, byte| acc.wrapping_add(byte as u64))
    }

    /// Bucket a name hashes to
    pub fn bucket_index(&self, name: &str) -> usize {
        (Self::hash(name) % self.buckets.len() as u64) as usize
    }

    /// Record that `name` resolves to `target`.
    ///
    /// A name may only be defined once; redefinition is rejected rather
    /// than shadowing or being shadowed.
    pub fn put(&mut self, name: impl Into<String>, target: usize) -> Result<(), LabelError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(LabelError::DuplicateLabel(name));
        }

        let bucket = self.bucket_index(&name);
        let slot = &mut self.buckets[bucket];
        let entry = Box::new(LabelEntry {
            name,
            target,
            next: slot.take(),
        });
        *slot = Some(entry);
        self.len += 1;
        Ok(())
    }

    /// Resolve `name` to its instruction position.
    pub fn get(&self, name: &str) -> Result<usize, LabelError> {
        self.find(name)
            .map(|entry| entry.target)
            .ok_or_else(|| LabelError::UnknownLabel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&LabelEntry> {
        let mut entry = self.buckets[self.bucket_index(name)].as_deref();
        while let Some(current) = entry {
            if current.name == name {
                return Some(current);
            }
            entry = current.next.as_deref();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries chained in `bucket` (0 for out-of-range buckets)
    pub fn chain_len(&self, bucket: usize) -> usize {
        self.buckets
            .get(bucket)
            .map(|head| Chain { next: head.as_deref() }.count())
            .unwrap_or(0)
    }

    /// All `(name, target)` pairs, bucket by bucket
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.buckets
            .iter()
            .flat_map(|head| Chain { next: head.as_deref() })
            .map(|entry| (entry.name.as_str(), entry.target))
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LabelTable {
    fn drop(&mut self) {
        // Unlink chains iteratively so long chains don't recurse.
        for bucket in &mut self.buckets {
            let mut next = bucket.take();
            while let Some(mut entry) = next {
                next = entry.next.take();
            }
        }
    }
}

struct Chain<'a> {
    next: Option<&'a LabelEntry>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a LabelEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.next?;
        self.next = entry.next.as_deref();
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let mut table = LabelTable::new();
        table.put("loop", 3).unwrap();
        table.put("done", 9).unwrap();

        assert_eq!(table.get("loop"), Ok(3));
        assert_eq!(table.get("done"), Ok(9));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_miss_is_unknown_label() {
        let mut table = LabelTable::new();
        table.put("present", 0).unwrap();
        assert_eq!(
            table.get("absent"),
            Err(LabelError::UnknownLabel("absent".to_string()))
        );
    }

    #[test]
    fn test_colliding_names_resolve_independently() {
        // "ab" and "ba" have the same byte sum
        let mut table = LabelTable::with_buckets(8);
        assert_eq!(table.bucket_index("ab"), table.bucket_index("ba"));

        table.put("ab", 1).unwrap();
        table.put("ba", 2).unwrap();

        assert_eq!(table.get("ab"), Ok(1));
        assert_eq!(table.get("ba"), Ok(2));
        assert_eq!(table.chain_len(table.bucket_index("ab")), 2);
    }

    #[test]
    fn test_miss_in_occupied_bucket() {
        // Same bucket as "ab" but never defined: must not resolve to "ab"
        let mut table = LabelTable::with_buckets(8);
        table.put("ab", 1).unwrap();
        assert_eq!(table.bucket_index("ab"), table.bucket_index("ba"));
        assert!(matches!(table.get("ba"), Err(LabelError::UnknownLabel(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut table = LabelTable::new();
        table.put("start", 0).unwrap();
        assert_eq!(
            table.put("start", 5),
            Err(LabelError::DuplicateLabel("start".to_string()))
        );
        assert_eq!(table.get("start"), Ok(0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_single_bucket_chains_everything() {
        let mut table = LabelTable::with_buckets(0);
        assert_eq!(table.bucket_count(), 1);
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            table.put(*name, i).unwrap();
        }
        assert_eq!(table.chain_len(0), 4);
        assert_eq!(table.get("c"), Ok(2));

        let mut all: Vec<_> = table.iter().collect();
        all.sort();
        assert_eq!(all, vec![("a", 0), ("b", 1), ("c", 2), ("d", 3)]);
    }

    #[test]
    fn test_empty_bucket_placeholders() {
        let table = LabelTable::with_buckets(16);
        assert!(table.is_empty());
        assert_eq!(table.bucket_count(), 16);
        assert!((0..16).all(|b| table.chain_len(b) == 0));
    }
}
