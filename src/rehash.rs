//! Rehasher (C5): growing on load-limit or displacement exhaustion,
//! shrinking to fit, and reserving ahead of a known insertion burst.
//!
//! Every rehash goes through [`RawTable::rehash_to`], which always builds a
//! brand-new table at the target bucket count and reinserts every live key
//! as known-unique. If any reinsertion hits displacement exhaustion at that
//! target, the attempt is abandoned (its entries recovered, not dropped)
//! and retried at double the capacity.

use core::hash::{BuildHasher, Hash};

use crate::raw::{RawTable, MIN_BUCKETS};

impl<K, V, S> RawTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Double the bucket count (from `0` straight to [`MIN_BUCKETS`]) and
    /// move every live entry into the new layout.
    pub(crate) fn grow(&mut self) {
        let target = if self.bucket_count() == 0 {
            MIN_BUCKETS
        } else {
            self.bucket_count() * 2
        };
        self.rehash_to(target);
    }

    /// Ensure the table can hold `self.len() + additional` items without
    /// needing to grow again, rehashing immediately if it can't already.
    /// Returns whether a rehash actually happened.
    pub(crate) fn reserve(&mut self, additional: usize) -> bool {
        let needed = self
            .len
            .checked_add(additional)
            .expect("reserve: requested capacity overflows usize");
        let target = crate::raw::buckets_for_capacity(needed, self.max_load_permille);
        if target > self.bucket_count() {
            self.rehash_to(target);
            true
        } else {
            false
        }
    }

    /// Shrink to the smallest bucket count that fits the current number of
    /// live entries (possibly down to the zero-capacity state). Returns
    /// whether the bucket count actually changed.
    pub(crate) fn shrink_to_fit(&mut self) -> bool {
        let target = crate::raw::buckets_for_capacity(self.len, self.max_load_permille);
        if target == self.bucket_count() {
            return false;
        }
        self.rehash_to(target);
        true
    }

    /// Rebuild the table at exactly `target` buckets (or, failing that
    /// due to displacement exhaustion during reinsertion, at `target * 2`,
    /// `target * 4`, ... until an attempt succeeds).
    ///
    /// `target == 0` is a valid request (used by `shrink_to_fit` when the
    /// table is empty) and always succeeds immediately, since there is
    /// nothing to reinsert.
    pub(crate) fn rehash_to(&mut self, mut target: usize) {
        let max_load_permille = self.max_load_permille;
        let shared_hasher = self.hasher.clone();

        let placeholder = RawTable::with_hasher(self.hasher.clone());
        let old = std::mem::replace(self, placeholder);
        let mut pending = old.into_entries().into_iter();

        loop {
            let mut candidate =
                RawTable::with_bucket_count_and_hasher(target, max_load_permille, shared_hasher.clone());
            let mut recovered: Vec<(K, V)> = Vec::new();
            let mut exhausted = false;

            for (k, v) in pending.by_ref() {
                match candidate.try_insert(k, v, true, false) {
                    Ok(_) => {}
                    Err(pair) => {
                        recovered.push(pair);
                        exhausted = true;
                        break;
                    }
                }
            }

            if exhausted {
                recovered.extend(candidate.into_entries());
                recovered.extend(pending);
                pending = recovered.into_iter();
                target = target
                    .max(MIN_BUCKETS)
                    .checked_mul(2)
                    .expect("rehash target overflows usize");
                continue;
            }

            *self = candidate;
            return;
        }
    }
}
