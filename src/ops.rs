//! Table operations (C4): `insert`, `get_or_insert`, `get`, `erase`, and
//! `erase`-by-iterator-position, layered on top of the chain engine (C3).
//! Growth is triggered here (`ops`) rather than in `chain`: the chain
//! engine's [`RawTable::try_insert`] only ever reports that there's no room
//! at the *current* capacity; the public-facing methods below are the ones
//! that actually call into the rehasher and retry.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

use crate::metadata;
use crate::probe;
use crate::raw::RawTable;

/// Outcome of a single, non-retrying insert attempt at the table's current
/// capacity. `try_insert` never grows the table itself.
pub(crate) enum InsertOutcome<V> {
    /// A new key was written; no prior value existed.
    Inserted(usize),
    /// An existing key's value was overwritten; the old value is returned.
    Replaced(usize, V),
    /// An existing key was found and left untouched (`get_or_insert` path).
    Existing(usize),
}

impl<K, V, S> RawTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Attempt to place `key`/`value` without growing the table. Returns
    /// the key/value back (unconsumed) if there is no room at the current
    /// capacity, whether because the load limit would be exceeded or
    /// because displacement exhaustion was hit while searching for a free
    /// slot; either way the caller (`insert_or_replace`/`get_or_insert`)
    /// must grow and retry.
    ///
    /// `unique` skips the duplicate-key chain scan (used by the rehasher,
    /// which knows every key it reinserts is already distinct). `replace`
    /// controls whether a duplicate's value is overwritten or kept as-is;
    /// it is ignored when `unique` is set.
    pub(crate) fn try_insert(
        &mut self,
        key: K,
        value: V,
        unique: bool,
        replace: bool,
    ) -> Result<InsertOutcome<V>, (K, V)> {
        if self.bucket_count() == 0 {
            return Err((key, value));
        }

        let hash = self.hash_of(&key);
        let home = probe::home_bucket(hash, self.bucket_count());
        let fragment = probe::hash_fragment(hash);
        let home_meta = self.metadata_at(home);

        if !metadata::in_home_bucket(home_meta) {
            // Case A: `home` is not the anchor of its own chain, it's
            // either empty, or occupied by a key belonging to some other
            // chain that merely probed through here.
            if self.len + 1 > self.load_limit() {
                return Err((key, value));
            }
            if !metadata::is_empty(home_meta) && !self.evict(home) {
                return Err((key, value));
            }
            self.write_entry(home, (key, value));
            self.set_metadata_at(home, metadata::pack(fragment, true, metadata::END_OF_CHAIN));
            self.len += 1;
            return Ok(InsertOutcome::Inserted(home));
        }

        // Case B: `home` anchors a chain. Walk it looking for `key`.
        if !unique {
            let mut current = home;
            loop {
                let meta = self.metadata_at(current);
                if metadata::fragment(meta) == fragment && self.key_at(current) == &key {
                    return Ok(if replace {
                        let old = std::mem::replace(&mut self.entry_at_mut(current).1, value);
                        InsertOutcome::Replaced(current, old)
                    } else {
                        InsertOutcome::Existing(current)
                    });
                }
                let d = metadata::displacement(meta);
                if d == metadata::END_OF_CHAIN {
                    break;
                }
                current = probe::successor(home, d, self.bucket_count());
            }
        }

        if self.len + 1 > self.load_limit() {
            return Err((key, value));
        }
        let Some((empty_bucket, d_new)) = self.find_first_empty_from(home) else {
            return Err((key, value));
        };
        let splice_point = self.find_insert_location_in_chain(home, d_new);
        let splice_meta = self.metadata_at(splice_point);
        let splice_disp = metadata::displacement(splice_meta);

        self.write_entry(empty_bucket, (key, value));
        self.set_metadata_at(empty_bucket, metadata::pack(fragment, false, splice_disp));
        self.set_metadata_at(splice_point, metadata::with_displacement(splice_meta, d_new));
        self.len += 1;
        Ok(InsertOutcome::Inserted(empty_bucket))
    }

    /// Index of the bucket holding `key`, or `None` if it's absent.
    pub(crate) fn get_index<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.bucket_count() == 0 {
            return None;
        }
        let hash = crate::make_hash(&self.hasher, key);
        let home = probe::home_bucket(hash, self.bucket_count());
        let fragment = probe::hash_fragment(hash);

        let home_meta = self.metadata_at(home);
        if !metadata::in_home_bucket(home_meta) {
            return None;
        }

        let mut current = home;
        loop {
            let meta = self.metadata_at(current);
            if metadata::fragment(meta) == fragment && self.key_at(current).borrow() == key {
                return Some(current);
            }
            let d = metadata::displacement(meta);
            if d == metadata::END_OF_CHAIN {
                return None;
            }
            current = probe::successor(home, d, self.bucket_count());
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index(key).map(|i| &self.entry_at(i).1)
    }

    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index(key).map(|i| &mut self.entry_at_mut(i).1)
    }

    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index(key).is_some()
    }

    /// Erase whatever key is at `bucket`, handling the solo/tail/interior
    /// cases of chain-preserving deletion. Returns the removed `(key,
    /// value)` pair and whether an iterator scanning forward from
    /// `bucket` should advance past it (`false` means the caller must
    /// re-examine `bucket`, since an interior erase may move an
    /// as-yet-unvisited key into it).
    pub(crate) fn erase_at(&mut self, bucket: usize, home: usize) -> ((K, V), bool) {
        let meta = self.metadata_at(bucket);
        let d = metadata::displacement(meta);

        if d == metadata::END_OF_CHAIN {
            if metadata::in_home_bucket(meta) {
                // Solo: the only member of its own chain.
                self.set_metadata_at(bucket, 0);
            } else {
                // Tail: not the home anchor, but the last link. Find and
                // truncate its predecessor.
                let predecessor = self.find_predecessor(home, bucket);
                let predecessor_meta = self.metadata_at(predecessor);
                self.set_metadata_at(
                    predecessor,
                    metadata::with_displacement(predecessor_meta, metadata::END_OF_CHAIN),
                );
                self.set_metadata_at(bucket, 0);
            }
            self.len -= 1;
            return (self.take_entry(bucket), true);
        }

        // Interior: walk to the chain's tail, move it into `bucket`, and
        // free the tail's old slot instead.
        let mut predecessor = bucket;
        let mut tail = probe::successor(home, d, self.bucket_count());
        loop {
            let tail_meta = self.metadata_at(tail);
            let tail_d = metadata::displacement(tail_meta);
            if tail_d == metadata::END_OF_CHAIN {
                break;
            }
            predecessor = tail;
            tail = probe::successor(home, tail_d, self.bucket_count());
        }

        let removed = self.take_entry(bucket);
        let moved = self.take_entry(tail);
        let bucket_meta = self.metadata_at(bucket);
        let tail_meta = self.metadata_at(tail);

        self.write_entry(bucket, moved);
        self.set_metadata_at(
            bucket,
            metadata::with_fragment(bucket_meta, metadata::fragment(tail_meta)),
        );

        if predecessor == bucket {
            // The tail was `bucket`'s immediate successor, so `predecessor
            // == bucket` here means we must truncate `bucket`'s own
            // (already-updated) displacement link, not a separate
            // predecessor slot.
            let bucket_meta_now = self.metadata_at(bucket);
            self.set_metadata_at(
                bucket,
                metadata::with_displacement(bucket_meta_now, metadata::END_OF_CHAIN),
            );
        } else {
            let predecessor_meta = self.metadata_at(predecessor);
            self.set_metadata_at(
                predecessor,
                metadata::with_displacement(predecessor_meta, metadata::END_OF_CHAIN),
            );
        }
        self.set_metadata_at(tail, 0);

        self.len -= 1;
        // Scan order is array index, not chain order, so whether the moved
        // key was already visited depends on whether `tail` sits before or
        // after `bucket` in the array. If `tail < bucket`, that key was
        // already passed over and the caller must advance past `bucket` to
        // avoid visiting it twice; otherwise it hasn't been seen yet and the
        // caller must re-examine `bucket`.
        (removed, tail < bucket)
    }

    /// Remove `key` if present, returning its value.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.get_index(key)?;
        let hash = crate::make_hash(&self.hasher, key);
        let home = probe::home_bucket(hash, self.bucket_count());
        let ((_, v), _) = self.erase_at(bucket, home);
        Some(v)
    }

    /// Keep only the entries for which `f` returns `true`, erasing the rest
    /// in place via the same erase-by-iterator machinery `remove` uses.
    ///
    /// An interior erase can move an as-yet-unvisited key backward into the
    /// slot just examined; `erase_at` reports this via its `advance` flag
    /// (`tail < bucket`), so the scan re-examines a bucket whenever that
    /// happens rather than unconditionally stepping forward. This is how
    /// every survivor ends up visited exactly once despite entries shifting
    /// underneath the scan.
    pub(crate) fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut index = 0;
        while index < self.bucket_count() {
            if metadata::is_empty(self.metadata_at(index)) {
                index += 1;
                continue;
            }
            let (k, v) = self.entry_at_mut(index);
            if f(&*k, v) {
                index += 1;
                continue;
            }
            let home = {
                let hash = self.hash_of(self.key_at(index));
                probe::home_bucket(hash, self.bucket_count())
            };
            let (_, advance) = self.erase_at(index, home);
            if advance {
                index += 1;
            }
        }
    }
}

impl<K, V, S> RawTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Insert `key`/`value`, growing first if the table has no room,
    /// overwriting and returning any prior value for `key`.
    pub(crate) fn insert_or_replace(&mut self, key: K, value: V) -> Option<V> {
        let mut attempt = (key, value);
        loop {
            match self.try_insert(attempt.0, attempt.1, false, true) {
                Ok(InsertOutcome::Inserted(_)) | Ok(InsertOutcome::Existing(_)) => return None,
                Ok(InsertOutcome::Replaced(_, old)) => return Some(old),
                Err(pair) => {
                    attempt = pair;
                    self.grow();
                }
            }
        }
    }

    /// Insert `key`/`value` on the assumption that `key` is not already
    /// present, growing first if needed. `replace` is forwarded to
    /// `try_insert` for parity with the duplicate-aware path, though a
    /// genuinely unique key never hits it.
    pub(crate) fn insert_unique(&mut self, key: K, value: V, replace: bool) {
        let mut attempt = (key, value);
        loop {
            match self.try_insert(attempt.0, attempt.1, true, replace) {
                Ok(_) => return,
                Err(pair) => {
                    attempt = pair;
                    self.grow();
                }
            }
        }
    }

    /// Return a mutable reference to `key`'s value, inserting
    /// `default_value` first if it's absent. Growing happens before the
    /// lookup that produces the returned reference, so the borrow never
    /// outlives a table that might reallocate under it.
    pub(crate) fn get_or_insert(&mut self, key: K, default_value: V) -> &mut V {
        let mut attempt = (key, default_value);
        let bucket = loop {
            match self.try_insert(attempt.0, attempt.1, false, false) {
                Ok(InsertOutcome::Inserted(i)) | Ok(InsertOutcome::Existing(i)) => break i,
                Ok(InsertOutcome::Replaced(..)) => {
                    unreachable!("get_or_insert never requests replacement")
                }
                Err(pair) => {
                    attempt = pair;
                    self.grow();
                }
            }
        };
        &mut self.entry_at_mut(bucket).1
    }
}

#[cfg(test)]
mod tests {
    use crate::raw::RawTable;
    use crate::DefaultHashBuilder;

    fn table() -> RawTable<i32, i32, DefaultHashBuilder> {
        RawTable::with_hasher(DefaultHashBuilder::default())
    }

    #[test]
    fn insert_then_get() {
        let mut t = table();
        for i in 0..9 {
            t.insert_or_replace(i, i * 10);
        }
        for i in 0..9 {
            assert_eq!(t.get(&i), Some(&(i * 10)));
        }
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut t = table();
        assert_eq!(t.insert_or_replace(5, 10), None);
        assert_eq!(t.insert_or_replace(5, 20), Some(10));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&5), Some(&20));
    }

    #[test]
    fn erase_removes_key_and_shrinks_len() {
        let mut t = table();
        for i in 0..10 {
            t.insert_or_replace(i, i);
        }
        for k in [0, 3, 6, 9] {
            assert!(t.remove(&k).is_some());
        }
        for i in 0..10 {
            assert_eq!(t.get(&i).is_some(), ![0, 3, 6, 9].contains(&i));
        }
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn borrowed_key_lookup() {
        let mut t: RawTable<String, i32, DefaultHashBuilder> = RawTable::with_hasher(Default::default());
        t.insert_or_replace("hello".to_string(), 1);
        assert_eq!(t.get("hello"), Some(&1));
        assert!(t.remove("hello").is_some());
    }
}
