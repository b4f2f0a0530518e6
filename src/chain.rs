//! Chain engine (C3): the operations that walk and rewrite the per-home
//! chains: finding the next free slot, finding where a new displacement
//! slots into a chain, finding a bucket's predecessor, and evicting a
//! chain-interior occupant out of its foreign home bucket.

use core::hash::{BuildHasher, Hash};

use crate::metadata;
use crate::probe;
use crate::raw::RawTable;

impl<K, V, S> RawTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Walk the quadratic probe sequence from `home`, returning the first
    /// empty bucket found and the displacement that reaches it, or `None`
    /// on displacement exhaustion.
    pub(crate) fn find_first_empty_from(&self, home: usize) -> Option<(usize, u16)> {
        probe::find_first_empty(home, self.bucket_count(), self.metadata_slice())
    }

    /// Starting at `home`, walk the chain and return the last bucket whose
    /// displacement link is strictly less than `d_new`, the point after
    /// which a new link with displacement `d_new` should be spliced in.
    /// Preserves the chain's monotonically-increasing displacement order.
    pub(crate) fn find_insert_location_in_chain(&self, home: usize, d_new: u16) -> usize {
        let mut current = home;
        loop {
            let d = metadata::displacement(self.metadata_at(current));
            if d == metadata::END_OF_CHAIN || d >= d_new {
                return current;
            }
            current = probe::successor(home, d, self.bucket_count());
        }
    }

    /// Starting at `home`, walk the chain to find the bucket whose
    /// displacement link points at `target`.
    ///
    /// `target` must actually be reachable from `home`'s chain (every
    /// caller only invokes this for a bucket it already knows belongs to
    /// that chain).
    pub(crate) fn find_predecessor(&self, home: usize, target: usize) -> usize {
        let mut current = home;
        loop {
            let d = metadata::displacement(self.metadata_at(current));
            debug_assert_ne!(
                d,
                metadata::END_OF_CHAIN,
                "target bucket is not a member of home's chain"
            );
            let next = probe::successor(home, d, self.bucket_count());
            if next == target {
                return current;
            }
            current = next;
        }
    }

    /// Evict the chain-interior occupant of `bucket` (precondition: `bucket`
    /// is occupied and its metadatum has the home-bucket flag unset) to make
    /// room for a new key that wants `bucket` as its home.
    ///
    /// Unlinks the occupant from its true home's chain *before* confirming
    /// that chain has anywhere left to put it. If that confirmation fails,
    /// the chain is left disturbed and this returns `false`, and the caller
    /// must abort its own insert and fall back to a full rehash at doubled
    /// capacity, which reinserts every live key from scratch and never
    /// consults the disturbed chain.
    pub(crate) fn evict(&mut self, bucket: usize) -> bool {
        let occupant_home = {
            let hash = self.hash_of(self.key_at(bucket));
            probe::home_bucket(hash, self.bucket_count())
        };
        let predecessor = self.find_predecessor(occupant_home, bucket);

        let bucket_meta = self.metadata_at(bucket);
        let bucket_disp = metadata::displacement(bucket_meta);
        let predecessor_meta = self.metadata_at(predecessor);
        self.set_metadata_at(
            predecessor,
            metadata::with_displacement(predecessor_meta, bucket_disp),
        );

        let Some((empty_bucket, d_new)) = self.find_first_empty_from(occupant_home) else {
            return false;
        };
        let splice_point = self.find_insert_location_in_chain(occupant_home, d_new);

        let entry = self.take_entry(bucket);
        self.write_entry(empty_bucket, entry);

        let splice_meta = self.metadata_at(splice_point);
        let splice_disp = metadata::displacement(splice_meta);
        self.set_metadata_at(
            empty_bucket,
            metadata::pack(metadata::fragment(bucket_meta), false, splice_disp),
        );
        self.set_metadata_at(splice_point, metadata::with_displacement(splice_meta, d_new));

        true
    }
}
