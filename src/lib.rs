#![feature(dropck_eyepatch)]
//! An open-addressed, quadratically-probed hash table in which every key
//! that shares a home bucket is linked through a per-bucket displacement
//! field rather than re-probed for. See [`raw`] for the bucket layout and
//! chain-discipline algorithm; [`Map`] and [`Set`] are the public entry
//! points.

use core::hash::{BuildHasher, Hash, Hasher};

mod metadata;
mod probe;

mod raw;

mod chain;
mod iter;
mod ops;
mod rehash;

mod map;
mod set;

pub use map::{IntoIter as MapIntoIter, Iter as MapIter, IterMut as MapIterMut, Map};
pub use set::{IntoIter as SetIntoIter, Iter as SetIter, Set};

/// Hash builder used when a table is constructed without an explicit one.
///
/// `ahash` is the standard ecosystem swap-in for `std`'s SipHash when DoS
/// resistance against adversarial input isn't the caller's top priority and
/// raw throughput is; it is noticeably faster for the integer- and
/// short-string-heavy keys this table is built for.
pub type DefaultHashBuilder = ahash::RandomState;

/// Hash `key` with `build_hasher`, producing the 64-bit value the probe
/// calculator splits into a home bucket and a hash fragment.
fn make_hash<S, Q>(build_hasher: &S, key: &Q) -> u64
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}
