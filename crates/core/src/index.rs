use std::fmt::Debug;
use std::ops::{Add, AddAssign, Sub};
use std::sync::atomic::Ordering;

use atomic::Atomic;

/// A generic integer index, used both for vertex ids and for row/offset
/// counters. Row/offset counters may need a wider type than vertex ids (see
/// `Topology`), so the two are kept as separate type parameters everywhere
/// even though most callers pick the same concrete type for both.
pub trait Idx:
    Copy + Clone + Default + Debug + Ord + Send + Sync + 'static + Add<Output = Self> + AddAssign + Sub<Output = Self>
{
    fn new(value: usize) -> Self;

    fn zero() -> Self {
        Self::new(0)
    }

    fn one() -> Self {
        Self::new(1)
    }

    fn index(self) -> usize;

    /// Atomically increments the value at `slot` and returns the value
    /// observed before the increment.
    fn get_and_increment(slot: &Atomic<Self>, order: Ordering) -> Self {
        Self::fetch_add(slot, Self::one(), order)
    }

    fn fetch_add(slot: &Atomic<Self>, value: Self, order: Ordering) -> Self;

    /// Parses a leading run of ASCII decimal digits from `bytes`, returning
    /// the parsed value and the number of bytes consumed. Does not accept a
    /// leading sign: vertex indices are always non-negative (see §6 of the
    /// spec this engine implements), and rejecting the sign here rather than
    /// downstream keeps index parsing and validation in one place.
    fn parse(bytes: &[u8]) -> Option<(Self, usize)>;
}

macro_rules! impl_idx {
    ($ty:ty) => {
        impl Idx for $ty {
            fn new(value: usize) -> Self {
                value as $ty
            }

            fn index(self) -> usize {
                self as usize
            }

            fn fetch_add(slot: &Atomic<Self>, value: Self, order: Ordering) -> Self {
                slot.fetch_add(value, order)
            }

            fn parse(bytes: &[u8]) -> Option<(Self, usize)> {
                let (value, used): (u64, usize) = atoi::FromRadix10::from_radix_10(bytes);
                if used == 0 {
                    None
                } else {
                    Some((value as $ty, used))
                }
            }
        }
    };
}

impl_idx!(i32);
impl_idx!(i64);
impl_idx!(u32);
impl_idx!(u64);
impl_idx!(usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_digits() {
        assert_eq!(i32::parse(b"1234"), Some((1234, 4)));
        assert_eq!(i32::parse(b"0 rest"), Some((0, 1)));
    }

    #[test]
    fn parse_rejects_non_digit_prefix() {
        assert_eq!(i32::parse(b"-5"), None);
        assert_eq!(i32::parse(b"abc"), None);
    }

    #[test]
    fn get_and_increment_returns_previous_value() {
        let slot = Atomic::new(5i64);
        let prev = i64::get_and_increment(&slot, Ordering::SeqCst);
        assert_eq!(prev, 5);
        assert_eq!(slot.load(Ordering::SeqCst), 6);
    }
}
