//! Lifecycle lattice
//!
//! A lifecycle state describes how far a subsystem has initialized. The queue only needs two
//! relations on it: exact identity (`is`) and reachability (`is_at_least`). States may share a
//! readiness level without being the same stage, so `is` is not derived from `is_at_least`.

use std::fmt::Debug;

/// A stage marker in a monotonically advancing readiness lattice.
pub trait Lifecycle: Clone + Debug + Send + Sync + 'static {
    /// Exact equality of lifecycle stage.
    fn is(&self, other: &Self) -> bool;

    /// Reflexive, transitive: true if `self` has reached or passed `other`.
    fn is_at_least(&self, other: &Self) -> bool;

    fn is_at_most(&self, other: &Self) -> bool {
        other.is_at_least(self)
    }

    /// Inclusive on both ends.
    fn is_between(&self, low: &Self, high: &Self) -> bool {
        self.is_at_least(low) && self.is_at_most(high)
    }
}

macro_rules! ordered_lifecycle {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Lifecycle for $ty {
                fn is(&self, other: &Self) -> bool {
                    self == other
                }

                fn is_at_least(&self, other: &Self) -> bool {
                    self >= other
                }
            }
        )*
    };
}

ordered_lifecycle!(u8, u16, u32, u64, usize, i32, i64);
