//! Proof and disproof numbers for proof-number search.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type used for a single bound component.
pub type BoundValue = u32;

/// A (phi, delta) proof/disproof pair.
///
/// `phi` estimates the work remaining to prove the side to move wins;
/// `delta` estimates the work remaining to prove it loses. A zero component
/// means the corresponding outcome is proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Proof number.
    pub phi: BoundValue,
    /// Disproof number.
    pub delta: BoundValue,
}

impl Bounds {
    /// Denotes a proven state.
    pub const INFTY: BoundValue = 2_000_000_000;

    /// Maximum amount of work. Must be less than [`INFTY`](Self::INFTY).
    pub const MAX_WORK: BoundValue = Self::INFTY - 1;

    /// Fresh, unexplored bounds.
    #[inline]
    pub const fn new(phi: BoundValue, delta: BoundValue) -> Bounds {
        Bounds { phi, delta }
    }

    /// The canonical proven-win bounds, (0, INFTY).
    #[inline]
    pub const fn winning() -> Bounds {
        Bounds {
            phi: 0,
            delta: Self::INFTY,
        }
    }

    /// The canonical proven-loss bounds, (INFTY, 0).
    #[inline]
    pub const fn losing() -> Bounds {
        Bounds {
            phi: Self::INFTY,
            delta: 0,
        }
    }

    /// True if the side to move is proven to win.
    #[inline]
    pub const fn is_winning(self) -> bool {
        self.phi == 0
    }

    /// True if the side to move is proven to lose.
    #[inline]
    pub const fn is_losing(self) -> bool {
        self.delta == 0
    }

    /// True if either outcome is proven.
    #[inline]
    pub const fn is_solved(self) -> bool {
        self.is_winning() || self.is_losing()
    }

    /// True if both components strictly exceed the other's.
    #[inline]
    pub const fn greater_than(self, other: Bounds) -> bool {
        self.phi > other.phi && self.delta > other.delta
    }
}

impl Default for Bounds {
    /// Unexplored positions start at (1, 1).
    fn default() -> Bounds {
        Bounds { phi: 1, delta: 1 }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.phi, self.delta)
    }
}

#[cfg(test)]
mod tests {
    use super::Bounds;

    #[test]
    fn default_is_unexplored() {
        let bounds = Bounds::default();
        assert_eq!(bounds, Bounds::new(1, 1));
        assert!(!bounds.is_solved());
    }

    #[test]
    fn winning_and_losing_are_solved() {
        assert!(Bounds::winning().is_winning());
        assert!(!Bounds::winning().is_losing());
        assert!(Bounds::losing().is_losing());
        assert!(!Bounds::losing().is_winning());
        assert!(Bounds::winning().is_solved());
        assert!(Bounds::losing().is_solved());
    }

    #[test]
    fn greater_than_is_strict_in_both() {
        let small = Bounds::new(2, 3);
        let big = Bounds::new(5, 7);
        assert!(big.greater_than(small));
        assert!(!small.greater_than(big));
        assert!(!Bounds::new(5, 3).greater_than(small));
    }

    #[test]
    fn display_format() {
        assert_eq!(Bounds::new(3, 9).to_string(), "[3, 9]");
    }
}
