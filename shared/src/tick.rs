use std::fmt;

/// A simulation tick. Ticks wrap around `u32::MAX`, so ordering is only
/// meaningful between ticks less than `2^31` apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct NetworkTick(u32);

impl NetworkTick {
    pub const fn new(tick: u32) -> Self {
        Self(tick)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// The tick `ticks` before this one
    pub fn rewind(&self, ticks: u32) -> Self {
        Self(self.0.wrapping_sub(ticks))
    }

    /// Signed wrapping distance from `other` to `self`.
    ///
    /// ```
    /// # use netcode_shared::NetworkTick;
    /// assert_eq!(NetworkTick::new(5).ticks_since(NetworkTick::new(2)), 3);
    /// assert_eq!(NetworkTick::new(2).ticks_since(NetworkTick::new(5)), -3);
    /// assert_eq!(NetworkTick::new(1).ticks_since(NetworkTick::new(u32::MAX)), 2);
    /// ```
    pub fn ticks_since(&self, other: NetworkTick) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    pub fn is_newer_than(&self, other: NetworkTick) -> bool {
        self.ticks_since(other) > 0
    }

    pub fn is_older_than(&self, other: NetworkTick) -> bool {
        self.ticks_since(other) < 0
    }
}

impl fmt::Display for NetworkTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
