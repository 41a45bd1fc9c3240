// crates/powerlink-psi/src/common.rs
use crate::types::UNSIGNED32;

/// Represents the 64 bits relative time forwarded across the interface
/// once per cycle, split into two 32 bit halves as it appears in the
/// status buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeStamp {
    pub rel_time_low: UNSIGNED32,
    pub rel_time_high: UNSIGNED32,
}

impl TimeStamp {
    /// Returns the relative time as a single 64 bit value.
    pub fn as_u64(&self) -> u64 {
        ((self.rel_time_high as u64) << 32) | self.rel_time_low as u64
    }

    /// Splits a 64 bit relative time into its two halves.
    pub fn from_u64(rel_time: u64) -> Self {
        Self {
            rel_time_low: rel_time as u32,
            rel_time_high: (rel_time >> 32) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_halves() {
        let ts = TimeStamp::from_u64(0x0000_0002_8000_0001);
        assert_eq!(ts.rel_time_low, 0x8000_0001);
        assert_eq!(ts.rel_time_high, 2);
        assert_eq!(ts.as_u64(), 0x0000_0002_8000_0001);
    }
}
