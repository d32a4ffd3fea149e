//! Read/write policy for a cache tier.

use serde::{Deserialize, Serialize};

/// Controls whether a cache tier may be read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Read and write.
    Enabled,
    /// Read only.
    ReadOnly,
    /// Write only.
    WriteOnly,
    /// Neither read nor write.
    Disabled,
}

impl CachePolicy {
    /// Returns true if the tier may be read.
    #[must_use]
    pub const fn read_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::ReadOnly)
    }

    /// Returns true if the tier may be written.
    #[must_use]
    pub const fn write_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::WriteOnly)
    }

    /// Builds a policy from its two flags.
    #[must_use]
    pub const fn from_flags(read_enabled: bool, write_enabled: bool) -> Self {
        match (read_enabled, write_enabled) {
            (true, true) => Self::Enabled,
            (true, false) => Self::ReadOnly,
            (false, true) => Self::WriteOnly,
            (false, false) => Self::Disabled,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(CachePolicy::Enabled, true, true ; "enabled")]
    #[test_case(CachePolicy::ReadOnly, true, false ; "read_only")]
    #[test_case(CachePolicy::WriteOnly, false, true ; "write_only")]
    #[test_case(CachePolicy::Disabled, false, false ; "disabled")]
    fn test_policy_flags(policy: CachePolicy, read: bool, write: bool) {
        assert_eq!(policy.read_enabled(), read);
        assert_eq!(policy.write_enabled(), write);
        assert_eq!(CachePolicy::from_flags(read, write), policy);
    }
}
