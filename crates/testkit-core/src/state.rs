//! Shim lifecycle states.
//!
//! Stored as a `u8` in a single atomic by the shim so the signal handler can
//! read and publish it without locks.

/// `Uninstalled -> Installing -> Installed -> Firing`, with `Installing ->
/// Failed` when setup cannot complete and `Failed -> Installing` on retry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShimState {
    #[default]
    Uninstalled = 0,
    Installing = 1,
    Installed = 2,
    Failed = 3,
    Firing = 4,
}

impl ShimState {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a stored byte. Unknown values read as `Uninstalled`.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Installing,
            2 => Self::Installed,
            3 => Self::Failed,
            4 => Self::Firing,
            _ => Self::Uninstalled,
        }
    }

    /// True when an install attempt may start from this state.
    #[must_use]
    pub const fn can_begin_install(self) -> bool {
        matches!(self, Self::Uninstalled | Self::Failed)
    }

    /// True once handlers are live (including while one is running).
    #[must_use]
    pub const fn is_armed(self) -> bool {
        matches!(self, Self::Installed | Self::Firing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for s in [
            ShimState::Uninstalled,
            ShimState::Installing,
            ShimState::Installed,
            ShimState::Failed,
            ShimState::Firing,
        ] {
            assert_eq!(ShimState::from_u8(s.as_u8()), s);
        }
        assert_eq!(ShimState::from_u8(200), ShimState::Uninstalled);
    }

    #[test]
    fn install_gate() {
        assert!(ShimState::Uninstalled.can_begin_install());
        assert!(ShimState::Failed.can_begin_install());
        assert!(!ShimState::Installing.can_begin_install());
        assert!(!ShimState::Installed.can_begin_install());
        assert!(!ShimState::Firing.can_begin_install());
    }

    #[test]
    fn armed_states() {
        assert!(ShimState::Installed.is_armed());
        assert!(ShimState::Firing.is_armed());
        assert!(!ShimState::Failed.is_armed());
    }
}
