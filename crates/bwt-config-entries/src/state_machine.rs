//! Config Entry State Machine
//!
//! Enforces valid state transitions for the ConfigEntry lifecycle:
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry)
//!                            ↘ SetupRetry → SetupInProgress (auto-retry)
//!                            ↘ MigrationError (terminal)
//!
//! Loaded/SetupError/SetupRetry → UnloadInProgress → NotLoaded
//!                                                 ↘ FailedUnload (terminal)
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// Attempt a transition to a new state.
    ///
    /// Returns the new state if valid, or an error describing why the
    /// transition is invalid.
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let valid = match (self, to) {
            // From NotLoaded - can only start setup
            (NotLoaded, SetupInProgress) => true,

            // From SetupInProgress - can go to any setup result state
            (SetupInProgress, Loaded) => true,
            (SetupInProgress, SetupError) => true,
            (SetupInProgress, SetupRetry) => true,
            (SetupInProgress, MigrationError) => true,

            // From SetupError - can retry setup or start unload
            (SetupError, SetupInProgress) => true,
            (SetupError, UnloadInProgress) => true,

            // From SetupRetry - can retry setup or start unload
            (SetupRetry, SetupInProgress) => true,
            (SetupRetry, UnloadInProgress) => true,

            // From Loaded - can only start unload
            (Loaded, UnloadInProgress) => true,

            // From UnloadInProgress - can complete or fail
            (UnloadInProgress, NotLoaded) => true,
            (UnloadInProgress, FailedUnload) => true,

            // Terminal states - no transitions allowed
            (MigrationError, _) => false,
            (FailedUnload, _) => false,

            // All other transitions are invalid
            _ => false,
        };

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                reason: Self::transition_error_reason(self, to),
            })
        }
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }

    /// Get a human-readable reason for why a transition is invalid
    fn transition_error_reason(from: ConfigEntryState, to: ConfigEntryState) -> &'static str {
        use ConfigEntryState::*;

        match (from, to) {
            (MigrationError, _) => "MigrationError is terminal - entry cannot recover",
            (FailedUnload, _) => "FailedUnload is terminal - entry cannot recover",
            (Loaded, SetupInProgress) => "Already loaded - unload first before re-setup",
            (NotLoaded, Loaded) => "Cannot jump to Loaded - must go through SetupInProgress",
            (Loaded, NotLoaded) => "Cannot jump to NotLoaded - must go through UnloadInProgress",
            _ => "Invalid state transition",
        }
    }
}

/// Calculates retry delay in seconds with exponential backoff.
///
/// 2^min(tries, 4) * 5 plus a small jitter: 5s, 10s, 20s, 40s, 80s (then
/// stays at 80s). Used when setup signals "not ready yet".
pub fn calculate_retry_delay(tries: u32) -> f64 {
    let base_delay = 2_u32.pow(tries.min(4)) * 5;
    // Jitter (0-100ms) to prevent thundering herd
    let jitter = rand::random::<f64>() * 0.1;
    base_delay as f64 + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    #[test]
    fn test_valid_setup_transitions() {
        assert!(NotLoaded.can_transition_to(SetupInProgress));
        assert!(SetupInProgress.can_transition_to(Loaded));
        assert!(SetupInProgress.can_transition_to(SetupError));
        assert!(SetupInProgress.can_transition_to(SetupRetry));
        assert!(SetupInProgress.can_transition_to(MigrationError));
    }

    #[test]
    fn test_valid_retry_transitions() {
        assert!(SetupError.can_transition_to(SetupInProgress));
        assert!(SetupRetry.can_transition_to(SetupInProgress));
        assert!(SetupError.can_transition_to(UnloadInProgress));
        assert!(SetupRetry.can_transition_to(UnloadInProgress));
    }

    #[test]
    fn test_valid_unload_transitions() {
        assert!(Loaded.can_transition_to(UnloadInProgress));
        assert!(UnloadInProgress.can_transition_to(NotLoaded));
        assert!(UnloadInProgress.can_transition_to(FailedUnload));
    }

    #[test]
    fn test_invalid_transitions() {
        let result = NotLoaded.try_transition(Loaded);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.from, NotLoaded);
        assert_eq!(err.to, Loaded);

        assert!(!Loaded.can_transition_to(NotLoaded));
        assert!(!Loaded.can_transition_to(SetupInProgress));
        assert!(!SetupInProgress.can_transition_to(NotLoaded));
        assert!(!UnloadInProgress.can_transition_to(Loaded));
    }

    #[test]
    fn test_terminal_states() {
        for to in [
            NotLoaded,
            SetupInProgress,
            Loaded,
            SetupError,
            SetupRetry,
            UnloadInProgress,
        ] {
            assert!(!MigrationError.can_transition_to(to));
            assert!(!FailedUnload.can_transition_to(to));
        }
    }

    #[test]
    fn test_full_lifecycle_path() {
        // NotLoaded -> SetupInProgress -> Loaded -> UnloadInProgress -> NotLoaded
        let state = NotLoaded;
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        let state = state.try_transition(UnloadInProgress).unwrap();
        let state = state.try_transition(NotLoaded).unwrap();
        assert_eq!(state, NotLoaded);
    }

    #[test]
    fn test_not_ready_retry_path() {
        // Device unreachable at setup: SetupRetry then a later attempt succeeds
        let state = NotLoaded;
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(SetupRetry).unwrap();
        let state = state.try_transition(SetupInProgress).unwrap();
        let state = state.try_transition(Loaded).unwrap();
        assert_eq!(state, Loaded);
    }

    #[test]
    fn test_retry_delay_exponential_backoff() {
        // Base delays: 5, 10, 20, 40, 80 (then caps at 80)
        assert!((5.0..5.2).contains(&calculate_retry_delay(0)));
        assert!((10.0..10.2).contains(&calculate_retry_delay(1)));
        assert!((20.0..20.2).contains(&calculate_retry_delay(2)));
        assert!((40.0..40.2).contains(&calculate_retry_delay(3)));
        assert!((80.0..80.2).contains(&calculate_retry_delay(4)));
        assert!((80.0..80.2).contains(&calculate_retry_delay(9)));
    }
}
