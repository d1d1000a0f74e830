//! Maps `Box<dyn Error>` from trait boundaries to typed `FesError`.
//!
//! The traits in `fes_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `fes_hardware::HwError` downcasting.

use crate::error::FesError;

/// Map a trait-boundary error to a typed `FesError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FesError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<fes_hardware::error::HwError>() {
            return match hw {
                fes_hardware::error::HwError::Timeout => FesError::Timeout,
                fes_hardware::error::HwError::Store(msg) => FesError::Store(msg.clone()),
                other => FesError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FesError::Timeout
    } else {
        FesError::Hardware(s)
    }
}
