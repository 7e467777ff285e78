//! Status codes for the time-stepping driver

/// Terminal status of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Reached the end time.
    Success,
    /// The user's `ODE::update` hook vetoed a shift.
    Interrupted,
    /// The rejection budget was exhausted without an accepted slab.
    TooManyRejections,
}
