use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    /// Bad signal data or an inconsistent covariance may cause the innovation
    /// matrix to become non invertible. The failing epoch is skipped, the
    /// filter is left untouched and the next epoch will try again.
    #[error("failed to invert innovation matrix")]
    MatrixInversion,

    /// No observation row survived the residual screening (no range entry,
    /// elevation mask, unhealthy satellite...): nothing to correct with.
    #[error("empty observation set after screening")]
    NoObservation,

    /// Clock jump was detected, but the residual after compensation still
    /// exceeds the allowable delta from true GPS time.
    #[error("unresolved receiver clock jump")]
    ClockJump,
}
