//! Temporal synchronization wrappers reconciling the inertial sample rate
//! with the latency of satellite observations.

mod back_propagate;
mod real_time;

pub use back_propagate::BackPropagate;
pub use real_time::RealTime;
