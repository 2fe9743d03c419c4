#![doc = include_str!("../README.md")]

// private modules
mod cfg;
mod constants;
mod coords;
mod corrector;
mod ephemeris;
mod error;
mod filter;
mod ins;
mod measurement;
mod residual;
mod space_node;
mod sync;
mod time;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::cfg::{Config, RtMode};
    pub use crate::constants::SPEED_OF_LIGHT_M_S;
    pub use crate::coords::{Enu, Llh, Xyz};
    pub use crate::corrector::CorrectInfo;
    pub use crate::ephemeris::{
        Almanac, AlmanacRaw, Constellation, Ephemeris, EphemerisHistory, EphemerisRaw,
        IterationOrder,
    };
    pub use crate::error::Error;
    pub use crate::filter::InsFilter;
    pub use crate::ins::Ins;
    pub use crate::measurement::{Observation, ObservationSet};
    pub use crate::residual::{ReceiverState, RelativeProperty, ResidualGenerator};
    pub use crate::space_node::{IonoUtcParameters, IonoUtcRaw, NiellMapping, Satellite, SpaceNode};
    pub use crate::sync::{BackPropagate, RealTime};
    pub use crate::time::GpsTime;
    // re-export
    pub use hifitime::{Duration, Epoch, TimeScale};
    pub use nalgebra::Vector3;
}
