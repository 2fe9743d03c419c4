use std::collections::BTreeMap;

use crate::prelude::GpsTime;

/// Raw observation of one satellite, as sampled by the receiver
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Observation {
    /// Pseudo range (m). Without it, the satellite does not contribute.
    pub pseudo_range_m: Option<f64>,
    /// Pseudo range rate (m.s⁻¹)
    pub range_rate_m_s: Option<f64>,
    /// Receiver estimated range standard deviation (m)
    pub sigma_range_m: Option<f64>,
    /// Receiver estimated rate standard deviation (m.s⁻¹)
    pub sigma_rate_m_s: Option<f64>,
    /// Receiver supplied weight, non positive to force exclusion
    pub weight: Option<f64>,
}

impl Observation {
    /// Builds an [Observation] from a pseudo range reading
    pub fn from_pseudo_range(pseudo_range_m: f64) -> Self {
        Self {
            pseudo_range_m: Some(pseudo_range_m),
            ..Default::default()
        }
    }

    /// Attach a pseudo range rate reading
    pub fn with_range_rate(mut self, range_rate_m_s: f64) -> Self {
        self.range_rate_m_s = Some(range_rate_m_s);
        self
    }

    /// Attach the receiver range standard deviation
    pub fn with_sigma_range(mut self, sigma_m: f64) -> Self {
        self.sigma_range_m = Some(sigma_m);
        self
    }

    /// Attach the receiver rate standard deviation
    pub fn with_sigma_rate(mut self, sigma_m_s: f64) -> Self {
        self.sigma_rate_m_s = Some(sigma_m_s);
        self
    }

    /// Attach a receiver weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// One epoch of GNSS observations, conditioning one receiver clock channel
#[derive(Debug, Default, Clone)]
pub struct ObservationSet {
    /// Nominal receiver time of the epoch
    pub gps_time: GpsTime,
    /// Index of the augmented clock pair this epoch conditions
    pub clock_index: usize,
    /// Per PRN observations
    observations: BTreeMap<u8, Observation>,
}

impl ObservationSet {
    pub fn new(gps_time: GpsTime, clock_index: usize) -> Self {
        Self {
            gps_time,
            clock_index,
            observations: Default::default(),
        }
    }

    /// Inserts (replacing) the observation of one satellite
    pub fn insert(&mut self, prn: u8, observation: Observation) {
        self.observations.insert(prn, observation);
    }

    /// Observation of one satellite
    pub fn get(&self, prn: u8) -> Option<&Observation> {
        self.observations.get(&prn)
    }

    /// Iterates observations in PRN order
    pub fn iter(&self) -> impl Iterator<Item = (&u8, &Observation)> {
        self.observations.iter()
    }

    /// Number of observed satellites
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
