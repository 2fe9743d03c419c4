#[cfg(feature = "serde")]
use serde::Deserialize;

/// Real-time compensation algorithm selection
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub enum RtMode {
    /// Exact per snapshot propagation of H and R
    #[default]
    Normal,
    /// Mean propagation closed form, cheaper on long snapshot runs
    LightWeight,
}

fn default_beta() -> f64 {
    1.0
}

/// Estimator configuration. All fields have sane defaults,
/// start from [Default] and customize what your application needs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct Config {
    /// Back propagation termination depth (s) beyond the last correction.
    /// 0 (the default) retro-corrects the latest snapshot only.
    #[cfg_attr(feature = "serde", serde(default))]
    pub back_propagate_depth: f64,

    /// Compensation algorithm of the [RealTime](crate::prelude::RealTime)
    /// synchronizer.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rt_mode: RtMode,

    /// Gauss-Markov reciprocal time constant of the receiver clock error
    /// channels (1/s). Applied to every clock, individual channels can be
    /// tuned on the filter afterwards.
    #[cfg_attr(feature = "serde", serde(default = "default_beta"))]
    pub beta_clock_error: f64,

    /// Gauss-Markov reciprocal time constant of the receiver clock error
    /// rate channels (1/s)
    #[cfg_attr(feature = "serde", serde(default = "default_beta"))]
    pub beta_clock_error_rate: f64,

    /// Minimal SV elevation angle (degrees) for a satellite to contribute.
    /// Use this as a simple quality criteria.
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_sv_elev: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            back_propagate_depth: 0.0,
            rt_mode: Default::default(),
            beta_clock_error: default_beta(),
            beta_clock_error_rate: default_beta(),
            min_sv_elev: None,
        }
    }
}

impl Config {
    /// Copies self with the desired back propagation depth (s)
    pub fn with_back_propagate_depth(&self, depth_s: f64) -> Self {
        let mut s = self.clone();
        s.back_propagate_depth = depth_s;
        s
    }

    /// Copies self with the desired [RtMode]
    pub fn with_rt_mode(&self, rt_mode: RtMode) -> Self {
        let mut s = self.clone();
        s.rt_mode = rt_mode;
        s
    }

    /// Copies self with the desired elevation mask (degrees)
    pub fn with_min_sv_elev(&self, elev_deg: f64) -> Self {
        let mut s = self.clone();
        s.min_sv_elev = Some(elev_deg);
        s
    }
}
