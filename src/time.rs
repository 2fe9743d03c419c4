use hifitime::{Epoch, TimeScale, Unit};

use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Seconds per GPS week
pub const SECONDS_PER_WEEK: f64 = 604_800.0;

/// [GpsTime] is the (week, seconds in week) pair the estimator arithmetic
/// runs on, counted from the GPS epoch (1980-01-06T00:00:00 GPST).
/// The 0 <= seconds < 604800 invariant is restored after every operation.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct GpsTime {
    /// Week counter (no 10 bit truncation)
    pub week: i32,
    /// Seconds elapsed in week
    pub seconds: f64,
}

impl GpsTime {
    /// Builds a new [GpsTime], canonicalized.
    pub fn new(week: i32, seconds: f64) -> Self {
        Self { week, seconds }.canonicalized()
    }

    /// Restores the 0 <= seconds < 604800 invariant by moving
    /// whole weeks into the week counter.
    pub fn canonicalized(mut self) -> Self {
        let wrap = (self.seconds / SECONDS_PER_WEEK).floor();
        self.week += wrap as i32;
        self.seconds -= wrap * SECONDS_PER_WEEK;
        self
    }

    /// Builds [GpsTime] from [Epoch], expressed in [TimeScale::GPST].
    pub fn from_epoch(t: Epoch) -> Self {
        let (week, nanos) = t.to_time_scale(TimeScale::GPST).to_time_of_week();
        Self::new(week as i32, nanos as f64 / 1.0E9)
    }

    /// Converts to [Epoch] ([TimeScale::GPST]), truncated to 1 ns.
    pub fn to_epoch(&self) -> Epoch {
        let t = self.canonicalized();
        Epoch::from_time_of_week(t.week as u32, 0, TimeScale::GPST) + t.seconds * Unit::Second
    }

    /// Builds [GpsTime] from a UTC [Epoch] and an externally supplied
    /// leap second offset: the UTC calendar reading is taken as is, then
    /// offset. Use [Self::from_epoch] when the timescale conversion can be
    /// trusted to hifitime instead.
    pub fn from_utc_epoch(t: Epoch, leap_seconds: f64) -> Self {
        let (y, m, d, hh, mm, ss, ns) = t.to_gregorian_utc();
        let gpst = Epoch::from_gregorian(y, m, d, hh, mm, ss, ns, TimeScale::GPST);
        Self::from_epoch(gpst) + leap_seconds
    }

    /// Total seconds since the GPS epoch.
    pub fn serialized(&self) -> f64 {
        self.seconds + SECONDS_PER_WEEK * self.week as f64
    }

    /// Interval to (week, seconds), in seconds.
    /// Positive when the argument is later than self.
    pub fn interval(&self, week: i32, seconds: f64) -> f64 {
        seconds - self.seconds + (week - self.week) as f64 * SECONDS_PER_WEEK
    }
}

impl Add<f64> for GpsTime {
    type Output = GpsTime;
    fn add(self, seconds: f64) -> GpsTime {
        GpsTime::new(self.week, self.seconds + seconds)
    }
}

impl AddAssign<f64> for GpsTime {
    fn add_assign(&mut self, seconds: f64) {
        *self = *self + seconds;
    }
}

impl Sub<f64> for GpsTime {
    type Output = GpsTime;
    fn sub(self, seconds: f64) -> GpsTime {
        self + (-seconds)
    }
}

impl SubAssign<f64> for GpsTime {
    fn sub_assign(&mut self, seconds: f64) {
        *self = *self - seconds;
    }
}

impl Sub<GpsTime> for GpsTime {
    type Output = f64;
    /// Interval in seconds, positive when self is later than rhs.
    fn sub(self, rhs: GpsTime) -> f64 {
        (self.seconds - rhs.seconds) + (self.week - rhs.week) as f64 * SECONDS_PER_WEEK
    }
}

impl PartialOrd for GpsTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.week.cmp(&other.week) {
            std::cmp::Ordering::Equal => self.seconds.partial_cmp(&other.seconds),
            ord => Some(ord),
        }
    }
}

impl std::fmt::Display for GpsTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} week {:.3} sec", self.week, self.seconds)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonicalization() {
        let t = GpsTime::new(2000, 604_800.0 + 1.5);
        assert_eq!(t.week, 2001);
        assert!((t.seconds - 1.5).abs() < 1E-9);

        let t = GpsTime::new(2000, -1.0);
        assert_eq!(t.week, 1999);
        assert!((t.seconds - 604_799.0).abs() < 1E-9);
    }

    #[test]
    fn week_crossing_interval() {
        let t0 = GpsTime::new(2000, 604_790.0);
        let t1 = GpsTime::new(2001, 10.0);
        assert!((t1 - t0 - 20.0).abs() < 1E-9);
        assert!((t0.interval(2001, 10.0) - 20.0).abs() < 1E-9);
    }
}
