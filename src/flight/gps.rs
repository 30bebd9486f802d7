//! GPS stabilization.
//!
//! Raw accumulated positions are unreliable in three ways: the receiver
//! emits noise while it acquires satellites, some firmware writes a
//! placeholder initial position near (39.05, -94.88) in Kansas until lock,
//! and the transition from placeholder to real fix is one enormous jump.
//! The filter holds positions back until two consecutive reads agree, lets
//! a placeholder-latched flight teleport once to its real fix, and after
//! stabilization requires every output to be continuous with the last.

use crate::flight::header::POSITION_UNITS_PER_DEGREE;
use crate::utils::round6;

/// The maximum plausible movement between consecutive samples, in degrees.
///
/// At a six-second interval this is roughly 1.3 miles.
pub(crate) const MAX_JUMP_DEGREES: f64 = 0.02;

/// The placeholder latitude certain receivers report before satellite lock.
pub(crate) const KANSAS_LAT: f64 = 39.05;

/// The placeholder longitude certain receivers report before satellite lock.
pub(crate) const KANSAS_LONG: f64 = -94.88;

/// How close the preamble position must be to the placeholder to latch
/// placeholder handling, in degrees.
const KANSAS_LATCH_DEGREES: f64 = 0.1;

/// How far a sample may sit from the placeholder and still count as
/// pre-lock, in degrees.
const KANSAS_NEAR_DEGREES: f64 = 5.0;

/// How many non-placeholder outputs are allowed before large jumps are
/// rejected again.
const KANSAS_GRACE_SAMPLES: u32 = 50;

/// Consecutive close reads required before a position is trusted.
const STABILITY_WINDOW: u32 = 2;

/// Accumulators start at the shared slot default, not at zero.
const ACCUMULATOR_BASE: i32 = 240;

/// The raw delta bytes one record carried for one axis.
///
/// The high byte widens the delta to 16 bits; the low byte's sign flag
/// applies to the composed value. A record with no low byte does not
/// update the axis at all.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RawDelta {
    pub(crate) lo: Option<u8>,
    pub(crate) hi: Option<u8>,
    pub(crate) negate: bool,
}

impl RawDelta {
    fn value(self) -> Option<i32> {
        let lo = i32::from(self.lo?);
        let value = match self.hi {
            Some(hi) => i32::from(hi) << 8 | lo,
            None => lo,
        };
        Some(if self.negate { -value } else { value })
    }
}

/// Per-flight GPS state: the cumulative counters and the stabilization
/// state machine.
#[derive(Debug)]
pub(crate) struct GpsFilter {
    initial: Option<(f64, f64)>,
    lat_acc: i32,
    long_acc: i32,
    kansas: bool,
    stable_count: u32,
    candidate: Option<(f64, f64)>,
    last_good: Option<(f64, f64)>,
    non_kansas_count: u32,
}

impl GpsFilter {
    pub(crate) fn new(initial: Option<(f64, f64)>) -> GpsFilter {
        let kansas = initial.is_some_and(|(lat, long)| {
            (lat - KANSAS_LAT).abs() < KANSAS_LATCH_DEGREES
                && (long - KANSAS_LONG).abs() < KANSAS_LATCH_DEGREES
        });
        GpsFilter {
            initial,
            lat_acc: ACCUMULATOR_BASE,
            long_acc: ACCUMULATOR_BASE,
            kansas,
            stable_count: 0,
            candidate: None,
            last_good: None,
            non_kansas_count: 0,
        }
    }

    /// Feeds one record's raw GPS deltas and returns the position to emit
    /// with the current sample, if any.
    pub(crate) fn update(&mut self, lat_delta: RawDelta, long_delta: RawDelta) -> Option<(f64, f64)> {
        if let Some(delta) = lat_delta.value() {
            self.lat_acc = self.lat_acc.wrapping_add(delta);
        }
        if let Some(delta) = long_delta.value() {
            self.long_acc = self.long_acc.wrapping_add(delta);
        }
        let (initial_lat, initial_long) = self.initial?;
        if self.lat_acc == 0 && self.long_acc == 0 {
            self.stable_count = 0;
            self.candidate = None;
            self.last_good = None;
            return None;
        }
        let lat = initial_lat + f64::from(self.lat_acc - ACCUMULATOR_BASE) / POSITION_UNITS_PER_DEGREE;
        let long =
            initial_long + f64::from(self.long_acc - ACCUMULATOR_BASE) / POSITION_UNITS_PER_DEGREE;
        let is_kansas_pos = self.kansas
            && (lat - KANSAS_LAT).abs() < KANSAS_NEAR_DEGREES
            && (long - KANSAS_LONG).abs() < KANSAS_NEAR_DEGREES;
        let allow_large_jump = self.kansas && self.non_kansas_count < KANSAS_GRACE_SAMPLES;

        let Some((candidate_lat, candidate_long)) = self.candidate else {
            self.candidate = Some((lat, long));
            self.stable_count = 1;
            return None;
        };
        let jump = (lat - candidate_lat).abs().max((long - candidate_long).abs());
        if !allow_large_jump && jump > MAX_JUMP_DEGREES {
            self.candidate = Some((lat, long));
            self.stable_count = 1;
            return None;
        }
        self.stable_count += 1;
        if self.stable_count < STABILITY_WINDOW {
            self.candidate = Some((lat, long));
            return None;
        }
        if !allow_large_jump && self.non_kansas_count >= KANSAS_GRACE_SAMPLES {
            if let Some((good_lat, good_long)) = self.last_good {
                let jump = (lat - good_lat).abs().max((long - good_long).abs());
                if jump > MAX_JUMP_DEGREES {
                    self.candidate = Some((lat, long));
                    self.stable_count = 1;
                    return None;
                }
            }
        }
        if !is_kansas_pos {
            self.non_kansas_count += 1;
        }
        self.candidate = Some((lat, long));
        self.last_good = Some((lat, long));
        Some((round6(lat), round6(long)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lo(byte: u8) -> RawDelta {
        RawDelta {
            lo: Some(byte),
            hi: None,
            negate: false,
        }
    }

    fn none() -> RawDelta {
        RawDelta::default()
    }

    #[test]
    fn delta_composition() {
        assert_eq!(None, none().value());
        assert_eq!(Some(0x70), lo(0x70).value());
        assert_eq!(
            Some(0x1770),
            RawDelta {
                lo: Some(0x70),
                hi: Some(0x17),
                negate: false,
            }
            .value()
        );
        assert_eq!(
            Some(-0x1770),
            RawDelta {
                lo: Some(0x70),
                hi: Some(0x17),
                negate: true,
            }
            .value()
        );
        // a high byte without a low byte is not an update
        assert_eq!(
            None,
            RawDelta {
                lo: None,
                hi: Some(0x17),
                negate: false,
            }
            .value()
        );
    }

    #[test]
    fn no_preamble_position_never_emits() {
        let mut filter = GpsFilter::new(None);
        for _ in 0..10 {
            assert_eq!(None, filter.update(lo(1), lo(1)));
        }
    }

    #[test]
    fn emits_after_two_agreeing_reads() {
        let mut filter = GpsFilter::new(Some((40.0, -105.0)));
        assert_eq!(None, filter.update(none(), none()));
        let (lat, long) = filter.update(none(), none()).unwrap();
        assert_eq!(40.0, lat);
        assert_eq!(-105.0, long);
    }

    #[test]
    fn rejects_an_isolated_spike() {
        let mut filter = GpsFilter::new(Some((40.0, -105.0)));
        assert_eq!(None, filter.update(none(), none()));
        assert!(filter.update(none(), none()).is_some());
        // 300/6000 = 0.05 degrees, past the jump limit
        assert_eq!(
            None,
            filter.update(
                RawDelta {
                    lo: Some(0x2C),
                    hi: Some(0x01),
                    negate: false,
                },
                none(),
            )
        );
        // jump back down: still not trusted, the window restarts
        assert_eq!(
            None,
            filter.update(
                RawDelta {
                    lo: Some(0x2C),
                    hi: Some(0x01),
                    negate: true,
                },
                none(),
            )
        );
        // and now two agreeing reads again
        assert!(filter.update(none(), none()).is_some());
    }

    #[test]
    fn small_movement_tracks() {
        let mut filter = GpsFilter::new(Some((40.0, -105.0)));
        assert_eq!(None, filter.update(none(), none()));
        assert!(filter.update(none(), none()).is_some());
        // 60/6000 = 0.01 degrees per sample stays under the limit
        let (lat, _) = filter.update(lo(60), none()).unwrap();
        assert!((lat - 40.01).abs() < 1e-9);
        let (lat, _) = filter.update(lo(60), none()).unwrap();
        assert!((lat - 40.02).abs() < 1e-9);
    }

    #[test]
    fn kansas_placeholder_may_teleport_once() {
        let mut filter = GpsFilter::new(Some((KANSAS_LAT, KANSAS_LONG)));
        assert_eq!(None, filter.update(none(), none()));
        // placeholder position is emitted while latched
        assert!(filter.update(none(), none()).is_some());
        // teleport five degrees south: emitted immediately while the
        // placeholder grace period lasts
        let teleport = RawDelta {
            lo: Some(0x30),
            hi: Some(0x75),
            negate: true,
        };
        let (lat, _) = filter.update(teleport, none()).unwrap();
        assert!((lat - (KANSAS_LAT - 5.0)).abs() < 0.001);
        let (lat, _) = filter.update(none(), none()).unwrap();
        assert!((lat - (KANSAS_LAT - 5.0)).abs() < 0.001);
    }

    #[test]
    fn zeroed_accumulators_reset_the_window() {
        let mut filter = GpsFilter::new(Some((40.0, -105.0)));
        assert_eq!(None, filter.update(none(), none()));
        assert!(filter.update(none(), none()).is_some());
        // drive both accumulators to exactly zero
        let minus_base = RawDelta {
            lo: Some(0xF0),
            hi: None,
            negate: true,
        };
        assert_eq!(None, filter.update(minus_base, minus_base));
        // recovery needs the full stability window again
        let plus_base = RawDelta {
            lo: Some(0xF0),
            hi: None,
            negate: false,
        };
        assert_eq!(None, filter.update(plus_base, plus_base));
        assert!(filter.update(none(), none()).is_some());
    }
}
