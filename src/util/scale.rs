//! Linear remapping between the host's logical servo scale and the bus' raw position ranges.

/// Lowest logical servo position used by the host.
pub const SERVO_MIN: i32 = 1;
/// Highest logical servo position used by the host.
pub const SERVO_MAX: i32 = 180;

/// Range of goal positions the servo accepts on the bus.
pub const BUS_POSITION_RANGE: ScalarRange = ScalarRange { start: 1, end: 1023 };

/// Range the present position is reported in.
pub const REPLY_POSITION_RANGE: ScalarRange = ScalarRange { start: 1, end: 1000 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarRange {
    pub start: i32,
    pub end: i32,
}

impl ScalarRange {
    pub const fn new(start: i32, end: i32) -> Self {
        ScalarRange { start, end }
    }

    #[inline]
    pub fn clamp(&self, v: i32) -> i32 {
        let (lower, upper) = if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        };

        v.clamp(lower, upper)
    }
}

/// Maps `v` from `from` onto `to` without clamping; the result is truncated toward zero.
/// Float to int casts saturate, so any `i32` input is safe.
pub fn remap(v: i32, from: ScalarRange, to: ScalarRange) -> i32 {
    let span = from.end as f64 - from.start as f64;
    if span == 0.0 {
        return to.start;
    }

    let ratio = (v as f64 - from.start as f64) / span;
    (ratio * (to.end as f64 - to.start as f64) + to.start as f64) as i32
}

/// The logical scale a host uses for servo positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoScale {
    pub min: i32,
    pub max: i32,
}

impl Default for ServoScale {
    fn default() -> Self {
        ServoScale {
            min: SERVO_MIN,
            max: SERVO_MAX,
        }
    }
}

impl ServoScale {
    #[inline]
    fn logical(&self) -> ScalarRange {
        ScalarRange::new(self.min, self.max)
    }

    /// Converts a logical position into a bus goal position, saturating at the scale's ends.
    pub fn to_bus(&self, position: i32) -> i32 {
        let logical = self.logical();
        remap(logical.clamp(position), logical, BUS_POSITION_RANGE)
    }

    /// Converts a raw present position reading into a logical position.
    pub fn from_reply(&self, raw: i16) -> i32 {
        remap(raw as i32, REPLY_POSITION_RANGE, self.logical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_midpoint_maps_to_logical_midpoint() {
        let scale = ServoScale::default();
        assert_eq!(scale.from_reply(500), (SERVO_MIN + SERVO_MAX) / 2);
        assert_eq!(scale.from_reply(1), SERVO_MIN);
        assert_eq!(scale.from_reply(1000), SERVO_MAX);
    }

    #[test]
    fn logical_bounds_map_to_bus_bounds() {
        let scale = ServoScale::default();
        assert_eq!(scale.to_bus(SERVO_MIN), 1);
        assert_eq!(scale.to_bus(SERVO_MAX), 1023);
    }

    #[test]
    fn to_bus_saturates_out_of_scale_input() {
        let scale = ServoScale::default();
        assert_eq!(scale.to_bus(i32::MIN), scale.to_bus(SERVO_MIN));
        assert_eq!(scale.to_bus(-10), 1);
        assert_eq!(scale.to_bus(i32::MAX), scale.to_bus(SERVO_MAX));
        assert_eq!(scale.to_bus(5000), 1023);

        let reversed = ServoScale { min: 180, max: 1 };
        assert_eq!(reversed.to_bus(i32::MIN), 1023);
    }

    #[test]
    fn remap_extremes_do_not_overflow() {
        let wide = ScalarRange::new(i32::MIN, i32::MAX);
        assert_eq!(remap(i32::MIN, wide, BUS_POSITION_RANGE), 1);
        assert_eq!(remap(i32::MAX, wide, BUS_POSITION_RANGE), 1023);
        assert_eq!(remap(i32::MIN, REPLY_POSITION_RANGE, BUS_POSITION_RANGE), i32::MIN);
    }

    #[test]
    fn remap_degenerate_source() {
        let r = ScalarRange::new(5, 5);
        assert_eq!(remap(100, r, BUS_POSITION_RANGE), 1);
    }

    #[test]
    fn clamp_handles_reversed_range() {
        let r = ScalarRange::new(10, 0);
        assert_eq!(r.clamp(-3), 0);
        assert_eq!(r.clamp(42), 10);
    }
}
