//! Blink patterns and the blocking executor that plays them.
//!
//! A [`BlinkSpec`] is a validated `(count, frequency)` pair. The executor turns
//! it into `count` on/off pulses, each half of the pulse lasting
//! `500 / frequency` milliseconds (integer division, so frequencies that do not
//! divide 500 evenly round the half-period down).
//!
//! Playback blocks for the full `count * 2 * half_period` milliseconds. Nothing
//! else is observed while a pattern runs, so a pattern always finishes before
//! the next interrupt or command is considered.

use core::fmt;
use core::ops::RangeInclusive;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Accepted pulse counts.
pub const COUNT_RANGE: RangeInclusive<u32> = 1..=100;
/// Accepted frequencies in hertz.
pub const FREQUENCY_RANGE: RangeInclusive<u32> = 1..=100;
/// Milliseconds in half a second; one period at 1 Hz is two of these.
pub const HALF_SECOND_MS: u32 = 500;

/// Played once at power-up.
pub const STARTUP_PATTERN: BlinkSpec = BlinkSpec::fixed(2, 5);
/// Played when the wake interrupt fires.
pub const BUTTON_PATTERN: BlinkSpec = BlinkSpec::fixed(3, 10);
/// Played on every idle iteration.
pub const HEARTBEAT_PATTERN: BlinkSpec = BlinkSpec::fixed(1, 1);

/// Out-of-range blink parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpecError {
    CountOutOfRange(u32),
    FrequencyOutOfRange(u32),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::CountOutOfRange(count) => write!(f, "count {count} out of range"),
            SpecError::FrequencyOutOfRange(freq) => write!(f, "frequency {freq} out of range"),
        }
    }
}

/// Validated blink parameters. Both fields are always non-zero.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlinkSpec {
    count: u32,
    frequency_hz: u32,
}

impl BlinkSpec {
    /// Validates and builds a spec.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when `count` lies outside [`COUNT_RANGE`] or
    /// `frequency_hz` lies outside [`FREQUENCY_RANGE`]. The count is checked
    /// first.
    pub fn new(count: u32, frequency_hz: u32) -> Result<Self, SpecError> {
        if !COUNT_RANGE.contains(&count) {
            return Err(SpecError::CountOutOfRange(count));
        }
        if !FREQUENCY_RANGE.contains(&frequency_hz) {
            return Err(SpecError::FrequencyOutOfRange(frequency_hz));
        }

        Ok(Self {
            count,
            frequency_hz,
        })
    }

    // Compile-time constructor for the built-in patterns.
    const fn fixed(count: u32, frequency_hz: u32) -> Self {
        assert!(matches!(count, 1..=100));
        assert!(matches!(frequency_hz, 1..=100));
        Self {
            count,
            frequency_hz,
        }
    }

    /// Number of on/off pulses.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.count
    }

    /// Pulse frequency in hertz.
    #[must_use]
    pub const fn frequency_hz(self) -> u32 {
        self.frequency_hz
    }

    /// Duration of each on or off phase in milliseconds (`500 / frequency`).
    #[must_use]
    pub const fn half_period_ms(self) -> u32 {
        HALF_SECOND_MS / self.frequency_hz
    }

    /// Total blocking time of the pattern in milliseconds.
    #[must_use]
    pub const fn duration_ms(self) -> u32 {
        self.count * 2 * self.half_period_ms()
    }
}

/// Plays blink patterns on a status LED using a blocking delay.
pub struct PatternExecutor<L, D> {
    led: L,
    delay: D,
}

impl<L, D> PatternExecutor<L, D>
where
    L: OutputPin,
    D: DelayNs,
{
    /// Wraps the LED output and delay provider.
    #[must_use]
    pub const fn new(led: L, delay: D) -> Self {
        Self { led, delay }
    }

    /// Plays `spec` to completion.
    ///
    /// The executor makes no promise about the LED level afterwards; callers
    /// that need it off call [`PatternExecutor::led_off`].
    ///
    /// # Errors
    ///
    /// Propagates the first LED output error; the pattern stops there.
    pub fn run(&mut self, spec: BlinkSpec) -> Result<(), L::Error> {
        let half_period = spec.half_period_ms();
        for _ in 0..spec.count() {
            self.led.set_high()?;
            self.delay.delay_ms(half_period);
            self.led.set_low()?;
            self.delay.delay_ms(half_period);
        }
        Ok(())
    }

    /// Deasserts the LED.
    ///
    /// # Errors
    ///
    /// Propagates the LED output error.
    pub fn led_off(&mut self) -> Result<(), L::Error> {
        self.led.set_low()
    }

    /// Returns the LED output.
    #[must_use]
    pub fn led(&self) -> &L {
        &self.led
    }

    /// Returns the delay provider.
    #[must_use]
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Consumes the executor and returns its parts.
    #[must_use]
    pub fn into_parts(self) -> (L, D) {
        (self.led, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_patterns_match_device_constants() {
        assert_eq!((STARTUP_PATTERN.count(), STARTUP_PATTERN.frequency_hz()), (2, 5));
        assert_eq!((BUTTON_PATTERN.count(), BUTTON_PATTERN.frequency_hz()), (3, 10));
        assert_eq!(
            (HEARTBEAT_PATTERN.count(), HEARTBEAT_PATTERN.frequency_hz()),
            (1, 1)
        );
        assert_eq!(HEARTBEAT_PATTERN.half_period_ms(), 500);
        assert_eq!(BUTTON_PATTERN.duration_ms(), 300);
    }

    #[test]
    fn half_period_rounds_down() {
        assert_eq!(BlinkSpec::new(1, 3).unwrap().half_period_ms(), 166);
        assert_eq!(BlinkSpec::new(1, 7).unwrap().half_period_ms(), 71);
        assert_eq!(BlinkSpec::new(1, 100).unwrap().half_period_ms(), 5);
    }

    #[test]
    fn out_of_range_specs_are_never_built() {
        assert_eq!(BlinkSpec::new(0, 5), Err(SpecError::CountOutOfRange(0)));
        assert_eq!(BlinkSpec::new(101, 5), Err(SpecError::CountOutOfRange(101)));
        assert_eq!(BlinkSpec::new(1, 0), Err(SpecError::FrequencyOutOfRange(0)));
        assert_eq!(
            BlinkSpec::new(1, 101),
            Err(SpecError::FrequencyOutOfRange(101))
        );
        assert_eq!(BlinkSpec::new(0, 0), Err(SpecError::CountOutOfRange(0)));
    }
}
