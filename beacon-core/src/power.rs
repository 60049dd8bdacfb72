//! Power state controller and the sleep-entry handshake.
//!
//! The device rests in [`PowerState::ActiveIdle`], moves to
//! [`PowerState::ActiveDispatching`] while a command or button pattern plays,
//! and drops into [`PowerState::Sleeping`] once that pattern has finished.
//! Waking is synchronous: [`PowerHal::enter_low_power`] returns when the
//! hardware resumes and the controller goes straight back to `ActiveIdle`.
//!
//! # Wake line sharing
//!
//! On the reference board the wake input shares its net with the serial
//! flow-control signal. Clearing the pin's pending-interrupt indication flips
//! that signal, so the interrupt handler must leave it alone and only raise the
//! shared flag. The main loop clears the pending indication immediately before
//! halting instead. [`WakeLineRouting::Dedicated`] boards may let the handler
//! clear its own pending state; the pre-halt clear happens either way.
//!
//! An event that lands between the loop's last pending-work check and the halt
//! is not seen until the next wake. The handshake narrows that window but does
//! not close it.

use core::fmt;

use crate::flag::FlagRaiser;

/// Power states of the device.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PowerState {
    /// Resting state; heartbeat runs here.
    #[default]
    ActiveIdle,
    /// A command or button pattern is playing.
    ActiveDispatching,
    /// Halted until the next wake edge.
    Sleeping,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::ActiveIdle => f.write_str("active-idle"),
            PowerState::ActiveDispatching => f.write_str("active-dispatching"),
            PowerState::Sleeping => f.write_str("sleeping"),
        }
    }
}

/// How the wake input is routed on the board.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WakeLineRouting {
    /// Wake input shares its net with serial flow control.
    #[default]
    SharedWithFlowControl,
    /// Wake input has a line of its own.
    Dedicated,
}

impl WakeLineRouting {
    /// Returns `true` when the interrupt handler may clear its own pending
    /// indication.
    #[must_use]
    pub const fn isr_may_clear_pending(self) -> bool {
        matches!(self, WakeLineRouting::Dedicated)
    }
}

/// Low-power mode entered after a dispatch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SleepDepth {
    /// CPU halt only; peripherals keep running.
    Sleep,
    /// Clocks stopped; peripherals may lose state until restored.
    #[default]
    DeepSleep,
}

/// Static power configuration.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PowerConfig {
    pub routing: WakeLineRouting,
    pub depth: SleepDepth,
}

impl PowerConfig {
    /// Shared wake line, deep sleep.
    pub const DEFAULT: Self = Self {
        routing: WakeLineRouting::SharedWithFlowControl,
        depth: SleepDepth::DeepSleep,
    };

    #[must_use]
    pub const fn new(routing: WakeLineRouting, depth: SleepDepth) -> Self {
        Self { routing, depth }
    }
}

/// Hardware hooks needed by the sleep-entry handshake.
pub trait PowerHal {
    /// Clears the wake line's pending-interrupt indication.
    fn clear_wake_pending(&mut self);

    /// Saves state, halts, and restores state after the hardware wakes.
    ///
    /// Blocks until the device resumes.
    fn enter_low_power(&mut self, depth: SleepDepth);
}

/// Failure reported when attempting an invalid state transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionError {
    pub from: PowerState,
    pub to: PowerState,
}

impl TransitionError {
    #[must_use]
    pub const fn new(from: PowerState, to: PowerState) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid power transition {} -> {}", self.from, self.to)
    }
}

/// Tracks the power state and runs the sleep-entry handshake.
#[derive(Clone, Debug)]
pub struct PowerController {
    state: PowerState,
    config: PowerConfig,
    sleep_cycles: u32,
}

impl PowerController {
    #[must_use]
    pub const fn new(config: PowerConfig) -> Self {
        Self {
            state: PowerState::ActiveIdle,
            config,
            sleep_cycles: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> PowerState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> PowerConfig {
        self.config
    }

    /// Number of completed sleep/wake cycles.
    #[must_use]
    pub const fn sleep_cycles(&self) -> u32 {
        self.sleep_cycles
    }

    fn transition(&mut self, to: PowerState) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.state, to),
            (PowerState::ActiveIdle, PowerState::ActiveDispatching)
                | (PowerState::ActiveDispatching, PowerState::Sleeping)
                | (PowerState::Sleeping, PowerState::ActiveIdle)
        );

        if allowed {
            self.state = to;
            Ok(())
        } else {
            Err(TransitionError::new(self.state, to))
        }
    }

    /// Marks the start of a command or button dispatch.
    ///
    /// # Errors
    ///
    /// Fails unless the controller is in [`PowerState::ActiveIdle`].
    pub fn begin_dispatch(&mut self) -> Result<(), TransitionError> {
        self.transition(PowerState::ActiveDispatching)
    }

    /// Runs the sleep-entry handshake after a dispatched pattern completes.
    ///
    /// Clears the wake line's pending indication, halts at the configured
    /// depth, and returns in [`PowerState::ActiveIdle`] once the hardware
    /// wakes. The caller re-arms the serial interface afterwards.
    ///
    /// # Errors
    ///
    /// Fails without touching the hardware unless the controller is in
    /// [`PowerState::ActiveDispatching`].
    pub fn sleep_after_dispatch<H>(&mut self, hal: &mut H) -> Result<(), TransitionError>
    where
        H: PowerHal + ?Sized,
    {
        self.transition(PowerState::Sleeping)?;

        hal.clear_wake_pending();
        hal.enter_low_power(self.config.depth);

        self.transition(PowerState::ActiveIdle)?;
        self.sleep_cycles = self.sleep_cycles.wrapping_add(1);
        Ok(())
    }
}

impl Default for PowerController {
    fn default() -> Self {
        Self::new(PowerConfig::DEFAULT)
    }
}

/// Interrupt-handler body for the wake line.
///
/// Raises the shared flag and, only when the routing allows it, clears the
/// pin's pending indication through `clear_pending`. Returns `true` when the
/// pending indication was cleared here, in which case the caller does not
/// need to mask the line to stop the interrupt re-entering.
#[must_use]
pub fn handle_wake_edge<F>(flag: &FlagRaiser<'_>, routing: WakeLineRouting, clear_pending: F) -> bool
where
    F: FnOnce(),
{
    flag.raise();

    if routing.isr_may_clear_pending() {
        clear_pending();
        true
    } else {
        false
    }
}
