//! Main control loop.
//!
//! Each call to [`ControlLoop::step`] performs one iteration:
//!
//! 1. If the serial port has a byte, feed it to the line assembler.
//! 2. If a command line is ready, clear the ready flag and parse it. A valid
//!    command plays its pattern, turns the LED off, runs the sleep-entry
//!    handshake and re-arms the serial port. An invalid one is dropped and the
//!    iteration ends.
//! 3. Otherwise, if the wake interrupt flag is raised, clear it and do the same
//!    with the fixed button pattern.
//! 4. Otherwise play one heartbeat pulse.
//!
//! A ready command always wins over a pending button event; the button event
//! stays raised and is handled on the following iteration.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::command::{ParseError, parse_command};
use crate::flag::FlagReader;
use crate::line::{LINE_CAPACITY, LineAssembler, LineEvent};
use crate::pattern::{
    BUTTON_PATTERN, BlinkSpec, HEARTBEAT_PATTERN, PatternExecutor, STARTUP_PATTERN,
};
use crate::power::{PowerConfig, PowerController, PowerHal, TransitionError};

/// Polled serial receiver.
pub trait SerialPort {
    /// Returns the next received byte, or `None` when nothing is waiting.
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Re-initializes the port after a low-power transition.
    fn rearm(&mut self);
}

/// Fixed device behaviour.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub startup: BlinkSpec,
    pub button: BlinkSpec,
    pub heartbeat: BlinkSpec,
    pub power: PowerConfig,
}

impl ControllerConfig {
    /// The device's compile-time constants.
    pub const DEFAULT: Self = Self {
        startup: STARTUP_PATTERN,
        button: BUTTON_PATTERN,
        heartbeat: HEARTBEAT_PATTERN,
        power: PowerConfig::DEFAULT,
    };

    /// Replaces the power configuration.
    #[must_use]
    pub const fn with_power(mut self, power: PowerConfig) -> Self {
        self.power = power;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Control loop states.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopPhase {
    IdleHeartbeat,
    DispatchCommand,
    DispatchButton,
}

/// What a single iteration did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IterationOutcome {
    /// Nothing pending; one heartbeat pulse played.
    Heartbeat,
    /// A serial command played, followed by the sleep handshake.
    CommandDispatched(BlinkSpec),
    /// A completed line failed to parse and was dropped.
    CommandRejected(ParseError),
    /// The button pattern played, followed by the sleep handshake.
    ButtonDispatched,
}

impl IterationOutcome {
    /// Loop state the iteration ran in. Rejected commands do not enter a
    /// dispatch state.
    #[must_use]
    pub const fn phase(self) -> Option<LoopPhase> {
        match self {
            IterationOutcome::Heartbeat => Some(LoopPhase::IdleHeartbeat),
            IterationOutcome::CommandDispatched(_) => Some(LoopPhase::DispatchCommand),
            IterationOutcome::ButtonDispatched => Some(LoopPhase::DispatchButton),
            IterationOutcome::CommandRejected(_) => None,
        }
    }

    /// Returns `true` when the iteration ended with a sleep/wake cycle.
    #[must_use]
    pub const fn slept(self) -> bool {
        matches!(
            self,
            IterationOutcome::CommandDispatched(_) | IterationOutcome::ButtonDispatched
        )
    }
}

/// Diagnostics for one iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IterationReport {
    /// Result of feeding the byte read this iteration, if any.
    pub line_event: Option<LineEvent>,
    pub outcome: IterationOutcome,
}

/// Errors raised while driving the loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlError<E> {
    /// The LED output failed.
    Output(E),
    /// The power controller refused a transition.
    Transition(TransitionError),
}

impl<E> From<TransitionError> for ControlError<E> {
    fn from(error: TransitionError) -> Self {
        Self::Transition(error)
    }
}

impl<E: fmt::Debug> fmt::Display for ControlError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Output(error) => write!(f, "LED output error: {error:?}"),
            ControlError::Transition(error) => error.fmt(f),
        }
    }
}

/// State owned by the loop and lent to the assembler and power controller.
#[derive(Clone, Debug)]
pub struct ControlState<const N: usize = LINE_CAPACITY> {
    pub line: LineAssembler<N>,
    pub power: PowerController,
}

impl<const N: usize> ControlState<N> {
    #[must_use]
    pub const fn new(power: PowerConfig) -> Self {
        Self {
            line: LineAssembler::new(),
            power: PowerController::new(power),
        }
    }
}

/// The device's top-level state machine.
pub struct ControlLoop<'f, L, D, S, H, const N: usize = LINE_CAPACITY> {
    executor: PatternExecutor<L, D>,
    serial: S,
    power_hal: H,
    interrupt: FlagReader<'f>,
    state: ControlState<N>,
    config: ControllerConfig,
}

impl<'f, L, D, S, H, const N: usize> ControlLoop<'f, L, D, S, H, N>
where
    L: OutputPin,
    D: DelayNs,
    S: SerialPort,
    H: PowerHal,
{
    /// Assembles the loop from its collaborators.
    #[must_use]
    pub fn new(
        executor: PatternExecutor<L, D>,
        serial: S,
        power_hal: H,
        interrupt: FlagReader<'f>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            executor,
            serial,
            power_hal,
            interrupt,
            state: ControlState::new(config.power),
            config,
        }
    }

    /// Plays the power-up pattern and leaves the LED off.
    ///
    /// # Errors
    ///
    /// Propagates LED output errors.
    pub fn startup(&mut self) -> Result<(), ControlError<L::Error>> {
        self.executor
            .run(self.config.startup)
            .and_then(|()| self.executor.led_off())
            .map_err(ControlError::Output)
    }

    /// Runs one loop iteration.
    ///
    /// # Errors
    ///
    /// Propagates LED output errors and power transition errors. The loop's
    /// state stays consistent, so callers may keep stepping afterwards.
    pub fn step(&mut self) -> Result<IterationReport, ControlError<L::Error>> {
        let line_event = self
            .serial
            .try_read_byte()
            .map(|byte| self.state.line.feed(byte));

        let outcome = if let Some(line) = self.state.line.take_command() {
            match parse_command(&line) {
                Ok(spec) => {
                    self.dispatch(spec)?;
                    IterationOutcome::CommandDispatched(spec)
                }
                Err(error) => IterationOutcome::CommandRejected(error),
            }
        } else if self.interrupt.take() {
            self.dispatch(self.config.button)?;
            IterationOutcome::ButtonDispatched
        } else {
            self.executor
                .run(self.config.heartbeat)
                .map_err(ControlError::Output)?;
            IterationOutcome::Heartbeat
        };

        Ok(IterationReport {
            line_event,
            outcome,
        })
    }

    fn dispatch(&mut self, spec: BlinkSpec) -> Result<(), ControlError<L::Error>> {
        self.state.power.begin_dispatch()?;

        let played = self
            .executor
            .run(spec)
            .and_then(|()| self.executor.led_off());

        // The handshake runs even after an LED failure so the power state
        // returns to idle.
        let slept = self.state.power.sleep_after_dispatch(&mut self.power_hal);
        self.serial.rearm();

        played.map_err(ControlError::Output)?;
        slept?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> &ControlState<N> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ControlState<N> {
        &mut self.state
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Returns `true` when the wake interrupt flag is currently raised.
    #[must_use]
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.is_raised()
    }

    #[must_use]
    pub fn executor(&self) -> &PatternExecutor<L, D> {
        &self.executor
    }

    #[must_use]
    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    #[must_use]
    pub fn power_hal(&self) -> &H {
        &self.power_hal
    }

    pub fn power_hal_mut(&mut self) -> &mut H {
        &mut self.power_hal
    }
}
