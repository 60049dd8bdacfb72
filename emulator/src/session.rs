use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use beacon_core::control::{ControlLoop, ControllerConfig, IterationOutcome, SerialPort};
use beacon_core::flag::InterruptFlag;
use beacon_core::line::LineEvent;
use beacon_core::pattern::PatternExecutor;
use beacon_core::power::{PowerConfig, PowerHal, SleepDepth, WakeLineRouting, handle_wake_edge};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "LED:<count>:<freq>",
        "any other line is sent over the simulated serial port",
    ),
    ("!button", "press the wake button"),
    ("!run [n]", "run n loop iterations (default 1)"),
    ("!status", "show power, line and flag state"),
    ("!help", "show this list"),
    ("exit", "close the session"),
];

/// Board options selectable from the command line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SessionOptions {
    pub power: PowerConfig,
}

impl SessionOptions {
    #[must_use]
    pub fn from_flags(dedicated_wake_line: bool, light_sleep: bool) -> Self {
        let routing = if dedicated_wake_line {
            WakeLineRouting::Dedicated
        } else {
            WakeLineRouting::SharedWithFlowControl
        };
        let depth = if light_sleep {
            SleepDepth::Sleep
        } else {
            SleepDepth::DeepSleep
        };

        Self {
            power: PowerConfig::new(routing, depth),
        }
    }
}

/// Virtual millisecond clock advanced only by the simulated delay.
#[derive(Clone, Default)]
struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }

    fn advance(&self, ms: u64) {
        self.0.set(self.0.get().saturating_add(ms));
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum HwEvent {
    LedOn,
    LedOff,
    Delay(u32),
    ClearWakePending,
    Halt(SleepDepth),
    SerialRearm,
}

#[derive(Clone)]
struct HwTrace {
    clock: SimClock,
    events: Rc<RefCell<Vec<(u64, HwEvent)>>>,
}

impl HwTrace {
    fn new(clock: SimClock) -> Self {
        Self {
            clock,
            events: Rc::default(),
        }
    }

    fn record(&self, event: HwEvent) {
        self.events
            .borrow_mut()
            .push((self.clock.now_ms(), event));
    }

    fn take(&self) -> Vec<(u64, HwEvent)> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

struct SimLed {
    trace: HwTrace,
}

impl ErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.trace.record(HwEvent::LedOff);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.trace.record(HwEvent::LedOn);
        Ok(())
    }
}

struct SimDelay {
    trace: HwTrace,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.trace.clock.advance(u64::from(ns.div_ceil(1_000_000)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.trace.record(HwEvent::Delay(ms));
        self.trace.clock.advance(u64::from(ms));
    }
}

struct SimSerial {
    trace: HwTrace,
    rx: VecDeque<u8>,
}

impl SerialPort for SimSerial {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn rearm(&mut self) {
        self.trace.record(HwEvent::SerialRearm);
    }
}

/// EXTI-style pending latch and NVIC mask for the wake input.
#[derive(Debug, Default)]
struct WakeLine {
    pending: bool,
    masked: bool,
}

struct SimPower {
    trace: HwTrace,
    wake_line: Rc<RefCell<WakeLine>>,
    asleep: Rc<Cell<bool>>,
}

impl PowerHal for SimPower {
    fn clear_wake_pending(&mut self) {
        let mut line = self.wake_line.borrow_mut();
        line.pending = false;
        line.masked = false;
        self.trace.record(HwEvent::ClearWakePending);
    }

    // The halt has to outlive this call on a host, so the session holds the
    // device asleep until the next button press.
    fn enter_low_power(&mut self, depth: SleepDepth) {
        self.trace.record(HwEvent::Halt(depth));
        self.asleep.set(true);
    }
}

type SimLoop = ControlLoop<'static, SimLed, SimDelay, SimSerial, SimPower>;

pub struct Session {
    control: SimLoop,
    flag: &'static InterruptFlag,
    options: SessionOptions,
    clock: SimClock,
    trace: HwTrace,
    wake_line: Rc<RefCell<WakeLine>>,
    asleep: Rc<Cell<bool>>,
    // Hardware activity after the halt instruction; reported at wake.
    after_wake: Vec<HwEvent>,
    transcript: TranscriptLogger,
}

impl Session {
    pub fn new(options: SessionOptions, transcript_path: Option<&Path>) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(transcript_path, options)?;
        let clock = SimClock::default();
        let trace = HwTrace::new(clock.clone());
        let wake_line = Rc::new(RefCell::new(WakeLine::default()));
        let asleep = Rc::new(Cell::new(false));

        // One flag per session, alive for the rest of the process like the
        // firmware's static.
        let flag: &'static InterruptFlag = Box::leak(Box::new(InterruptFlag::new()));

        let executor = PatternExecutor::new(
            SimLed {
                trace: trace.clone(),
            },
            SimDelay {
                trace: trace.clone(),
            },
        );
        let serial = SimSerial {
            trace: trace.clone(),
            rx: VecDeque::new(),
        };
        let power = SimPower {
            trace: trace.clone(),
            wake_line: Rc::clone(&wake_line),
            asleep: Rc::clone(&asleep),
        };
        let config = ControllerConfig::DEFAULT.with_power(options.power);
        let reader = flag
            .take_reader()
            .ok_or_else(|| io::Error::other("wake flag reader already claimed"))?;
        let control = ControlLoop::new(executor, serial, power, reader, config);

        Ok(Self {
            control,
            flag,
            options,
            clock,
            trace,
            wake_line,
            asleep,
            after_wake: Vec::new(),
            transcript,
        })
    }

    /// Plays the startup pattern.
    pub fn boot(&mut self) -> io::Result<Vec<String>> {
        let mut out = Vec::new();
        let banner = format!(
            "boot (wake line {}, {})",
            routing_label(self.options.power.routing),
            depth_label(self.options.power.depth)
        );
        self.emit(&mut out, self.clock.now_ms(), &banner)?;

        if let Err(error) = self.control.startup() {
            self.emit(&mut out, self.clock.now_ms(), &format!("ERR {error}"))?;
        }
        let events = self.trace.take();
        self.describe_events(&mut out, &events)?;
        Ok(out)
    }

    pub fn handle_input(&mut self, line: &str) -> io::Result<Vec<String>> {
        let at = self.clock.now_ms();
        self.transcript.append_line(at, TranscriptRole::Host, line)?;

        let mut out = Vec::new();
        match line.strip_prefix('!') {
            Some("button") => self.press_button(&mut out)?,
            Some("status") => self.status(&mut out)?,
            Some("help") => {
                for (topic, text) in HELP_TOPICS {
                    out.push(format!("{topic:<20} - {text}"));
                }
            }
            Some(run) if run == "run" || run.starts_with("run ") => {
                match parse_run_count(&run["run".len()..]) {
                    Ok(iterations) => self.run(&mut out, iterations)?,
                    Err(message) => self.emit(&mut out, at, &format!("ERR {message}"))?,
                }
            }
            Some(other) => self.emit(&mut out, at, &format!("ERR unknown command !{other}"))?,
            None => {
                let mut bytes = line.as_bytes().to_vec();
                bytes.push(b'\n');
                self.send_serial(&mut out, &bytes)?;
            }
        }
        Ok(out)
    }

    /// Queues raw bytes on the serial port and runs the loop until they are
    /// consumed or the device halts.
    pub fn send_serial(&mut self, out: &mut Vec<String>, bytes: &[u8]) -> io::Result<()> {
        if self.asleep.get() {
            let message = format!("serial: {} byte(s) lost while asleep", bytes.len());
            return self.emit(out, self.clock.now_ms(), &message);
        }

        self.control.serial_mut().rx.extend(bytes.iter().copied());
        self.drain_serial(out)
    }

    pub fn press_button(&mut self, out: &mut Vec<String>) -> io::Result<()> {
        let at = self.clock.now_ms();
        let routing = self.options.power.routing;

        let handler_ran = {
            let mut line = self.wake_line.borrow_mut();
            line.pending = true;
            if line.masked {
                false
            } else {
                let cleared =
                    handle_wake_edge(&self.flag.raiser(), routing, || line.pending = false);
                if !cleared {
                    line.masked = true;
                }
                true
            }
        };

        if !handler_ran {
            return self.emit(out, at, "wake edge latched; line masked until next sleep");
        }

        if self.asleep.replace(false) {
            self.emit(out, at, "wake edge")?;
            let resumed: Vec<(u64, HwEvent)> = std::mem::take(&mut self.after_wake)
                .into_iter()
                .map(|event| (at, event))
                .collect();
            self.describe_events(out, &resumed)?;
        } else {
            self.emit(out, at, "wake edge (awake)")?;
        }

        self.step(out)?;
        self.drain_serial(out)
    }

    pub fn run(&mut self, out: &mut Vec<String>, iterations: u32) -> io::Result<()> {
        for _ in 0..iterations {
            if self.asleep.get() {
                return self.emit(out, self.clock.now_ms(), "asleep; use !button to wake");
            }
            self.step(out)?;
        }
        Ok(())
    }

    fn status(&mut self, out: &mut Vec<String>) -> io::Result<()> {
        let at = self.clock.now_ms();
        let state = self.control.state();
        let lines = {
            let wake_line = self.wake_line.borrow();
            [
                format!(
                    "power: {} (asleep={}, sleep cycles={})",
                    state.power.state(),
                    self.asleep.get(),
                    state.power.sleep_cycles()
                ),
                format!(
                    "line: cursor={} discarding={} ready={}",
                    state.line.cursor(),
                    state.line.is_discarding(),
                    state.line.command_ready()
                ),
                format!(
                    "wake: flag={} pending={} masked={}",
                    self.control.interrupt_pending(),
                    wake_line.pending,
                    wake_line.masked
                ),
                format!("serial: {} byte(s) queued", self.control.serial().rx.len()),
            ]
        };

        for line in &lines {
            self.emit(out, at, line)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_asleep(&self) -> bool {
        self.asleep.get()
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    #[must_use]
    pub fn sleep_cycles(&self) -> u32 {
        self.control.state().power.sleep_cycles()
    }

    fn drain_serial(&mut self, out: &mut Vec<String>) -> io::Result<()> {
        while !self.control.serial().rx.is_empty() && !self.asleep.get() {
            self.step(out)?;
        }
        Ok(())
    }

    fn step(&mut self, out: &mut Vec<String>) -> io::Result<()> {
        let started = self.clock.now_ms();
        let report = match self.control.step() {
            Ok(report) => report,
            Err(error) => {
                self.trace.take();
                return self.emit(out, started, &format!("ERR {error}"));
            }
        };

        if report.line_event == Some(LineEvent::Overflow) {
            self.emit(out, started, "serial: line overflow, discarding until terminator")?;
        }

        match report.outcome {
            IterationOutcome::Heartbeat => {
                self.trace.take();
                return self.emit(out, started, "heartbeat");
            }
            IterationOutcome::CommandRejected(error) => {
                self.trace.take();
                return self.emit(out, started, &format!("command rejected: {error}"));
            }
            IterationOutcome::CommandDispatched(spec) => {
                let message = format!(
                    "command LED:{}:{} accepted",
                    spec.count(),
                    spec.frequency_hz()
                );
                self.emit(out, started, &message)?;
            }
            IterationOutcome::ButtonDispatched => {
                self.emit(out, started, "button event")?;
            }
        }

        let mut events = self.trace.take();
        if self.asleep.get()
            && let Some(halt) = events
                .iter()
                .position(|(_, event)| matches!(event, HwEvent::Halt(_)))
        {
            self.after_wake = events
                .split_off(halt + 1)
                .into_iter()
                .map(|(_, event)| event)
                .collect();
        }
        self.describe_events(out, &events)
    }

    fn describe_events(&mut self, out: &mut Vec<String>, events: &[(u64, HwEvent)]) -> io::Result<()> {
        let mut pattern = PatternSummary::default();
        let mut led_high = false;

        for &(at, event) in events {
            match event {
                HwEvent::LedOn => {
                    led_high = true;
                    pattern.pulse(at);
                }
                HwEvent::Delay(ms) => pattern.half_period_ms = ms,
                HwEvent::LedOff if led_high => led_high = false,
                HwEvent::LedOff => {
                    self.flush_pattern(out, &mut pattern)?;
                    self.emit(out, at, "led off")?;
                }
                HwEvent::ClearWakePending => {
                    self.flush_pattern(out, &mut pattern)?;
                    self.emit(out, at, "wake pending cleared")?;
                }
                HwEvent::Halt(depth) => {
                    let message = format!("halt ({})", depth_label(depth));
                    self.emit(out, at, &message)?;
                }
                HwEvent::SerialRearm => self.emit(out, at, "serial re-armed")?,
            }
        }

        self.flush_pattern(out, &mut pattern)
    }

    fn flush_pattern(&mut self, out: &mut Vec<String>, pattern: &mut PatternSummary) -> io::Result<()> {
        if let Some(started) = pattern.started_at {
            let message = format!(
                "led: {} pulse(s), {} ms half-period",
                pattern.pulses, pattern.half_period_ms
            );
            self.emit(out, started, &message)?;
        }
        *pattern = PatternSummary::default();
        Ok(())
    }

    fn emit(&mut self, out: &mut Vec<String>, at: u64, message: &str) -> io::Result<()> {
        let line = self
            .transcript
            .append_line(at, TranscriptRole::Emulator, message)?;
        out.push(line);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PatternSummary {
    started_at: Option<u64>,
    pulses: u32,
    half_period_ms: u32,
}

impl PatternSummary {
    fn pulse(&mut self, at: u64) {
        self.started_at.get_or_insert(at);
        self.pulses += 1;
    }
}

fn parse_run_count(rest: &str) -> Result<u32, String> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(1);
    }
    rest.parse()
        .map_err(|_| format!("invalid iteration count `{rest}`"))
}

fn routing_label(routing: WakeLineRouting) -> &'static str {
    match routing {
        WakeLineRouting::SharedWithFlowControl => "shared with CTS",
        WakeLineRouting::Dedicated => "dedicated",
    }
}

fn depth_label(depth: SleepDepth) -> &'static str {
    match depth {
        SleepDepth::Sleep => "sleep",
        SleepDepth::DeepSleep => "deep sleep",
    }
}

struct TranscriptLogger {
    writer: Option<BufWriter<File>>,
}

impl TranscriptLogger {
    fn new(path: Option<&Path>, options: SessionOptions) -> io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self { writer: None });
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: Some(BufWriter::new(file)),
        };

        logger.write_header(options)?;
        Ok(logger)
    }

    fn write_header(&mut self, options: SessionOptions) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        writeln!(writer, "# Beacon emulator transcript")?;
        writeln!(
            writer,
            "# Wake line {}, {}",
            routing_label(options.power.routing),
            depth_label(options.power.depth)
        )?;
        writeln!(writer, "# Timestamps are virtual milliseconds since boot")?;
        writeln!(writer)?;
        writer.flush()
    }

    /// Formats one transcript line, records it, and returns it.
    fn append_line(&mut self, at_ms: u64, role: TranscriptRole, line: &str) -> io::Result<String> {
        let formatted = format!("[+{at_ms:>6} ms] {} {line}", role.prefix());
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{formatted}")?;
            writer.flush()?;
        }
        Ok(formatted)
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
