//! Mock hardware shared by the scenario tests.
//!
//! Every mock appends to one [`Timeline`], so tests can assert on the exact
//! interleaving of LED edges, delays, the sleep handshake and serial re-arms.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use beacon_core::control::{ControlLoop, ControllerConfig, SerialPort};
use beacon_core::flag::InterruptFlag;
use beacon_core::pattern::PatternExecutor;
use beacon_core::power::{PowerHal, SleepDepth};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    LedHigh,
    LedLow,
    DelayMs(u32),
    ClearWakePending,
    EnterLowPower(SleepDepth),
    SerialRearm,
}

#[derive(Clone, Default)]
pub struct Timeline(Rc<RefCell<Vec<Event>>>);

impl Timeline {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn count(&self, event: Event) -> usize {
        self.0.borrow().iter().filter(|seen| **seen == event).count()
    }
}

pub struct MockLed(Timeline);

impl ErrorType for MockLed {
    type Error = Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.push(Event::LedLow);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.push(Event::LedHigh);
        Ok(())
    }
}

pub struct MockDelay(Timeline);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.push(Event::DelayMs(ns / 1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.push(Event::DelayMs(ms));
    }
}

pub struct MockSerial {
    timeline: Timeline,
    pub rx: VecDeque<u8>,
}

impl MockSerial {
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl SerialPort for MockSerial {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn rearm(&mut self) {
        self.timeline.push(Event::SerialRearm);
    }
}

pub struct MockPower(Timeline);

impl PowerHal for MockPower {
    fn clear_wake_pending(&mut self) {
        self.0.push(Event::ClearWakePending);
    }

    fn enter_low_power(&mut self, depth: SleepDepth) {
        self.0.push(Event::EnterLowPower(depth));
    }
}

pub type MockLoop<'f> = ControlLoop<'f, MockLed, MockDelay, MockSerial, MockPower>;

/// Builds a control loop wired to mocks sharing one timeline.
pub fn build_loop(flag: &InterruptFlag, config: ControllerConfig) -> (MockLoop<'_>, Timeline) {
    let timeline = Timeline::default();
    let delay = MockDelay(timeline.clone());
    let control = build_loop_with_delay(flag, config, &timeline, delay);
    (control, timeline)
}

/// Like [`build_loop`], with a caller-supplied delay that should log to
/// `timeline` itself.
pub fn build_loop_with_delay<'f, D: DelayNs>(
    flag: &'f InterruptFlag,
    config: ControllerConfig,
    timeline: &Timeline,
    delay: D,
) -> ControlLoop<'f, MockLed, D, MockSerial, MockPower> {
    let executor = PatternExecutor::new(MockLed(timeline.clone()), delay);
    let serial = MockSerial {
        timeline: timeline.clone(),
        rx: VecDeque::new(),
    };
    let power = MockPower(timeline.clone());
    let reader = flag.take_reader().expect("flag reader already claimed");
    ControlLoop::new(executor, serial, power, reader, config)
}

/// Expected timeline for `count` pulses with the given half-period.
pub fn pulses(count: u32, half_period_ms: u32) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..count {
        events.extend([
            Event::LedHigh,
            Event::DelayMs(half_period_ms),
            Event::LedLow,
            Event::DelayMs(half_period_ms),
        ]);
    }
    events
}

/// Expected timeline tail for a dispatch: LED off, handshake, re-arm.
pub fn sleep_handshake(depth: SleepDepth) -> Vec<Event> {
    vec![
        Event::LedLow,
        Event::ClearWakePending,
        Event::EnterLowPower(depth),
        Event::SerialRearm,
    ]
}
