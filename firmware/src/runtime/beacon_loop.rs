//! Drives the shared control loop on the board and logs what it does.

use beacon_core::control::{ControlLoop, ControllerConfig, IterationOutcome, IterationReport};
use beacon_core::line::LineEvent;
use beacon_core::pattern::PatternExecutor;
use embassy_time::Delay;

use crate::hw::{Board, WAKE_FLAG};

pub fn run(board: Board, config: ControllerConfig) -> ! {
    let Board { led, serial, power } = board;
    let executor = PatternExecutor::new(led, Delay);
    let reader = WAKE_FLAG
        .take_reader()
        .expect("wake flag reader already claimed");
    let mut control: ControlLoop<'static, _, _, _, _> =
        ControlLoop::new(executor, serial, power, reader, config);

    match control.startup() {
        Ok(()) => defmt::info!(
            "beacon: startup pattern {}x{} Hz done",
            config.startup.count(),
            config.startup.frequency_hz()
        ),
        Err(error) => defmt::error!("beacon: startup failed: {}", defmt::Display2Format(&error)),
    }

    loop {
        match control.step() {
            Ok(report) => log_report(&report, control.state().power.sleep_cycles()),
            Err(error) => defmt::error!("control: {}", defmt::Display2Format(&error)),
        }
    }
}

fn log_report(report: &IterationReport, sleep_cycles: u32) {
    if report.line_event == Some(LineEvent::Overflow) {
        defmt::warn!("serial: line overflow, discarding until terminator");
    }

    match report.outcome {
        IterationOutcome::Heartbeat => defmt::trace!("heartbeat"),
        IterationOutcome::CommandDispatched(spec) => defmt::info!(
            "command: {} pulses at {} Hz ({} ms half-period), wake #{}",
            spec.count(),
            spec.frequency_hz(),
            spec.half_period_ms(),
            sleep_cycles
        ),
        IterationOutcome::CommandRejected(error) => {
            defmt::warn!("command: rejected: {}", defmt::Display2Format(&error));
        }
        IterationOutcome::ButtonDispatched => {
            defmt::info!("button: pattern played, wake #{}", sleep_cycles);
        }
    }
}
