#![no_std]

// Control logic for the single-LED beacon.
//
// Everything here is hardware-agnostic: the firmware and the host emulator
// supply the LED, delay, serial and power implementations through the traits
// exposed by each module.

pub mod command;
pub mod control;
pub mod flag;
pub mod line;
pub mod pattern;
pub mod power;
