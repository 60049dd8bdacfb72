//! Build-time board options.
//!
//! The reference board wires the wake button onto the USART2 CTS net and
//! sleeps in STOP. Cargo features select the alternatives.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use beacon_core::control::ControllerConfig;
use beacon_core::power::{PowerConfig, SleepDepth, WakeLineRouting};

pub const WAKE_ROUTING: WakeLineRouting = if cfg!(feature = "dedicated-wake-line") {
    WakeLineRouting::Dedicated
} else {
    WakeLineRouting::SharedWithFlowControl
};

pub const SLEEP_DEPTH: SleepDepth = if cfg!(feature = "light-sleep") {
    SleepDepth::Sleep
} else {
    SleepDepth::DeepSleep
};

pub const CONTROLLER_CONFIG: ControllerConfig =
    ControllerConfig::DEFAULT.with_power(PowerConfig::new(WAKE_ROUTING, SLEEP_DEPTH));

/// Baud rate of the command channel.
pub const COMMAND_UART_BAUD: u32 = 115_200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_matches_reference_board() {
        if cfg!(any(feature = "dedicated-wake-line", feature = "light-sleep")) {
            return;
        }
        assert_eq!(CONTROLLER_CONFIG, ControllerConfig::DEFAULT);
        assert!(!WAKE_ROUTING.isr_may_clear_pending());
    }

    #[test]
    fn patterns_are_never_overridden_by_board_options() {
        assert_eq!(CONTROLLER_CONFIG.startup, ControllerConfig::DEFAULT.startup);
        assert_eq!(CONTROLLER_CONFIG.button, ControllerConfig::DEFAULT.button);
        assert_eq!(CONTROLLER_CONFIG.heartbeat, ControllerConfig::DEFAULT.heartbeat);
    }
}
