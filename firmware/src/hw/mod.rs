//! Board bring-up and the concrete collaborators handed to the control loop.
//!
//! Pin map (NUCLEO-G0B1RE):
//!
//! | Signal | Pin | Notes                                  |
//! |--------|-----|----------------------------------------|
//! | LED    | PA5 | push-pull, active high                 |
//! | Wake   | PA0 | EXTI0 falling edge, shares USART2 CTS  |
//! | TX     | PA2 | USART2                                 |
//! | RX     | PA3 | USART2                                 |

mod serial;
mod wake;

use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};

pub use serial::UartSerial;
pub use wake::{StopModePower, WAKE_FLAG};

/// Everything the control loop needs from the board.
pub struct Board {
    pub led: Output<'static>,
    pub serial: UartSerial<'static>,
    pub power: StopModePower,
}

/// Initializes clocks and peripherals. Call once at boot.
#[must_use]
pub fn init() -> Board {
    // The reset clock tree (HSI16) is also the clock STOP mode resumes on, so
    // nothing has to be restored after a wake.
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA2,
        PA3,
        PA5,
        USART2,
        ..
    } = hal::init(config);

    let core = cortex_m::Peripherals::take().expect("core peripherals already taken");

    let led = Output::new(PA5, Level::Low, Speed::Low);
    let serial = UartSerial::new(USART2, PA2, PA3);
    let wake_pin = wake::setup_wake_line(PA0);
    let power = StopModePower::new(core.SCB, wake_pin, WAKE_FLAG.monitor());

    Board { led, serial, power }
}
