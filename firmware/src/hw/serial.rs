//! Polled USART2 command channel.

use beacon_core::control::SerialPort;
use embassy_stm32::Peri;
use embassy_stm32::peripherals::{PA2, PA3, USART2};
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embedded_io::{Read, ReadReady};

use crate::board::COMMAND_UART_BAUD;

const UART_BUFFER_SIZE: usize = 64;

static mut UART_TX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART2_LPUART2 => embassy_stm32::usart::BufferedInterruptHandler<USART2>;
});

fn uart_config() -> UartConfig {
    let mut config = UartConfig::default();
    config.baudrate = COMMAND_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;
    config
}

/// Buffered UART polled one byte at a time.
pub struct UartSerial<'d> {
    uart: BufferedUart<'d>,
    config: UartConfig,
}

impl UartSerial<'static> {
    #[must_use]
    pub fn new(
        usart: Peri<'static, USART2>,
        tx_pin: Peri<'static, PA2>,
        rx_pin: Peri<'static, PA3>,
    ) -> Self {
        let config = uart_config();
        let uart = unsafe {
            BufferedUart::new(
                usart,
                rx_pin,
                tx_pin,
                &mut UART_TX_BUFFER,
                &mut UART_RX_BUFFER,
                UartIrqs,
                config,
            )
            .expect("failed to initialize command UART")
        };

        Self { uart, config }
    }
}

impl SerialPort for UartSerial<'_> {
    fn try_read_byte(&mut self) -> Option<u8> {
        match self.uart.read_ready() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(_) => {
                defmt::warn!("serial: UART status error");
                return None;
            }
        }

        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(_) => {
                defmt::warn!("serial: UART read error");
                None
            }
        }
    }

    fn rearm(&mut self) {
        // STOP mode gates the USART clock; reprogramming the peripheral puts
        // the receiver back into a known state.
        if self.uart.set_config(&self.config).is_err() {
            defmt::warn!("serial: UART re-arm failed");
        }
    }
}
