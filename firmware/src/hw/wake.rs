//! Wake button interrupt and the STOP-mode power hooks.

use beacon_core::flag::{FlagMonitor, InterruptFlag};
use beacon_core::power::{PowerHal, SleepDepth, handle_wake_edge};
use cortex_m::peripheral::{NVIC, SCB};
use embassy_stm32::Peri;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::interrupt::EXTI0_1 as WAKE_IRQ;
use embassy_stm32::pac;
use embassy_stm32::peripherals::PA0;
use pac::interrupt;

use crate::board::WAKE_ROUTING;

/// Raised by the `EXTI0_1` handler; taken by the control loop.
pub static WAKE_FLAG: InterruptFlag = InterruptFlag::new();

const WAKE_LINE: usize = 0;
// EXTICR source selector for GPIOA.
const PORT_A: u8 = 0;

fn clear_exti_pending() {
    pac::EXTI.fpr(0).write(|w| w.set_line(WAKE_LINE, true));
}

fn unmask_wake_irq() {
    NVIC::unpend(WAKE_IRQ);
    unsafe { NVIC::unmask(WAKE_IRQ) };
}

#[interrupt]
fn EXTI0_1() {
    let cleared = handle_wake_edge(&WAKE_FLAG.raiser(), WAKE_ROUTING, clear_exti_pending);
    if !cleared {
        // Pending stays latched; keep the handler from re-entering until the
        // loop clears it ahead of the next halt.
        NVIC::mask(WAKE_IRQ);
    }
}

/// Routes PA0 falling edges to EXTI line 0 and unmasks the interrupt.
#[must_use]
pub fn setup_wake_line(pin: Peri<'static, PA0>) -> Input<'static> {
    let input = Input::new(pin, Pull::Up);

    let exti = pac::EXTI;
    exti.exticr(WAKE_LINE / 4)
        .modify(|w| w.set_exti(WAKE_LINE % 4, PORT_A));
    exti.rtsr(0).modify(|w| w.set_line(WAKE_LINE, false));
    exti.ftsr(0).modify(|w| w.set_line(WAKE_LINE, true));
    clear_exti_pending();
    exti.imr(0).modify(|w| w.set_line(WAKE_LINE, true));
    unmask_wake_irq();

    input
}

/// [`PowerHal`] backed by WFI with SLEEPDEEP selecting STOP.
///
/// `PWR_CR1.LPMS` is left at its reset value, Stop 0.
pub struct StopModePower {
    scb: SCB,
    wake: FlagMonitor<'static>,
    _wake_pin: Input<'static>,
}

impl StopModePower {
    #[must_use]
    pub fn new(scb: SCB, wake_pin: Input<'static>, wake: FlagMonitor<'static>) -> Self {
        Self {
            scb,
            wake,
            _wake_pin: wake_pin,
        }
    }
}

impl PowerHal for StopModePower {
    fn clear_wake_pending(&mut self) {
        clear_exti_pending();
        unmask_wake_irq();
    }

    fn enter_low_power(&mut self, depth: SleepDepth) {
        match depth {
            SleepDepth::DeepSleep => {
                defmt::debug!("power: entering STOP");
                self.scb.set_sleepdeep();
            }
            SleepDepth::Sleep => {
                defmt::debug!("power: entering sleep");
                self.scb.clear_sleepdeep();
            }
        }

        // Other interrupts (the time driver in light sleep) also end WFI; only
        // a wake edge returns control to the loop.
        loop {
            cortex_m::asm::dsb();
            cortex_m::asm::wfi();
            if self.wake.is_raised() {
                break;
            }
        }

        self.scb.clear_sleepdeep();
        defmt::debug!("power: woke");
    }
}
