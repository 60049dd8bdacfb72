use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;

use crate::board::{CONTROLLER_CONFIG, SLEEP_DEPTH, WAKE_ROUTING};
use crate::hw;

mod beacon_loop;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) {
    defmt::info!(
        "beacon: boot (wake line {}, sleep {})",
        defmt::Debug2Format(&WAKE_ROUTING),
        defmt::Debug2Format(&SLEEP_DEPTH),
    );

    let board = hw::init();

    // The loop blocks in delays and WFI; nothing else runs on this executor.
    beacon_loop::run(board, CONTROLLER_CONFIG);
}
