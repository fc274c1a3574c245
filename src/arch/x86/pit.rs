//! The 8253/8254 PIT (Programmable Interval Timer), channel 0, used as the preemption clock.

use crate::arch::x86::io;
use crate::memory::config::PIT_BASE_FREQUENCY;
use core::sync::atomic::{AtomicU64, Ordering};

const CHANNEL_0: u16 = 0x40;
const COMMAND: u16 = 0x43;

const SELECT_CHANNEL_0: u8 = 0x00;
const ACCESS_LOBYTE_HIBYTE: u8 = 0x30;
const MODE_2_RATE_GENERATOR: u8 = 0x04;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Computes the PIT reload divisor for a target `frequency` in hertz.
pub const fn divisor(frequency: u32) -> u16 {
	(PIT_BASE_FREQUENCY / frequency) as u16
}

/// Programs channel 0 in rate-generator mode for `frequency` hertz.
pub fn init(frequency: u32) {
	let div = divisor(frequency);
	unsafe {
		io::outb(COMMAND, SELECT_CHANNEL_0 | ACCESS_LOBYTE_HIBYTE | MODE_2_RATE_GENERATOR);
		io::outb(CHANNEL_0, (div & 0xff) as u8);
		io::outb(CHANNEL_0, ((div >> 8) & 0xff) as u8);
	}
}

/// Called from the IRQ0 handler: increments the tick counter and drives the scheduler.
pub fn tick(frame: &mut crate::arch::x86::idt::IntFrame) {
	TICKS.fetch_add(1, Ordering::Relaxed);
	crate::process::task::switch_task(frame);
}

/// Returns the number of timer ticks observed since boot.
pub fn ticks() -> u64 {
	TICKS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn s6_divisor_byte_order() {
		let div = divisor(50);
		assert_eq!(div, 23863);
		assert_eq!((div & 0xff) as u8, 0x37);
		assert_eq!(((div >> 8) & 0xff) as u8, 0x5d);
	}
}
