//! A small ring-buffer log sink used by [`crate::print`] and [`crate::panic`].
//!
//! Logs are always retained in the buffer even when console echo is silenced with the `-silent`
//! boot argument; only the mirroring to the console collaborator is suppressed.

use crate::console;
use core::fmt;

const LOGS_SIZE: usize = 16 * 1024;

pub struct Logger {
	pub silent: bool,
	buf: [u8; LOGS_SIZE],
	write_head: usize,
	len: usize,
}

impl Logger {
	const fn new() -> Self {
		Self {
			silent: false,
			buf: [0; LOGS_SIZE],
			write_head: 0,
			len: 0,
		}
	}

	fn push(&mut self, byte: u8) {
		self.buf[self.write_head] = byte;
		self.write_head = (self.write_head + 1) % LOGS_SIZE;
		self.len = (self.len + 1).min(LOGS_SIZE);
	}

	/// Returns the buffered content in chronological order.
	pub fn get_content(&self) -> impl Iterator<Item = u8> + '_ {
		let start = if self.len < LOGS_SIZE {
			0
		} else {
			self.write_head
		};
		(0..self.len).map(move |i| self.buf[(start + i) % LOGS_SIZE])
	}
}

impl fmt::Write for Logger {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		for byte in s.bytes() {
			self.push(byte);
		}
		if !self.silent {
			console::write_str(s);
		}
		Ok(())
	}
}

/// Disables interrupts for the duration of the closure, then calls it with exclusive access to
/// the global logger. Mirrors the "disable interrupts around structural shared state" discipline
/// used everywhere else singletons are mutated in this kernel.
pub fn with_logger<F, R>(f: F) -> R
where
	F: FnOnce(&mut Logger) -> R,
{
	static mut LOGGER: Logger = Logger::new();
	crate::arch::x86::wrap_disable_interrupts(|| unsafe {
		#[allow(static_mut_refs)]
		f(&mut LOGGER)
	})
}
