//! Minimal VGA text-mode console.
//!
//! This is an external collaborator in the sense the specification uses the term: the core only
//! needs `put`/`clear`/`write` to post diagnostics, nothing about its implementation is load
//! bearing for the tested invariants.

use core::ptr;

const VGA_BUFFER: *mut u8 = 0xb8000 as *mut u8;
const WIDTH: usize = 80;
const HEIGHT: usize = 25;
const DEFAULT_ATTR: u8 = 0x07;

static mut CURSOR: usize = 0;

/// Clears the screen and resets the cursor to the top left.
pub fn clear() {
	unsafe {
		for i in 0..(WIDTH * HEIGHT) {
			ptr::write_volatile(VGA_BUFFER.add(i * 2), b' ');
			ptr::write_volatile(VGA_BUFFER.add(i * 2 + 1), DEFAULT_ATTR);
		}
		#[allow(static_mut_refs)]
		{
			CURSOR = 0;
		}
	}
}

/// Writes a single character at the current cursor position, scrolling if needed.
pub fn put(c: u8) {
	unsafe {
		#[allow(static_mut_refs)]
		let cursor = &mut CURSOR;
		if c == b'\n' {
			*cursor += WIDTH - (*cursor % WIDTH);
		} else {
			ptr::write_volatile(VGA_BUFFER.add(*cursor * 2), c);
			ptr::write_volatile(VGA_BUFFER.add(*cursor * 2 + 1), DEFAULT_ATTR);
			*cursor += 1;
		}
		if *cursor >= WIDTH * HEIGHT {
			scroll();
			*cursor -= WIDTH;
		}
	}
}

unsafe fn scroll() {
	for i in WIDTH..(WIDTH * HEIGHT) {
		let byte = ptr::read_volatile(VGA_BUFFER.add(i * 2));
		let attr = ptr::read_volatile(VGA_BUFFER.add(i * 2 + 1));
		ptr::write_volatile(VGA_BUFFER.add((i - WIDTH) * 2), byte);
		ptr::write_volatile(VGA_BUFFER.add((i - WIDTH) * 2 + 1), attr);
	}
	for i in (HEIGHT - 1) * WIDTH..HEIGHT * WIDTH {
		ptr::write_volatile(VGA_BUFFER.add(i * 2), b' ');
		ptr::write_volatile(VGA_BUFFER.add(i * 2 + 1), DEFAULT_ATTR);
	}
}

/// Writes a UTF-8 string, dropping non-ASCII bytes onto the same cell they'd otherwise fill.
pub fn write_str(s: &str) {
	for byte in s.bytes() {
		put(byte);
	}
}
