//! Kernel panic handling.
//!
//! A kernel panic occurs when an error is raised that the kernel cannot recover from. There is
//! no recovery path: the only thing left to do is report what happened and halt.

use crate::arch::x86::idt::IntFrame;
use crate::arch::x86::cli;
use crate::{logger, power, println};
use core::fmt;
use core::panic::PanicInfo;

fn panic_impl(msg: impl fmt::Display, frame: Option<&IntFrame>) -> ! {
	cli();
	logger::with_logger(|l| l.silent = false);
	println!("-- KERNEL PANIC --");
	println!("reason: {msg}");
	if let Some(frame) = frame {
		println!("{frame}");
	}
	println!("-- end --");
	power::halt();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
	panic_impl(info.message(), None);
}

/// Exception names ordered by interrupt vector, for diagnostics.
static INT_REASONS: &[&str] = &[
	"Divide-by-zero Error",
	"Debug",
	"Non-maskable Interrupt",
	"Breakpoint",
	"Overflow",
	"Bound Range Exceeded",
	"Invalid Opcode",
	"Device Not Available",
	"Double Fault",
	"Coprocessor Segment Overrun",
	"Invalid TSS",
	"Segment Not Present",
	"Stack-Segment Fault",
	"General Protection Fault",
	"Page Fault",
	"Unknown",
	"x87 Floating-Point Exception",
	"Alignment Check",
	"Machine Check",
	"SIMD Floating-Point Exception",
	"Virtualization Exception",
	"Unknown",
	"Unknown",
	"Unknown",
	"Unknown",
	"Unknown",
	"Unknown",
	"Unknown",
	"Unknown",
	"Unknown",
	"Security Exception",
	"Unknown",
];

/// Panics with the context of an unhandled interrupt.
pub fn with_frame(frame: &IntFrame) -> ! {
	let reason = INT_REASONS
		.get(frame.int_no as usize)
		.copied()
		.unwrap_or("Unknown");
	panic_impl(reason, Some(frame));
}
