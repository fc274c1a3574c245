//! The INT 0x80 syscall dispatcher: a small table of function pointers indexed by EAX, each
//! taking up to five arguments pulled from EBX, ECX, EDX, ESI, EDI.
//!
//! Out-of-range syscall numbers are not fatal here, unlike the tutorial this was learned from:
//! they return [`KernelError::BadSyscall`] encoded in EAX instead of panicking.

use crate::arch::x86::idt::{self, IntFrame};
use crate::errno::KernelError;
use crate::process::task;

type Handler = fn(&IntFrame) -> u32;

const TABLE: &[Handler] = &[sys_getpid, sys_fork];

fn sys_getpid(_frame: &IntFrame) -> u32 {
	task::getpid()
}

fn sys_fork(frame: &IntFrame) -> u32 {
	match task::fork(frame) {
		Ok(pid) => pid,
		Err(e) => encode_error(e),
	}
}

fn encode_error(e: KernelError) -> u32 {
	// Error codes are returned as negative values in EAX, the convention the rest of the table
	// follows for anything that can fail.
	(-(e as i32)) as u32
}

fn dispatch(frame: &mut IntFrame) {
	let id = frame.syscall_id() as usize;
	let ret = match TABLE.get(id) {
		Some(handler) => handler(frame),
		None => encode_error(KernelError::BadSyscall),
	};
	frame.set_syscall_return(ret);
}

/// Registers the syscall dispatcher on vector 0x80.
pub fn init() {
	idt::register_syscall(dispatch);
}
