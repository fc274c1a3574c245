//! The kernel's error taxonomy.
//!
//! Every kind here except [`KernelError::BadSyscall`] is fatal: the caller asserts success and
//! a failure is routed to [`crate::panic`]. `BadSyscall` is the one recoverable kind, surfaced
//! as a negative return value in the caller's register frame rather than panicking.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
	/// The physical frame bitset has no free frame left.
	OutOfFrames,
	/// A heap would have to grow past its configured maximum.
	OutOfVirtual,
	/// A heap block's header or footer magic does not match.
	CorruptedBlock,
	/// An ordered array insertion would exceed its capacity.
	IndexOverflow,
	/// The requested syscall number has no matching entry.
	BadSyscall,
	/// An unexpected page fault occurred.
	PageFault,
	/// A CPU exception fired with no registered handler.
	UnhandledException,
	/// An IRQ fired with no registered handler.
	UnhandledIrq,
}

impl fmt::Display for KernelError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let msg = match self {
			Self::OutOfFrames => "out of physical frames",
			Self::OutOfVirtual => "heap would exceed its maximum size",
			Self::CorruptedBlock => "corrupted heap block",
			Self::IndexOverflow => "ordered array overflow",
			Self::BadSyscall => "bad syscall number",
			Self::PageFault => "page fault",
			Self::UnhandledException => "unhandled exception",
			Self::UnhandledIrq => "unhandled IRQ",
		};
		write!(f, "{msg}")
	}
}

pub type KResult<T> = Result<T, KernelError>;
