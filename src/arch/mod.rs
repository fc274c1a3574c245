//! Architecture-specific code. Only the x86 (32-bit protected mode) backend exists.

pub mod x86;

/// Returns an identifier for the current CPU core. This core never runs on more than one.
pub fn core_id() -> u32 {
	0
}
