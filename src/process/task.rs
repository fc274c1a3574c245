//! Task control blocks and the round-robin scheduler.
//!
//! Replaces the resumable-`read_eip`/sentinel trick with an explicit context-switch primitive,
//! [`swtch`], which is free of the undefined behaviour that trick would carry in a compiled
//! language: the outgoing task's registers are saved into its own `TaskContext` and the
//! incoming task's are loaded from its own, with no reliance on re-entering a single call frame
//! from a foreign stack.

use crate::arch::x86::idt::IntFrame;
use crate::arch::x86::{gdt, DEFAULT_FLAGS};
use crate::errno::KResult;
use crate::memory::malloc;
use crate::memory::paging::{self, PageDirectory};
use crate::memory::config::KERNEL_STACK_SIZE;
use core::mem::size_of;

pub type Pid = u32;

/// Saved callee-saved registers and resume address for a context switch. Kept separate from
/// [`Task`] itself purely so the assembly side has a stable, minimal layout to poke at.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct TaskContext {
	pub esp: u32,
	pub ebp: u32,
	pub eip: u32,
}

pub struct Task {
	pub id: Pid,
	pub ctx: TaskContext,
	pub page_directory: *mut PageDirectory,
	pub kernel_stack: usize,
	pub next: *mut Task,
}

extern "C" {
	/// Defined in `arch/x86/asm/switch.s`. Saves the current callee-saved registers and
	/// instruction pointer into `*old`, then loads `*new`'s and jumps there.
	fn swtch(old: *mut TaskContext, new: *const TaskContext);

	/// Defined in `arch/x86/asm/interrupts.s`: the tail every interrupt stub jumps to once its
	/// dispatcher returns, restoring segment registers and the pushed frame before `iret`ing. A
	/// forked child's context points here, so its first resumption replays a synthesized
	/// `IntFrame` rather than trying to return from a call frame it was never on the stack for.
	fn resume_frame();
}

static mut READY_QUEUE: *mut Task = core::ptr::null_mut();
static mut CURRENT_TASK: *mut Task = core::ptr::null_mut();
static mut NEXT_PID: Pid = 1;
static mut TASKING_INITIALISED: bool = false;
static mut INITIAL_ESP: usize = 0;

fn alloc_task() -> KResult<*mut Task> {
	let addr = malloc::kmalloc(size_of::<Task>())?;
	Ok(addr as *mut Task)
}

fn next_pid() -> Pid {
	unsafe {
		let id = NEXT_PID;
		NEXT_PID += 1;
		id
	}
}

/// Records the bootstrap stack pointer captured at kernel entry, used by [`move_stack`] to
/// compute the relocation offset.
pub fn set_initial_esp(esp: usize) {
	unsafe {
		INITIAL_ESP = esp;
	}
}

/// Sets up the kernel task (id 1) as the sole, current, ready task. Disables interrupts for the
/// duration, matching the discipline every structural task-list mutation follows.
pub fn init() -> KResult<()> {
	crate::arch::x86::wrap_disable_interrupts(|| -> KResult<()> {
		let kernel_task = alloc_task()?;
		unsafe {
			(*kernel_task).id = next_pid();
			(*kernel_task).ctx = TaskContext::default();
			(*kernel_task).page_directory = paging::current_directory();
			(*kernel_task).kernel_stack = 0;
			(*kernel_task).next = kernel_task;

			READY_QUEUE = kernel_task;
			CURRENT_TASK = kernel_task;
			TASKING_INITIALISED = true;
		}
		Ok(())
	})
}

/// Returns the running task's id.
pub fn getpid() -> Pid {
	unsafe { (*CURRENT_TASK).id }
}

/// Invoked from the timer IRQ. Round-robins to the next ready task.
pub fn switch_task(_frame: &mut IntFrame) {
	unsafe {
		if !TASKING_INITIALISED || CURRENT_TASK.is_null() {
			return;
		}
		let current = CURRENT_TASK;
		let next = (*current).next;
		if next == current {
			return;
		}
		CURRENT_TASK = next;
		paging::switch_page_directory((*next).page_directory);
		swtch(&mut (*current).ctx, &(*next).ctx);
	}
}

/// Clones the calling task's address space and appends a new task with its own kernel stack,
/// onto which a copy of `parent_frame` is placed (EAX forced to `0`). The child's context points
/// at [`resume_frame`], so when the scheduler first switches to it, it `iret`s straight back to
/// the instruction after the `int 0x80` that entered `fork`, with EAX already `0` — the parent
/// gets the child's pid from this call's ordinary return value, mirroring `fork(2)` semantics.
pub fn fork(parent_frame: &IntFrame) -> KResult<Pid> {
	crate::arch::x86::wrap_disable_interrupts(|| -> KResult<Pid> {
		unsafe {
			let parent = CURRENT_TASK;
			let cloned_dir = paging::clone_directory(&mut *(*parent).page_directory)?;

			let child = alloc_task()?;
			let child_pid = next_pid();
			(*child).id = child_pid;
			(*child).page_directory = cloned_dir;
			(*child).next = (*parent).next;
			(*parent).next = child;

			alloc_kernel_stack(&mut *child)?;
			let stack_top = (*child).kernel_stack + KERNEL_STACK_SIZE;
			let frame_addr = (stack_top - size_of::<IntFrame>()) as *mut IntFrame;
			frame_addr.write(*parent_frame);
			(*frame_addr).set_syscall_return(0);

			(*child).ctx = TaskContext {
				esp: frame_addr as u32,
				ebp: 0,
				eip: resume_frame as usize as u32,
			};

			Ok(child_pid)
		}
	})
}

/// Relocates the currently running task's stack to `[new_start - size, new_start)`, rewriting
/// saved base pointers found in the copied region. This is a heuristic: any word in the copied
/// range whose value happens to fall within `(old_esp, initial_esp)` is assumed to be a saved
/// base pointer and rewritten; callers must ensure no data-shaped integer lives there.
pub fn move_stack(new_start: usize, size: usize) -> KResult<()> {
	let dir = unsafe { &mut *(*CURRENT_TASK).page_directory };
	let mut addr = new_start - size;
	while addr < new_start {
		let page = paging::get_page(dir, addr, true)?.unwrap();
		paging::alloc_frame(page, false, true)?;
		addr += crate::memory::PAGE_SIZE;
	}

	// Flush the TLB so the newly-mapped pages are visible.
	paging::switch_page_directory(paging::current_directory());

	let (old_esp, old_ebp): (usize, usize) = unsafe {
		let esp: usize;
		let ebp: usize;
		core::arch::asm!("mov {}, esp", out(reg) esp);
		core::arch::asm!("mov {}, ebp", out(reg) ebp);
		(esp, ebp)
	};
	let initial_esp = unsafe { INITIAL_ESP };
	let offset = new_start as isize - initial_esp as isize;

	let len = initial_esp - old_esp;
	unsafe {
		core::ptr::copy_nonoverlapping(
			old_esp as *const u8,
			(new_start as isize - len as isize) as *mut u8,
			len,
		);
	}

	let new_base = (new_start as isize - len as isize) as usize;
	let mut i = 0;
	while i < len {
		let word_addr = new_base + i;
		let word = unsafe { (word_addr as *const usize).read() };
		if word > old_esp && word < initial_esp {
			let rewritten = (word as isize + offset) as usize;
			unsafe {
				(word_addr as *mut usize).write(rewritten);
			}
		}
		i += size_of::<usize>();
	}

	let new_esp = (old_esp as isize + offset) as usize;
	let new_ebp = (old_ebp as isize + offset) as usize;
	unsafe {
		core::arch::asm!("mov esp, {}", in(reg) new_esp);
		core::arch::asm!("mov ebp, {}", in(reg) new_ebp);
	}
	Ok(())
}

/// Allocates a fresh kernel stack of the standard size for a task and records it on the TCB.
/// Used by [`fork`] to give the child somewhere to build its resume frame; a future per-task TSS
/// would also point `esp0` at the top of this.
pub fn alloc_kernel_stack(task: &mut Task) -> KResult<()> {
	let addr = malloc::kmalloc(KERNEL_STACK_SIZE)?;
	task.kernel_stack = addr;
	Ok(())
}

/// Initial EFLAGS/selector values a freshly constructed task resumes with, kept for callers
/// building a task context from scratch rather than via `fork`.
pub fn default_flags() -> usize {
	DEFAULT_FLAGS
}

pub fn kernel_code_selector() -> u16 {
	gdt::KERNEL_CS
}
