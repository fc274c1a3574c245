//! The kernel library: every subsystem lives here, with [`bin.rs`](../bin.rs) providing only the
//! raw `_start` shim the linker script points at.

#![cfg_attr(not(test), no_std)]
#![allow(dead_code)]

pub mod arch;
pub mod console;
pub mod errno;
pub mod fs;
pub mod logger;
pub mod memory;
pub mod multiboot;
pub mod panic;
pub mod print;
pub mod power;
pub mod process;
pub mod syscall;

use crate::arch::x86::{gdt, idt, pit, sti};
use crate::memory::{config, malloc, paging};
use crate::process::task;

const KERNEL_VERSION: &str = "0.1";

/// Entry point called from `_start` once the CPU is in protected mode with a usable stack.
///
/// `magic` is the value the boot loader left in EAX; `multiboot_addr` is what it left in EBX.
/// Implements the boot order this core always follows: descriptor tables, console, interrupts,
/// timer, multiboot modules, paging (which also stands up the heap and clones the initial
/// address space), tasking, filesystem roots, then idle.
#[no_mangle]
pub extern "C" fn kernel_main(magic: u32, multiboot_addr: u32, initial_esp: u32) -> ! {
	console::clear();
	println!("booting kernel {KERNEL_VERSION}");

	gdt::init();
	idt::init();
	syscall::init();
	idt::register_irq(0, pit::tick);
	idt::register_exception(14, paging::page_fault_handler);

	pit::init(config::TIMER_FREQUENCY);
	sti();

	const MULTIBOOT_MAGIC: u32 = 0x2BADB002;
	if magic != MULTIBOOT_MAGIC {
		println!("warning: bootloader did not pass the expected multiboot magic");
	}

	malloc::init_placement(kernel_end());
	let module = unsafe { multiboot::first_module(multiboot_addr as usize) };
	if let Some(ref m) = module {
		malloc::init_placement(m.end);
	}

	paging::init_frames(config::PHYS_MEM_CEILING / memory::PAGE_SIZE);
	paging::init(
		malloc::placement_end(),
		config::KHEAP_START,
		config::KHEAP_INITIAL_SIZE,
	)
	.unwrap_or_else(|e| panic!("paging init failed: {e}"));
	malloc::install_heap(
		config::KHEAP_START,
		config::KHEAP_INITIAL_SIZE,
		config::KHEAP_MAX,
		config::HEAP_MIN_SIZE,
	);

	task::set_initial_esp(initial_esp as usize);
	task::init().unwrap_or_else(|e| panic!("task init failed: {e}"));

	if let Some(m) = module {
		let root = unsafe { fs::InitrdRoot::from_module(m.start, m.end) };
		let size = m.end - m.start;
		fs::install_root(root);
		println!("mounted initrd root, {size} bytes");
	} else {
		println!("no boot module supplied, filesystem root is empty");
	}

	println!("pid {} idle", task::getpid());
	loop {
		unsafe {
			core::arch::asm!("hlt");
		}
	}
}

/// First byte past the kernel image, supplied by the linker script.
fn kernel_end() -> usize {
	extern "C" {
		static _kernel_end: u8;
	}
	unsafe { &_kernel_end as *const u8 as usize }
}
