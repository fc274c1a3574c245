//! The GDT (Global Descriptor Table): segments for ring 0/3 code and data plus the TSS.
//!
//! Six entries, matching the minimal layout a protected-mode kernel needs: null, kernel code,
//! kernel data, user code, user data, TSS.

use crate::arch::x86::tss::Tss;
use crate::memory::VirtAddr;
use core::mem::size_of;

extern "C" {
	/// Defined in `arch/x86/asm/boot.s`: loads the GDT descriptor pointed to by its argument
	/// and reloads every segment register, including a far jump to refresh CS.
	fn gdt_flush(desc: *const GdtDesc);
	/// Defined in `arch/x86/asm/boot.s`: loads the TSS selector with `ltr`.
	fn tss_flush(selector: u16);
}

pub const NULL: u16 = 0;
pub const KERNEL_CS: u16 = 8;
pub const KERNEL_DS: u16 = 16;
pub const USER_CS: u16 = 24;
pub const USER_DS: u16 = 32;
pub const TSS_SEL: u16 = 40;

const ENTRIES_COUNT: usize = 6;

/// A raw GDT entry, packed as the x86 descriptor format requires.
#[repr(transparent)]
#[derive(Clone, Copy, Default)]
pub struct Entry(pub u64);

impl Entry {
	pub const fn new(base: u32, limit: u32, access: u8, granularity: u8) -> Self {
		let mut val: u64 = 0;
		val |= (limit as u64) & 0xffff;
		val |= ((limit as u64) >> 16 & 0xf) << 48;
		val |= (base as u64 & 0xffffff) << 16;
		val |= ((base as u64 >> 24) & 0xff) << 56;
		val |= (access as u64) << 40;
		val |= (granularity as u64 & 0xf) << 52;
		Self(val)
	}

	pub fn is_present(&self) -> bool {
		(self.0 >> 47) & 1 != 0
	}
}

#[repr(C, packed)]
struct GdtDesc {
	size: u16,
	addr: VirtAddr,
}

static mut GDT: [Entry; ENTRIES_COUNT] = [Entry(0); ENTRIES_COUNT];
static mut TSS: Tss = Tss::new();

/// Builds the GDT and the TSS entry pointing at it, then loads it with `lgdt`.
pub fn init() {
	unsafe {
		#[allow(static_mut_refs)]
		let gdt = &mut GDT;
		gdt[0] = Entry(0);
		// Kernel code: present, ring 0, executable/readable, 4K granularity, 32-bit.
		gdt[1] = Entry::new(0, 0xfffff, 0b1001_1010, 0b1100);
		// Kernel data: present, ring 0, writable.
		gdt[2] = Entry::new(0, 0xfffff, 0b1001_0010, 0b1100);
		// User code: present, ring 3, executable/readable.
		gdt[3] = Entry::new(0, 0xfffff, 0b1111_1010, 0b1100);
		// User data: present, ring 3, writable.
		gdt[4] = Entry::new(0, 0xfffff, 0b1111_0010, 0b1100);

		#[allow(static_mut_refs)]
		let tss = &mut TSS;
		tss.ss0 = KERNEL_DS as u32;
		let tss_base = tss as *mut Tss as u32;
		let tss_limit = size_of::<Tss>() as u32 - 1;
		gdt[5] = Entry::new(tss_base, tss_limit, 0b1000_1001, 0b0000);

		flush();
		load_tss();
	}
}

/// Updates the kernel stack pointer the CPU will load into ESP on a ring 3 -> ring 0 transition.
pub fn set_kernel_stack(stack_top: usize) {
	unsafe {
		#[allow(static_mut_refs)]
		{
			TSS.esp0 = stack_top as u32;
		}
	}
}

fn flush() {
	unsafe {
		let desc = GdtDesc {
			size: (size_of::<[Entry; ENTRIES_COUNT]>() - 1) as u16,
			addr: VirtAddr(&raw const GDT as usize),
		};
		gdt_flush(&desc);
	}
}

fn load_tss() {
	unsafe {
		tss_flush(TSS_SEL);
	}
}
