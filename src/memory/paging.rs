//! Two-level x86 paging: page directories, page tables, the page-fault handler, and
//! copy-on-fork address-space cloning.

use crate::arch::x86::idt::IntFrame;
use crate::errno::{KResult, KernelError};
use crate::memory::frame::FrameBitset;
use crate::memory::malloc;
use crate::memory::PAGE_SIZE;
use core::arch::asm;

const PRESENT: u32 = 1 << 0;
const RW: u32 = 1 << 1;
const USER: u32 = 1 << 2;
const ACCESSED: u32 = 1 << 5;
const DIRTY: u32 = 1 << 6;

/// A single page-table entry. Bits 12-31 hold the physical frame index; the low 12 bits carry
/// `present`/`rw`/`user`/`accessed`/`dirty` plus 7 reserved bits.
#[repr(transparent)]
#[derive(Clone, Copy, Default)]
pub struct Page(pub u32);

impl Page {
	pub fn present(&self) -> bool {
		self.0 & PRESENT != 0
	}

	pub fn frame(&self) -> u32 {
		self.0 >> 12
	}

	fn set_frame(&mut self, frame: u32) {
		self.0 = (self.0 & 0xfff) | (frame << 12);
	}

	fn set_flags(&mut self, rw: bool, user: bool) {
		self.0 = (self.0 & !0b111) | PRESENT | if rw { RW } else { 0 } | if user { USER } else { 0 };
	}

	fn clear(&mut self) {
		self.0 = 0;
	}
}

#[repr(C, align(4096))]
pub struct PageTable {
	pub pages: [Page; 1024],
}

impl PageTable {
	const fn zeroed() -> Self {
		Self {
			pages: [Page(0); 1024],
		}
	}
}

#[repr(C, align(4096))]
pub struct PageDirectory {
	/// Logical pointers to each of the 1024 possible page tables. Null when absent.
	pub tables: [*mut PageTable; 1024],
	/// Physical address of each table ORed with its permission bits, as the CPU wants it.
	pub tables_physical: [u32; 1024],
	/// Physical address of `tables_physical` itself: what gets loaded into CR3.
	pub self_physical: u32,
	/// Whether slot `i`'s table is shared with the kernel directory (not to be deep-cloned).
    shared: [bool; 1024],
}

static mut FRAME_STORAGE: [u32; (16 * 1024 * 1024 / PAGE_SIZE) / 32 + 1] =
	[0; (16 * 1024 * 1024 / PAGE_SIZE) / 32 + 1];
static mut FRAMES: Option<FrameBitset<'static>> = None;

static mut KERNEL_DIRECTORY: *mut PageDirectory = core::ptr::null_mut();
static mut CURRENT_DIRECTORY: *mut PageDirectory = core::ptr::null_mut();

extern "C" {
	/// Defined in `arch/x86/asm/switch.s`: copies one 4 KiB physical frame to another by
	/// temporarily disabling paging, so both addresses can be treated as physical.
	fn copy_page_physical(src: u32, dest: u32);
}

/// Initialises the global frame bitset over `nframes` physical frames.
pub fn init_frames(nframes: usize) {
	unsafe {
		#[allow(static_mut_refs)]
		let storage = &mut FRAME_STORAGE[..];
		FRAMES = Some(FrameBitset::new(storage, nframes));
	}
}

fn frames() -> &'static mut FrameBitset<'static> {
	unsafe {
		#[allow(static_mut_refs)]
		FRAMES.as_mut().expect("frame bitset not initialised")
	}
}

/// Allocates a frame for `page` if it doesn't already have one.
pub fn alloc_frame(page: &mut Page, is_kernel: bool, is_writable: bool) -> KResult<()> {
	if page.frame() != 0 {
		return Ok(());
	}
	let addr = frames().alloc()?;
	page.set_frame((addr / PAGE_SIZE) as u32);
	page.set_flags(is_writable, !is_kernel);
	Ok(())
}

/// Releases the frame backing `page`, if any.
pub fn free_frame(page: &mut Page) {
	if page.frame() == 0 {
		return;
	}
	let addr = (page.frame() as usize) * PAGE_SIZE;
	frames().clear(addr);
	page.clear();
}

/// Looks up (creating if `make` and absent) the page-table entry for `virt`.
pub fn get_page(dir: &mut PageDirectory, virt: usize, make: bool) -> KResult<Option<&mut Page>> {
	let table_idx = virt / PAGE_SIZE / 1024;
	let page_idx = (virt / PAGE_SIZE) % 1024;

	if dir.tables[table_idx].is_null() {
		if !make {
			return Ok(None);
		}
		let table_addr = malloc::kmalloc_ap(core::mem::size_of::<PageTable>(), PAGE_SIZE)?;
		let table_ptr = table_addr.virt as *mut PageTable;
		unsafe {
			table_ptr.write(PageTable::zeroed());
		}
		dir.tables[table_idx] = table_ptr;
		dir.tables_physical[table_idx] = (table_addr.phys as u32) | PRESENT | RW;
		dir.shared[table_idx] = false;
	}
	let table = unsafe { &mut *dir.tables[table_idx] };
	Ok(Some(&mut table.pages[page_idx]))
}

/// Sets up the kernel page directory, identity-maps everything allocated so far, creates and
/// maps the kernel heap range, and switches to it.
pub fn init(
	placement_end: usize,
	kheap_start: usize,
	kheap_initial_size: usize,
) -> KResult<()> {
	let dir_addr = malloc::kmalloc_a(core::mem::size_of::<PageDirectory>())?;
	let dir_ptr = dir_addr.virt as *mut PageDirectory;
	unsafe {
		(*dir_ptr).tables = [core::ptr::null_mut(); 1024];
		(*dir_ptr).tables_physical = [0; 1024];
		(*dir_ptr).shared = [true; 1024];
		(*dir_ptr).self_physical =
			(dir_addr.phys + offset_of_tables_physical()) as u32;
	}
	let dir = unsafe { &mut *dir_ptr };

	// Reserve (but don't yet back with frames) the heap's page-table slots, so identity-mapping
	// the rest of low memory below can't steal those table slots first.
	let mut addr = kheap_start;
	while addr < kheap_start + kheap_initial_size {
		get_page(dir, addr, true)?;
		addr += PAGE_SIZE;
	}

	// Identity map everything allocated so far (kernel image + bump allocations).
	let mut addr = 0;
	while addr < placement_end {
		let page = get_page(dir, addr, true)?.unwrap();
		alloc_frame(page, true, false)?;
		addr += PAGE_SIZE;
	}

	// Now back the reserved heap pages with real frames.
	let mut addr = kheap_start;
	while addr < kheap_start + kheap_initial_size {
		let page = get_page(dir, addr, true)?.unwrap();
		alloc_frame(page, true, true)?;
		addr += PAGE_SIZE;
	}

	unsafe {
		KERNEL_DIRECTORY = dir_ptr;
	}
	switch_page_directory(dir_ptr);
	Ok(())
}

fn offset_of_tables_physical() -> usize {
	// `tables_physical` follows `tables` (1024 pointers) in `PageDirectory`'s layout.
	core::mem::size_of::<[*mut PageTable; 1024]>()
}

/// Loads `dir` into CR3 and ensures paging is enabled.
pub fn switch_page_directory(dir: *mut PageDirectory) {
	unsafe {
		CURRENT_DIRECTORY = dir;
		let phys = (*dir).self_physical;
		asm!(
			"mov cr3, {0}",
			"mov {1}, cr0",
			"or {1}, 0x80000000",
			"mov cr0, {1}",
			in(reg) phys,
			out(reg) _,
		);
	}
}

/// Returns the directory currently loaded into CR3.
pub fn current_directory() -> *mut PageDirectory {
	unsafe { CURRENT_DIRECTORY }
}

/// Returns the kernel's own directory (shared by every cloned address space).
pub fn kernel_directory() -> *mut PageDirectory {
	unsafe { KERNEL_DIRECTORY }
}

fn clone_table(src: &PageTable) -> KResult<(*mut PageTable, u32)> {
	let addr = malloc::kmalloc_ap(core::mem::size_of::<PageTable>(), PAGE_SIZE)?;
	let table_ptr = addr.virt as *mut PageTable;
	unsafe {
		table_ptr.write(PageTable::zeroed());
	}
	let table = unsafe { &mut *table_ptr };
	for i in 0..1024 {
		if src.pages[i].frame() == 0 {
			continue;
		}
		let rw = src.pages[i].0 & RW != 0;
		let user = src.pages[i].0 & USER != 0;
		alloc_frame(&mut table.pages[i], !user, rw)?;
		table.pages[i].0 |= src.pages[i].0 & (ACCESSED | DIRTY);
		let src_phys = (src.pages[i].frame() as u32) * PAGE_SIZE as u32;
		let dest_phys = (table.pages[i].frame() as u32) * PAGE_SIZE as u32;
		unsafe {
			copy_page_physical(src_phys, dest_phys);
		}
	}
	Ok((table_ptr, addr.phys as u32))
}

/// Produces a new address space that shares the kernel's tables and deep-copies every other
/// table, so writes to a clone's user-space pages are never observed through the original.
pub fn clone_directory(src: &mut PageDirectory) -> KResult<*mut PageDirectory> {
	let dir_addr = malloc::kmalloc_a(core::mem::size_of::<PageDirectory>())?;
	let dir_ptr = dir_addr.virt as *mut PageDirectory;
	unsafe {
		(*dir_ptr).tables = [core::ptr::null_mut(); 1024];
		(*dir_ptr).tables_physical = [0; 1024];
		(*dir_ptr).shared = [false; 1024];
		(*dir_ptr).self_physical =
			(dir_addr.phys + offset_of_tables_physical()) as u32;
	}
	let dst = unsafe { &mut *dir_ptr };

	for i in 0..1024 {
		if src.tables[i].is_null() {
			continue;
		}
		if src.tables[i] == unsafe { (*KERNEL_DIRECTORY).tables[i] } {
			dst.tables[i] = src.tables[i];
			dst.tables_physical[i] = src.tables_physical[i];
			dst.shared[i] = true;
		} else {
			let src_table = unsafe { &*src.tables[i] };
			let (table_ptr, phys) = clone_table(src_table)?;
			let flags = src.tables_physical[i] & 0xfff;
			dst.tables[i] = table_ptr;
			dst.tables_physical[i] = phys | flags;
			dst.shared[i] = false;
		}
	}
	Ok(dir_ptr)
}

/// The page-fault handler, registered on vector 14.
pub fn page_fault_handler(frame: &mut IntFrame) {
	let cr2: usize = unsafe {
		let v: usize;
		asm!("mov {}, cr2", out(reg) v);
		v
	};
	let flags = frame.page_fault_flags();
	crate::println!(
		"page fault at {:#010x}: {} (eip={:#010x})",
		cr2, flags, frame.eip
	);
	let _ = KernelError::PageFault;
	crate::panic::with_frame(frame);
}
