//! The kernel malloc facade: before the heap exists, a monotonic bump pointer serves every
//! allocation; once [`install_heap`] runs, everything routes through [`super::heap::Heap`]
//! instead. `kmalloc` is the plain case; `kmalloc_a`/`kmalloc_ap` additionally align the
//! allocation and report back the physical address backing it.

use crate::errno::KResult;
use crate::memory::heap::{Backend, Heap};
use crate::memory::paging::{self, PageDirectory};
use crate::memory::PAGE_SIZE;

static mut PLACEMENT: usize = 0;
static mut HEAP: Option<Heap<'static, PagingBackend>> = None;

/// Result of an allocation: its (identity, in the pre-heap case) virtual address, and the
/// physical address backing it.
pub struct Alloc {
	pub virt: usize,
	pub phys: usize,
}

/// Sets the bump allocator's starting point. Called once, right after the multiboot modules
/// have been parsed and `placement` has been raised past them.
pub fn init_placement(start: usize) {
	unsafe {
		PLACEMENT = start;
	}
}

/// Returns the current bump pointer, i.e. the first byte not yet claimed by any allocator.
pub fn placement_end() -> usize {
	unsafe { PLACEMENT }
}

struct PagingBackend;

impl Backend for PagingBackend {
	fn map_page(&mut self, addr: usize) -> KResult<()> {
		let dir = unsafe { &mut *paging::kernel_directory() };
		let page = paging::get_page(dir, addr, true)?.unwrap();
		paging::alloc_frame(page, true, true)
	}

	fn unmap_page(&mut self, addr: usize) {
		let dir = unsafe { &mut *paging::kernel_directory() };
		if let Ok(Some(page)) = paging::get_page(dir, addr, false) {
			paging::free_frame(page);
		}
	}
}

/// Creates the kernel heap over `[start, start + initial_size)`, growable to `max`, and
/// switches every subsequent allocation over to it. The heap's hole index lives inside that
/// same range (see [`Heap::create`]), so `start` must already be mapped and writable.
pub fn install_heap(start: usize, initial_size: usize, max: usize, min_size: usize) {
	unsafe {
		HEAP = Some(Heap::create(
			start,
			start + initial_size,
			max,
			min_size,
			true,
			false,
			PagingBackend,
		));
	}
}

fn heap() -> Option<&'static mut Heap<'static, PagingBackend>> {
	unsafe {
		#[allow(static_mut_refs)]
		HEAP.as_mut()
	}
}

fn bump_alloc(size: usize, align: bool) -> usize {
	unsafe {
		if align && PLACEMENT % PAGE_SIZE != 0 {
			PLACEMENT = (PLACEMENT + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
		}
		let addr = PLACEMENT;
		PLACEMENT += size;
		addr
	}
}

/// Plain allocation: neither aligned nor physical-address-reporting.
pub fn kmalloc(size: usize) -> KResult<usize> {
	match heap() {
		Some(h) => h.alloc(size, false),
		None => Ok(bump_alloc(size, false)),
	}
}

/// Page-aligned allocation, physical address reported.
pub fn kmalloc_a(size: usize) -> KResult<Alloc> {
	kmalloc_ap(size, PAGE_SIZE)
}

/// Page-aligned allocation with a caller-chosen alignment, physical address reported. Before
/// the heap exists this is exact (bump allocations are identity-mapped); afterwards the
/// physical address is recovered via the current page directory.
pub fn kmalloc_ap(size: usize, align: usize) -> KResult<Alloc> {
	match heap() {
		Some(h) => {
			let virt = h.alloc(size, align >= PAGE_SIZE)?;
			let dir = unsafe { &mut *paging::current_directory() };
			let phys = physical_of(dir, virt);
			Ok(Alloc { virt, phys })
		}
		None => {
			let addr = bump_alloc(size, true);
			Ok(Alloc {
				virt: addr,
				phys: addr,
			})
		}
	}
}

fn physical_of(dir: &mut PageDirectory, virt: usize) -> usize {
	let page = paging::get_page(dir, virt, false)
		.ok()
		.flatten()
		.expect("physical_of called on unmapped address");
	(page.frame() as usize) * PAGE_SIZE + (virt & (PAGE_SIZE - 1))
}

/// Frees a pointer previously returned by [`kmalloc`]/[`kmalloc_a`]/[`kmalloc_ap`]. Only valid
/// once the heap has been installed; pre-heap allocations are never freed.
pub fn kfree(ptr: usize) -> KResult<()> {
	match heap() {
		Some(h) => h.free(ptr),
		None => Ok(()),
	}
}
