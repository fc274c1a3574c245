//! Physical and virtual memory types shared by the paging, heap, and bump-allocator modules.

pub mod frame;
pub mod heap;
pub mod malloc;
pub mod ordered_array;
pub mod paging;

use core::fmt;
use core::ops::{Add, Deref, DerefMut, Sub};

/// The size of a physical page/frame, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Boot-time tunables. Kept as plain constants rather than a parsed configuration file: this
/// core's entire tunable surface is small enough that a build-time config pipeline would be
/// pure ceremony.
pub mod config {
	/// Physical memory is assumed to extend no further than this. Not derived from the
	/// multiboot memory map: an open question left unresolved upstream, kept as a tunable here.
	pub const PHYS_MEM_CEILING: usize = 16 * 1024 * 1024;

	/// Start of the kernel heap's virtual range.
	pub const KHEAP_START: usize = 0xc000_0000;
	/// Initial size of the kernel heap.
	pub const KHEAP_INITIAL_SIZE: usize = 0x0010_0000;
	/// Highest address the kernel heap is allowed to grow to.
	pub const KHEAP_MAX: usize = 0xcfff_f000;
	/// The heap never contracts below this size.
	pub const HEAP_MIN_SIZE: usize = 0x0007_0000;

	/// Base frequency of the PIT oscillator, in hertz.
	pub const PIT_BASE_FREQUENCY: u32 = 1_193_180;
	/// Desired timer tick frequency.
	pub const TIMER_FREQUENCY: u32 = 50;

	/// Size of a task's kernel-mode stack.
	pub const KERNEL_STACK_SIZE: usize = 2048;
}

macro_rules! addr_impl {
	($name:ident) => {
		#[repr(transparent)]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
		pub struct $name(pub usize);

		impl $name {
			/// Returns `true` if the address is the null address.
			#[inline]
			pub const fn is_null(&self) -> bool {
				self.0 == 0
			}

			/// Returns `true` if the address is aligned to `align` (which must be a power of two).
			#[inline]
			pub const fn is_aligned_to(&self, align: usize) -> bool {
				self.0 & (align - 1) == 0
			}

			/// Rounds the address up to the next multiple of `align`.
			#[inline]
			pub const fn align_to(&self, align: usize) -> Self {
				Self((self.0 + align - 1) & !(align - 1))
			}

			/// Rounds the address down to the previous multiple of `align`.
			#[inline]
			pub const fn down_align_to(&self, align: usize) -> Self {
				Self(self.0 & !(align - 1))
			}
		}

		impl Deref for $name {
			type Target = usize;

			fn deref(&self) -> &usize {
				&self.0
			}
		}

		impl DerefMut for $name {
			fn deref_mut(&mut self) -> &mut usize {
				&mut self.0
			}
		}

		impl Add<usize> for $name {
			type Output = Self;

			fn add(self, rhs: usize) -> Self {
				Self(self.0.wrapping_add(rhs))
			}
		}

		impl Sub<usize> for $name {
			type Output = Self;

			fn sub(self, rhs: usize) -> Self {
				Self(self.0.wrapping_sub(rhs))
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}(0x{:08x})", stringify!($name), self.0)
			}
		}
	};
}

addr_impl!(PhysAddr);
addr_impl!(VirtAddr);
