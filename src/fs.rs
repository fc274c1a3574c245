//! The filesystem collaborator's interface, as seen from the core: opaque nodes with a handful
//! of capability-ish operation slots. The core never dispatches on a node itself — it just
//! stores the root handle produced at boot and hands it onward.

pub struct DirEntry {
	pub name: &'static str,
	pub ino: u32,
}

/// A filesystem node. Concrete filesystems (FAT16, initrd) implement this; the core only ever
/// holds a `&dyn Node` for the root.
pub trait Node {
	fn read(&self, offset: usize, buf: &mut [u8]) -> usize;
	fn write(&mut self, offset: usize, buf: &[u8]) -> usize;
	fn open(&mut self);
	fn close(&mut self);
	fn readdir(&self, index: usize) -> Option<DirEntry>;
	fn finddir(&self, name: &str) -> Option<u32>;
}

/// A read-only root backed by the boot module's raw bytes, with no directory structure of its
/// own. Stands in for whatever initrd/FAT16 reader the rest of the system plugs in; the core
/// only needs a root node to exist once boot reaches the "construct filesystem roots" stage.
pub struct InitrdRoot {
	image: &'static [u8],
}

impl InitrdRoot {
	/// # Safety
	/// `[start, end)` must be mapped, readable, and outlive every use of the returned root.
	pub unsafe fn from_module(start: usize, end: usize) -> Self {
		let image = core::slice::from_raw_parts(start as *const u8, end - start);
		Self { image }
	}
}

static mut ROOT: Option<InitrdRoot> = None;

/// Stores the boot-time root handle. Called once, after the filesystem roots are constructed.
pub fn install_root(root: InitrdRoot) {
	unsafe {
		ROOT = Some(root);
	}
}

/// Returns the installed root, if any filesystem roots were constructed at boot.
pub fn root() -> Option<&'static dyn Node> {
	unsafe {
		#[allow(static_mut_refs)]
		ROOT.as_ref().map(|r| r as &dyn Node)
	}
}

impl Node for InitrdRoot {
	fn read(&self, offset: usize, buf: &mut [u8]) -> usize {
		if offset >= self.image.len() {
			return 0;
		}
		let n = buf.len().min(self.image.len() - offset);
		buf[..n].copy_from_slice(&self.image[offset..offset + n]);
		n
	}

	fn write(&mut self, _offset: usize, _buf: &[u8]) -> usize {
		0
	}

	fn open(&mut self) {}

	fn close(&mut self) {}

	fn readdir(&self, _index: usize) -> Option<DirEntry> {
		None
	}

	fn finddir(&self, _name: &str) -> Option<u32> {
		None
	}
}
