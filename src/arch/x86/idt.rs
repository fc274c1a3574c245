//! The IDT (Interrupt Descriptor Table): 256 vectors covering CPU exceptions (0-31), IRQs
//! (32-47, after the PIC remap in [`crate::arch::x86::pic`]), and the syscall gate (128).

use crate::arch::x86::{gdt, pic};
use crate::memory::VirtAddr;
use core::fmt;
use core::mem::size_of;

pub const SYSCALL_VECTOR: usize = 0x80;
const ENTRIES_COUNT: usize = 256;

/// The register frame an interrupt stub saves on the kernel stack before calling into Rust.
/// Field order matches what the assembly stubs in `arch/x86/asm/interrupts.s` actually push.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IntFrame {
	pub ds: u32,
	pub edi: u32,
	pub esi: u32,
	pub ebp: u32,
	pub esp: u32,
	pub ebx: u32,
	pub edx: u32,
	pub ecx: u32,
	pub eax: u32,
	pub int_no: u32,
	pub err_code: u32,
	pub eip: u32,
	pub cs: u32,
	pub eflags: u32,
	pub useresp: u32,
	pub ss: u32,
}

impl IntFrame {
	/// Returns the syscall number, read from EAX per the calling convention in `§4.9`.
	pub fn syscall_id(&self) -> u32 {
		self.eax
	}

	/// Returns the `n`th syscall argument (0-indexed), per the EBX/ECX/EDX/ESI/EDI ordering.
	pub fn syscall_arg(&self, n: usize) -> u32 {
		match n {
			0 => self.ebx,
			1 => self.ecx,
			2 => self.edx,
			3 => self.esi,
			4 => self.edi,
			_ => panic!("syscall argument index out of range"),
		}
	}

	/// Writes the syscall's return value back into EAX.
	pub fn set_syscall_return(&mut self, ret: u32) {
		self.eax = ret;
	}

	/// Decodes the page-fault error code bits (only meaningful when `int_no == 14`).
	pub fn page_fault_flags(&self) -> PageFaultFlags {
		PageFaultFlags(self.err_code)
	}
}

impl fmt::Display for IntFrame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"int={:#x} err={:#x} eip={:#010x} cs={:#x} eflags={:#010x}",
			self.int_no, self.err_code, self.eip, self.cs, self.eflags
		)
	}
}

/// Decoded page-fault error code, per the x86 manual's bit layout.
#[derive(Debug, Clone, Copy)]
pub struct PageFaultFlags(pub u32);

impl PageFaultFlags {
	pub fn present(&self) -> bool {
		self.0 & 1 != 0
	}

	pub fn write(&self) -> bool {
		self.0 & (1 << 1) != 0
	}

	pub fn user(&self) -> bool {
		self.0 & (1 << 2) != 0
	}

	pub fn reserved(&self) -> bool {
		self.0 & (1 << 3) != 0
	}
}

impl fmt::Display for PageFaultFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		let mut tag = |f: &mut fmt::Formatter<'_>, cond: bool, name: &str| -> fmt::Result {
			if cond {
				if !first {
					write!(f, " ")?;
				}
				first = false;
				write!(f, "{name}")?;
			}
			Ok(())
		};
		tag(f, self.present(), "present")?;
		tag(f, self.write(), "write")?;
		tag(f, self.user(), "user")?;
		tag(f, self.reserved(), "reserved")?;
		if first {
			write!(f, "not-present")?;
		}
		Ok(())
	}
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Descriptor {
	offset_lo: u16,
	selector: u16,
	zero: u8,
	flags: u8,
	offset_hi: u16,
}

impl Descriptor {
	const fn placeholder() -> Self {
		Self {
			offset_lo: 0,
			selector: 0,
			zero: 0,
			flags: 0,
			offset_hi: 0,
		}
	}

	fn new(address: usize, selector: u16, flags: u8) -> Self {
		Self {
			offset_lo: (address & 0xffff) as u16,
			selector,
			zero: 0,
			flags,
			offset_hi: ((address >> 16) & 0xffff) as u16,
		}
	}
}

#[repr(C, packed)]
struct Idtr {
	size: u16,
	addr: VirtAddr,
}

static mut IDT: [Descriptor; ENTRIES_COUNT] = [Descriptor::placeholder(); ENTRIES_COUNT];

/// A handler for a CPU exception or the syscall gate: receives the frame by mutable reference
/// so the syscall handler can write a return value back into it.
pub type Handler = fn(&mut IntFrame);
/// A handler for an external IRQ. EOI has already been sent before this runs.
pub type IrqHandler = fn(&mut IntFrame);

const NO_HANDLER: Option<Handler> = None;
static mut EXCEPTION_HANDLERS: [Option<Handler>; 32] = [NO_HANDLER; 32];
static mut IRQ_HANDLERS: [Option<IrqHandler>; 16] = [NO_HANDLER; 16];
static mut SYSCALL_HANDLER: Option<Handler> = None;

/// Registers `handler` for CPU exception vector `vector` (0-31).
pub fn register_exception(vector: usize, handler: Handler) {
	unsafe {
		#[allow(static_mut_refs)]
		{
			EXCEPTION_HANDLERS[vector] = Some(handler);
		}
	}
}

/// Registers `handler` for IRQ line `irq` (0-15).
pub fn register_irq(irq: usize, handler: IrqHandler) {
	unsafe {
		#[allow(static_mut_refs)]
		{
			IRQ_HANDLERS[irq] = Some(handler);
		}
	}
}

/// Registers the syscall dispatcher invoked on `int 0x80`.
pub fn register_syscall(handler: Handler) {
	unsafe {
		SYSCALL_HANDLER = Some(handler);
	}
}

extern "C" {
	fn error0();
	fn error1();
	fn error2();
	fn error3();
	fn error4();
	fn error5();
	fn error6();
	fn error7();
	fn error8();
	fn error9();
	fn error10();
	fn error11();
	fn error12();
	fn error13();
	fn error14();
	fn error15();
	fn error16();
	fn error17();
	fn error18();
	fn error19();
	fn error20();
	fn error21();
	fn error22();
	fn error23();
	fn error24();
	fn error25();
	fn error26();
	fn error27();
	fn error28();
	fn error29();
	fn error30();
	fn error31();

	fn irq0();
	fn irq1();
	fn irq2();
	fn irq3();
	fn irq4();
	fn irq5();
	fn irq6();
	fn irq7();
	fn irq8();
	fn irq9();
	fn irq10();
	fn irq11();
	fn irq12();
	fn irq13();
	fn irq14();
	fn irq15();

	fn syscall_stub();

	/// Defined in `arch/x86/asm/boot.s`: loads the IDT descriptor.
	fn idt_flush(desc: *const Idtr);
}

/// Remaps the PIC, fills every IDT entry, and loads the table with `lidt`.
pub fn init() {
	crate::arch::x86::cli();
	pic::init(0x20, 0x28);

	let errors: [usize; 32] = [
		error0 as usize,
		error1 as usize,
		error2 as usize,
		error3 as usize,
		error4 as usize,
		error5 as usize,
		error6 as usize,
		error7 as usize,
		error8 as usize,
		error9 as usize,
		error10 as usize,
		error11 as usize,
		error12 as usize,
		error13 as usize,
		error14 as usize,
		error15 as usize,
		error16 as usize,
		error17 as usize,
		error18 as usize,
		error19 as usize,
		error20 as usize,
		error21 as usize,
		error22 as usize,
		error23 as usize,
		error24 as usize,
		error25 as usize,
		error26 as usize,
		error27 as usize,
		error28 as usize,
		error29 as usize,
		error30 as usize,
		error31 as usize,
	];
	let irqs: [usize; 16] = [
		irq0 as usize,
		irq1 as usize,
		irq2 as usize,
		irq3 as usize,
		irq4 as usize,
		irq5 as usize,
		irq6 as usize,
		irq7 as usize,
		irq8 as usize,
		irq9 as usize,
		irq10 as usize,
		irq11 as usize,
		irq12 as usize,
		irq13 as usize,
		irq14 as usize,
		irq15 as usize,
	];

	unsafe {
		#[allow(static_mut_refs)]
		let idt = &mut IDT;
		for (i, addr) in errors.into_iter().enumerate() {
			idt[i] = Descriptor::new(addr, gdt::KERNEL_CS, 0x8e);
		}
		for (i, addr) in irqs.into_iter().enumerate() {
			idt[32 + i] = Descriptor::new(addr, gdt::KERNEL_CS, 0x8e);
		}
		idt[SYSCALL_VECTOR] = Descriptor::new(syscall_stub as usize, gdt::KERNEL_CS, 0xee);

		let desc = Idtr {
			size: (size_of::<[Descriptor; ENTRIES_COUNT]>() - 1) as u16,
			addr: VirtAddr(&raw const IDT as usize),
		};
		idt_flush(&desc);
	}
}

/// Called from the exception stubs. Dispatches to a registered handler, or falls back to an
/// unhandled-exception panic.
#[no_mangle]
extern "C" fn exception_dispatch(frame: &mut IntFrame) {
	let vector = (frame.int_no & 0xff) as usize;
	let handler = unsafe {
		#[allow(static_mut_refs)]
		EXCEPTION_HANDLERS[vector]
	};
	match handler {
		Some(h) => h(frame),
		None => crate::panic::with_frame(frame),
	}
}

/// Called from the IRQ stubs. Sends EOI, then dispatches to a registered handler if any.
#[no_mangle]
extern "C" fn irq_dispatch(frame: &mut IntFrame) {
	let irq = (frame.int_no - 32) as usize;
	pic::end_of_interrupt(irq as u8);
	let handler = unsafe {
		#[allow(static_mut_refs)]
		IRQ_HANDLERS[irq]
	};
	if let Some(h) = handler {
		h(frame);
	}
}

/// Called from the syscall stub.
#[no_mangle]
extern "C" fn syscall_dispatch(frame: &mut IntFrame) {
	let handler = unsafe { SYSCALL_HANDLER };
	match handler {
		Some(h) => h(frame),
		None => frame.set_syscall_return(0),
	}
}
