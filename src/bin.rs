//! The binary crate is just a linker target: the real entry point is `_start` in
//! `arch/x86/asm/boot.s`, which sets up a stack and multiboot header before jumping into
//! [`kernel::kernel_main`].

#![no_std]
#![no_main]

// Pulls the `kernel` rlib's object code (including `kernel_main` and the panic handler) into
// this binary; nothing here calls it directly, `_start` does.
extern crate kernel;
