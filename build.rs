//! Build script: assembles the architecture stubs and wires the linker script.
//!
//! Mirrors the shape of the teacher's `build/main.rs` + `build/compile.rs`, trimmed of the
//! vDSO compilation step and the TOML-driven target/config machinery this core has no use for.

use std::env;
use std::path::PathBuf;

fn main() {
	let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
	let asm_dir = manifest_dir.join("src/arch/x86/asm");
	let linker_script = manifest_dir.join("src/arch/x86/linker.ld");

	let files: Vec<PathBuf> = std::fs::read_dir(&asm_dir)
		.expect("asm directory missing")
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.path())
		.filter(|path| path.extension().map(|e| e == "s").unwrap_or(false))
		.collect();

	cc::Build::new()
		.flag("-nostdlib")
		.flag("-ffreestanding")
		.flag("-fno-stack-protector")
		.flag("-m32")
		.flag("-Wall")
		.flag("-Wextra")
		.pic(false)
		.files(&files)
		.compile("teachos_asm");

	for file in &files {
		println!("cargo:rerun-if-changed={}", file.display());
	}
	println!("cargo:rerun-if-changed={}", linker_script.display());
	println!("cargo:rustc-link-arg=-T{}", linker_script.display());
	println!("cargo:rustc-link-arg=-zmax-page-size=0x1000");
	println!("cargo:rustc-link-arg=-nostdlib");
}
