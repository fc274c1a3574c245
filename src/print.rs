//! Implementation of the `print!`/`println!` macros.
//!
//! Unlike the standard library's macros of the same name, these log: every byte written also
//! lands in the in-memory ring buffer, regardless of whether the console echo is silenced.

use crate::logger;
use core::fmt;

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
	logger::with_logger(|logger| {
		fmt::write(logger, args).ok();
	});
}

#[macro_export]
macro_rules! print {
	($($arg:tt)*) => {{
		$crate::print::_print(format_args!($($arg)*));
	}};
}

#[macro_export]
macro_rules! println {
	() => ($crate::print!("\n"));
	($($arg:tt)*) => {{
		$crate::print::_print(format_args!($($arg)*));
		$crate::print::_print(format_args!("\n"));
	}};
}
