//! Функции печати, которые вызывает сгенерированный код.
//!
//! Экспортируются с C ABI под теми же именами, что и объявления в IR, так
//! что их может найти как JIT (через явное отображение), так и `lli` при
//! загрузке собранной библиотеки.

use std::ffi::{c_char, CStr};
use std::io::Write;

/// Печать строки (`ptr`).
pub const PRINT_TEXT: &str = "print_text";
/// Печать целого (`i32`).
pub const PRINT_INTEGER: &str = "print_integer";
/// Печать float (`double`).
pub const PRINT_REAL: &str = "print_real";

/// Текст вывода для строки.
pub fn format_text(text: &str) -> String {
    format!("{}\n", text)
}

/// Текст вывода для целого.
pub fn format_integer(value: i32) -> String {
    format!("{}\n", value)
}

/// Текст вывода для float: шесть знаков после точки, как `%f`.
pub fn format_real(value: f64) -> String {
    format!("{:.6}\n", value)
}

fn emit(text: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
        log::warn!("runtime output failed: {}", e);
    }
}

/// # Safety
///
/// `text` должен указывать на строку, завершённую нулём, или быть нулевым.
#[no_mangle]
pub unsafe extern "C" fn print_text(text: *const c_char) {
    if text.is_null() {
        emit(&format_text("(null)"));
        return;
    }
    let text = CStr::from_ptr(text).to_string_lossy();
    emit(&format_text(&text));
}

#[no_mangle]
pub extern "C" fn print_integer(value: i32) {
    emit(&format_integer(value));
}

#[no_mangle]
pub extern "C" fn print_real(value: f64) {
    emit(&format_real(value));
}

/// Адреса функций печати по их именам в IR.
pub fn symbols() -> [(&'static str, usize); 3] {
    [
        (PRINT_TEXT, print_text as *const () as usize),
        (PRINT_INTEGER, print_integer as *const () as usize),
        (PRINT_REAL, print_real as *const () as usize),
    ]
}
