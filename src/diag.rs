//! Diagnostics sink.
//!
//! Failures in this app degrade, never crash: callers emit a line here and
//! treat the operation as a no-op for the cycle. On wasm the line goes to
//! the browser console; off wasm (tests) to stderr.

#[cfg(target_arch = "wasm32")]
pub fn warn(msg: &str) {
    web_sys::console::warn_1(&msg.into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(msg: &str) {
    eprintln!("warn: {msg}");
}

#[cfg(target_arch = "wasm32")]
pub fn log(msg: &str) {
    web_sys::console::log_1(&msg.into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(msg: &str) {
    eprintln!("{msg}");
}
