//! Panic reporting
//!
//! `install_panic_handler` routes panics from any thread through tracing
//! before the default hook runs. `panic_message` extracts the text of a
//! caught panic payload so the session can log it before tearing down.

use std::any::Any;
use std::panic;

use tracing::error;

/// Text of a panic payload (`&str` or `String`), or a placeholder
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}

/// Log panics through tracing, then defer to the previous hook
///
/// Unlike an abort-on-panic hook this lets the panicking thread unwind, so
/// a session whose listener panics still closes its subscriptions.
pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown location>".to_string());
        let thread = std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();

        error!(
            location = %location,
            thread = %thread,
            message = %panic_message(info.payload()),
            "panic"
        );

        default_hook(info);
    }));
}
