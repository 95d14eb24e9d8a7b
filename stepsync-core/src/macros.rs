// Optional logging. Without the `log` feature the arguments are still
// type-checked but nothing is emitted.

#[cfg(feature = "log")]
macro_rules! step_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! step_debug {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}

#[cfg(feature = "log")]
macro_rules! step_info {
    ($($arg:tt)*) => { log::info!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! step_info {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}

#[cfg(feature = "log")]
macro_rules! step_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! step_warn {
    ($($arg:tt)*) => {{ let _ = ::core::format_args!($($arg)*); }};
}
