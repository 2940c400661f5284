// src/backend/utils/log.rs
// Canister log lines: "<icon> LEVEL: message".

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Info => "ℹ️ INFO",
            Level::Warn => "⚠️ WARN",
            Level::Error => "🔥 ERROR",
        }
    }
}

/// Writes one log line. Inside a canister this is the IC debug print;
/// native builds (tests) have no such system call and use stderr.
pub fn emit(level: Level, message: &str) {
    #[cfg(target_arch = "wasm32")]
    ic_cdk::println!("{}: {}", level.prefix(), message);

    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{}: {}", level.prefix(), message);
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::utils::log::emit($crate::utils::log::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::utils::log::emit($crate::utils::log::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::utils::log::emit($crate::utils::log::Level::Error, &format!($($arg)*))
    };
}
