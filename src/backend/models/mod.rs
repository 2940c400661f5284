pub mod app;
pub mod common;
pub mod init;
pub mod promotional_code;
pub mod tester;

// Re-export common types/enums for easier access
pub use app::{App, AppView};
pub use common::*;
pub use promotional_code::PromotionalCode;
pub use tester::{Tester, TesterUpdate};
