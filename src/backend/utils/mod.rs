pub mod crypto;
pub mod guards;
pub mod log;
pub mod play_store;
pub mod time;
