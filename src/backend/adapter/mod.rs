pub mod google_groups;

pub use google_groups::HttpGroupDirectory;
