pub mod file_share;

pub use file_share::FileShareProvider;
