pub mod fs;
pub mod registry;
pub mod retry;
pub mod traits;
