pub mod hash;
pub mod nocase;
