pub mod error;

pub use error::LainError;
