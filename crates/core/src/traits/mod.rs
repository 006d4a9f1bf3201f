pub mod inference;
pub mod repository;

pub use inference::*;
pub use repository::*;
