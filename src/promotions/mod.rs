pub mod catalog;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pricer;
pub mod repository;

pub use catalog::*;
pub use error::*;
pub use handlers::*;
pub use models::*;
pub use pricer::*;
pub use repository::*;
