pub mod book;
pub mod error;
pub mod handlers;
pub mod models;
pub mod price_calculator;
pub mod report;
pub mod repository;
pub mod scheduler;
pub mod status_machine;

pub use book::*;
pub use error::*;
pub use handlers::*;
pub use models::*;
pub use price_calculator::*;
pub use report::*;
pub use repository::*;
pub use scheduler::*;
pub use status_machine::*;
