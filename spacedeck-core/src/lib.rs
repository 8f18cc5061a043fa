pub mod due;
pub mod errors;
pub mod history;
pub mod models;
pub mod repo;
pub mod request;
pub mod scheduler;

pub use due::*;
pub use errors::*;
pub use history::*;
pub use models::*;
pub use repo::*;
pub use request::*;
pub use scheduler::*;
