//! Repository implementations for database operations

pub mod history;
pub mod prescriptions;
pub mod sessions;
pub mod users;

pub use history::*;
pub use prescriptions::*;
pub use sessions::*;
pub use users::*;
