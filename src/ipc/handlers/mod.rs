pub mod core;
pub mod courses;
pub mod entities;
pub mod reports;
pub mod session;
pub mod teaching;
pub mod users;
