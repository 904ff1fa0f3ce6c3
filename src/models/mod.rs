pub mod hazard;
pub mod registration;
pub mod report;
pub mod role;
pub mod user;
