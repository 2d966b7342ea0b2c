pub mod actor;
pub mod approval;
