pub mod actions;
pub mod admin;
pub mod judge;
