//! HTTP handlers. Each submodule serves one area of the portal; guards are
//! applied by the router, so handlers behind them can rely on [`Access`].
//!
//! [`Access`]: crate::guards::Access

pub mod access;
pub mod actions;
pub mod admin;
pub mod catalog;
pub(crate) mod helper;
pub mod judge;
pub mod student;
