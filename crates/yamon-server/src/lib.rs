//! yamon collector server: HTTP front end over a [`yamon_storage::Repository`].

pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod state;
