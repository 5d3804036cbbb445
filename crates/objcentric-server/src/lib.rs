#[macro_use]
extern crate rocket;

pub mod app;
pub mod args;
pub mod docs;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
