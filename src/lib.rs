#![doc = "The `todo_api` library crate."]
#![doc = ""]
#![doc = "Domain models, credential handling, persistence backends, routing and error"]
#![doc = "handling for the collaborative todo API. The binary (`main.rs`) wires them into"]
#![doc = "an actix-web server."]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

pub use crate::config::Config;
pub use crate::error::AppError;
