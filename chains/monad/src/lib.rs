pub mod api;
pub mod app;
pub mod config;
pub mod menu;
pub mod route;
pub mod task;
pub mod utils;
