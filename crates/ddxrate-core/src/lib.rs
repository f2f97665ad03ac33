pub mod admin;
pub mod config;
pub mod errors;
pub mod generate;
pub mod model;
pub mod progress;
pub mod providers;
pub mod session;
pub mod storage;
