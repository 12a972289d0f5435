pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod core;
pub mod display;
pub mod git;
pub mod input;
pub mod transport;
pub mod utils;
