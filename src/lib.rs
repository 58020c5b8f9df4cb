pub mod cli;
pub mod client;
pub mod config;
pub mod session;
pub mod shared;
pub mod tools;
pub mod workflow;
