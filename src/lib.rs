pub mod config;
pub mod constants;
pub mod core;
pub mod job;
pub mod memory;
pub mod soap;
pub mod stubs;
