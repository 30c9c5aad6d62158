pub mod adapters;
pub mod bundler;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod linker;
pub mod offline_queue;
pub mod registry;
pub mod resources;
pub mod vlm;
