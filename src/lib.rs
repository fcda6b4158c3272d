pub mod config;
pub mod drivers;
pub mod registry;
pub mod utils;
