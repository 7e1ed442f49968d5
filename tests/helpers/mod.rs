pub mod factories;
pub mod server;
