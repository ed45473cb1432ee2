pub mod blocking_client;
pub mod client;
pub mod server;
