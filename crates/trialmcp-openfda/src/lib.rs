pub mod client;
pub mod endpoints;

pub use client::OpenFdaClient;
pub use endpoints::{Endpoint, DEFAULT_ENDPOINT, ENDPOINTS};
