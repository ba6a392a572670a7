pub mod client;
pub mod models;

pub use client::{ApiError, HttpClient, Result};
pub use models::HttpConfig;
