//! Seller API adapter: request building, type fallback and tolerant decoding.

pub mod client;
pub mod http;
pub mod types;

pub use client::SellerApi;
pub use types::{QueryParams, RawApiResponse, ResponseSource};
