//! HTTP client for the purchase-request workflow service.

mod client;

pub use client::{PURCHASE_REQUESTS_PATH, WorkflowHttpClient};
