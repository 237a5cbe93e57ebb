//! Crpt Gateway - rate-limited document submission
//!
//! This crate submits documents to the CRPT registration API while never
//! exceeding a configured number of requests per time window. Requests are
//! admitted through a fixed-window permit pool that a background task refills
//! at every window boundary.

pub mod config;
pub mod document;
pub mod error;
pub mod gateway;
pub mod ratelimit;

pub use document::{Description, Document, Product};
pub use error::{GatewayError, Result};
pub use gateway::{HttpTransport, SubmissionGateway, Transport};
pub use ratelimit::{PermitPool, TimeWindow};
