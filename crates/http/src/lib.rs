//! rsu-http: JSON API transport for rsu
//!
//! This crate implements the `StorageTransport` trait from rsu-core on top of
//! reqwest. It knows the JSON API paths, the resumable upload protocol and the
//! mapping from HTTP statuses to canonical status codes, and nothing about
//! retries.

pub mod client;

pub use client::{DEFAULT_TIMEOUT, HttpTransport, content_range, status_code_for};
