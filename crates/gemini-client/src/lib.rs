//! Gemini completion client
//!
//! Implements the `CompletionBackend` capability over the Gemini
//! `generateContent` REST endpoint. The client is credential-agnostic: the
//! rotation core passes the API key for each call, so one client serves the
//! whole key pool.

pub mod client;
pub mod constants;

pub use client::{GeminiClient, GenerationSettings};
pub use constants::*;
