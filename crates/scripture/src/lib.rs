//! Scripture search fallback source
//!
//! Used only after every generative credential is exhausted. Looks up
//! passages through the API.Bible search endpoint and renders them into a
//! structured markdown outline without any generative model.
//!
//! Flow:
//! 1. `derive_search_terms` pulls topic words out of the original prompt
//! 2. `ScriptureAdapter::lookup` runs one search (bounded by a timeout)
//! 3. `synthesize` formats the passages; per-passage reflection lines are
//!    picked from versioned variant tables by a stable hash of the reference

pub mod adapter;
pub mod client;
pub mod reference;
pub mod synthesis;
pub mod terms;
pub mod variants;

pub use adapter::{FallbackContent, ScriptureAdapter, SecondaryFailure};
pub use client::{ApiBibleClient, DEFAULT_BASE_URL as API_BIBLE_BASE_URL};
pub use reference::{ParsedReference, parse_reference};
pub use synthesis::synthesize;
pub use terms::derive_search_terms;
pub use variants::{VARIANT_TABLE_VERSION, variant_index};
