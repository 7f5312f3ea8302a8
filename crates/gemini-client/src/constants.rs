//! Gemini API defaults

/// Public Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when the configuration does not name one.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Sampling temperature for study content.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
