//! API.Bible search client

use provider::{BoxFuture, ProviderError, Result, ScripturePassage, ScriptureSearch};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.scripture.api.bible";

/// Longest upstream error body kept in a `ProviderError`.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for `GET /v1/bibles/{bible_id}/search`.
#[derive(Clone)]
pub struct ApiBibleClient {
    http: reqwest::Client,
    base_url: String,
    bible_id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
struct SearchData {
    #[serde(default)]
    verses: Vec<Verse>,
    #[serde(default)]
    passages: Vec<Passage>,
}

#[derive(Debug, Deserialize)]
struct Verse {
    reference: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Passage {
    reference: String,
    #[serde(default)]
    content: String,
}

impl ApiBibleClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        bible_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            bible_id: bible_id.into(),
            api_key: api_key.into(),
        }
    }

    pub fn bible_id(&self) -> &str {
        &self.bible_id
    }

    /// Run one search and return up to `limit` passages.
    ///
    /// Verse hits are preferred; when the query is a reference the API
    /// answers with passages instead, whose HTML content is flattened.
    pub async fn search_passages(&self, query: &str, limit: usize) -> Result<Vec<ScripturePassage>> {
        let url = format!(
            "{}/v1/bibles/{}/search",
            self.base_url.trim_end_matches('/'),
            self.bible_id
        );
        let limit_param = limit.to_string();

        let response = self
            .http
            .get(&url)
            .header("api-key", &self.api_key)
            .query(&[("query", query), ("limit", limit_param.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_excerpt(&body),
            });
        }

        let envelope = response
            .json::<SearchEnvelope>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid search response: {e}")))?;

        let passages = collect_passages(envelope.data, limit);
        debug!(query, results = passages.len(), "scripture search completed");
        Ok(passages)
    }
}

fn collect_passages(data: SearchData, limit: usize) -> Vec<ScripturePassage> {
    let from_verses = data.verses.into_iter().map(|v| ScripturePassage {
        reference: v.reference.trim().to_string(),
        text: normalize_whitespace(&v.text),
    });
    let from_passages = data.passages.into_iter().map(|p| ScripturePassage {
        reference: p.reference.trim().to_string(),
        text: normalize_whitespace(&strip_tags(&p.content)),
    });

    from_verses
        .chain(from_passages)
        .filter(|p| !p.reference.is_empty() && !p.text.is_empty())
        .take(limit)
        .collect()
}

/// Drop everything between `<` and `>`; passage content arrives as HTML.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Flattened, length-capped error body. Gateways answer with HTML pages.
fn error_excerpt(body: &str) -> String {
    let flat = normalize_whitespace(&strip_tags(body));
    if flat.chars().count() <= MAX_ERROR_BODY_CHARS {
        return flat;
    }
    let mut excerpt: String = flat.chars().take(MAX_ERROR_BODY_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ScriptureSearch for ApiBibleClient {
    fn id(&self) -> &str {
        "api.bible"
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ScripturePassage>>> {
        Box::pin(self.search_passages(query, limit))
    }
}
