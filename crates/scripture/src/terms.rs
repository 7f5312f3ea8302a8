//! Search-term extraction from study prompts

/// Maximum number of words sent to the search endpoint.
pub const MAX_TERMS: usize = 4;

/// Words that carry no topical signal in study prompts.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "analysis", "and", "answer", "any", "are",
    "background", "because", "been", "before", "being", "between", "bible", "biblical", "both",
    "but", "can", "chapter", "commentary", "comprehensive", "content", "context", "could",
    "create", "deep", "describe", "detail", "detailed", "does", "each", "explain", "explanation",
    "following", "for", "format", "from", "generate", "give", "has", "have", "help", "here",
    "how", "include", "including", "insights", "into", "its", "just", "length", "long",
    "markdown", "more", "most", "must", "not", "notes", "only", "other", "our", "out", "over",
    "please", "provide", "question", "questions", "scripture", "section", "sections", "should",
    "some", "study", "such", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "topic", "under", "use", "using", "verse", "verses",
    "very", "was", "were", "what", "when", "where", "which", "while", "who", "why", "will",
    "with", "words", "would", "write", "you", "your",
];

/// Pull up to `MAX_TERMS` distinct topical words out of a prompt, in order of
/// first appearance. Returns an empty string when nothing usable remains.
pub fn derive_search_terms(prompt: &str) -> String {
    let mut terms: Vec<String> = Vec::new();

    for raw in prompt.split(|c: char| !(c.is_alphanumeric() || c == '\'')) {
        let word = raw.trim_matches('\'').to_lowercase();
        let word = word.strip_suffix("'s").unwrap_or(&word).to_string();
        if word.chars().count() < 3
            || word.chars().all(|c| c.is_ascii_digit())
            || STOPWORDS.contains(&word.as_str())
            || terms.contains(&word)
        {
            continue;
        }
        terms.push(word);
        if terms.len() == MAX_TERMS {
            break;
        }
    }

    terms.join(" ")
}
