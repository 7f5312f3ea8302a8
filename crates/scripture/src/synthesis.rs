//! Deterministic markdown rendering of fallback passages

use std::fmt::Write;

use provider::ScripturePassage;

use crate::terms::derive_search_terms;
use crate::variants::{VARIANT_TABLE_VERSION, VariantSlot, render_variant};

const UNAVAILABLE_NOTICE: &str = "The study generator is temporarily unavailable, so this outline \
was assembled from scripture search results. Generated commentary will return once capacity recovers.";

/// Render located passages as a structured study outline.
///
/// Pure function of its inputs: no clock, no randomness. Identical
/// `(results, original_prompt)` always yield byte-identical output.
pub fn synthesize(results: &[ScripturePassage], original_prompt: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Scripture Study: {}\n", title(original_prompt));
    let _ = writeln!(out, "> {UNAVAILABLE_NOTICE}\n");

    if results.is_empty() {
        out.push_str("_No passages were found for this topic._\n");
        return out;
    }

    for (i, passage) in results.iter().enumerate() {
        let _ = writeln!(out, "## {}. {}\n", i + 1, passage.reference);
        let _ = writeln!(out, "> {}\n", passage.text);
        let _ = writeln!(
            out,
            "**Reflection:** {}\n",
            render_variant(&passage.reference, VariantSlot::Reflection)
        );
        let _ = writeln!(
            out,
            "**Application:** {}\n",
            render_variant(&passage.reference, VariantSlot::Application)
        );
    }

    let _ = writeln!(out, "---");
    let _ = writeln!(
        out,
        "_Source: scripture search fallback ({} passages, variant tables v{VARIANT_TABLE_VERSION})_",
        results.len()
    );
    out
}

fn title(prompt: &str) -> String {
    let terms = derive_search_terms(prompt);
    if terms.is_empty() {
        return "Selected Passages".to_string();
    }
    terms
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
