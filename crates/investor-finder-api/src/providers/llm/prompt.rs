use crate::models::{ChatMessage, MessageRole};
use crate::providers::LlmContext;

const SNIPPET_CHARS: usize = 150;
const BIO_CHARS: usize = 200;
const MAX_PROMPT_RESULTS: usize = 15;

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a concise, factual assistant that helps founders find startup investors.

Goals:
1) Work out the startup's sector, stage and location preference. Use location context when given; otherwise prefer US and major hubs without inventing filters.
2) Present at most one page of investors per reply. When more exist, say how many remain and tell the user to say "more" to continue.
3) For each investor show Name, Title, Company, Location, Investment Focus, a short Bio and the LinkedIn URL. Never invent missing fields; omit them.
4) Stay professional and action-oriented. Reply in the user's language; keep investor data as-is.

Output format (markdown list):
1. **Name**
   Title @ Company
   Location: <city/region or "-" if unknown>
   Focus: tag1, tag2
   Bio: one or two sentences
   LinkedIn: URL

Rules:
- Never list more than one page of investors in a reply.
- Do not promise future actions; share what you have now.
- Keep paragraphs short."#;

/// Builds the system message shared by every LLM backend.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn system_prompt(base: Option<&str>, context: &LlmContext) -> String {
        let mut parts = vec![base.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string()];

        if let Some(summary) = &context.summary {
            if !summary.sectors_discussed.is_empty() {
                parts.push(format!(
                    "\nSectors discussed in this conversation: {}",
                    summary.sectors_discussed.join(", ")
                ));
            }
            if summary.investors_found > 0 {
                parts.push(format!("Total investors found so far: {}", summary.investors_found));
            }
        }

        if !context.sectors.is_empty() {
            parts.push(format!("\nUser's sectors of interest: {}", context.sectors.join(", ")));
        }

        if !context.search_results.is_empty() {
            parts.push(format!("\nWeb search results ({} results):", context.search_results.len()));
            for result in context.search_results.iter().take(MAX_PROMPT_RESULTS) {
                parts.push(format!(
                    "- {}: {}...",
                    result.title,
                    truncate(&result.snippet, SNIPPET_CHARS)
                ));
            }
        }

        if !context.investors.is_empty() {
            let total = context.total_investors.max(context.investors.len());
            if context.is_pagination {
                parts.push(format!(
                    "\nNext investors (page {}, {} on this page, {} total):",
                    context.current_page + 1,
                    context.investors.len(),
                    total
                ));
            } else {
                parts.push(format!(
                    "\nFound investors ({} on this page, {} total):",
                    context.investors.len(),
                    total
                ));
            }

            for investor in &context.investors {
                let mut block = format!("\n### {}", investor.name);
                if let Some(title) = &investor.title {
                    block.push_str(&format!("\n   Title: {}", title));
                }
                if let Some(company) = &investor.company {
                    block.push_str(&format!("\n   Company: {}", company));
                }
                if let Some(location) = &investor.location {
                    block.push_str(&format!("\n   Location: {}", location));
                }
                if let Some(bio) = &investor.bio {
                    let short = truncate(bio, BIO_CHARS);
                    let ellipsis = if short.len() < bio.len() { "..." } else { "" };
                    block.push_str(&format!("\n   Bio: {}{}", short, ellipsis));
                }
                if !investor.investment_focus.is_empty() {
                    block.push_str(&format!(
                        "\n   Investment Focus: {}",
                        investor.investment_focus.join(", ")
                    ));
                }
                if let Some(url) = &investor.linkedin_url {
                    block.push_str(&format!("\n   LinkedIn: {}", url));
                }
                parts.push(block);
            }

            let shown_through = (context.current_page + 1) * context.page_size.max(1);
            let remaining = total.saturating_sub(shown_through);
            if remaining > 0 {
                parts.push(format!(
                    "\n{} more investors available. If the user says 'more' or \
                     'show more investors', show the next page.",
                    remaining
                ));
            }
        }

        parts.join("\n")
    }

    /// History as (role, text) pairs, dropping stored system messages.
    pub fn dialogue(messages: &[ChatMessage]) -> Vec<(MessageRole, &str)> {
        messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }
}

/// Prefix of at most `max` characters, never splitting a code point.
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
