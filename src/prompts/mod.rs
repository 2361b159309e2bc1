//! Prompt Templates
//!
//! Information Hiding:
//! - Template text lives in `templates/` and is compiled into the binary
//! - Context rendering shared by every generation mode and by document chat
//! - Sampling parameters are fixed per mode, callers cannot override them

use crate::core::{ChatMessage, SamplingParams};
use crate::session::UploadedDocument;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Substituted when no documents are uploaded.
pub const NO_CONTEXT_FALLBACK: &str = "No context files were provided.";

const CONTEXT_PLACEHOLDER: &str = "{context}";

const BUSINESS_CANVAS_TEMPLATE: &str = include_str!("templates/business_canvas.md");
const VALUE_PROPOSITION_TEMPLATE: &str = include_str!("templates/value_proposition.md");
const BUSINESS_PLAN_TEMPLATE: &str = include_str!("templates/business_plan.md");
const PITCH_SLIDE_TEMPLATE: &str = include_str!("templates/pitch_slide.md");

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the following context from uploaded files to answer questions. Format your responses using markdown for better readability (use headers, bullet points, code blocks, etc. when appropriate):";

/// Kind of HTML document the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanvasKind {
    BusinessCanvas,
    ValueProposition,
    BusinessPlan,
    PitchSlide,
}

impl CanvasKind {
    pub const ALL: [CanvasKind; 4] = [
        CanvasKind::BusinessCanvas,
        CanvasKind::ValueProposition,
        CanvasKind::BusinessPlan,
        CanvasKind::PitchSlide,
    ];

    fn template(self) -> &'static str {
        match self {
            CanvasKind::BusinessCanvas => BUSINESS_CANVAS_TEMPLATE,
            CanvasKind::ValueProposition => VALUE_PROPOSITION_TEMPLATE,
            CanvasKind::BusinessPlan => BUSINESS_PLAN_TEMPLATE,
            CanvasKind::PitchSlide => PITCH_SLIDE_TEMPLATE,
        }
    }

    pub fn sampling(self) -> SamplingParams {
        match self {
            CanvasKind::BusinessCanvas | CanvasKind::ValueProposition => {
                SamplingParams::new(0.8, 6000)
            }
            CanvasKind::BusinessPlan => SamplingParams::new(0.7, 8000),
            CanvasKind::PitchSlide => SamplingParams::new(0.8, 4000),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CanvasKind::BusinessCanvas => "Business Model Canvas",
            CanvasKind::ValueProposition => "Value Proposition Canvas",
            CanvasKind::BusinessPlan => "Business Plan",
            CanvasKind::PitchSlide => "Pitch Slide",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            CanvasKind::BusinessCanvas => "canvas",
            CanvasKind::ValueProposition => "value-prop",
            CanvasKind::BusinessPlan => "plan",
            CanvasKind::PitchSlide => "pitch",
        }
    }
}

impl fmt::Display for CanvasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for CanvasKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canvas" | "business-canvas" | "bmc" => Ok(CanvasKind::BusinessCanvas),
            "value-prop" | "value-proposition" | "vpc" => Ok(CanvasKind::ValueProposition),
            "plan" | "business-plan" => Ok(CanvasKind::BusinessPlan),
            "pitch" | "pitch-slide" => Ok(CanvasKind::PitchSlide),
            other => Err(format!(
                "unknown canvas kind '{}' (expected one of: canvas, value-prop, plan, pitch)",
                other
            )),
        }
    }
}

/// `Document: {name}\n{text}` for every document, blank-line separated.
pub fn render_context(documents: &[UploadedDocument]) -> String {
    if documents.is_empty() {
        return NO_CONTEXT_FALLBACK.to_string();
    }
    documents
        .iter()
        .map(|doc| format!("Document: {}\n{}", doc.name(), doc.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Messages for one generation request.
pub fn build(kind: CanvasKind, documents: &[UploadedDocument]) -> Vec<ChatMessage> {
    let prompt = kind
        .template()
        .replacen(CONTEXT_PLACEHOLDER, &render_context(documents), 1);
    vec![ChatMessage::user(prompt)]
}

/// Messages for one document-chat question.
pub fn build_chat(documents: &[UploadedDocument], question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!("{}\n\n{}", CHAT_SYSTEM_PROMPT, render_context(documents))),
        ChatMessage::user(question),
    ]
}

/// Drop the markdown fence a model sometimes wraps raw HTML in.
pub fn strip_code_fence(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.starts_with("```html") {
        return trimmed.replace("```html", "").replace("```", "").trim().to_string();
    }
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            body.trim_end().trim_end_matches("```").trim().to_string()
        }
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;

    fn doc(name: &str, text: &str) -> UploadedDocument {
        UploadedDocument::new(name, text, text.len() as u64)
    }

    #[test]
    fn test_empty_documents_use_fallback() {
        for kind in CanvasKind::ALL {
            let messages = build(kind, &[]);
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].role, Role::User);
            assert!(messages[0].content.contains(NO_CONTEXT_FALLBACK));
            assert!(!messages[0].content.contains(CONTEXT_PLACEHOLDER));
        }
    }

    #[test]
    fn test_documents_are_substituted() {
        for kind in CanvasKind::ALL {
            let messages = build(kind, &[doc("a.txt", "hello")]);
            let prompt = &messages[0].content;
            assert!(prompt.contains("Document: a.txt\nhello"));
            assert!(!prompt.contains(NO_CONTEXT_FALLBACK));
        }
    }

    #[test]
    fn test_context_joins_with_blank_lines_in_order() {
        let context = render_context(&[doc("b.md", "second"), doc("a.txt", "first")]);
        assert_eq!(context, "Document: b.md\nsecond\n\nDocument: a.txt\nfirst");
    }

    #[test]
    fn test_templates_keep_css_braces() {
        let prompt = &build(CanvasKind::BusinessCanvas, &[])[0].content;
        assert!(prompt.contains("body { font-family: 'Inter', sans-serif; }"));
        assert!(prompt.contains("ONLY OUTPUT THE HTML CODE"));
    }

    #[test]
    fn test_sampling_is_fixed_per_kind() {
        assert_eq!(CanvasKind::BusinessCanvas.sampling(), SamplingParams::new(0.8, 6000));
        assert_eq!(CanvasKind::ValueProposition.sampling().max_tokens, 6000);
    }

    #[test]
    fn test_chat_messages_carry_context() {
        let messages = build_chat(&[doc("q3.pdf", "Revenue grew 12%")], "How did revenue do?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("You are a helpful assistant."));
        assert!(messages[0].content.contains("Document: q3.pdf\nRevenue grew 12%"));
        assert_eq!(messages[1], ChatMessage::user("How did revenue do?"));
    }

    #[test]
    fn test_kind_parsing_round_trips_display() {
        for kind in CanvasKind::ALL {
            assert_eq!(kind.to_string().parse::<CanvasKind>().unwrap(), kind);
        }
        assert!("poster".parse::<CanvasKind>().is_err());
    }

    #[test]
    fn test_strip_html_fence() {
        let html = strip_code_fence("```html\n<!DOCTYPE html><html></html>\n```");
        assert_eq!(html, "<!DOCTYPE html><html></html>");
        assert!(!html.contains("```html"));

        assert_eq!(strip_code_fence("```\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fence("  <p>plain</p>\n"), "<p>plain</p>");
    }
}
