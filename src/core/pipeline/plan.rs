//! Plan extraction from planner output.
//!
//! Planner models are asked to embed a JSON plan in free prose. Extraction
//! tries a fenced ```json block first, then falls back to the outermost
//! balanced `{...}` span found by brace-depth scanning (nested objects break
//! naive first/last-brace matching). A response with no extractable plan is
//! a conversational reply, not an error.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::types::{AgentRole, Stage};

/// Plans outside 1..=6 stages are rejected as invalid.
pub const MAX_STAGES: usize = 6;

/// One stage of a freshly parsed plan. Transient: never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStage {
    pub role: AgentRole,
    pub task: String,
    pub research_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub stages: Vec<ParsedStage>,
}

/// Planner output split into renderable pieces for display layers.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageSegment {
    Text(String),
    Plan(ParsedPlan),
}

// Compiled once; these run on every planner reply.
static FENCED_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*.*?```").unwrap());
static FENCED_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());
static NUMBERED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s+").unwrap());

#[derive(Deserialize)]
struct RawPlan {
    pipeline: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawStage {
    role: String,
    task: String,
    #[serde(default, rename = "researchURLs")]
    research_urls: Vec<String>,
}

/// Extracts a pipeline plan from planner text output. `None` means no valid
/// plan was found (conversational response).
pub fn parse(text: &str) -> Option<ParsedPlan> {
    let block = extract_json_block(text)?;
    let raw: RawPlan = serde_json::from_str(&block).ok()?;

    let stages: Vec<ParsedStage> = raw
        .pipeline
        .into_iter()
        .filter_map(|value| {
            // A malformed or unrecognized entry drops that stage only.
            let raw: RawStage = serde_json::from_value(value).ok()?;
            let role = parse_role(&raw.role)?;
            let research_urls = raw
                .research_urls
                .into_iter()
                .filter(|u| url::Url::parse(u).is_ok())
                .collect();
            Some(ParsedStage {
                role,
                task: raw.task,
                research_urls,
            })
        })
        .collect();

    if stages.is_empty() || stages.len() > MAX_STAGES {
        return None;
    }
    Some(ParsedPlan { stages })
}

/// Creates ordered stage entities from a parsed plan. Research URLs are
/// embedded into the input context so a downstream researcher stage can
/// rediscover them.
pub fn build_stages(parsed: &ParsedPlan) -> Vec<Stage> {
    parsed
        .stages
        .iter()
        .enumerate()
        .map(|(index, parsed_stage)| {
            let mut context = parsed_stage.task.clone();
            if !parsed_stage.research_urls.is_empty() {
                context.push_str("\n\nResearch URLs:\n");
                context.push_str(&parsed_stage.research_urls.join("\n"));
            }
            Stage::new(parsed_stage.role, index, context)
        })
        .collect()
}

/// Splits planner output into alternating prose/plan segments. Prose after
/// the plan block loses its numbered summary lines (the plan card already
/// shows the stages).
pub fn split_into_segments(text: &str) -> Vec<MessageSegment> {
    let Some((start, end)) = json_block_span(text) else {
        return vec![MessageSegment::Text(text.to_string())];
    };

    let mut segments = Vec::new();

    let before = text[..start].trim();
    if !before.is_empty() {
        segments.push(MessageSegment::Text(before.to_string()));
    }

    match parse(text) {
        Some(plan) => segments.push(MessageSegment::Plan(plan)),
        None => segments.push(MessageSegment::Text(text[start..end].to_string())),
    }

    let after = strip_numbered_summary(text[end..].trim());
    if !after.is_empty() {
        segments.push(MessageSegment::Text(after));
    }

    segments
}

/// Maps planner role strings to roles, case-insensitively. Returns `None`
/// for strings outside the alias table.
fn parse_role(raw: &str) -> Option<AgentRole> {
    match raw.to_lowercase().as_str() {
        "researcher" => Some(AgentRole::Researcher),
        "producer" | "writer" | "content_producer" => Some(AgentRole::Producer),
        "reviewer" | "qa" | "qareviewer" | "qa_reviewer" | "qa reviewer" => {
            Some(AgentRole::Reviewer)
        }
        _ => None,
    }
}

/// Byte span of the whole plan block (fences included) or outermost braces.
fn json_block_span(text: &str) -> Option<(usize, usize)> {
    if let Some(m) = FENCED_BLOCK_RE.find(text) {
        return Some((m.start(), m.end()));
    }
    outermost_braces_span(text)
}

/// JSON content of the plan block (fence markers stripped).
fn extract_json_block(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_CONTENT_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    outermost_braces_span(text).map(|(start, end)| text[start..end].to_string())
}

/// Locates the outermost `{...}` pair with an explicit depth counter.
/// Blind to braces inside string values; the fenced path is preferred and
/// the expected planner shape contains none.
fn outermost_braces_span(text: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return start.map(|s| (s, i + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Drops "1. ..." style summary lines.
fn strip_numbered_summary(text: &str) -> String {
    text.lines()
        .filter(|line| !NUMBERED_LINE_RE.is_match(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
