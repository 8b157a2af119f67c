//! Artifact extraction from finalized assistant output
//!
//! Two pure extraction paths feed the same artifact list:
//! - fenced blocks in message text (an explicit `artifact`-tagged form and a
//!   bare form keyed by a recognized language token)
//! - successful file-writing tool invocations
//!
//! Both run against finalized content only, never against a live stream.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Artifact, ArtifactKind};
use crate::core::types::{ToolRecord, ToolStatus};

/// Minimum body length (chars) for a bare fence or tool write to count as an
/// artifact; explicit-tagged blocks are accepted at any length
const MIN_BODY_CHARS: usize = 100;

/// Auto-title prefix taken from the first content line of a bare block
const TITLE_PREFIX_CHARS: usize = 40;

/// Tool names that write files and can therefore surface artifacts
const FILE_WRITE_TOOLS: &[&str] = &["write_file", "create_file", "edit_file", "save_file"];

/// Historical argument names for the target path
const PATH_ARGS: &[&str] = &["path", "file_path", "filename"];

/// Historical argument names for the written body
const BODY_ARGS: &[&str] = &["content", "text", "body"];

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_]+)\s*=\s*"([^"]*)""#).expect("attr regex"));

/// A fenced block found in message text, with its consumed byte range
struct FencedBlock {
    info: String,
    body: String,
    start: usize,
    end: usize,
}

/// Scan text for fenced blocks (3+ backticks)
///
/// A block terminates at a line consisting solely of the same number of
/// backticks as its opening fence, so a longer-fenced body can nest shorter
/// fences. Unterminated fences are ignored.
fn scan_fences(content: &str) -> Vec<FencedBlock> {
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        lines.push((offset, line));
        offset += line.len();
    }
    if content.is_empty() {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (start, line) = lines[i];
        let trimmed = line.trim_end();
        let fence_len = trimmed.chars().take_while(|&c| c == '`').count();
        if fence_len >= 3 {
            let info = trimmed[fence_len..].trim().to_string();
            let mut close = None;
            for (j, &(line_start, candidate)) in lines.iter().enumerate().skip(i + 1) {
                let t = candidate.trim_end();
                if t.len() == fence_len && t.chars().all(|c| c == '`') {
                    close = Some((j, line_start + candidate.len()));
                    break;
                }
            }
            if let Some((close_idx, end)) = close {
                let body: String = lines[i + 1..close_idx].iter().map(|&(_, l)| l).collect();
                blocks.push(FencedBlock {
                    info,
                    body: body.trim_end_matches('\n').to_string(),
                    start,
                    end,
                });
                i = close_idx + 1;
                continue;
            }
        }
        i += 1;
    }
    blocks
}

/// Map a bare fence language token to an artifact kind
fn kind_for_bare_token(token: &str) -> Option<ArtifactKind> {
    match token {
        "markdown" | "md" => Some(ArtifactKind::Markdown),
        "html" => Some(ArtifactKind::Html),
        "svg" => Some(ArtifactKind::Svg),
        "mermaid" => Some(ArtifactKind::Diagram),
        _ => None,
    }
}

/// Map a written file's extension to an artifact kind and language label
fn kind_for_extension(ext: &str) -> Option<(ArtifactKind, Option<&'static str>)> {
    match ext.to_lowercase().as_str() {
        "md" | "markdown" => Some((ArtifactKind::Markdown, None)),
        "html" | "htm" => Some((ArtifactKind::Html, None)),
        "svg" => Some((ArtifactKind::Svg, None)),
        "mmd" | "mermaid" => Some((ArtifactKind::Diagram, None)),
        "rs" => Some((ArtifactKind::Code, Some("rust"))),
        "py" => Some((ArtifactKind::Code, Some("python"))),
        "js" | "jsx" => Some((ArtifactKind::Code, Some("javascript"))),
        "ts" | "tsx" => Some((ArtifactKind::Code, Some("typescript"))),
        "go" => Some((ArtifactKind::Code, Some("go"))),
        "java" => Some((ArtifactKind::Code, Some("java"))),
        "c" | "h" => Some((ArtifactKind::Code, Some("c"))),
        "cpp" | "cc" | "hpp" => Some((ArtifactKind::Code, Some("cpp"))),
        "sh" | "bash" => Some((ArtifactKind::Code, Some("bash"))),
        "rb" => Some((ArtifactKind::Code, Some("ruby"))),
        "css" => Some((ArtifactKind::Code, Some("css"))),
        "json" => Some((ArtifactKind::Code, Some("json"))),
        "yaml" | "yml" => Some((ArtifactKind::Code, Some("yaml"))),
        "toml" => Some((ArtifactKind::Code, Some("toml"))),
        "sql" => Some((ArtifactKind::Code, Some("sql"))),
        _ => None,
    }
}

fn parse_attrs(info: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(info)
        .map(|cap| (cap[1].to_lowercase(), cap[2].to_string()))
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn first_line_prefix(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .chars()
        .take(TITLE_PREFIX_CHARS)
        .collect()
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn push_unique(artifacts: &mut Vec<Artifact>, artifact: Artifact) {
    if !artifacts.iter().any(|a| a.id == artifact.id) {
        artifacts.push(artifact);
    }
}

/// Extract artifacts from finalized message text
///
/// Explicit `artifact`-tagged fences are accepted at any length; bare fences
/// with a recognized language token must meet the minimum body length and
/// must not overlap a range already consumed by an explicit block.
pub fn extract_from_text(content: &str) -> Vec<Artifact> {
    let blocks = scan_fences(content);
    let mut artifacts: Vec<Artifact> = Vec::new();
    let mut consumed: Vec<(usize, usize)> = Vec::new();

    // Pass 1: explicit-tagged blocks
    for block in &blocks {
        let mut tokens = block.info.split_whitespace();
        if tokens.next() != Some("artifact") {
            continue;
        }
        let attrs = parse_attrs(&block.info);
        let Some(kind) = attr(&attrs, "type").and_then(ArtifactKind::parse) else {
            tracing::debug!(info = %block.info, "skipping artifact fence with unrecognized type");
            continue;
        };
        let title = attr(&attrs, "title").unwrap_or("Untitled").to_string();
        let language = attr(&attrs, "language").map(str::to_string);

        consumed.push((block.start, block.end));
        push_unique(
            &mut artifacts,
            Artifact::new(kind, title, block.body.clone(), language),
        );
    }

    // Pass 2: bare language-tagged blocks
    for block in &blocks {
        let token = block
            .info
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        let Some(kind) = kind_for_bare_token(&token) else {
            continue;
        };
        let overlaps = consumed
            .iter()
            .any(|&(start, end)| block.start < end && start < block.end);
        if overlaps {
            continue;
        }
        if block.body.trim().chars().count() < MIN_BODY_CHARS {
            continue;
        }

        let title = format!("{}: {}", capitalize(&token), first_line_prefix(&block.body));
        push_unique(
            &mut artifacts,
            Artifact::new(kind, title, block.body.clone(), Some(token)),
        );
    }

    artifacts
}

/// Extract artifacts from successful file-writing tool invocations
///
/// Records with any other status, an unrecognized tool name, a missing
/// argument shape, or an unmapped file extension are skipped one at a time.
pub fn extract_from_tool_activity(records: &[ToolRecord]) -> Vec<Artifact> {
    let mut artifacts = Vec::new();

    for record in records {
        if record.status != ToolStatus::Success {
            continue;
        }
        if !FILE_WRITE_TOOLS.contains(&record.tool_name.as_str()) {
            continue;
        }
        let Some(args) = record.arguments.as_ref().and_then(|v| v.as_object()) else {
            continue;
        };
        let Some(path) = PATH_ARGS.iter().find_map(|k| args.get(*k)?.as_str()) else {
            continue;
        };
        let Some(body) = BODY_ARGS.iter().find_map(|k| args.get(*k)?.as_str()) else {
            continue;
        };
        let path = std::path::Path::new(path);
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some((kind, language)) = kind_for_extension(ext) else {
            continue;
        };
        if body.trim().chars().count() < MIN_BODY_CHARS {
            continue;
        }

        let title = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("untitled")
            .to_string();
        push_unique(
            &mut artifacts,
            Artifact::new(kind, title, body, language.map(str::to_string)),
        );
    }

    artifacts
}
