//! Comment-adjacency documentation extraction.
//!
//! A declaration's documentation is the run of comments that sits directly
//! above it: each comment must touch the next one (no blank line between)
//! and the last must touch the declaration. A comment that shares its first
//! line with preceding code is a trailing comment of that code and ends the
//! run.

use tree_sitter::Node;

use super::ParsedFile;

/// Per-language comment conventions.
#[derive(Debug)]
pub struct DocRule {
    /// Node kind the grammar uses for comments.
    pub comment_kind: &'static str,
    /// Line comment markers, e.g. `//`.
    pub line_prefixes: &'static [&'static str],
    /// Block comment delimiters, e.g. `/*` and `*/`.
    pub block_delimiters: &'static [(&'static str, &'static str)],
    /// Tool directives that are never documentation (`//go:generate`).
    pub directive_prefixes: &'static [&'static str],
    /// Blank lines tolerated between the block and the declaration.
    pub max_gap_lines: usize,
}

/// Documentation attached above `node`, or an empty string.
pub fn leading_doc(parsed: &ParsedFile, node: Node, rule: &DocRule) -> String {
    let mut comments = Vec::new();
    let mut boundary_row = node.start_position().row;
    let mut cursor = prev_significant(parsed, node);

    while let Some(candidate) = cursor {
        if candidate.kind() != rule.comment_kind {
            break;
        }
        if candidate.end_position().row + 1 + rule.max_gap_lines < boundary_row {
            break;
        }
        let before = prev_significant(parsed, candidate);
        if let Some(code) = before {
            if code.kind() != rule.comment_kind
                && code.end_position().row == candidate.start_position().row
            {
                break;
            }
        }
        comments.push(parsed.node_text(candidate));
        boundary_row = candidate.start_position().row;
        cursor = before;
    }

    comments.reverse();
    clean_comments(&comments, rule)
}

/// A comment starting on the same line that `node` ends on.
pub fn trailing_doc(parsed: &ParsedFile, node: Node, rule: &DocRule) -> String {
    let mut cursor = node.next_sibling();
    while let Some(next) = cursor {
        if is_blank_token(parsed, next) {
            cursor = next.next_sibling();
            continue;
        }
        if next.kind() == rule.comment_kind
            && next.start_position().row == node.end_position().row
        {
            return clean_comments(&[parsed.node_text(next)], rule);
        }
        break;
    }
    String::new()
}

/// Strip comment markers and directives, keep the line structure.
pub fn clean_comments(comments: &[&str], rule: &DocRule) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw in comments {
        let raw = raw.trim_end();
        if rule.directive_prefixes.iter().any(|d| raw.starts_with(d)) {
            continue;
        }

        if let Some(prefix) = rule.line_prefixes.iter().find(|p| raw.starts_with(**p)) {
            let body = &raw[prefix.len()..];
            lines.push(body.strip_prefix(' ').unwrap_or(body).trim_end().to_string());
            continue;
        }

        if let Some((open, close)) = rule
            .block_delimiters
            .iter()
            .find(|(open, close)| {
                raw.len() >= open.len() + close.len()
                    && raw.starts_with(open)
                    && raw.ends_with(close)
            })
        {
            let inner = &raw[open.len()..raw.len() - close.len()];
            lines.extend(inner.lines().map(|l| l.trim().to_string()));
            continue;
        }

        lines.push(raw.trim().to_string());
    }

    lines.join("\n").trim().to_string()
}

fn prev_significant<'t>(parsed: &ParsedFile, node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.prev_sibling();
    while let Some(prev) = cursor {
        if !is_blank_token(parsed, prev) {
            return Some(prev);
        }
        cursor = prev.prev_sibling();
    }
    None
}

/// Statement terminators surface as anonymous newline tokens.
fn is_blank_token(parsed: &ParsedFile, node: Node) -> bool {
    !node.is_named() && parsed.node_text(node).trim().is_empty()
}
