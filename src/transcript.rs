//! Plain-text transcript builder for text mode.
//!
//! Assistant bodies go through the markdown transcoder so the printed text carries the same
//! content the TUI shows, just without styling. User questions are echoed as typed. Every
//! line is stripped of control characters before it reaches the terminal.

use crate::markdown::{strip_controls, transcode, RenderNode};
use crate::model::{Message, Role, Session};

/// Pre-formatted lines for text output.
pub(crate) struct Transcript {
    pub lines: Vec<String>,
}

pub(crate) fn build_transcript(session: &Session) -> Transcript {
    let mut lines = vec![
        session.title.clone(),
        format!("Repository: {} ({})", session.repository_label, session.source_url),
    ];
    for message in &session.messages {
        lines.push(String::new());
        lines.extend(message_lines(message));
    }
    Transcript { lines }
}

/// Header line plus body lines for one message.
pub(crate) fn message_lines(message: &Message) -> Vec<String> {
    let who = match (message.role, message.is_error) {
        (Role::User, _) => "You",
        (Role::Assistant, false) => "Assistant",
        (Role::Assistant, true) => "Error",
    };
    let mut lines = vec![format!("[{}] {who}:", message.timestamp)];
    let body = match message.role {
        Role::User => strip_controls(&message.content),
        Role::Assistant => plain_text(&transcode(&message.content)),
    };
    lines.extend(body.lines().map(|l| format!("  {l}")));
    if !message.sources.is_empty() {
        lines.push("  Sources:".into());
        lines.extend(
            message
                .sources
                .iter()
                .map(|s| format!("    - {}", strip_controls(s))),
        );
    }
    lines
}

/// Flatten rendered nodes to unstyled text. Code blocks keep their lines, indented under a
/// language tag.
pub(crate) fn plain_text(nodes: &[RenderNode]) -> String {
    let mut out = String::new();
    push_plain(nodes, &mut out);
    out
}

fn push_plain(nodes: &[RenderNode], out: &mut String) {
    for node in nodes {
        match node {
            RenderNode::PlainText(s) => out.push_str(s),
            RenderNode::InlineCode(s) => {
                out.push('`');
                out.push_str(s);
                out.push('`');
            }
            RenderNode::Bold(children) | RenderNode::Italic(children) => push_plain(children, out),
            RenderNode::LineBreak => out.push('\n'),
            RenderNode::CodeBlock { language, code } => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("[{}]\n", language.as_deref().unwrap_or("code")));
                for line in code.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
}
