//! Render nodes and messages to ratatui lines.

use crate::markdown::{strip_controls, transcode, RenderNode};
use crate::model::{Message, Role};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.break_line();
            }
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn break_line(&mut self) {
        self.lines.push(Line::from(std::mem::take(&mut self.current)));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.current.is_empty() {
            self.break_line();
        }
        self.lines
    }
}

/// Styled lines for transcoded answer text. Every node's text is drawn verbatim.
pub fn nodes_to_lines(nodes: &[RenderNode], base: Style) -> Vec<Line<'static>> {
    let mut b = LineBuilder::new();
    push_nodes(&mut b, nodes, base);
    b.finish()
}

fn push_nodes(b: &mut LineBuilder, nodes: &[RenderNode], style: Style) {
    for node in nodes {
        match node {
            RenderNode::PlainText(s) => b.push_text(s, style),
            RenderNode::InlineCode(s) => b.push_text(s, style.fg(Color::Yellow)),
            RenderNode::Bold(children) => push_nodes(b, children, style.add_modifier(Modifier::BOLD)),
            RenderNode::Italic(children) => {
                push_nodes(b, children, style.add_modifier(Modifier::ITALIC))
            }
            RenderNode::LineBreak => b.break_line(),
            RenderNode::CodeBlock { language, code } => {
                if !b.current.is_empty() {
                    b.break_line();
                }
                let gutter = Style::default().fg(Color::DarkGray);
                b.lines.push(Line::from(Span::styled(
                    format!("┌─ {}", language.as_deref().unwrap_or("code")),
                    gutter,
                )));
                for line in code.lines() {
                    b.lines.push(Line::from(vec![
                        Span::styled("│ ", gutter),
                        Span::styled(line.to_string(), Style::default().fg(Color::Cyan)),
                    ]));
                }
                b.lines.push(Line::from(Span::styled("└─", gutter)));
            }
        }
    }
}

/// Header, body, and sources for one chat message, followed by a blank separator line.
pub fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let stamp = Span::styled(
        format!("  {}", message.timestamp),
        Style::default().fg(Color::DarkGray),
    );
    let header = match (message.role, message.is_error) {
        (Role::User, _) => Span::styled(
            "You",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ),
        (Role::Assistant, false) => Span::styled(
            "Assistant",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        (Role::Assistant, true) => Span::styled(
            "⚠ Error",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };
    let mut lines = vec![Line::from(vec![header, stamp])];

    match message.role {
        // Questions are shown as typed, without markup.
        Role::User => lines.extend(
            strip_controls(&message.content)
                .lines()
                .map(|l| Line::from(l.to_string())),
        ),
        Role::Assistant => {
            let base = if message.is_error {
                Style::default().fg(Color::LightRed)
            } else {
                Style::default()
            };
            lines.extend(nodes_to_lines(&transcode(&message.content), base));
        }
    }

    if !message.sources.is_empty() {
        lines.push(Line::from(Span::styled(
            "Sources:",
            Style::default().fg(Color::Magenta),
        )));
        for source in &message.sources {
            lines.push(Line::from(Span::styled(
                format!("  ↗ {}", strip_controls(source)),
                Style::default().fg(Color::Gray),
            )));
        }
    }
    lines.push(Line::from(""));
    lines
}

/// Hard-wrap lines to `width` columns, keeping span styles.
pub fn wrap_lines(lines: Vec<Line<'static>>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let style = line.style;
        let mut row: Vec<Span<'static>> = Vec::new();
        let mut used = 0;
        for span in line.spans {
            let mut rest: &str = span.content.as_ref();
            while !rest.is_empty() {
                if used == width {
                    out.push(Line::from(std::mem::take(&mut row)).style(style));
                    used = 0;
                }
                let room = width - used;
                let take = rest
                    .char_indices()
                    .nth(room)
                    .map_or(rest.len(), |(i, _)| i);
                row.push(Span::styled(rest[..take].to_string(), span.style));
                used += rest[..take].chars().count();
                rest = &rest[take..];
            }
        }
        out.push(Line::from(row).style(style));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn emphasis_becomes_modifiers() {
        let lines = nodes_to_lines(&transcode("a **b** *c* `d`"), Style::default());
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        let bold = spans.iter().find(|s| s.content == "b").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let italic = spans.iter().find(|s| s.content == "c").unwrap();
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
        let code = spans.iter().find(|s| s.content == "d").unwrap();
        assert_eq!(code.style.fg, Some(Color::Yellow));
    }

    #[test]
    fn markup_in_text_is_drawn_verbatim() {
        let lines = nodes_to_lines(&transcode("<script>alert(1)</script>"), Style::default());
        assert_eq!(text(&lines[0]), "<script>alert(1)</script>");
    }

    #[test]
    fn code_block_is_framed() {
        let lines = nodes_to_lines(&transcode("Run:\n```sh\nmake\n```"), Style::default());
        let rendered: Vec<String> = lines.iter().map(text).collect();
        assert_eq!(rendered, vec!["Run:", "┌─ sh", "│ make", "└─"]);
    }

    #[test]
    fn error_message_has_error_header() {
        let lines = message_lines(&Message::failure("HTTP 500"));
        assert!(text(&lines[0]).starts_with("⚠ Error"));
        assert!(text(&lines[1]).contains("HTTP 500"));
    }

    #[test]
    fn sources_listed_under_answer() {
        let lines = message_lines(&Message::assistant("ok", vec!["src/lib.rs".into()]));
        let rendered: Vec<String> = lines.iter().map(text).collect();
        assert!(rendered.contains(&"Sources:".to_string()));
        assert!(rendered.contains(&"  ↗ src/lib.rs".to_string()));
    }

    #[test]
    fn user_text_is_not_transcoded() {
        let lines = message_lines(&Message::user("**not bold**"));
        assert_eq!(text(&lines[1]), "**not bold**");
    }

    #[test]
    fn wrap_splits_across_spans() {
        let line = Line::from(vec![Span::raw("abcd"), Span::raw("efg")]);
        let wrapped = wrap_lines(vec![line], 3);
        let rendered: Vec<String> = wrapped.iter().map(text).collect();
        assert_eq!(rendered, vec!["abc", "def", "g"]);
    }

    #[test]
    fn wrap_keeps_empty_lines() {
        let wrapped = wrap_lines(vec![Line::from(""), Line::from("hi")], 10);
        assert_eq!(wrapped.len(), 2);
    }
}
