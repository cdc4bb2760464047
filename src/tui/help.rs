use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn key(k: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(k, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad.saturating_sub(k.chars().count()))),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Anywhere:"),
        key("Ctrl-C", 12, "Quit"),
        key("tab", 12, "Switch between sidebar and input"),
        key("PgUp/PgDn", 12, "Scroll the conversation"),
        Line::from(""),
        Line::from("Input:"),
        key("enter", 12, "Send question (or use highlighted suggestion)"),
        key("↑/↓", 12, "Pick a suggested question (empty conversation)"),
        key("esc", 12, "Back to sidebar"),
        Line::from(""),
        Line::from("Sidebar:"),
        key("↑/↓ j/k", 12, "Navigate"),
        key("enter", 12, "Open conversation"),
        key("n", 12, "Analyze a new repository"),
        key("c", 12, "Start new chat (deselect)"),
        key("d", 12, "Delete conversation"),
        key("y", 12, "Copy repository URL to clipboard"),
        key("e", 12, "Export conversation as JSON"),
        key("?", 12, "Show this help"),
        key("q", 12, "Quit"),
        Line::from(""),
        Line::from("Repository popup:"),
        key("↑/↓", 12, "Example repositories"),
        key("enter", 12, "Analyze"),
        key("esc", 12, "Close (dismisses an error)"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
