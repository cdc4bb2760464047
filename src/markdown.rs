//! Markdown subset transcoder for service answers.
//!
//! Answers arrive from an untrusted remote service. They are turned into a flat sequence of
//! [`RenderNode`]s that presentation layers draw as inert text; nothing in the input is ever
//! interpreted as markup or terminal control. Recognized forms, in precedence order: fenced code
//! blocks, inline code, bold, italic, line breaks.

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    PlainText(String),
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    InlineCode(String),
    Bold(Vec<RenderNode>),
    Italic(Vec<RenderNode>),
    LineBreak,
}

/// Transcode raw answer text into render nodes.
pub fn transcode(text: &str) -> Vec<RenderNode> {
    let clean = strip_controls(text);
    let mut nodes = Vec::new();
    for block in split_fences(&clean) {
        match block {
            Block::Text(t) => nodes.extend(inline_nodes(t)),
            Block::Fence { language, code } => nodes.push(RenderNode::CodeBlock {
                language: language.map(str::to_string),
                code: trim_code(code),
            }),
        }
    }
    nodes
}

/// Drop C0/C1 control characters (ESC included) except newline and tab.
pub(crate) fn strip_controls(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect()
}

enum Block<'a> {
    Text(&'a str),
    Fence {
        language: Option<&'a str>,
        code: &'a str,
    },
}

/// Split text on fenced blocks: three backticks, an optional `\w+` language word, a newline,
/// then everything up to the next three backticks.
fn split_fences(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut plain_start = 0;
    let mut search = 0;

    while let Some(rel) = text[search..].find(FENCE) {
        let open = search + rel;
        match parse_fence(text, open) {
            Some((language, code, end)) => {
                if open > plain_start {
                    blocks.push(Block::Text(&text[plain_start..open]));
                }
                blocks.push(Block::Fence { language, code });
                plain_start = end;
                search = end;
            }
            None => search = open + 1,
        }
    }
    if plain_start < text.len() {
        blocks.push(Block::Text(&text[plain_start..]));
    }
    blocks
}

/// Try to read a fenced block starting at `open`. Returns (language, body, end offset).
fn parse_fence(text: &str, open: usize) -> Option<(Option<&str>, &str, usize)> {
    let after = open + FENCE.len();
    let lang_len = text[after..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len() - after);
    let newline = after + lang_len;
    if !text[newline..].starts_with('\n') {
        return None;
    }
    let body_start = newline + 1;
    let close = body_start + text[body_start..].find(FENCE)?;
    let language = (lang_len > 0).then(|| &text[after..newline]);
    Some((language, &text[body_start..close], close + FENCE.len()))
}

/// Remove leading blank lines and trailing whitespace, keeping first-line indentation.
fn trim_code(raw: &str) -> String {
    let mut rest = raw;
    while let Some(pos) = rest.find('\n') {
        if rest[..pos].trim().is_empty() {
            rest = &rest[pos + 1..];
        } else {
            break;
        }
    }
    rest.trim_end().to_string()
}

/// Scanner token: a single character, or an already-extracted inline code span which later
/// passes treat as opaque.
#[derive(Debug, Clone)]
enum Tok {
    Char(char),
    Code(String),
}

impl Tok {
    fn is_star(&self) -> bool {
        matches!(self, Tok::Char('*'))
    }

    /// Emphasis never spans a line.
    fn is_barrier(&self) -> bool {
        match self {
            Tok::Char(c) => *c == '\n',
            Tok::Code(code) => code.contains('\n'),
        }
    }
}

fn inline_nodes(text: &str) -> Vec<RenderNode> {
    bold_pass(&tokenize_inline_code(text))
}

/// Extract single-backtick code spans. An empty pair of backticks is literal text.
fn tokenize_inline_code(text: &str) -> Vec<Tok> {
    let chars: Vec<char> = text.chars().collect();
    let mut toks = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '`' {
            if let Some(len) = chars[i + 1..].iter().position(|c| *c == '`') {
                if len > 0 {
                    toks.push(Tok::Code(chars[i + 1..i + 1 + len].iter().collect()));
                    i += len + 2;
                    continue;
                }
            }
        }
        toks.push(Tok::Char(chars[i]));
        i += 1;
    }
    toks
}

/// Position of the next `**` at or after `from`, stopping at a line barrier.
fn find_double_star(toks: &[Tok], from: usize) -> Option<usize> {
    let mut j = from;
    while j + 1 < toks.len() {
        if toks[j].is_barrier() {
            return None;
        }
        if toks[j].is_star() && toks[j + 1].is_star() {
            return Some(j);
        }
        j += 1;
    }
    None
}

fn bold_pass(toks: &[Tok]) -> Vec<RenderNode> {
    let mut nodes = Vec::new();
    let mut stretch: Vec<Tok> = Vec::new();
    let mut i = 0;

    while i < toks.len() {
        let opens = toks[i].is_star() && toks.get(i + 1).is_some_and(Tok::is_star);
        if !opens {
            stretch.push(toks[i].clone());
            i += 1;
            continue;
        }
        match find_double_star(toks, i + 2) {
            Some(close) if close > i + 2 => {
                nodes.extend(italic_pass(&stretch));
                stretch.clear();
                nodes.push(RenderNode::Bold(italic_pass(&toks[i + 2..close])));
                i = close + 2;
            }
            Some(close) => {
                // `****`: empty bold stays literal
                stretch.extend_from_slice(&toks[i..close + 2]);
                i = close + 2;
            }
            None => {
                stretch.extend_from_slice(&toks[i..i + 2]);
                i += 2;
            }
        }
    }
    nodes.extend(italic_pass(&stretch));
    nodes
}

fn italic_pass(toks: &[Tok]) -> Vec<RenderNode> {
    let mut nodes = Vec::new();
    let mut stretch: Vec<Tok> = Vec::new();
    let mut i = 0;

    while i < toks.len() {
        if !toks[i].is_star() {
            stretch.push(toks[i].clone());
            i += 1;
            continue;
        }
        let run = toks[i..].iter().take_while(|t| t.is_star()).count();
        if run >= 2 {
            stretch.extend_from_slice(&toks[i..i + run]);
            i += run;
            continue;
        }
        let close = toks[i + 1..]
            .iter()
            .take_while(|t| !t.is_barrier())
            .position(Tok::is_star)
            .map(|p| i + 1 + p);
        match close {
            Some(close) => {
                nodes.extend(leaf_nodes(&stretch));
                stretch.clear();
                nodes.push(RenderNode::Italic(leaf_nodes(&toks[i + 1..close])));
                i = close + 1;
            }
            None => {
                stretch.push(toks[i].clone());
                i += 1;
            }
        }
    }
    nodes.extend(leaf_nodes(&stretch));
    nodes
}

fn leaf_nodes(toks: &[Tok]) -> Vec<RenderNode> {
    let mut nodes = Vec::new();
    let mut buf = String::new();
    for tok in toks {
        match tok {
            Tok::Char('\n') => {
                flush_text(&mut buf, &mut nodes);
                nodes.push(RenderNode::LineBreak);
            }
            Tok::Char(c) => buf.push(*c),
            Tok::Code(code) => {
                flush_text(&mut buf, &mut nodes);
                nodes.push(RenderNode::InlineCode(code.clone()));
            }
        }
    }
    flush_text(&mut buf, &mut nodes);
    nodes
}

fn flush_text(buf: &mut String, nodes: &mut Vec<RenderNode>) {
    if !buf.is_empty() {
        nodes.push(RenderNode::PlainText(std::mem::take(buf)));
    }
}
