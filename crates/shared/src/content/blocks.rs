use serde::Serialize;

use super::inline::{InlineSpan, bold_span_at, collapse_whitespace, tokenize};

const BULLET_GLYPHS: [char; 3] = ['•', '-', '*'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BlockNode {
    OrderedList(Vec<OrderedItem>),
    BulletList(Vec<BulletItem>),
    Heading(Vec<InlineSpan>),
    Subheading(Vec<InlineSpan>),
    Paragraph(Vec<InlineSpan>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderedItem {
    /// Number as written, e.g. `"3"`; not renumbered.
    pub number: String,
    pub spans: Vec<InlineSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulletItem {
    pub spans: Vec<InlineSpan>,
}

enum Classification {
    NoMatch,
    Block(BlockNode),
    /// Matched, but nothing renderable survived.
    Empty,
}

type Matcher = fn(&str) -> Classification;

const MATCHERS: [Matcher; 5] = [
    match_numbered_list,
    match_bullet_list,
    match_heading,
    match_subheading,
    match_paragraph,
];

/// Parses free-form assistant text into display blocks. Never fails.
pub fn parse(raw: &str) -> Vec<BlockNode> {
    paragraphs(raw)
        .iter()
        .filter_map(|paragraph| classify(paragraph))
        .collect()
}

fn classify(paragraph: &str) -> Option<BlockNode> {
    for matcher in MATCHERS {
        match matcher(paragraph) {
            Classification::NoMatch => continue,
            Classification::Block(block) => return Some(block),
            Classification::Empty => return None,
        }
    }
    None
}

/// Blank lines separate paragraphs; lines inside one paragraph are joined.
fn paragraphs(raw: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

fn match_numbered_list(paragraph: &str) -> Classification {
    if numbered_marker_end(paragraph.as_bytes(), 0).is_none() {
        return Classification::NoMatch;
    }

    let items: Vec<OrderedItem> = split_at_boundaries(paragraph, |bytes, at| {
        numbered_marker_end(bytes, at).is_some()
    })
    .into_iter()
    .filter_map(|segment| {
        let marker_end = numbered_marker_end(segment.as_bytes(), 0)?;
        let number = segment[..marker_end - 1].to_string();
        let spans = tokenize(&segment[marker_end..]);
        (!spans.is_empty()).then_some(OrderedItem { number, spans })
    })
    .collect();

    non_empty(items, BlockNode::OrderedList)
}

fn match_bullet_list(paragraph: &str) -> Classification {
    if bullet_marker_end(paragraph, 0).is_none() {
        return Classification::NoMatch;
    }

    let items: Vec<BulletItem> =
        split_at_boundaries(paragraph, |_, at| bullet_marker_end(paragraph, at).is_some())
            .into_iter()
            .filter_map(|segment| {
                let remainder = match bullet_marker_end(segment, 0) {
                    Some(marker_end) => &segment[marker_end..],
                    None => segment,
                };
                let spans = tokenize(remainder);
                (!spans.is_empty()).then_some(BulletItem { spans })
            })
            .collect();

    non_empty(items, BlockNode::BulletList)
}

fn match_heading(paragraph: &str) -> Classification {
    match bold_span_at(paragraph) {
        Some((interior, consumed)) if consumed == paragraph.len() => {
            non_empty(tokenize(interior), BlockNode::Heading)
        }
        _ => Classification::NoMatch,
    }
}

fn match_subheading(paragraph: &str) -> Classification {
    if bold_span_at(paragraph).is_none() {
        return Classification::NoMatch;
    }
    non_empty(tokenize(paragraph), BlockNode::Subheading)
}

fn match_paragraph(paragraph: &str) -> Classification {
    non_empty(tokenize(paragraph), BlockNode::Paragraph)
}

fn non_empty<T>(items: Vec<T>, build: fn(Vec<T>) -> BlockNode) -> Classification {
    if items.is_empty() {
        Classification::Empty
    } else {
        Classification::Block(build(items))
    }
}

/// Splits `paragraph` before every position that follows a space and satisfies
/// `is_boundary`. The first segment always starts at 0.
fn split_at_boundaries(paragraph: &str, is_boundary: impl Fn(&[u8], usize) -> bool) -> Vec<&str> {
    let bytes = paragraph.as_bytes();
    let mut starts = vec![0];
    for at in 1..bytes.len() {
        if bytes[at - 1] == b' ' && paragraph.is_char_boundary(at) && is_boundary(bytes, at) {
            starts.push(at);
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(index, start)| {
            let end = starts.get(index + 1).copied().unwrap_or(paragraph.len());
            paragraph[*start..end].trim()
        })
        .collect()
}

/// `<digits>.` followed by a space or the end of input. Returns the byte just
/// past the dot, so `2.5 mg` is not a list marker.
fn numbered_marker_end(bytes: &[u8], at: usize) -> Option<usize> {
    let digits = bytes
        .get(at..)?
        .iter()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }

    let dot = at + digits;
    if bytes.get(dot) != Some(&b'.') {
        return None;
    }
    match bytes.get(dot + 1) {
        None => Some(dot + 1),
        Some(byte) if byte.is_ascii_whitespace() => Some(dot + 1),
        Some(_) => None,
    }
}

/// `•` anywhere, or `-`/`*` followed by a space or the end of input, so a
/// leading `**bold**` span is not read as a bullet.
fn bullet_marker_end(paragraph: &str, at: usize) -> Option<usize> {
    let glyph = paragraph.get(at..)?.chars().next()?;
    if !BULLET_GLYPHS.contains(&glyph) {
        return None;
    }

    let after = at + glyph.len_utf8();
    if glyph == '•' {
        return Some(after);
    }
    match paragraph[after..].chars().next() {
        None => Some(after),
        Some(next) if next.is_whitespace() => Some(after),
        Some(_) => None,
    }
}
