use serde::Serialize;

const BOLD_MARKER: &str = "**";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InlineSpan {
    Bold(String),
    Emoji(char),
    Plain(String),
}

impl InlineSpan {
    pub fn text(&self) -> String {
        match self {
            Self::Bold(text) | Self::Plain(text) => text.clone(),
            Self::Emoji(symbol) => symbol.to_string(),
        }
    }
}

/// Pictographs in U+1F300..=U+1F9FF are split out as their own spans.
pub fn is_emoji(symbol: char) -> bool {
    ('\u{1F300}'..='\u{1F9FF}').contains(&symbol)
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a run of text into bold, emoji and plain spans.
///
/// Bold spans are non-nested `**...**` pairs whose interior holds no `*`.
/// A `**` that does not open a valid span is kept as literal text.
pub fn tokenize(raw: &str) -> Vec<InlineSpan> {
    let text = collapse_whitespace(raw);
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let rest = &text[cursor..];

        if let Some((interior, consumed)) = bold_span_at(rest) {
            flush_plain(&mut plain, &mut spans);
            let interior = interior.trim();
            if !interior.is_empty() {
                spans.push(InlineSpan::Bold(interior.to_string()));
            }
            cursor += consumed;
            continue;
        }

        let Some(symbol) = rest.chars().next() else {
            break;
        };
        if is_emoji(symbol) {
            flush_plain(&mut plain, &mut spans);
            spans.push(InlineSpan::Emoji(symbol));
        } else {
            plain.push(symbol);
        }
        cursor += symbol.len_utf8();
    }

    flush_plain(&mut plain, &mut spans);
    spans
}

/// Returns the interior of a bold span starting at the head of `rest`, plus
/// the number of bytes the span occupies.
pub(crate) fn bold_span_at(rest: &str) -> Option<(&str, usize)> {
    let after_open = rest.strip_prefix(BOLD_MARKER)?;
    let interior_len = after_open.find('*')?;
    if interior_len == 0 || !after_open[interior_len..].starts_with(BOLD_MARKER) {
        return None;
    }

    Some((
        &after_open[..interior_len],
        BOLD_MARKER.len() * 2 + interior_len,
    ))
}

fn flush_plain(buffer: &mut String, spans: &mut Vec<InlineSpan>) {
    let normalized = collapse_whitespace(buffer);
    buffer.clear();
    if !normalized.is_empty() {
        spans.push(InlineSpan::Plain(normalized));
    }
}
