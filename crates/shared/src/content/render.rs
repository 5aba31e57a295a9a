use serde::Serialize;

use super::blocks::{BlockNode, parse};
use super::inline::InlineSpan;
use crate::llm::{Recommendation, StructuredContent};
use crate::models::{MessageContent, Role};

pub const DISCLAIMER_LABEL: &str = "Medical Disclaimer";
const DISCLAIMER_ICON: &str = "⚠️";
const RECOMMENDATIONS_TITLE: &str = "Recommendations";
const RECOMMENDATIONS_ICON: &str = "✅";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderTree {
    pub role: Role,
    pub nodes: Vec<RenderNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListSection {
    KeyPoints,
    UrgentSigns,
    ConsultDoctor,
}

impl ListSection {
    pub fn title(self) -> &'static str {
        match self {
            Self::KeyPoints => "Key Information",
            Self::UrgentSigns => "Urgent Signs (Seek immediate care)",
            Self::ConsultDoctor => "Consult a Doctor if",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::KeyPoints => "📋",
            Self::UrgentSigns => "⚠️",
            Self::ConsultDoctor => "🏥",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum RenderNode {
    /// User input, shown verbatim.
    Literal { text: String },
    Block { block: BlockNode },
    Greeting { text: String },
    Summary { text: String },
    ItemList {
        section: ListSection,
        items: Vec<String>,
    },
    Recommendations { items: Vec<Recommendation> },
    Disclaimer { text: String },
    Closing { text: String },
}

/// Builds the display tree for one message. Pure: equal inputs give equal trees.
pub fn render(content: &MessageContent, role: Role) -> RenderTree {
    let nodes = match (role, content) {
        (Role::User, content) => vec![RenderNode::Literal {
            text: content.to_transport_text(),
        }],
        (Role::Assistant, MessageContent::Plain(text)) => parse(text)
            .into_iter()
            .map(|block| RenderNode::Block { block })
            .collect(),
        (Role::Assistant, MessageContent::Structured(structured)) => structured_nodes(structured),
    };

    RenderTree { role, nodes }
}

fn structured_nodes(content: &StructuredContent) -> Vec<RenderNode> {
    let mut nodes = Vec::new();

    if let Some(text) = non_blank(content.greeting.as_deref()) {
        nodes.push(RenderNode::Greeting { text });
    }

    if let Some(main) = content.main_content.as_ref() {
        if let Some(text) = non_blank(main.summary.as_deref()) {
            nodes.push(RenderNode::Summary { text });
        }
        push_item_list(&mut nodes, ListSection::KeyPoints, &main.key_points);

        let recommendations: Vec<Recommendation> = main
            .recommendations
            .iter()
            .filter(|item| !item.title.trim().is_empty() || !item.description.trim().is_empty())
            .cloned()
            .collect();
        if !recommendations.is_empty() {
            nodes.push(RenderNode::Recommendations {
                items: recommendations,
            });
        }
    }

    if let Some(help) = content.when_to_seek_help.as_ref() {
        push_item_list(&mut nodes, ListSection::UrgentSigns, &help.urgent_signs);
        push_item_list(&mut nodes, ListSection::ConsultDoctor, &help.consult_doctor);
    }

    if let Some(text) = non_blank(content.disclaimer.as_deref()) {
        nodes.push(RenderNode::Disclaimer { text });
    }
    if let Some(text) = non_blank(content.supportive_closing.as_deref()) {
        nodes.push(RenderNode::Closing { text });
    }

    nodes
}

fn push_item_list(nodes: &mut Vec<RenderNode>, section: ListSection, items: &[String]) {
    let items: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if !items.is_empty() {
        nodes.push(RenderNode::ItemList { section, items });
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl RenderTree {
    /// Flattens the tree into terminal-friendly text, one blank line between nodes.
    pub fn to_plain_text(&self) -> String {
        self.nodes
            .iter()
            .map(node_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn node_text(node: &RenderNode) -> String {
    match node {
        RenderNode::Literal { text }
        | RenderNode::Greeting { text }
        | RenderNode::Summary { text }
        | RenderNode::Closing { text } => text.clone(),
        RenderNode::Block { block } => block_text(block),
        RenderNode::ItemList { section, items } => {
            let mut lines = vec![format!("{} {}", section.icon(), section.title())];
            lines.extend(items.iter().map(|item| format!("• {item}")));
            lines.join("\n")
        }
        RenderNode::Recommendations { items } => {
            let mut lines = vec![format!("{RECOMMENDATIONS_ICON} {RECOMMENDATIONS_TITLE}")];
            lines.extend(items.iter().map(recommendation_line));
            lines.join("\n")
        }
        RenderNode::Disclaimer { text } => {
            format!("{DISCLAIMER_ICON} {DISCLAIMER_LABEL}: {text}")
        }
    }
}

fn recommendation_line(item: &Recommendation) -> String {
    let mut line = String::new();
    if !item.icon.trim().is_empty() {
        line.push_str(item.icon.trim());
        line.push(' ');
    }
    match (item.title.trim(), item.description.trim()) {
        (title, "") => line.push_str(title),
        ("", description) => line.push_str(description),
        (title, description) => {
            line.push_str(title);
            line.push_str(": ");
            line.push_str(description);
        }
    }
    line
}

fn block_text(block: &BlockNode) -> String {
    match block {
        BlockNode::OrderedList(items) => items
            .iter()
            .map(|item| format!("{}. {}", item.number, spans_text(&item.spans)))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockNode::BulletList(items) => items
            .iter()
            .map(|item| format!("• {}", spans_text(&item.spans)))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockNode::Heading(spans) => format!("# {}", spans_text(spans)),
        BlockNode::Subheading(spans) => format!("## {}", spans_text(spans)),
        BlockNode::Paragraph(spans) => spans_text(spans),
    }
}

fn spans_text(spans: &[InlineSpan]) -> String {
    spans
        .iter()
        .map(InlineSpan::text)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{ListSection, RenderNode, render};
    use crate::content::blocks::BlockNode;
    use crate::llm::{MainContent, Recommendation, StructuredContent, WhenToSeekHelp};
    use crate::models::{MessageContent, Role};

    fn full_payload() -> StructuredContent {
        StructuredContent {
            greeting: Some("Hello there".to_string()),
            main_content: Some(MainContent {
                summary: Some("Headaches are common.".to_string()),
                key_points: vec!["Usually benign".to_string(), " ".to_string()],
                recommendations: vec![Recommendation {
                    title: "Hydrate".to_string(),
                    description: "Drink water".to_string(),
                    icon: "💧".to_string(),
                }],
            }),
            when_to_seek_help: Some(WhenToSeekHelp {
                urgent_signs: vec!["Sudden severe pain".to_string()],
                consult_doctor: vec!["Lasts over a week".to_string()],
            }),
            disclaimer: Some("Not medical advice.".to_string()),
            supportive_closing: Some("Feel better soon".to_string()),
        }
    }

    #[test]
    fn structured_sections_follow_fixed_order() {
        let tree = render(
            &MessageContent::Structured(full_payload()),
            Role::Assistant,
        );
        let kinds: Vec<&str> = tree
            .nodes
            .iter()
            .map(|node| match node {
                RenderNode::Greeting { .. } => "greeting",
                RenderNode::Summary { .. } => "summary",
                RenderNode::ItemList {
                    section: ListSection::KeyPoints,
                    ..
                } => "key_points",
                RenderNode::Recommendations { .. } => "recommendations",
                RenderNode::ItemList {
                    section: ListSection::UrgentSigns,
                    ..
                } => "urgent",
                RenderNode::ItemList {
                    section: ListSection::ConsultDoctor,
                    ..
                } => "consult",
                RenderNode::Disclaimer { .. } => "disclaimer",
                RenderNode::Closing { .. } => "closing",
                other => panic!("unexpected node {other:?}"),
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                "greeting",
                "summary",
                "key_points",
                "recommendations",
                "urgent",
                "consult",
                "disclaimer",
                "closing"
            ]
        );
    }

    #[test]
    fn absent_sections_are_omitted() {
        let content = StructuredContent {
            greeting: Some("Hi".to_string()),
            main_content: Some(MainContent::default()),
            disclaimer: Some("Not advice".to_string()),
            ..StructuredContent::default()
        };
        let tree = render(&MessageContent::Structured(content), Role::Assistant);
        assert_eq!(tree.nodes.len(), 2);
    }

    #[test]
    fn rendering_is_repeatable() {
        let content = MessageContent::Structured(full_payload());
        assert_eq!(
            render(&content, Role::Assistant),
            render(&content, Role::Assistant)
        );
    }

    #[test]
    fn user_markup_is_never_parsed() {
        let tree = render(
            &MessageContent::Plain("**not a heading**".to_string()),
            Role::User,
        );
        assert_eq!(
            tree.nodes,
            vec![RenderNode::Literal {
                text: "**not a heading**".to_string()
            }]
        );
    }

    #[test]
    fn assistant_plain_text_goes_through_block_parser() {
        let tree = render(
            &MessageContent::Plain("**Tips**\n\n- Rest".to_string()),
            Role::Assistant,
        );
        assert!(matches!(
            tree.nodes[0],
            RenderNode::Block {
                block: BlockNode::Heading(_)
            }
        ));
        assert_eq!(tree.to_plain_text(), "# Tips\n\n• Rest");
    }

    #[test]
    fn plain_text_rendering_includes_section_titles() {
        let text = render(
            &MessageContent::Structured(full_payload()),
            Role::Assistant,
        )
        .to_plain_text();
        assert!(text.contains("📋 Key Information\n• Usually benign"));
        assert!(text.contains("💧 Hydrate: Drink water"));
        assert!(text.contains("⚠️ Medical Disclaimer: Not medical advice."));
    }
}
