use chrono::{DateTime, Utc};

use crate::llm::{MainContent, Recommendation, StructuredContent, WhenToSeekHelp};
use crate::models::{Message, MessageContent};

/// Id of the seeded greeting; user turns continue from here.
pub const SEED_MESSAGE_ID: &str = "1";

pub const COMPLETION_FAILURE_MESSAGE: &str =
    "I apologize, but I'm having trouble responding right now. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub id: &'static str,
    pub label: &'static str,
    pub message: &'static str,
    pub icon: &'static str,
}

pub const QUICK_ACTIONS: [QuickAction; 6] = [
    QuickAction {
        id: "symptoms",
        label: "Symptom Checker",
        message: "I have some symptoms I'd like to discuss. Can you help me understand what they might mean?",
        icon: "🩺",
    },
    QuickAction {
        id: "wellness",
        label: "Wellness Tips",
        message: "Can you give me some general wellness and health tips for maintaining good health?",
        icon: "💪",
    },
    QuickAction {
        id: "nutrition",
        label: "Nutrition Advice",
        message: "I'd like some advice about healthy eating and nutrition. What should I know?",
        icon: "🥗",
    },
    QuickAction {
        id: "exercise",
        label: "Exercise Guidance",
        message: "Can you provide guidance on safe and effective exercise routines for general health?",
        icon: "🏃‍♂️",
    },
    QuickAction {
        id: "mental-health",
        label: "Mental Health",
        message: "I'd like to discuss mental health and stress management techniques. Can you help?",
        icon: "🧠",
    },
    QuickAction {
        id: "medication",
        label: "Medication Info",
        message: "I have questions about medications and their general effects. Can you provide information?",
        icon: "💊",
    },
];

pub fn find_quick_action(id: &str) -> Option<&'static QuickAction> {
    QUICK_ACTIONS.iter().find(|action| action.id == id)
}

/// Greeting that opens every new encounter.
pub fn welcome_message(at: DateTime<Utc>) -> Message {
    let content = StructuredContent {
        greeting: Some("Welcome to Your AI Medical Assistant! 🤗".to_string()),
        main_content: Some(MainContent {
            summary: Some(
                "I'm here to help you with health-related questions and provide general medical guidance."
                    .to_string(),
            ),
            key_points: strings(&[
                "General health information and wellness tips",
                "Symptom guidance and when to seek care",
                "Nutrition and exercise recommendations",
                "Mental health and stress management",
                "Medication information (general)",
                "Preventive care suggestions",
            ]),
            recommendations: vec![
                Recommendation {
                    title: "Ask Questions".to_string(),
                    description:
                        "Feel free to ask about any health concerns or symptoms you may have"
                            .to_string(),
                    icon: "🩺".to_string(),
                },
                Recommendation {
                    title: "Use Quick Actions".to_string(),
                    description: "Try the quick action buttons below for common health topics"
                        .to_string(),
                    icon: "⚡".to_string(),
                },
            ],
        }),
        when_to_seek_help: Some(WhenToSeekHelp {
            urgent_signs: strings(&[
                "Severe chest pain",
                "Difficulty breathing",
                "Loss of consciousness",
            ]),
            consult_doctor: strings(&[
                "Persistent symptoms",
                "Worsening conditions",
                "Medication questions",
            ]),
        }),
        disclaimer: Some(
            "I provide general information only and cannot replace professional medical advice. Always consult healthcare professionals for personalized care."
                .to_string(),
        ),
        supportive_closing: Some("How can I help you today? 💙".to_string()),
    };

    Message::assistant(SEED_MESSAGE_ID, MessageContent::Structured(content), at)
}

/// Shorter greeting shown after the visible conversation is cleared.
pub fn welcome_back_message(at: DateTime<Utc>) -> Message {
    let content = StructuredContent {
        greeting: Some("Welcome Back! 🤗".to_string()),
        main_content: Some(MainContent {
            summary: Some(
                "I'm your AI medical assistant, ready to help with your health questions."
                    .to_string(),
            ),
            key_points: Vec::new(),
            recommendations: Vec::new(),
        }),
        when_to_seek_help: Some(WhenToSeekHelp::default()),
        disclaimer: Some(
            "This is general information only. Always consult healthcare professionals for medical advice."
                .to_string(),
        ),
        supportive_closing: Some("How can I assist you today? 💙".to_string()),
    };

    Message::assistant(SEED_MESSAGE_ID, MessageContent::Structured(content), at)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
