use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fixed-shape assistant payload.
///
/// Every field is optional here; acceptance of a freshly generated payload is
/// decided by [`super::validation::validate_structured_value`]. Renderers skip
/// whatever is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_content: Option<MainContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_to_seek_help: Option<WhenToSeekHelp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supportive_closing: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MainContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhenToSeekHelp {
    #[serde(default)]
    pub urgent_signs: Vec<String>,
    #[serde(default)]
    pub consult_doctor: Vec<String>,
}

impl StructuredContent {
    /// Reads a payload field by field. A field with an unexpected shape is
    /// treated as absent; empty strings count as absent.
    pub fn from_value_lenient(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        Self {
            greeting: non_empty_string(object.get("greeting")),
            main_content: object
                .get("mainContent")
                .and_then(Value::as_object)
                .map(MainContent::from_object),
            when_to_seek_help: object
                .get("whenToSeekHelp")
                .and_then(Value::as_object)
                .map(WhenToSeekHelp::from_object),
            disclaimer: non_empty_string(object.get("disclaimer")),
            supportive_closing: non_empty_string(object.get("supportiveClosing")),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl MainContent {
    fn from_object(object: &Map<String, Value>) -> Self {
        let recommendations = object
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(Recommendation::from_object)
                    .filter(|item| !item.title.is_empty() || !item.description.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            summary: non_empty_string(object.get("summary")),
            key_points: string_list(object.get("keyPoints")),
            recommendations,
        }
    }
}

impl Recommendation {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            title: non_empty_string(object.get("title")).unwrap_or_default(),
            description: non_empty_string(object.get("description")).unwrap_or_default(),
            icon: non_empty_string(object.get("icon")).unwrap_or_default(),
        }
    }
}

impl WhenToSeekHelp {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            urgent_signs: string_list(object.get("urgentSigns")),
            consult_doctor: string_list(object.get("consultDoctor")),
        }
    }
}

/// JSON schema of [`StructuredContent`], embedded in the completion prompt.
pub fn output_schema() -> Value {
    serde_json::to_value(schema_for!(StructuredContent))
        .expect("structured content schema should be serializable")
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| non_empty_string(Some(item)))
                .collect()
        })
        .unwrap_or_default()
}
