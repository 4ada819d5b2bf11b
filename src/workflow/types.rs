/// Core workflow type definitions
///
/// Nodes and edges arrive in the shape a node-graph editor produces
/// (`{id, type, data: {label}}` and `{source, target}`). Raw per-node values are
/// supplied separately and may carry uploaded file bytes, which the engine never
/// inspects.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use indexmap::IndexMap;

/// Label used when a node carries no display name
pub const DEFAULT_NODE_LABEL: &str = "Unknown Node";

/// A single unit of work in the workflow graph
///
/// The `type` tag selects the processing capability; the engine never
/// interprets it beyond the registry lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the submitted graph (e.g. "node_1")
    pub id: String,
    /// Capability tag (e.g. "textInput", "promptNode")
    #[serde(rename = "type")]
    pub node_type: String,
    /// Editor payload; only `label` is meaningful to the engine
    #[serde(default)]
    pub data: NodeData,
}

/// Editor-supplied node payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Anything else the editor attached (positions, UI state). Carried, never read.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: NodeData::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.label = Some(label.into());
        self
    }

    /// Display name, falling back to "Unknown Node"
    pub fn label(&self) -> &str {
        self.data.label.as_deref().unwrap_or(DEFAULT_NODE_LABEL)
    }
}

/// Directed "produces input for" relation between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Producing node ID
    pub source: String,
    /// Consuming node ID
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// An uploaded file handed to a node as part of its raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Original file name, including extension
    pub name: String,
    /// MIME type reported by the client, if any
    pub content_type: Option<String>,
    /// Raw file content
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// Lowercased extension without the dot, if the name has one
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

impl Serialize for FilePayload {
    /// Byte content leaves the process base64-encoded
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("FilePayload", 3)?;
        state.serialize_field("file_name", &self.name)?;
        state.serialize_field("content_type", &self.content_type)?;
        state.serialize_field("content", &BASE64.encode(&self.bytes))?;
        state.end()
    }
}

/// Raw value supplied by the caller for one node
///
/// Either structured data (text, JSON) or a list of uploaded files. The engine
/// passes it through untouched; decoding is a processor concern.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Json(Value),
    Files(Vec<FilePayload>),
}

impl RawValue {
    /// The empty structured value used when a node has no raw input
    pub fn empty() -> Self {
        RawValue::Json(Value::Object(Map::new()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        RawValue::Json(Value::String(text.into()))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RawValue::Json(value) => Some(value),
            RawValue::Files(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn files(&self) -> Option<&[FilePayload]> {
        match self {
            RawValue::Files(files) => Some(files),
            RawValue::Json(_) => None,
        }
    }

    /// JSON rendering with file bytes base64-encoded
    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Json(value) => value.clone(),
            RawValue::Files(files) => {
                serde_json::to_value(files).unwrap_or_else(|_| Value::Array(Vec::new()))
            }
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        RawValue::empty()
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        RawValue::Json(value)
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Json(value) => value.serialize(serializer),
            RawValue::Files(files) => files.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    /// JSON bodies can only carry structured values; files arrive via multipart
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(RawValue::Json)
    }
}

/// Raw values keyed by node id, in the order they were submitted.
/// Absent entries mean "empty structured value".
pub type NodeValues = IndexMap<String, RawValue>;

/// The value actually handed to a processing capability
#[derive(Debug, Clone, Serialize)]
pub struct NodeInputBundle {
    /// Raw value for this node, or the empty structured value
    pub input: RawValue,
    /// Recorded output of each direct predecessor, keyed by predecessor id
    pub previous_output: Map<String, Value>,
}

/// What the result store keeps for one executed node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeResult {
    pub input: RawValue,
    pub output: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_deserializes_editor_shape() {
        let node: Node = serde_json::from_value(json!({
            "id": "node_1",
            "type": "textInput",
            "position": {"x": 10, "y": 20},
            "data": {"label": "Text Input", "value": "hi"}
        }))
        .unwrap();

        assert_eq!(node.id, "node_1");
        assert_eq!(node.node_type, "textInput");
        assert_eq!(node.label(), "Text Input");
        assert_eq!(node.data.extra["value"], "hi");
    }

    #[test]
    fn test_missing_label_falls_back() {
        let node: Node = serde_json::from_value(json!({"id": "a", "type": "x"})).unwrap();
        assert_eq!(node.label(), DEFAULT_NODE_LABEL);
    }

    #[test]
    fn test_files_serialize_as_base64() {
        let value = RawValue::Files(vec![FilePayload::new("a.bin", vec![0u8, 159, 146, 150])]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json[0]["file_name"], "a.bin");
        assert_eq!(json[0]["content"], "AJ+Slg==");
    }

    #[test]
    fn test_empty_raw_value_is_empty_object() {
        assert_eq!(RawValue::empty().to_json(), json!({}));
        assert_eq!(RawValue::default(), RawValue::empty());
    }

    #[test]
    fn test_file_extension_is_lowercased() {
        assert_eq!(FilePayload::new("Report.PDF", vec![]).extension().as_deref(), Some("pdf"));
        assert_eq!(FilePayload::new("README", vec![]).extension(), None);
    }
}
