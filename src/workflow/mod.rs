//! Workflow graphs in ComfyUI's API format.
//!
//! A workflow maps node ids to nodes; each node carries a `class_type` and a
//! bag of inputs. Inputs the relay knows about are typed, anything else is
//! kept verbatim so custom node types pass through untouched.
//!
//! - `template`: the built-in text-to-image graph.
//! - `overrides`: `KEY.PATH=VALUE` edits applied before submission.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod overrides;
pub mod template;

/// Node id of the sampler every submitted workflow must contain.
pub const DEFAULT_REQUIRED_NODE: &str = "3";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid workflow JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workflow must be a JSON object mapping node ids to nodes")]
    NotAnObject,

    #[error("Required node '{0}' is missing from the workflow")]
    MissingNode(String),

    #[error("{0}")]
    Override(String),
}

/// Link to another node's output: `["<node id>", <slot>]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef(pub String, pub u32);

impl NodeRef {
    pub fn new(node: impl Into<String>, slot: u32) -> Self {
        NodeRef(node.into(), slot)
    }

    pub fn node(&self) -> &str {
        &self.0
    }
}

/// A scalar input: either a literal or a link to another node's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input<T> {
    Link(NodeRef),
    Value(T),
}

impl<T> Input<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Input::Value(v) => Some(v),
            Input::Link(_) => None,
        }
    }

    pub fn link(&self) -> Option<&NodeRef> {
        match self {
            Input::Link(r) => Some(r),
            Input::Value(_) => None,
        }
    }
}

impl<T> From<T> for Input<T> {
    fn from(value: T) -> Self {
        Input::Value(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg: Option<Input<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denoise: Option<Input<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<Input<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Input<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<Input<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Input<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Input<u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<Input<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<Input<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ckpt_name: Option<Input<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Input<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_prefix: Option<Input<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latent_image: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vae: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<NodeRef>,

    /// Inputs of node types the relay has no typed field for.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeInputs {
    /// All node links held by the typed inputs, reference fields first.
    pub fn references(&self) -> impl Iterator<Item = &NodeRef> {
        let refs = [
            &self.model,
            &self.positive,
            &self.negative,
            &self.latent_image,
            &self.clip,
            &self.samples,
            &self.vae,
            &self.images,
        ]
        .into_iter()
        .flatten();
        let numeric = [&self.cfg, &self.denoise]
            .into_iter()
            .flatten()
            .filter_map(Input::link);
        let integral = [&self.seed]
            .into_iter()
            .flatten()
            .filter_map(Input::link)
            .chain(
                [&self.steps, &self.batch_size, &self.height, &self.width]
                    .into_iter()
                    .flatten()
                    .filter_map(Input::link),
            );
        let text = [
            &self.sampler_name,
            &self.scheduler,
            &self.ckpt_name,
            &self.text,
            &self.filename_prefix,
        ]
        .into_iter()
        .flatten()
        .filter_map(Input::link);
        refs.chain(numeric).chain(integral).chain(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub class_type: String,
    #[serde(default)]
    pub inputs: NodeInputs,
    /// Sibling keys such as `_meta`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(class_type: impl Into<String>, inputs: NodeInputs) -> Self {
        Node {
            class_type: class_type.into(),
            inputs,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow {
    nodes: BTreeMap<String, Node>,
}

impl Workflow {
    pub fn new(nodes: BTreeMap<String, Node>) -> Self {
        Workflow { nodes }
    }

    /// Parse a workflow string.
    ///
    /// Accepts the bare node map as well as the `{"nodes": {...}}` and
    /// `{"prompt": {...}}` envelopes.
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, WorkflowError> {
        let Value::Object(mut obj) = value else {
            return Err(WorkflowError::NotAnObject);
        };
        let graph = match unwrap_envelope(&mut obj) {
            Some(inner) => inner,
            None => Value::Object(obj),
        };
        if !graph.is_object() {
            return Err(WorkflowError::NotAnObject);
        }
        Ok(serde_json::from_value(graph)?)
    }

    pub fn to_value(&self) -> Value {
        // A map of plain structs always serializes.
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn require_node(&self, id: &str) -> Result<&Node, WorkflowError> {
        self.nodes
            .get(id)
            .ok_or_else(|| WorkflowError::MissingNode(id.to_string()))
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn unwrap_envelope(obj: &mut Map<String, Value>) -> Option<Value> {
    for key in ["nodes", "prompt"] {
        let is_envelope = obj
            .get(key)
            .and_then(|v| v.as_object())
            .map(|inner| !inner.contains_key("class_type"))
            .unwrap_or(false);
        if is_envelope {
            return obj.remove(key);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GRAPH: &str = r#"{
        "3": {"class_type": "KSampler", "inputs": {"cfg": 8, "seed": 42, "steps": 20,
              "sampler_name": "euler", "model": ["4", 0], "positive": ["6", 0]}},
        "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "v1.ckpt"}},
        "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "a cat", "clip": ["4", 1]}}
    }"#;

    #[test]
    fn parses_bare_node_map() {
        let wf = Workflow::parse(GRAPH).unwrap();
        assert_eq!(wf.len(), 3);
        let sampler = wf.require_node("3").unwrap();
        assert_eq!(sampler.class_type, "KSampler");
        assert_eq!(sampler.inputs.cfg, Some(Input::Value(8.0)));
        assert_eq!(sampler.inputs.seed, Some(Input::Value(42)));
        assert_eq!(sampler.inputs.model, Some(NodeRef::new("4", 0)));
    }

    #[test]
    fn parses_nodes_and_prompt_envelopes() {
        for key in ["nodes", "prompt"] {
            let raw = format!(r#"{{"{key}": {GRAPH}}}"#);
            let wf = Workflow::parse(&raw).unwrap();
            assert_eq!(wf.len(), 3, "envelope {key}");
            assert!(wf.node("6").is_some());
        }
    }

    #[test]
    fn missing_required_node_is_reported() {
        let wf = Workflow::parse(r#"{"4": {"class_type": "CheckpointLoaderSimple"}}"#).unwrap();
        let err = wf.require_node(DEFAULT_REQUIRED_NODE).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingNode(ref id) if id == "3"));
    }

    #[test]
    fn rejects_malformed_and_non_object_input() {
        assert!(matches!(Workflow::parse("{not json"), Err(WorkflowError::Json(_))));
        assert!(matches!(Workflow::parse("[1, 2]"), Err(WorkflowError::NotAnObject)));
        assert!(matches!(Workflow::parse(r#"{"nodes": 5}"#), Err(WorkflowError::Json(_))));
    }

    #[test]
    fn rejects_mistyped_known_input() {
        let raw = r#"{"3": {"class_type": "KSampler", "inputs": {"steps": "many"}}}"#;
        assert!(matches!(Workflow::parse(raw), Err(WorkflowError::Json(_))));
    }

    #[test]
    fn unknown_inputs_and_meta_survive_serialization() {
        let raw = json!({
            "12": {
                "class_type": "LoraLoader",
                "inputs": {"lora_name": "x.safetensors", "strength_model": 0.7, "model": ["4", 0]},
                "_meta": {"title": "Lora"}
            }
        });
        let wf = Workflow::from_value(raw.clone()).unwrap();
        assert_eq!(wf.to_value(), raw);
    }

    #[test]
    fn scalar_inputs_accept_links() {
        let raw = json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": ["10", 0], "steps": 20, "model": ["4", 0]}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": ["11", 0], "clip": ["4", 1]}},
            "10": {"class_type": "PrimitiveNode", "inputs": {"value": 7}},
            "11": {"class_type": "StringConstant", "inputs": {"string": "a fox"}}
        });
        let wf = Workflow::from_value(raw.clone()).unwrap();

        let sampler = wf.require_node("3").unwrap();
        assert_eq!(sampler.inputs.seed, Some(Input::Link(NodeRef::new("10", 0))));
        assert_eq!(sampler.inputs.steps, Some(Input::Value(20)));
        let encoder = wf.node("6").unwrap();
        assert_eq!(
            encoder.inputs.text.as_ref().and_then(Input::link),
            Some(&NodeRef::new("11", 0))
        );
        let refs: Vec<&str> = sampler.inputs.references().map(NodeRef::node).collect();
        assert_eq!(refs, vec!["4", "10"]);

        assert_eq!(wf.to_value(), raw);
    }

    #[test]
    fn references_serialize_as_pairs() {
        let wf = Workflow::parse(GRAPH).unwrap();
        let value = wf.to_value();
        assert_eq!(value["3"]["inputs"]["positive"], json!(["6", 0]));
        let refs: Vec<&str> = wf.node("3").unwrap().inputs.references().map(NodeRef::node).collect();
        assert_eq!(refs, vec!["4", "6"]);
    }
}
