//! Chain documents: the portable JSON form of a simulation.
//!
//! ## Format
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "timestamp": "2025-01-01T12:00:00.000Z",
//!   "nodes": [{ "id": 0, "x": 600.0, "y": 300.0, "color": "#4f46e5" }, ...],
//!   "transitionMatrix": [[0.2, 0.8], ...],     // N x N
//!   "currentNode": 0,
//!   "nodeVisits": [1, 0, ...],                  // length N
//!   "totalSteps": 0,
//!   "nextNodeId": 2
//! }
//! ```
//!
//! Loading validates the whole payload before touching the simulation, so a
//! rejected document leaves the previous chain in place.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use markov_stepper_core::{
    is_valid_probability, ChainError, ChainResult, Position, StateNode, TransitionMatrix,
};

use crate::error::{EngineError, EngineResult};
use crate::simulation::Simulation;
use crate::stats::VisitStats;
use crate::store::ChainStore;

/// Version written into saved documents.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Extension required of document files.
pub const DOCUMENT_EXTENSION: &str = "json";

/// One state as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

impl From<&StateNode> for NodeRecord {
    fn from(node: &StateNode) -> Self {
        Self {
            id: node.id,
            x: node.position.x,
            y: node.position.y,
            color: node.color.clone(),
        }
    }
}

impl From<NodeRecord> for StateNode {
    fn from(record: NodeRecord) -> Self {
        StateNode::new(record.id, Position::new(record.x, record.y), record.color)
    }
}

/// A saved chain with its simulation progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDocument {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub timestamp: Option<String>,

    pub nodes: Vec<NodeRecord>,

    pub transition_matrix: Vec<Vec<f64>>,

    #[serde(default, deserialize_with = "lenient_index")]
    pub current_node: Option<i64>,

    #[serde(default)]
    pub node_visits: Option<Vec<u64>>,

    #[serde(default)]
    pub total_steps: Option<u64>,

    #[serde(default)]
    pub next_node_id: Option<u64>,
}

impl ChainDocument {
    /// Capture the current state of a simulation.
    pub fn capture(sim: &Simulation) -> Self {
        let store = sim.store();
        Self {
            version: Some(DOCUMENT_VERSION.to_string()),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            nodes: store.nodes().iter().map(NodeRecord::from).collect(),
            transition_matrix: store.matrix().rows().to_vec(),
            current_node: Some(sim.current_state() as i64),
            node_visits: Some(sim.stats().visits().to_vec()),
            total_steps: Some(sim.stats().total_steps()),
            next_node_id: Some(store.next_node_id()),
        }
    }

    /// Parse and validate a document.
    pub fn from_json(json: &str) -> ChainResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ChainError::invalid_document(format!("could not parse JSON: {}", e)))?;
        validate_document(&value)?;
        serde_json::from_value(value).map_err(|e| ChainError::invalid_document(e.to_string()))
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check the typed document: at least one node, finite node positions and a
    /// square matrix of finite non-negative cells.
    pub fn validate(&self) -> ChainResult<()> {
        let count = self.nodes.len();
        if count == 0 {
            return Err(ChainError::invalid_document("nodes array is empty"));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.x.is_finite() || !node.y.is_finite() {
                return Err(ChainError::invalid_document(format!(
                    "node {} has no finite position",
                    i
                )));
            }
        }

        if self.transition_matrix.len() != count {
            return Err(ChainError::invalid_document(format!(
                "transitionMatrix has {} rows for {} nodes",
                self.transition_matrix.len(),
                count
            )));
        }
        for (i, row) in self.transition_matrix.iter().enumerate() {
            if row.len() != count {
                return Err(ChainError::invalid_document(format!(
                    "transitionMatrix row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    count
                )));
            }
            if let Some(j) = row.iter().position(|&p| !is_valid_probability(p)) {
                return Err(ChainError::invalid_document(format!(
                    "transitionMatrix[{}][{}] is not a non-negative number",
                    i, j
                )));
            }
        }

        Ok(())
    }

    /// Replace the chain in `sim` with this document.
    ///
    /// The document is validated first; a rejected document leaves `sim` untouched.
    /// The running loop is stopped before the swap. A missing or out-of-range current
    /// node becomes 0, missing visit counters become zeros, and a missing id counter
    /// becomes the node count.
    pub fn apply_to(self, sim: &mut Simulation) -> ChainResult<()> {
        self.validate()?;
        let count = self.nodes.len();

        let matrix = TransitionMatrix::from_rows(self.transition_matrix)
            .map_err(|e| ChainError::invalid_document(e.to_string()))?;
        let next_node_id = self.next_node_id.unwrap_or(count as u64);
        let nodes: Vec<StateNode> = self.nodes.into_iter().map(StateNode::from).collect();
        let store = ChainStore::from_parts(nodes, matrix, next_node_id)?;

        let current = match self.current_node {
            Some(index) if index >= 0 && (index as usize) < count => index as usize,
            Some(index) => {
                debug!(index, count, "document_current_node_reset");
                0
            }
            None => 0,
        };

        let visits = match self.node_visits {
            Some(visits) if visits.len() == count => visits,
            Some(visits) => {
                warn!(len = visits.len(), count, "document_visits_length_mismatch");
                vec![0; count]
            }
            None => vec![0; count],
        };
        let stats = VisitStats::from_parts(visits, self.total_steps.unwrap_or(0));

        sim.replace_chain(store, stats, current);
        info!(states = count, current, "document_applied");
        Ok(())
    }
}

/// Read `currentNode` as an integer index. Anything else (fractions, huge
/// values, strings) reads as absent and later falls back to state 0.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_i64().or_else(|| {
            v.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        })
    }))
}

/// Structural checks a document must pass before anything is applied.
pub fn validate_document(value: &Value) -> ChainResult<()> {
    let nodes = value
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::invalid_document("missing nodes array"))?;
    if nodes.is_empty() {
        return Err(ChainError::invalid_document("nodes array is empty"));
    }
    let count = nodes.len();

    let rows = value
        .get("transitionMatrix")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::invalid_document("missing transitionMatrix array"))?;
    if rows.len() != count {
        return Err(ChainError::invalid_document(format!(
            "transitionMatrix has {} rows for {} nodes",
            rows.len(),
            count
        )));
    }

    for (i, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            ChainError::invalid_document(format!("transitionMatrix row {} is not an array", i))
        })?;
        if cells.len() != count {
            return Err(ChainError::invalid_document(format!(
                "transitionMatrix row {} has {} columns, expected {}",
                i,
                cells.len(),
                count
            )));
        }
        for (j, cell) in cells.iter().enumerate() {
            match cell.as_f64() {
                Some(p) if is_valid_probability(p) => {}
                _ => {
                    return Err(ChainError::invalid_document(format!(
                        "transitionMatrix[{}][{}] is not a non-negative number",
                        i, j
                    )))
                }
            }
        }
    }

    for (i, node) in nodes.iter().enumerate() {
        let numeric = |field: &str| node.get(field).is_some_and(Value::is_number);
        if !node.get("id").is_some_and(|id| id.as_u64().is_some()) {
            return Err(ChainError::invalid_document(format!(
                "node {} has no integer id",
                i
            )));
        }
        if !numeric("x") || !numeric("y") {
            return Err(ChainError::invalid_document(format!(
                "node {} has no numeric position",
                i
            )));
        }
        if !node.get("color").is_some_and(Value::is_string) {
            return Err(ChainError::invalid_document(format!(
                "node {} has no color string",
                i
            )));
        }
    }

    Ok(())
}

/// Default file name for an export made now.
pub fn default_file_name() -> String {
    format!(
        "markov_chain_{}.json",
        Utc::now().format("%Y-%m-%dT%H-%M-%S")
    )
}

/// Reads and writes chain documents at a fixed path.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

impl DocumentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the simulation to disk.
    pub fn save(&self, sim: &Simulation) -> EngineResult<PathBuf> {
        let document = ChainDocument::capture(sim);
        let json = document.to_json()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, json)?;

        info!(
            path = %self.path.display(),
            states = document.node_count(),
            total_steps = sim.stats().total_steps(),
            "document_saved"
        );
        Ok(self.path.clone())
    }

    /// Read and validate the document without applying it.
    pub fn read(&self) -> EngineResult<ChainDocument> {
        let has_json_extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
        if !has_json_extension {
            return Err(ChainError::invalid_document("please select a JSON file").into());
        }

        let json = std::fs::read_to_string(&self.path)?;
        ChainDocument::from_json(&json).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "document_rejected");
            EngineError::from(e)
        })
    }

    /// Load the document into `sim`. On any error `sim` is unchanged.
    pub fn load_into(&self, sim: &mut Simulation) -> EngineResult<()> {
        let document = self.read()?;
        document.apply_to(sim)?;
        info!(path = %self.path.display(), "document_loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_json() -> Value {
        json!({
            "version": "1.0",
            "timestamp": "2025-01-01T00:00:00.000Z",
            "nodes": [
                { "id": 0, "x": 100.0, "y": 100.0, "color": "#4f46e5" },
                { "id": 1, "x": 200.0, "y": 150.0, "color": "#06b6d4" }
            ],
            "transitionMatrix": [[0.3, 0.7], [1.0, 0.0]],
            "currentNode": 1,
            "nodeVisits": [2, 3],
            "totalSteps": 4,
            "nextNodeId": 5
        })
    }

    fn sim() -> Simulation {
        Simulation::generated(SimulationConfig::default().with_seed(1), 3).unwrap()
    }

    #[test]
    fn test_load_full_document() {
        let mut s = sim();
        let doc = ChainDocument::from_json(&sample_json().to_string()).unwrap();
        doc.apply_to(&mut s).unwrap();

        assert_eq!(s.store().state_count(), 2);
        assert_eq!(s.store().matrix().rows(), &[vec![0.3, 0.7], vec![1.0, 0.0]]);
        assert_eq!(s.current_state(), 1);
        assert_eq!(s.stats().visits(), &[2, 3]);
        assert_eq!(s.stats().total_steps(), 4);
        assert_eq!(s.store().next_node_id(), 5);
        assert_eq!(s.store().node(1).unwrap().position, Position::new(200.0, 150.0));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let mut value = sample_json();
        let obj = value.as_object_mut().unwrap();
        obj.remove("nodeVisits");
        obj.remove("totalSteps");
        obj.remove("nextNodeId");
        obj.insert("currentNode".into(), json!(9));

        let mut s = sim();
        ChainDocument::from_json(&value.to_string())
            .unwrap()
            .apply_to(&mut s)
            .unwrap();

        assert_eq!(s.current_state(), 0);
        assert_eq!(s.stats().visits(), &[0, 0]);
        assert_eq!(s.stats().total_steps(), 0);
        assert_eq!(s.store().next_node_id(), 2);
    }

    #[test]
    fn test_rejections() {
        let cases: Vec<Box<dyn Fn(&mut Value)>> = vec![
            Box::new(|v| {
                v["nodes"] = json!([]);
            }),
            Box::new(|v| {
                v.as_object_mut().unwrap().remove("transitionMatrix");
            }),
            Box::new(|v| {
                v["transitionMatrix"] = json!([[1.0, 0.0]]);
            }),
            Box::new(|v| {
                v["transitionMatrix"][1] = json!([1.0]);
            }),
            Box::new(|v| {
                v["transitionMatrix"][0][1] = json!(-0.2);
            }),
            Box::new(|v| {
                v["transitionMatrix"][0][1] = json!("0.7");
            }),
            Box::new(|v| {
                v["nodes"][0]["x"] = json!("left");
            }),
            Box::new(|v| {
                v["nodes"][1]["color"] = json!(3);
            }),
            Box::new(|v| {
                v["nodes"][1].as_object_mut().unwrap().remove("id");
            }),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut value = sample_json();
            mutate(&mut value);
            let err = ChainDocument::from_json(&value.to_string()).unwrap_err();
            assert_eq!(err.kind(), "invalid_document", "case {}", i);
        }

        assert!(ChainDocument::from_json("{not json").is_err());
    }

    #[test]
    fn test_apply_validates_typed_document() {
        let empty: ChainDocument =
            serde_json::from_str(r#"{"nodes": [], "transitionMatrix": []}"#).unwrap();
        let mut s = sim();
        let before = s.store().clone();

        let err = empty.apply_to(&mut s).unwrap_err();
        assert_eq!(err.kind(), "invalid_document");
        assert_eq!(s.store(), &before);

        let mut negative = ChainDocument::from_json(&sample_json().to_string()).unwrap();
        negative.transition_matrix[0][1] = -0.5;
        assert_eq!(negative.apply_to(&mut s).unwrap_err().kind(), "invalid_document");

        let mut ragged = ChainDocument::from_json(&sample_json().to_string()).unwrap();
        ragged.transition_matrix[1].push(0.0);
        assert_eq!(ragged.apply_to(&mut s).unwrap_err().kind(), "invalid_document");

        let mut nan_node = ChainDocument::from_json(&sample_json().to_string()).unwrap();
        nan_node.nodes[0].x = f64::NAN;
        assert_eq!(nan_node.apply_to(&mut s).unwrap_err().kind(), "invalid_document");

        assert_eq!(s.store(), &before);
    }

    #[test]
    fn test_non_integer_current_node_falls_back_to_zero() {
        for current in [json!(1.5), json!(1e20), json!("1"), json!(-3)] {
            let mut value = sample_json();
            value["currentNode"] = current.clone();

            let mut s = sim();
            ChainDocument::from_json(&value.to_string())
                .unwrap()
                .apply_to(&mut s)
                .unwrap();
            assert_eq!(s.current_state(), 0, "currentNode {}", current);
        }

        let mut value = sample_json();
        value["currentNode"] = json!(1.0);
        let mut s = sim();
        ChainDocument::from_json(&value.to_string())
            .unwrap()
            .apply_to(&mut s)
            .unwrap();
        assert_eq!(s.current_state(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = DocumentStore::new(temp_dir.path().join("chain.json"));

        let mut original = sim();
        let handle = original.start().unwrap();
        original.fire(handle);
        original.stop();
        store.save(&original).unwrap();

        let mut loaded = Simulation::new(SimulationConfig::default());
        store.load_into(&mut loaded).unwrap();

        assert_eq!(loaded.store(), original.store());
        assert_eq!(loaded.current_state(), original.current_state());
        assert_eq!(loaded.stats(), original.stats());
    }

    #[test]
    fn test_rejects_non_json_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chain.txt");
        std::fs::write(&path, sample_json().to_string()).unwrap();

        let err = DocumentStore::new(&path).read().unwrap_err();
        assert_eq!(err.as_chain().map(ChainError::kind), Some("invalid_document"));
    }

    #[test]
    fn test_default_file_name() {
        let name = default_file_name();
        assert!(name.starts_with("markov_chain_"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains(':'));
    }
}
