use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fs, io, path::Path};

use crate::contract::{feature_names, CONTRACT_VERSION, FEATURE_COUNT};
use crate::error::{ArtifactLoadError, InferenceContractError};

/// Index of "booking succeeds" in the classifier output. Fixed by the
/// fitting pipeline's label encoding; checked against the artifact metadata.
pub const POSITIVE_CLASS_INDEX: usize = 1;

const SUPPORTED_OBJECTIVE: &str = "binary:logistic";

// ---------- On-disk documents ----------

/// Sidecar written next to the artifact by the fitting pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub contract_version: u32,
    #[serde(default)]
    pub model_version: String,
    pub feat_list: Vec<String>,
    pub in_dim: Option<usize>,
    pub positive_class: usize,
}

#[derive(Deserialize)]
struct ArtifactJson {
    learner: LearnerJson,
}

#[derive(Deserialize)]
struct LearnerJson {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterJson,
    learner_model_param: LearnerParamJson,
    objective: ObjectiveJson,
}

#[derive(Deserialize)]
struct BoosterJson {
    name: String,
    model: Option<GbtreeJson>,
}

#[derive(Deserialize)]
struct GbtreeJson {
    trees: Vec<TreeJson>,
}

#[derive(Deserialize)]
struct TreeJson {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    #[serde(default, deserialize_with = "flags")]
    default_left: Vec<bool>,
    #[serde(default)]
    split_type: Vec<u8>,
    #[serde(default)]
    categories_nodes: Vec<i64>,
}

#[derive(Deserialize)]
struct LearnerParamJson {
    base_score: String,
    num_feature: String,
}

#[derive(Deserialize)]
struct ObjectiveJson {
    name: String,
}

// Older writers emit 0/1, newer ones true/false.
fn flags<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<bool>, D::Error> {
    let raw = Vec::<Value>::deserialize(d)?;
    raw.into_iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|x| x != 0.0)),
            other => Err(serde::de::Error::custom(format!(
                "default_left entry must be bool or 0/1, got {other}"
            ))),
        })
        .collect()
}

// Scalars are stringified, sometimes bracketed: "5E-1" or "[5E-1]".
fn param<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ArtifactLoadError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| ArtifactLoadError::Unsupported(format!("{name}={raw:?} is not parseable")))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactLoadError> {
    let txt = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ArtifactLoadError::Missing {
            path: path.to_path_buf(),
        },
        _ => ArtifactLoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_str(&txt).map_err(|source| ArtifactLoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

// ---------- In-memory ensemble ----------

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn compile(idx: usize, t: TreeJson, num_feature: usize) -> Result<Self, ArtifactLoadError> {
        let corrupt = |detail: String| ArtifactLoadError::CorruptTree { tree: idx, detail };

        let n = t.left_children.len();
        if n == 0 {
            return Err(corrupt("no nodes".into()));
        }
        let lens = [
            t.right_children.len(),
            t.split_indices.len(),
            t.split_conditions.len(),
        ];
        if lens.iter().any(|&l| l != n) || (!t.default_left.is_empty() && t.default_left.len() != n)
        {
            return Err(corrupt(format!("node arrays disagree on length {n}")));
        }
        if t.split_type.iter().any(|&s| s != 0) || !t.categories_nodes.is_empty() {
            return Err(ArtifactLoadError::Unsupported(format!(
                "tree {idx} uses categorical splits"
            )));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (l, r) = (t.left_children[i], t.right_children[i]);
            if l == -1 && r == -1 {
                nodes.push(Node::Leaf(t.split_conditions[i]));
                continue;
            }
            // Children are always allocated after their parent; this also rules out cycles.
            let child = |c: i64| usize::try_from(c).ok().filter(|&c| c > i && c < n);
            let (Some(left), Some(right)) = (child(l), child(r)) else {
                return Err(corrupt(format!("node {i} has invalid children ({l}, {r})")));
            };
            let feature = usize::try_from(t.split_indices[i])
                .ok()
                .filter(|&f| f < num_feature)
                .ok_or_else(|| {
                    corrupt(format!(
                        "node {i} splits on feature {} of {num_feature}",
                        t.split_indices[i]
                    ))
                })?;
            nodes.push(Node::Split {
                feature,
                threshold: t.split_conditions[i],
                left,
                right,
                default_left: t.default_left.get(i).copied().unwrap_or(false),
            });
        }
        Ok(Self { nodes })
    }

    fn leaf_value(&self, tree: usize, x: &[f32]) -> Result<f32, InferenceContractError> {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf(v) => return Ok(v),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let v = *x.get(feature).ok_or(InferenceContractError::SplitOutOfRange {
                        tree,
                        index: feature,
                        dim: x.len(),
                    })?;
                    let go_left = if v.is_nan() { default_left } else { v < threshold };
                    at = if go_left { left } else { right };
                }
            }
        }
    }
}

/// Loaded scoring artifact: a gradient-boosted binary classifier plus the
/// metadata that ties it to this feature contract. Immutable once built.
#[derive(Debug)]
pub struct Model {
    trees: Vec<Tree>,
    base_margin: f32,
    num_feature: usize,
    meta: ArtifactMeta,
}

impl Model {
    /// Load the artifact and its sidecar, refusing anything that does not
    /// line up with the compiled-in contract.
    pub fn load(model_path: &Path, meta_path: &Path) -> Result<Self, ArtifactLoadError> {
        let meta: ArtifactMeta = read_json(meta_path)?;
        let artifact: ArtifactJson = read_json(model_path)?;
        Self::from_documents(artifact, meta)
    }

    /// Build from in-memory JSON documents (artifact, metadata).
    pub fn from_json(artifact: Value, meta: Value) -> Result<Self, ArtifactLoadError> {
        let bad = |source| ArtifactLoadError::Malformed {
            path: "<memory>".into(),
            source,
        };
        let artifact: ArtifactJson = serde_json::from_value(artifact).map_err(bad)?;
        let meta: ArtifactMeta = serde_json::from_value(meta).map_err(bad)?;
        Self::from_documents(artifact, meta)
    }

    fn from_documents(artifact: ArtifactJson, meta: ArtifactMeta) -> Result<Self, ArtifactLoadError> {
        check_meta(&meta)?;

        let learner = artifact.learner;
        if learner.objective.name != SUPPORTED_OBJECTIVE {
            return Err(ArtifactLoadError::Unsupported(format!(
                "objective {:?}, expected {SUPPORTED_OBJECTIVE:?}",
                learner.objective.name
            )));
        }
        let gbtree = match (learner.gradient_booster.name.as_str(), learner.gradient_booster.model) {
            ("gbtree", Some(m)) => m,
            (name, _) => {
                return Err(ArtifactLoadError::Unsupported(format!("booster {name:?}")));
            }
        };

        let num_feature: usize = param("num_feature", &learner.learner_model_param.num_feature)?;
        if num_feature != FEATURE_COUNT {
            return Err(ArtifactLoadError::ArityMismatch {
                expected: FEATURE_COUNT,
                found: num_feature,
            });
        }
        if !learner.feature_names.is_empty() {
            check_order(&learner.feature_names)?;
        }

        let base_score: f32 = param("base_score", &learner.learner_model_param.base_score)?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(ArtifactLoadError::Unsupported(format!(
                "base_score {base_score} outside (0, 1)"
            )));
        }
        let base_margin = (base_score / (1.0 - base_score)).ln();

        let trees = gbtree
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| Tree::compile(i, t, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            base_margin,
            num_feature,
            meta,
        })
    }

    pub fn meta(&self) -> &ArtifactMeta {
        &self.meta
    }

    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for the positive class.
    pub fn margin(&self, x: &[f32]) -> Result<f32, InferenceContractError> {
        if x.len() != self.num_feature {
            return Err(InferenceContractError::DimensionMismatch {
                expected: self.num_feature,
                found: x.len(),
            });
        }
        let mut m = self.base_margin;
        for (i, t) in self.trees.iter().enumerate() {
            m += t.leaf_value(i, x)?;
        }
        if !m.is_finite() {
            return Err(InferenceContractError::NonFinite(m));
        }
        Ok(m)
    }

    /// `[p(class 0), p(class 1)]`.
    pub fn class_probabilities(&self, x: &[f32]) -> Result<[f64; 2], InferenceContractError> {
        let p = sigmoid(f64::from(self.margin(x)?));
        Ok([1.0 - p, p])
    }

    /// Probability that the booking succeeds.
    pub fn score(&self, x: &[f32]) -> Result<f64, InferenceContractError> {
        Ok(self.class_probabilities(x)?[POSITIVE_CLASS_INDEX])
    }
}

fn sigmoid(m: f64) -> f64 {
    1.0 / (1.0 + (-m).exp())
}

fn check_meta(meta: &ArtifactMeta) -> Result<(), ArtifactLoadError> {
    if meta.contract_version != CONTRACT_VERSION {
        return Err(ArtifactLoadError::ContractVersionMismatch {
            expected: CONTRACT_VERSION,
            found: meta.contract_version,
        });
    }
    check_order(&meta.feat_list)?;
    if let Some(in_dim) = meta.in_dim.filter(|&d| d != FEATURE_COUNT) {
        return Err(ArtifactLoadError::ArityMismatch {
            expected: FEATURE_COUNT,
            found: in_dim,
        });
    }
    if meta.positive_class != POSITIVE_CLASS_INDEX {
        return Err(ArtifactLoadError::PositiveClassMismatch {
            expected: POSITIVE_CLASS_INDEX,
            found: meta.positive_class,
        });
    }
    Ok(())
}

fn check_order(found: &[String]) -> Result<(), ArtifactLoadError> {
    let expected = feature_names();
    if found.len() != expected.len() {
        return Err(ArtifactLoadError::ArityMismatch {
            expected: expected.len(),
            found: found.len(),
        });
    }
    if found.iter().zip(&expected).any(|(a, b)| a != b) {
        return Err(ArtifactLoadError::FeatureOrderMismatch {
            expected: expected.iter().map(|s| s.to_string()).collect(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
