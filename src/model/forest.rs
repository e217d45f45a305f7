//! Tree-ensemble artifact (random-forest export). Each tree is a flat node
//! list rooted at index 0; splits go left when `x <= threshold`, and class
//! probabilities are the mean of the per-tree normalized leaf distributions.

use super::ModelSchema;
use crate::error::LoadError;
use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestArtifact {
    #[serde(flatten)]
    pub schema: ModelSchema,
    pub trees: Vec<Tree>,
}

pub(crate) struct ForestModel {
    trees: Vec<Tree>,
    n_classes: usize,
}

fn validate_tree(t: usize, tree: &Tree, n_classes: usize) -> Result<(), LoadError> {
    if tree.nodes.is_empty() {
        return Err(LoadError::Malformed(format!("tree {} has no nodes", t)));
    }
    for (i, node) in tree.nodes.iter().enumerate() {
        match node {
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= FEATURE_COUNT {
                    return Err(LoadError::Malformed(format!(
                        "tree {} node {}: feature index {} out of range",
                        t, i, feature
                    )));
                }
                if !threshold.is_finite() {
                    return Err(LoadError::Malformed(format!(
                        "tree {} node {}: non-finite threshold",
                        t, i
                    )));
                }
                // children always point forward, so traversal terminates
                for child in [*left, *right] {
                    if child <= i || child >= tree.nodes.len() {
                        return Err(LoadError::Malformed(format!(
                            "tree {} node {}: child {} out of order",
                            t, i, child
                        )));
                    }
                }
            }
            Node::Leaf { leaf } => {
                if leaf.len() != n_classes {
                    return Err(LoadError::Malformed(format!(
                        "tree {} node {}: leaf has {} values for {} classes",
                        t,
                        i,
                        leaf.len(),
                        n_classes
                    )));
                }
                if leaf.iter().any(|v| !v.is_finite() || *v < 0.0) || leaf.iter().sum::<f64>() <= 0.0
                {
                    return Err(LoadError::Malformed(format!(
                        "tree {} node {}: leaf weights must be non-negative with a positive sum",
                        t, i
                    )));
                }
            }
        }
    }
    Ok(())
}

impl ForestModel {
    pub(crate) fn new(artifact: ForestArtifact, n_classes: usize) -> Result<Self, LoadError> {
        if artifact.trees.is_empty() {
            return Err(LoadError::Malformed("forest has no trees".into()));
        }
        for (t, tree) in artifact.trees.iter().enumerate() {
            validate_tree(t, tree, n_classes)?;
        }
        Ok(Self {
            trees: artifact.trees,
            n_classes,
        })
    }

    fn leaf<'a>(tree: &'a Tree, x: &[f64]) -> &'a [f64] {
        let mut i = 0;
        loop {
            match &tree.nodes[i] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { leaf } => return leaf,
            }
        }
    }

    pub(crate) fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        let x = features.as_slice();
        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let leaf = Self::leaf(tree, x);
            let total: f64 = leaf.iter().sum();
            for (p, w) in probs.iter_mut().zip(leaf) {
                *p += w / total;
            }
        }
        let n = self.trees.len() as f64;
        probs.iter_mut().for_each(|p| *p /= n);
        probs
    }
}
