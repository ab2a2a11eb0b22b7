use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::{DorisError, Result};

/// Primitive kind an argument slot accepts, and the bucket a non-keyword
/// token is filed under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    Int,
    Str,
    Any,
}

impl ArgKind {
    /// Content typing for non-keyword tokens: all digits is `int`, all
    /// alphabetic is `str`, anything else is `any`.
    pub fn of(text: &str) -> ArgKind {
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            ArgKind::Int
        } else if !text.is_empty() && text.chars().all(|c| c.is_alphabetic()) {
            ArgKind::Str
        } else {
            ArgKind::Any
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Int => write!(f, "int"),
            ArgKind::Str => write!(f, "str"),
            ArgKind::Any => write!(f, "any"),
        }
    }
}

/// One positional argument of a catalog action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// 0-based position, stable across catalog versions.
    pub index: usize,
    pub kind: ArgKind,
    /// Prefix prepended to the quoted value when the command line is built.
    #[serde(default)]
    pub format: String,
    /// Shown in disambiguation prompts.
    pub description: String,
    pub required: bool,
    /// Trigger words for this argument; feeds the per-action keyword index
    /// and the argument classifier bootstrap.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// One executable command template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    pub description: String,
    /// Prompt for confirmation before executing.
    #[serde(default)]
    pub warning: bool,
}

impl Action {
    pub fn required_args(&self) -> Vec<&ArgSpec> {
        self.args.iter().filter(|a| a.required).collect()
    }

    pub fn optional_args(&self) -> Vec<&ArgSpec> {
        self.args.iter().filter(|a| !a.required).collect()
    }
}

/// The versioned command catalog, loaded once per process. Immutable at
/// runtime; a changed content hash invalidates every derived artifact.
#[derive(Debug, Clone)]
pub struct Catalog {
    actions: BTreeMap<String, Action>,
    hash: String,
}

impl Catalog {
    /// Parses and validates a catalog document. Any missing required key or
    /// malformed argument spec is fatal: the engine must not start on a
    /// broken catalog.
    pub fn from_json(text: &str) -> Result<Catalog> {
        let actions: BTreeMap<String, Action> = serde_json::from_str(text)
            .map_err(|e| DorisError::catalog(format!("invalid catalog document: {}", e)))?;
        let catalog = Catalog {
            hash: content_hash(&actions)?,
            actions,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.actions.is_empty() {
            return Err(DorisError::catalog("catalog declares no actions"));
        }
        for (id, action) in &self.actions {
            if id.trim().is_empty() {
                return Err(DorisError::catalog("action with empty identifier"));
            }
            if action.keywords.is_empty() {
                return Err(DorisError::catalog(format!(
                    "action '{}' declares no keywords",
                    id
                )));
            }
            for (position, arg) in action.args.iter().enumerate() {
                if arg.index != position {
                    return Err(DorisError::catalog(format!(
                        "action '{}': argument at position {} declares index {}",
                        id, position, arg.index
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Action> {
        self.actions.get(id)
    }

    pub fn actions(&self) -> impl Iterator<Item = (&String, &Action)> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Hex SHA-256 over the canonicalized (sorted, re-serialized) document.
    /// Gates rebuilds of the keyword index and classifier bundle.
    pub fn content_hash(&self) -> &str {
        &self.hash
    }
}

fn content_hash(actions: &BTreeMap<String, Action>) -> Result<String> {
    let canonical = serde_json::to_string(actions)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    Ok(hex)
}
