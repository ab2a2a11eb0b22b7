use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::core::catalog::Catalog;
use crate::core::classifier::BagClassifier;
use crate::core::error::{DorisError, Result};
use crate::core::index::KeywordIndex;

/// Everything the trained state consists of, keyed by the catalog hash that
/// produced it. A stale hash means the whole bundle is discarded and
/// re-bootstrapped from the catalog's own keyword lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierBundle {
    pub catalog_hash: String,
    pub keyword_actions: BTreeMap<String, BTreeSet<String>>,
    pub action_model: BagClassifier,
    /// Argument models per action; labels are argument indices as strings.
    pub arg_models: BTreeMap<String, BagClassifier>,
}

impl ClassifierBundle {
    /// Bootstrap training pass: each action's keyword list is one labeled
    /// example, likewise each argument's keyword list. Guarantees the
    /// models are usable before the first user correction ever happens.
    pub fn bootstrap(catalog: &Catalog, index: &KeywordIndex) -> ClassifierBundle {
        let mut action_model = BagClassifier::new();
        let mut arg_models = BTreeMap::new();
        for (id, action) in catalog.actions() {
            action_model.partial_fit(&action.keywords, id);
            let mut model = BagClassifier::new();
            for arg in &action.args {
                if !arg.keywords.is_empty() {
                    model.partial_fit(&arg.keywords, &arg.index.to_string());
                }
            }
            if model.is_trained() {
                arg_models.insert(id.clone(), model);
            }
        }
        ClassifierBundle {
            catalog_hash: catalog.content_hash().to_string(),
            keyword_actions: index.actions_map().clone(),
            action_model,
            arg_models,
        }
    }
}

/// Owns the bundle and its on-disk artifact. All mutation goes through the
/// mutex so the read-modify-persist cycle stays atomic when the engine is
/// embedded in a host serving more than one request.
pub struct ModelStore {
    path: PathBuf,
    bundle: Mutex<ClassifierBundle>,
}

impl ModelStore {
    /// Loads the persisted bundle when its hash matches the current
    /// catalog; otherwise bootstraps a fresh one and tries to save it.
    /// Returns the store plus a warning message when the artifact had to be
    /// discarded or could not be written.
    pub fn open(
        path: PathBuf,
        catalog: &Catalog,
        index: &KeywordIndex,
    ) -> (ModelStore, Option<String>) {
        let mut warning = None;
        let bundle = match Self::load(&path, catalog.content_hash()) {
            Ok(Some(bundle)) => bundle,
            Ok(None) => ClassifierBundle::bootstrap(catalog, index),
            Err(e) => {
                warning = Some(format!("discarding stored models: {}", e));
                ClassifierBundle::bootstrap(catalog, index)
            }
        };
        let store = ModelStore {
            path,
            bundle: Mutex::new(bundle),
        };
        if let Err(e) = store.save() {
            warning = Some(format!("could not persist models: {}", e));
        }
        (store, warning)
    }

    fn load(path: &PathBuf, catalog_hash: &str) -> Result<Option<ClassifierBundle>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let bundle: ClassifierBundle = serde_json::from_str(&content)
            .map_err(|e| DorisError::persistence(format!("corrupt model bundle: {}", e)))?;
        if bundle.catalog_hash != catalog_hash {
            return Ok(None);
        }
        Ok(Some(bundle))
    }

    pub fn with_bundle<R>(&self, f: impl FnOnce(&ClassifierBundle) -> R) -> R {
        f(&self.lock())
    }

    pub fn with_bundle_mut<R>(&self, f: impl FnOnce(&mut ClassifierBundle) -> R) -> R {
        f(&mut self.lock())
    }

    /// Atomic write: temp file in the same directory, then rename. A failed
    /// save only ever costs future learning, never the current decision.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.lock())?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| DorisError::persistence(format!("writing model bundle: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| DorisError::persistence(format!("finalizing model bundle: {}", e)))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ClassifierBundle> {
        match self.bundle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
