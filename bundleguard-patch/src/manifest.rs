//! Bundle manifest (`manifest.json`) editing.
//!
//! The document is held as an order-preserving JSON map so fields the
//! passes do not own are written back untouched.

use crate::asset::ResourceHost;
use crate::error::{PatchError, PatchResult};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Match pattern for resource groups created by the passes.
pub const ALL_URLS: &str = "<all_urls>";

/// Shape of the manifest's `background` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    Absent,
    /// `background.scripts`: a list run in order.
    Scripts(Vec<String>),
    /// `background.service_worker`: a single entry point.
    ServiceWorker { entry: String, module: bool },
    /// Present but neither shape (e.g. a background page).
    Unrecognised,
}

#[derive(Debug, Clone)]
pub struct BundleManifest {
    path: PathBuf,
    doc: Map<String, Value>,
    modified: bool,
}

impl BundleManifest {
    /// Loads `manifest.json` from the bundle root.
    ///
    /// # Errors
    ///
    /// [`PatchError::AssetMissing`] when absent, [`PatchError::AssetParse`]
    /// when it is not a JSON object.
    pub fn load(root: &Path) -> PatchResult<Self> {
        let path = root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(PatchError::AssetMissing(path));
        }
        let text = fs::read_to_string(&path).map_err(|e| PatchError::io(&path, e))?;
        Self::parse(path, &text)
    }

    /// Parses manifest text; `path` is where [`save`](Self::save) writes.
    ///
    /// # Errors
    ///
    /// [`PatchError::AssetParse`] for invalid JSON or a non-object document.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> PatchResult<Self> {
        let path = path.into();
        let value: Value = serde_json::from_str(text).map_err(|e| PatchError::AssetParse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(doc) => Ok(Self {
                path,
                doc,
                modified: false,
            }),
            other => Err(PatchError::AssetParse {
                path,
                reason: format!("expected a JSON object, found {}", type_name(&other)),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn document(&self) -> &Map<String, Value> {
        &self.doc
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[must_use]
    pub fn background(&self) -> Background {
        let Some(bg) = self.doc.get("background") else {
            return Background::Absent;
        };
        if let Some(scripts) = bg.get("scripts").and_then(Value::as_array) {
            return Background::Scripts(
                scripts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            );
        }
        if let Some(entry) = bg.get("service_worker").and_then(Value::as_str) {
            return Background::ServiceWorker {
                entry: entry.to_string(),
                module: bg.get("type").and_then(Value::as_str) == Some("module"),
            };
        }
        Background::Unrecognised
    }

    /// Puts `script` first in `background.scripts`, creating the background
    /// declaration if the manifest has none. Returns whether it changed.
    pub fn prepend_background_script(&mut self, script: &str) -> bool {
        match self.doc.get_mut("background") {
            None => {
                self.doc
                    .insert("background".to_string(), json!({ "scripts": [script] }));
            }
            Some(bg) => {
                let Some(scripts) = bg.get_mut("scripts").and_then(Value::as_array_mut) else {
                    return false;
                };
                if scripts.iter().any(|s| s.as_str() == Some(script)) {
                    return false;
                }
                scripts.insert(0, Value::from(script));
            }
        }
        self.modified = true;
        true
    }

    /// Points `background.service_worker` at `entry`.
    pub fn set_service_worker(&mut self, entry: &str) -> bool {
        let Some(bg) = self.doc.get_mut("background").and_then(Value::as_object_mut) else {
            return false;
        };
        if bg.get("service_worker").and_then(Value::as_str) == Some(entry) {
            return false;
        }
        bg.insert("service_worker".to_string(), Value::from(entry));
        self.modified = true;
        true
    }

    /// Script paths declared under `content_scripts[*].js`.
    #[must_use]
    pub fn content_script_paths(&self) -> Vec<String> {
        self.doc
            .get("content_scripts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|cs| cs.get("js").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect()
    }

    /// Returns true if any resource group lists `resource`.
    #[must_use]
    pub fn declares_resource(&self, resource: &str) -> bool {
        let Some(groups) = self.doc.get("web_accessible_resources").and_then(Value::as_array)
        else {
            return false;
        };
        groups.iter().any(|g| match g {
            Value::String(s) => s == resource,
            Value::Object(o) => o
                .get("resources")
                .and_then(Value::as_array)
                .is_some_and(|r| r.iter().any(|v| v.as_str() == Some(resource))),
            _ => false,
        })
    }

    /// Sets `content_security_policy.extension_pages`. A legacy string
    /// policy is left as is.
    pub fn set_extension_pages_csp(&mut self, policy: &str) -> bool {
        match self.doc.get_mut("content_security_policy") {
            None => {
                self.doc.insert(
                    "content_security_policy".to_string(),
                    json!({ "extension_pages": policy }),
                );
            }
            Some(Value::Object(csp)) => {
                if csp.get("extension_pages").and_then(Value::as_str) == Some(policy) {
                    return false;
                }
                csp.insert("extension_pages".to_string(), Value::from(policy));
            }
            Some(_) => {
                debug!("content_security_policy is not an object, leaving it unchanged");
                return false;
            }
        }
        self.modified = true;
        true
    }

    /// Pretty-printed JSON (two-space indent, trailing newline).
    ///
    /// # Errors
    ///
    /// [`PatchError::Json`] if serialization fails.
    pub fn to_json(&self) -> PatchResult<String> {
        let mut text = serde_json::to_string_pretty(&self.doc)?;
        text.push('\n');
        Ok(text)
    }

    /// Writes the manifest back if modified. Returns whether it wrote.
    ///
    /// # Errors
    ///
    /// [`PatchError::Io`] or [`PatchError::Json`].
    pub fn save(&self) -> PatchResult<bool> {
        if !self.modified {
            return Ok(false);
        }
        fs::write(&self.path, self.to_json()?).map_err(|e| PatchError::io(&self.path, e))?;
        Ok(true)
    }
}

impl ResourceHost for BundleManifest {
    fn declare_resource(&mut self, resource: &str, matches: &[&str]) -> bool {
        if self.declares_resource(resource) {
            return false;
        }
        let group = json!({ "resources": [resource], "matches": matches });

        match self.doc.get_mut("web_accessible_resources") {
            None => {
                self.doc
                    .insert("web_accessible_resources".to_string(), json!([group]));
            }
            Some(Value::Array(groups)) => {
                if groups.iter().any(Value::is_string) {
                    // Flat list of paths (manifest v2 shape).
                    groups.push(Value::from(resource));
                } else if let Some(list) = groups
                    .iter_mut()
                    .find_map(|g| g.get_mut("resources").and_then(Value::as_array_mut))
                {
                    list.push(Value::from(resource));
                } else {
                    groups.push(group);
                }
            }
            Some(other) => {
                warn!(
                    "web_accessible_resources is a {}, not a list; not declaring {}",
                    type_name(other),
                    resource
                );
                return false;
            }
        }
        self.modified = true;
        true
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
