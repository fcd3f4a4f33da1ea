//! ActorManifest - How Platform actors map onto VMS records
//!
//! ```yaml
//! app: vms
//! mappings:
//!   - entity: visitor
//!     actorTypes: [visitor, guest]
//!     writeAs: visitor
//!     attributes:
//!       organization: company
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use shared::{EntityType, Result, VmsError};

/// Mapping for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMapping {
    pub entity: EntityType,
    /// Platform types read as this entity
    pub actor_types: Vec<String>,
    /// Type used when the VMS writes; defaults to the first actor type
    #[serde(default)]
    pub write_as: Option<String>,
    /// VMS field name to Platform attribute name; unmapped fields keep their name
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl EntityMapping {
    pub fn new(entity: EntityType, actor_types: &[&str]) -> Self {
        Self {
            entity,
            actor_types: actor_types.iter().map(|t| t.to_string()).collect(),
            write_as: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, field: &str, attribute: &str) -> Self {
        self.attributes.insert(field.to_string(), attribute.to_string());
        self
    }

    pub fn write_type(&self) -> &str {
        self.write_as
            .as_deref()
            .or_else(|| self.actor_types.first().map(String::as_str))
            .unwrap_or_else(|| self.entity.as_str())
    }

    /// Platform attribute name for a VMS field
    pub fn attribute<'a>(&'a self, field: &'a str) -> &'a str {
        self.attributes.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn accepts(&self, actor_type: &str) -> bool {
        self.actor_types.iter().any(|t| t.eq_ignore_ascii_case(actor_type))
    }
}

/// Complete actor manifest of the app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorManifest {
    pub app: String,
    #[serde(default)]
    pub mappings: Vec<EntityMapping>,
}

impl ActorManifest {
    /// Default VMS mappings
    pub fn builtin() -> Self {
        Self {
            app: "vms".to_string(),
            mappings: vec![
                EntityMapping::new(EntityType::Employee, &["employee", "staff"])
                    .with_attribute("employeeCode", "employeeCode")
                    .with_attribute("designation", "title"),
                EntityMapping::new(EntityType::Visitor, &["visitor", "guest", "contractor"])
                    .with_attribute("organization", "company"),
                EntityMapping::new(EntityType::Location, &["site", "building", "floor", "gate", "area"]),
            ],
        }
    }

    pub fn mapping(&self, entity: EntityType) -> Option<&EntityMapping> {
        self.mappings.iter().find(|m| m.entity == entity)
    }

    /// Replace mappings with those of `other` for the entities it names
    pub fn merge(&mut self, other: ActorManifest) {
        if !other.app.trim().is_empty() {
            self.app = other.app;
        }
        for mapping in other.mappings {
            match self.mappings.iter_mut().find(|m| m.entity == mapping.entity) {
                Some(existing) => *existing = mapping,
                None => self.mappings.push(mapping),
            }
        }
    }

    /// Reject empty type lists and actor types claimed by two entities
    pub fn validate(&self) -> Result<()> {
        let mut owners: HashMap<String, EntityType> = HashMap::new();
        for mapping in &self.mappings {
            if mapping.actor_types.iter().all(|t| t.trim().is_empty()) {
                return Err(VmsError::Config(format!(
                    "mapping for '{}' has no actor types",
                    mapping.entity
                )));
            }
            for actor_type in &mapping.actor_types {
                let key = actor_type.trim().to_lowercase();
                if let Some(owner) = owners.insert(key, mapping.entity) {
                    if owner != mapping.entity {
                        return Err(VmsError::Config(format!(
                            "actor type '{}' is mapped to both '{}' and '{}'",
                            actor_type, owner, mapping.entity
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for ActorManifest {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Manifest loader
#[derive(Debug, Default)]
pub struct ManifestLoader {
    files: Vec<String>,
}

impl ManifestLoader {
    /// Create a new ManifestLoader
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` in a directory on top of the builtin manifest
    ///
    /// Files are applied in name order, so later files win for the same entity.
    /// A missing directory yields the builtin manifest.
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<ActorManifest> {
        let mut manifest = ActorManifest::builtin();
        if !dir.exists() {
            return Ok(manifest);
        }

        let mut paths = Vec::new();
        for ext in ["yaml", "yml"] {
            let pattern = dir.join(format!("*.{ext}"));
            let entries = glob::glob(&pattern.to_string_lossy())
                .map_err(|e| VmsError::Config(format!("invalid manifest pattern: {e}")))?;
            paths.extend(entries.filter_map(std::result::Result::ok));
        }
        paths.sort();

        for path in paths {
            manifest.merge(Self::load_file(&path)?);
            self.files.push(path.display().to_string());
        }

        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse one manifest file
    pub fn load_file(path: &Path) -> Result<ActorManifest> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| VmsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Files applied by the last load
    pub fn files(&self) -> &[String] {
        &self.files
    }
}
