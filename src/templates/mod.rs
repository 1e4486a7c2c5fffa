//! Record templates loaded from a directory of TOML files.
//!
//! Each `.toml` file holds one `[template]` table:
//!
//! ```toml
//! [template]
//! name = "standup"
//! project = "internal"
//! task = "meetings"
//! title = "Daily standup"
//! description = "Team sync"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::RecordTemplate;
use crate::state::TemplateProvider;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    template: RecordTemplate,
}

/// Registry of loaded templates, indexed by name.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, RecordTemplate>,
}

impl TemplateRegistry {
    /// Create an empty registry with no templates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load all `.toml` files from a directory and build the registry.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut templates = BTreeMap::new();

        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!("cannot read template dir {}: {e}", dir.display()))
        })?;

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)?;
                let file: TemplateFile = toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("bad template {}: {e}", path.display()))
                })?;
                let mut template = file.template;
                if template.name.is_empty() {
                    template.name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                }
                templates.insert(template.name.clone(), template);
            }
        }

        Ok(Self { templates })
    }

    pub fn insert(&mut self, template: RecordTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[async_trait]
impl TemplateProvider for TemplateRegistry {
    async fn list_templates(&self) -> Result<Vec<RecordTemplate>> {
        Ok(self.templates.values().cloned().collect())
    }

    async fn get_template(&self, name: &str) -> Result<RecordTemplate> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("template '{name}'")))
    }
}
