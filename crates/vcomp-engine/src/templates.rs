//! Template registry.
//!
//! Constructed once at startup and shared read-only. Lookups hand out
//! `Arc<TemplateConfig>`; retries clone the config before changing it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use vcomp_models::{CaptionAnchor, Effect, TemplateConfig, TransitionType};

/// Name of the template used when a request names none.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Named, validated templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<TemplateConfig>>,
}

impl TemplateRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in templates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for template in builtin_templates() {
            registry
                .templates
                .insert(template.name.clone(), Arc::new(template));
        }
        registry
    }

    /// Built-ins plus the templates in an optional JSON file.
    pub fn load(templates_file: Option<&Path>) -> EngineResult<Self> {
        let mut registry = Self::with_builtins();
        if let Some(path) = templates_file {
            registry.load_file(path)?;
        }
        Ok(registry)
    }

    /// Register every template in a JSON array file. Names already present
    /// are replaced.
    pub fn load_file(&mut self, path: &Path) -> EngineResult<usize> {
        if !path.exists() {
            return Err(EngineError::MissingInput(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let templates: Vec<TemplateConfig> = serde_json::from_str(&raw)?;
        let count = templates.len();
        for template in templates {
            self.register(template)?;
        }
        info!(path = %path.display(), count, "Loaded templates");
        Ok(count)
    }

    /// Validate and register a template.
    pub fn register(&mut self, template: TemplateConfig) -> EngineResult<()> {
        template.validate()?;
        self.templates
            .insert(template.name.clone(), Arc::new(template));
        Ok(())
    }

    pub fn get(&self, name: &str) -> EngineResult<Arc<TemplateConfig>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::TemplateNotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TemplateConfig>> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn builtin_templates() -> Vec<TemplateConfig> {
    let default = TemplateConfig::named(DEFAULT_TEMPLATE);

    let mut bold = TemplateConfig::named("bold");
    bold.text_style.size = 64;
    bold.text_style.stroke_width = 4;
    bold.caption_defaults.anchor = CaptionAnchor::Center;
    bold.effects = vec![Effect::Contrast { factor: 1.1 }, Effect::Saturation { factor: 1.2 }];
    bold.letterbox_opacity = 0.5;

    let mut minimal = TemplateConfig::named("minimal");
    minimal.transition = TransitionType::Cut;
    minimal.letterbox_opacity = 0.0;
    minimal.caption_defaults.panel_opacity = 0.0;

    let mut cinematic = TemplateConfig::named("cinematic");
    cinematic.intro_duration = 0.75;
    cinematic.outro_duration = 0.75;
    cinematic.transition = TransitionType::Fade { duration: 0.8 };
    cinematic.effects = vec![Effect::Vignette, Effect::Contrast { factor: 1.05 }];
    cinematic.background_blur = 45.0;

    vec![default, bold, minimal, cinematic]
}
