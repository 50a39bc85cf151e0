//! Built-in presets and user-defined formats, ordered and enabled per the
//! user's settings.

use crate::config::{EngineConfig, Settings};
use crate::error::PresetError;
use crate::pipeline::{Formatted, Formatter};
use crate::runner::guard;
use crate::types::{FormatSpec, PageContext};
use crate::util::{escape_html, escape_markdown_brackets};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPreset {
    TitleUrlNewline,
    TitleUrlSpace,
    Markdown,
    Html,
    SelectedText,
}

/// Built-in presets in their default order.
pub const BUILTIN_PRESETS: &[BuiltinPreset] = &[
    BuiltinPreset::TitleUrlNewline,
    BuiltinPreset::TitleUrlSpace,
    BuiltinPreset::Markdown,
    BuiltinPreset::Html,
    BuiltinPreset::SelectedText,
];

pub const BUILTIN_IDS: &[&str] = &[
    "title-url-newline",
    "title-url-space",
    "markdown-format",
    "html-format",
    "selected-text-format",
];

impl BuiltinPreset {
    pub fn id(self) -> &'static str {
        match self {
            BuiltinPreset::TitleUrlNewline => "title-url-newline",
            BuiltinPreset::TitleUrlSpace => "title-url-space",
            BuiltinPreset::Markdown => "markdown-format",
            BuiltinPreset::Html => "html-format",
            BuiltinPreset::SelectedText => "selected-text-format",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinPreset::TitleUrlNewline => "Title and URL (newline)",
            BuiltinPreset::TitleUrlSpace => "Title and URL (space)",
            BuiltinPreset::Markdown => "Markdown link",
            BuiltinPreset::Html => "HTML link",
            BuiltinPreset::SelectedText => "Selection, title and URL",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            BuiltinPreset::TitleUrlNewline => "📄",
            BuiltinPreset::TitleUrlSpace => "🔗",
            BuiltinPreset::Markdown => "📝",
            BuiltinPreset::Html => "🌐",
            BuiltinPreset::SelectedText => "✂️",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinPreset::TitleUrlNewline => "Title and URL on separate lines",
            BuiltinPreset::TitleUrlSpace => "Title and URL joined by a space",
            BuiltinPreset::Markdown => "Markdown link with brackets in the title escaped",
            BuiltinPreset::Html => "HTML anchor with the title escaped",
            BuiltinPreset::SelectedText => "Selected text, a blank line, then title and URL",
        }
    }

    pub fn render(self, page: &PageContext) -> String {
        let (title, url) = (&page.title, &page.url);
        match self {
            BuiltinPreset::TitleUrlNewline => format!("{}\n{}", title, url),
            BuiltinPreset::TitleUrlSpace => format!("{} {}", title, url),
            BuiltinPreset::Markdown => format!("[{}]({})", escape_markdown_brackets(title), url),
            BuiltinPreset::Html => format!("<a href=\"{}\">{}</a>", url, escape_html(title)),
            BuiltinPreset::SelectedText => {
                let selected = page.selected().trim();
                if selected.is_empty() {
                    format!("{}\n{}", title, url)
                } else {
                    format!("{}\n\n{}\n{}", selected, title, url)
                }
            }
        }
    }
}

/// One copy button: a built-in or a user-defined format.
#[derive(Debug, Clone, PartialEq)]
pub enum Preset {
    Builtin(BuiltinPreset),
    Custom(FormatSpec),
}

impl Preset {
    pub fn id(&self) -> &str {
        match self {
            Preset::Builtin(b) => b.id(),
            Preset::Custom(spec) => &spec.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Preset::Builtin(b) => b.name(),
            Preset::Custom(spec) => &spec.name,
        }
    }

    pub fn icon(&self) -> &str {
        match self {
            Preset::Builtin(b) => b.icon(),
            Preset::Custom(_) => "⚙️",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Preset::Builtin(b) => b.description(),
            Preset::Custom(spec) => &spec.template,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Preset::Builtin(_))
    }
}

/// Registered presets plus the settings that order and enable them.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: Vec<Preset>,
    settings: Settings,
}

impl PresetRegistry {
    /// Register the built-ins, then every custom format that validates.
    pub fn new(settings: Settings) -> Self {
        let mut registry = PresetRegistry {
            presets: BUILTIN_PRESETS.iter().map(|&b| Preset::Builtin(b)).collect(),
            settings,
        };
        for spec in registry.settings.custom_formats.clone() {
            match registry.validate(&spec) {
                Ok(()) => registry.presets.push(Preset::Custom(spec)),
                Err(e) => tracing::warn!(id = %spec.id, error = %e, "skipping custom format"),
            }
        }
        registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Check a custom format before it is registered.
    pub fn validate(&self, spec: &FormatSpec) -> Result<(), PresetError> {
        if spec.id.trim().is_empty() {
            return Err(PresetError::MissingField("id"));
        }
        if spec.name.trim().is_empty() {
            return Err(PresetError::MissingField("name"));
        }
        if spec.template.is_empty() {
            return Err(PresetError::MissingField("template"));
        }
        if self.get(&spec.id).is_some() {
            return Err(PresetError::DuplicateId(spec.id.clone()));
        }
        if spec.has_script() {
            guard::check_source(&spec.script_source, &self.settings.engine.extra_denied_words)
                .map_err(PresetError::Rejected)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id() == id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.settings.enabled_presets.iter().any(|e| e == id)
    }

    /// Enabled presets in the user's order; ids with no preset are skipped.
    pub fn active(&self) -> Vec<&Preset> {
        self.settings
            .preset_order
            .iter()
            .filter(|id| self.is_enabled(id))
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Flip a preset's enabled state and return the new state.
    pub fn toggle(&mut self, id: &str) -> Result<bool, PresetError> {
        if self.get(id).is_none() {
            return Err(PresetError::UnknownPreset(id.to_string()));
        }
        let enabled = &mut self.settings.enabled_presets;
        if let Some(pos) = enabled.iter().position(|e| e == id) {
            enabled.remove(pos);
            Ok(false)
        } else {
            enabled.push(id.to_string());
            Ok(true)
        }
    }

    pub fn set_order(&mut self, ids: Vec<String>) -> Result<(), PresetError> {
        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(PresetError::UnknownPreset(unknown.clone()));
        }
        self.settings.preset_order = ids;
        Ok(())
    }

    /// Register a custom format; it is enabled and placed last.
    pub fn add_custom(&mut self, spec: FormatSpec) -> Result<(), PresetError> {
        self.validate(&spec)?;
        tracing::debug!(id = %spec.id, name = %spec.name, "adding custom format");
        self.settings.enabled_presets.push(spec.id.clone());
        self.settings.preset_order.push(spec.id.clone());
        self.settings.custom_formats.push(spec.clone());
        self.presets.push(Preset::Custom(spec));
        Ok(())
    }

    pub fn remove_custom(&mut self, id: &str) -> Result<FormatSpec, PresetError> {
        let pos = match self.presets.iter().position(|p| p.id() == id) {
            Some(pos) => pos,
            None => return Err(PresetError::UnknownPreset(id.to_string())),
        };
        let spec = match &self.presets[pos] {
            Preset::Builtin(_) => return Err(PresetError::BuiltinPreset(id.to_string())),
            Preset::Custom(spec) => spec.clone(),
        };
        self.presets.remove(pos);
        self.settings.custom_formats.retain(|f| f.id != id);
        self.settings.enabled_presets.retain(|e| e != id);
        self.settings.preset_order.retain(|e| e != id);
        Ok(spec)
    }

    pub fn apply(&self, preset: &Preset, page: &PageContext, config: &EngineConfig) -> Formatted {
        match preset {
            Preset::Builtin(b) => Formatted::plain(b.render(page)),
            Preset::Custom(spec) => Formatter::new(config.clone()).format(spec, page),
        }
    }
}
