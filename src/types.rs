use serde::{Serialize, Deserialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A user-defined format: a template plus optional search/replace and script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSpec {
    pub id: String,
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub search_pattern: String,
    #[serde(default)]
    pub replace_pattern: String,
    /// Source for the `{js}` placeholder, run by the restricted evaluator.
    #[serde(default)]
    pub script_source: String,
}

impl FormatSpec {
    /// Format with only a template; no substitution and no script.
    pub fn template(id: &str, name: &str, template: &str) -> Self {
        FormatSpec {
            id: id.to_string(),
            name: name.to_string(),
            template: template.to_string(),
            ..Default::default()
        }
    }

    pub fn has_script(&self) -> bool {
        !self.script_source.trim().is_empty()
    }

    pub fn has_search(&self) -> bool {
        !self.search_pattern.trim().is_empty()
    }
}

/// The page being formatted, as reported by the tab-query collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    pub title: String,
    pub url: String,
    pub selected_text: Option<String>,
}

impl PageContext {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        PageContext { title: title.into(), url: url.into(), selected_text: None }
    }

    pub fn with_selection(mut self, text: impl Into<String>) -> Self {
        self.selected_text = Some(text.into());
        self
    }

    pub fn selected(&self) -> &str {
        self.selected_text.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_spec_camel_case_json() {
        let json = r#"{"id":"1","name":"n","template":"{title}","searchPattern":"/a/g","scriptSource":"title"}"#;
        let spec: FormatSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.search_pattern, "/a/g");
        assert_eq!(spec.replace_pattern, "");
        assert!(spec.has_script());
        assert!(spec.has_search());
    }

    #[test]
    fn test_blank_search_is_not_a_search() {
        let mut spec = FormatSpec::template("1", "n", "{url}");
        spec.search_pattern = "   ".into();
        assert!(!spec.has_search());
    }

    #[test]
    fn test_selected_defaults_to_empty() {
        let page = PageContext::new("T", "U");
        assert_eq!(page.selected(), "");
        assert_eq!(page.with_selection("sel").selected(), "sel");
    }
}
