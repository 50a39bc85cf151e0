// context.rs: values a template or script can refer to

use url::Url;

use crate::types::PageContext;

/// Page values with `domain` and `path` derived from the URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageVars {
    pub title: String,
    pub url: String,
    pub domain: String,
    pub path: String,
    pub selected_text: String,
}

impl PageVars {
    pub fn from_page(page: &PageContext) -> Self {
        let (domain, path) = split_url(&page.url);
        PageVars {
            title: page.title.clone(),
            url: page.url.clone(),
            domain,
            path,
            selected_text: page.selected().to_string(),
        }
    }

    /// Look up a placeholder name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "url" => Some(&self.url),
            "domain" => Some(&self.domain),
            "path" => Some(&self.path),
            "selectedText" => Some(&self.selected_text),
            _ => None,
        }
    }
}

/// Host (without port) and path of `url`; both empty when it does not parse.
pub fn split_url(url: &str) -> (String, String) {
    match Url::parse(url.trim()) {
        Ok(u) => (
            u.host_str().unwrap_or("").to_string(),
            u.path().to_string(),
        ),
        Err(e) => {
            tracing::debug!(url, error = %e, "page url did not parse; domain and path left empty");
            (String::new(), String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("https://example.com/a"), ("example.com".into(), "/a".into()));
        assert_eq!(
            split_url("http://localhost:8080/x/y?q=1#frag"),
            ("localhost".into(), "/x/y".into())
        );
    }

    #[test]
    fn test_split_url_invalid() {
        assert_eq!(split_url("not a url"), (String::new(), String::new()));
        assert_eq!(split_url(""), (String::new(), String::new()));
    }

    #[test]
    fn test_split_url_without_host() {
        let (domain, path) = split_url("about:blank");
        assert_eq!(domain, "");
        assert_eq!(path, "blank");
    }

    #[test]
    fn test_page_vars() {
        let page = PageContext::new("Example", "https://example.com/docs/").with_selection("hi");
        let vars = PageVars::from_page(&page);
        assert_eq!(vars.get("domain"), Some("example.com"));
        assert_eq!(vars.get("path"), Some("/docs/"));
        assert_eq!(vars.get("selectedText"), Some("hi"));
        assert_eq!(vars.get("js"), None);
    }
}
