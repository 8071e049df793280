//! Public URIs for generated images.
//!
//! The generator only knows artifact names. A [`UriBuilder`] turns a name
//! into the address a page should reference. [`BaseUrl`] joins the name onto
//! the configured `base_url` prefix; CDN rewriting belongs in another
//! implementation.

/// Maps an artifact name (relative to the destination root) to its URI.
pub trait UriBuilder: Send + Sync {
    fn uri(&self, name: &str) -> String;
}

/// Prefix-joining [`UriBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    prefix: String,
}

impl BaseUrl {
    /// Trailing slashes on `prefix` are ignored.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl UriBuilder for BaseUrl {
    fn uri(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_prefix_and_name() {
        let base = BaseUrl::new("/generated");
        assert_eq!(base.uri("img-100-e391bf5cd.webp"), "/generated/img-100-e391bf5cd.webp");
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let base = BaseUrl::new("https://cdn.example.com/img/");
        assert_eq!(
            base.uri("folder/a-25-xxxxxxxxx.jpg"),
            "https://cdn.example.com/img/folder/a-25-xxxxxxxxx.jpg"
        );
    }

    #[test]
    fn empty_prefix_is_root_relative() {
        let base = BaseUrl::new("");
        assert_eq!(base.uri("a-25-123456789.jpg"), "/a-25-123456789.jpg");
    }
}
