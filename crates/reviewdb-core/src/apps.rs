//! Typed App Store app references parsed from storefront URLs.
//!
//! A storefront URL looks like
//! `https://apps.apple.com/us/app/facebook/id284882215`: country code, the
//! literal `app` segment, a URL slug, and the numeric id prefixed with `id`.
//! Parsing happens once at the boundary so downstream code never re-splits
//! URL paths.

use std::collections::HashSet;
use std::path::Path;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::{ConfigError, CoreError};

const STOREFRONT_HOST: &str = "apps.apple.com";

/// One App Store app, identified by storefront country and numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppRef {
    /// Two-letter storefront code, lowercased (e.g. `"us"`).
    pub country: String,
    /// URL slug exactly as it appears in the path, percent-encoded when the
    /// name is not ASCII.
    pub slug: String,
    /// Numeric app id without the `id` prefix.
    pub app_id: String,
}

impl AppRef {
    /// Builds a reference from already-separated parts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAppUrl`] if the country is not two ASCII
    /// letters, the slug is empty, or the id is not numeric (an `id` prefix is
    /// accepted and stripped).
    pub fn new(country: &str, slug: &str, app_id: &str) -> Result<Self, CoreError> {
        let raw = format!("{country}/app/{slug}/{app_id}");
        let invalid = |reason: &str| CoreError::InvalidAppUrl {
            url: raw.clone(),
            reason: reason.to_owned(),
        };

        let country = country.trim().to_ascii_lowercase();
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(invalid("country must be a two-letter storefront code"));
        }

        let slug = slug.trim();
        if slug.is_empty() {
            return Err(invalid("app slug is empty"));
        }

        let app_id = app_id.trim();
        let app_id = app_id.strip_prefix("id").unwrap_or(app_id);
        if app_id.is_empty() || !app_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("app id must be numeric"));
        }

        Ok(Self {
            country,
            slug: slug.to_owned(),
            app_id: app_id.to_owned(),
        })
    }

    /// Parses a storefront URL such as
    /// `https://apps.apple.com/us/app/facebook/id284882215`.
    ///
    /// Query strings, fragments, and a trailing slash are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAppUrl`] if the URL does not parse, is not
    /// on `apps.apple.com`, or its path is not `/{country}/app/{slug}/id{digits}`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidAppUrl {
            url: input.to_owned(),
            reason,
        };

        let url = Url::parse(input.trim()).map_err(|e| invalid(e.to_string()))?;
        if url.host_str() != Some(STOREFRONT_HOST) {
            return Err(invalid(format!("host is not {STOREFRONT_HOST}")));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [country, "app", slug, id] if id.starts_with("id") => {
                Self::new(country, slug, id).map_err(|e| match e {
                    CoreError::InvalidAppUrl { reason, .. } => invalid(reason),
                    other => other,
                })
            }
            _ => Err(invalid(
                "expected path /{country}/app/{slug}/id{digits}".to_owned(),
            )),
        }
    }

    /// The slug with percent-encoding removed, suitable for display and storage.
    #[must_use]
    pub fn display_name(&self) -> String {
        percent_decode_str(&self.slug)
            .decode_utf8_lossy()
            .into_owned()
    }

    /// Path of the app's landing page relative to the storefront root.
    #[must_use]
    pub fn landing_path(&self) -> String {
        format!("{}/app/{}/id{}", self.country, self.slug, self.app_id)
    }
}

impl std::fmt::Display for AppRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/id{}", self.country, self.app_id)
    }
}

/// Reads an apps file: one storefront URL per line, blank lines and `#`
/// comments ignored.
///
/// # Errors
///
/// Returns [`ConfigError::AppsFileIo`] if the file cannot be read, or
/// [`ConfigError::AppsFileEntry`] for the first line that is not a valid
/// storefront URL.
pub fn load_app_list(path: &Path) -> Result<Vec<AppRef>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AppsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_app_list(&content)
}

/// Parses apps-file content. Repeated apps (same country and id) are kept
/// once, in first-seen order.
///
/// # Errors
///
/// Returns [`ConfigError::AppsFileEntry`] for the first invalid line.
pub fn parse_app_list(content: &str) -> Result<Vec<AppRef>, ConfigError> {
    let mut seen = HashSet::new();
    let mut apps = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let app = AppRef::parse(line).map_err(|source| ConfigError::AppsFileEntry {
            line: idx + 1,
            source,
        })?;
        if seen.insert((app.country.clone(), app.app_id.clone())) {
            apps.push(app);
        }
    }

    Ok(apps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_list_skips_comments_blanks_and_repeats() {
        let content = "# social\n\
            https://apps.apple.com/us/app/facebook/id284882215\n\
            \n\
              https://apps.apple.com/gb/app/minecraft/id479516143  \n\
            https://apps.apple.com/us/app/facebook/id284882215?see-all=reviews\n";
        let apps = parse_app_list(content).unwrap();
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].app_id, "284882215");
        assert_eq!(apps[1].country, "gb");
    }

    #[test]
    fn app_list_reports_bad_line_number() {
        let content = "https://apps.apple.com/us/app/facebook/id284882215\nnot a url\n";
        match parse_app_list(content).unwrap_err() {
            ConfigError::AppsFileEntry { line, .. } => assert_eq!(line, 2),
            other => panic!("expected AppsFileEntry, got {other:?}"),
        }
    }

    #[test]
    fn missing_app_list_file_is_io_error() {
        let err = load_app_list(Path::new("/nonexistent/reviewdb/apps.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::AppsFileIo { .. }));
    }

    #[test]
    fn parses_canonical_storefront_url() {
        let app = AppRef::parse("https://apps.apple.com/us/app/facebook/id284882215").unwrap();
        assert_eq!(app.country, "us");
        assert_eq!(app.slug, "facebook");
        assert_eq!(app.app_id, "284882215");
        assert_eq!(app.landing_path(), "us/app/facebook/id284882215");
    }

    #[test]
    fn ignores_query_and_trailing_slash() {
        let app =
            AppRef::parse("https://apps.apple.com/GB/app/minecraft/id479516143/?see-all=reviews")
                .unwrap();
        assert_eq!(app.country, "gb");
        assert_eq!(app.app_id, "479516143");
    }

    #[test]
    fn non_ascii_slug_is_kept_encoded_and_decoded_for_display() {
        let app = AppRef::parse("https://apps.apple.com/cn/app/微信/id414478124").unwrap();
        assert_eq!(app.slug, "%E5%BE%AE%E4%BF%A1");
        assert_eq!(app.display_name(), "微信");
    }

    #[test]
    fn rejects_other_hosts() {
        let err = AppRef::parse("https://play.google.com/us/app/facebook/id284882215").unwrap_err();
        assert!(matches!(err, CoreError::InvalidAppUrl { .. }));
    }

    #[test]
    fn rejects_chart_and_story_urls() {
        assert!(AppRef::parse("https://apps.apple.com/us/charts/iphone").is_err());
        assert!(AppRef::parse("https://apps.apple.com/story/id1538632801").is_err());
    }

    #[test]
    fn rejects_non_numeric_id() {
        let err = AppRef::parse("https://apps.apple.com/us/app/facebook/idabc").unwrap_err();
        match err {
            CoreError::InvalidAppUrl { reason, .. } => assert!(reason.contains("numeric")),
            other => panic!("expected InvalidAppUrl, got {other:?}"),
        }
    }

    #[test]
    fn new_strips_id_prefix() {
        let app = AppRef::new("us", "facebook", "id284882215").unwrap();
        assert_eq!(app.app_id, "284882215");
        assert_eq!(app.to_string(), "us/id284882215");
    }
}
