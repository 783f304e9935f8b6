//! Tag list and URL normalization.
//!
//! Tag lists arrive as free text. Normalization:
//! 1. full-width separators become `,`
//! 2. all whitespace is removed
//! 3. titles are deduplicated case-insensitively, first spelling wins
//! 4. blank, over-long and disallowed titles are dropped
//! 5. at most `max_count` titles are kept

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use taghub_types::IngestSettings;

/// CJK unified ideographs, word characters, whitespace and `& + - .`
static TAG_TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\u{4e00}-\u{9fa5}\w\s&+\-.]+$").expect("tag title pattern is valid")
});

const SEPARATORS: &[char] = &['，', '、', '；', ';'];

/// Bounds applied to each article's tag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRules {
    pub max_count: usize,
    pub max_title_len: usize,
}

impl Default for TagRules {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for TagRules {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            max_count: settings.max_tag_count,
            max_title_len: settings.max_tag_title_len,
        }
    }
}

/// Normalize a raw tag list into distinct titles in first-seen order.
pub fn normalize_tags(raw: &str, rules: &TagRules) -> Vec<String> {
    let unified = unify_separators(raw);

    let mut kept: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for title in unified.split(',') {
        if title.is_empty() {
            continue;
        }
        let folded = title.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);

        if title.chars().count() > rules.max_title_len || !TAG_TITLE_PATTERN.is_match(title) {
            continue;
        }
        kept.push(title.to_string());
        if kept.len() >= rules.max_count {
            break;
        }
    }
    kept
}

/// Split a query tag list the way ingestion splits tags, lowercased.
pub fn split_query_tags(raw: &str) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for title in unify_separators(raw).to_lowercase().split(',') {
        if !title.is_empty() && !titles.iter().any(|t| t == title) {
            titles.push(title.to_string());
        }
    }
    titles
}

/// Drop all whitespace and turn full-width separators into `,`.
fn unify_separators(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if SEPARATORS.contains(&c) { ',' } else { c })
        .collect()
}

/// Normalize a blog host into `scheme://host[:port]`.
///
/// A host without a scheme is taken as `http://`.
pub fn normalize_source_host(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("host is empty".to_string());
    }
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&candidate).map_err(|e| format!("invalid host '{}': {}", raw, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| format!("invalid host '{}'", raw))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Resolve a permalink against the blog host.
///
/// Absolute http(s) permalinks are kept as they are; anything else is
/// taken relative to the host root.
pub fn resolve_permalink(source_host: &str, raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("permalink is empty".to_string());
    }

    if let Ok(url) = Url::parse(raw) {
        if url.scheme() == "http" || url.scheme() == "https" {
            return Ok(url.to_string());
        }
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }

    let base = Url::parse(source_host).map_err(|e| format!("invalid host: {}", e))?;
    let relative = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{}", raw)
    };
    base.join(&relative)
        .map(|u| u.to_string())
        .map_err(|e| format!("invalid permalink '{}': {}", raw, e))
}

/// Bare lowercase host name: scheme, port and path stripped.
///
/// Used to compare hosts that may be written differently.
pub fn bare_host(raw: &str) -> String {
    let without_scheme = match raw.find("://") {
        Some(idx) => &raw[idx + 3..],
        None => raw,
    };
    without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules() -> TagRules {
        TagRules::default()
    }

    #[test]
    fn test_dedup_case_insensitive_first_seen() {
        assert_eq!(normalize_tags("a, a, A, b", &rules()), vec!["a", "b"]);
        assert_eq!(normalize_tags("go, GO, rust", &rules()), vec!["go", "rust"]);
        assert_eq!(normalize_tags("Go, go", &rules()), vec!["Go"]);
    }

    #[test]
    fn test_full_width_separators() {
        assert_eq!(
            normalize_tags("rust，go、zig；c;d", &rules()),
            vec!["rust", "go", "zig", "c"]
        );
    }

    #[test]
    fn test_whitespace_removed() {
        assert_eq!(normalize_tags("  Rust Lang , ,", &rules()), vec!["RustLang"]);
    }

    #[test]
    fn test_drops_long_and_invalid_titles() {
        let tags = normalize_tags("averyverylongtag, ok, bad<tag>, c++, 中文", &rules());
        assert_eq!(tags, vec!["ok", "c++", "中文"]);
    }

    #[test]
    fn test_caps_count() {
        let tags = normalize_tags("a,b,c,d,e,f", &rules());
        assert_eq!(tags, vec!["a", "b", "c", "d"]);

        let narrow = TagRules {
            max_count: 2,
            max_title_len: 9,
        };
        assert_eq!(normalize_tags("a,b,c", &narrow), vec!["a", "b"]);
    }

    #[test]
    fn test_blank_input() {
        assert!(normalize_tags("", &rules()).is_empty());
        assert!(normalize_tags(" ，, ; ", &rules()).is_empty());
    }

    #[test]
    fn test_split_query_tags() {
        assert_eq!(split_query_tags("Rust, GO,,rust"), vec!["rust", "go"]);
        assert_eq!(split_query_tags("Rust Lang，go ; web"), vec!["rustlang", "go", "web"]);
        assert_eq!(
            split_query_tags("rust lang"),
            normalize_tags("Rust Lang", &rules())
                .iter()
                .map(|t| t.to_lowercase())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_normalize_source_host() {
        assert_eq!(
            normalize_source_host("blog.example.com").unwrap(),
            "http://blog.example.com"
        );
        assert_eq!(
            normalize_source_host("https://Blog.Example.com:8443/").unwrap(),
            "https://blog.example.com:8443"
        );
        assert!(normalize_source_host("").is_err());
        assert!(normalize_source_host("ftp://blog.example.com").is_err());
    }

    #[test]
    fn test_resolve_permalink() {
        let host = "http://blog.example.com";
        assert_eq!(
            resolve_permalink(host, "/p1").unwrap(),
            "http://blog.example.com/p1"
        );
        assert_eq!(
            resolve_permalink(host, "articles/2.html").unwrap(),
            "http://blog.example.com/articles/2.html"
        );
        assert_eq!(
            resolve_permalink(host, "https://other.example.com/x").unwrap(),
            "https://other.example.com/x"
        );
        assert!(resolve_permalink(host, "").is_err());
        assert!(resolve_permalink(host, "javascript:alert(1)").is_err());
    }

    #[test]
    fn test_bare_host() {
        assert_eq!(bare_host("http://Blog.Example.com:8080/x"), "blog.example.com");
        assert_eq!(bare_host("blog.example.com"), "blog.example.com");
        assert_eq!(bare_host("https://blog.example.com"), "blog.example.com");
    }
}
