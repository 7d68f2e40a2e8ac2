//! URL helpers for scoping requests to a domain and project.
//!
//! Resource URLs follow the pattern
//! `{root}/rest[/domains/{domain}[/projects/{project}]]{path}[?query]`.
//! A project is only ever appended underneath a domain.

use crate::QueryOptions;

/// Removes one trailing and one leading `/`, if present.
///
/// # Examples
///
/// ```
/// use qcrest::url_builder::trim_slash;
///
/// assert_eq!(trim_slash("/qcbin/"), "qcbin");
/// assert_eq!(trim_slash("http://host/"), "http://host");
/// assert_eq!(trim_slash(""), "");
/// ```
pub fn trim_slash(url: &str) -> &str {
    let url = url.strip_suffix('/').unwrap_or(url);
    url.strip_prefix('/').unwrap_or(url)
}

/// [`trim_slash`] over an optional value; `None` passes through.
pub fn trim_slash_opt(url: Option<&str>) -> Option<&str> {
    url.map(trim_slash)
}

/// Ensures `path` starts with `/`.
///
/// # Examples
///
/// ```
/// use qcrest::url_builder::prepend_slash;
///
/// assert_eq!(prepend_slash("defects"), "/defects");
/// assert_eq!(prepend_slash("/defects"), "/defects");
/// ```
pub fn prepend_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Builds a fully scoped resource URL.
///
/// The query string is introduced with `&` when `path` already carries a
/// `?`, otherwise with `?`.
///
/// # Examples
///
/// ```
/// use qcrest::{url_builder::build_url, QueryOptions};
///
/// let options = QueryOptions::new().page_size(10).fields(["a", "b"]);
/// let url = build_url("http://host", Some("D"), Some("P"), "/x", Some(&options));
///
/// assert_eq!(url, "http://host/rest/domains/D/projects/P/x?page-size=10&fields=a,b");
/// ```
pub fn build_url(
    root_url: &str,
    domain: Option<&str>,
    project: Option<&str>,
    path: &str,
    options: Option<&QueryOptions>,
) -> String {
    let mut target = format!("{}/rest", root_url);

    if let Some(domain) = domain.filter(|d| !d.is_empty()) {
        target.push_str("/domains/");
        target.push_str(domain);

        if let Some(project) = project.filter(|p| !p.is_empty()) {
            target.push_str("/projects/");
            target.push_str(project);
        }
    }

    target.push_str(&prepend_slash(path));

    if let Some(options) = options {
        let pairs = options.query_pairs();
        if !pairs.is_empty() {
            target.push(if path.contains('?') { '&' } else { '?' });
            target.push_str(&pairs.join("&"));
        }
    }

    target
}
