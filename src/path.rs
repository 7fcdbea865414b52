//! Path cleaning shared by the rewriter (`__source.fileName`) and the runtime
//! resolver (`filePath`).
//!
//! Paths arrive in many shapes: absolute paths on disk, bundler module ids,
//! dev-server URLs, stack-frame locations of hashed production chunks. The goal
//! is a short project-relative path a developer recognises.

use std::sync::OnceLock;

use regex::Regex;

/// Placeholder for bundled output whose original path cannot be recovered.
pub const BUNDLED_PLACEHOLDER: &str = "<bundled>";

const SCHEME_PREFIXES: &[&str] = &[
    "webpack-internal:///",
    "webpack://",
    "file:///",
    "file://",
    "rsc://React/Server/",
    "rsc://React/Client/",
];

const PROJECT_PREFIXES: &[&str] = &["/turbopack/[project]/", "turbopack/[project]/", "[project]/"];

const BUNDLE_MARKERS: &[&str] = &[
    "_next/static/",
    ".next/",
    "static/chunks/",
    "node_modules/.vite/",
    "[turbopack]",
    "__turbopack",
];

/// Project-root segments, in recovery priority order.
const ROOT_MARKERS: &[&str] = &["app", "pages", "src", "components"];

const SOURCE_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".js", ".mjs", ".cjs", ".mts", ".cts"];

fn re_hashed_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.-]([A-Za-z0-9_]{8,})\.(?:m?js|css)$").unwrap())
}

fn re_chunk_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:[.-][A-Za-z0-9_]+)?\.m?js$").unwrap())
}

/// Content hashes as bundlers print them: lowercase hex with at least one
/// digit (webpack, Next.js), or exactly eight base64url characters mixing
/// upper case, lower case and digits (Vite, Rollup).
fn looks_like_hash(s: &str) -> bool {
    let has_digit = s.bytes().any(|b| b.is_ascii_digit());
    let hex = s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if hex && has_digit {
        return true;
    }
    s.len() == 8
        && has_digit
        && s.bytes().any(|b| b.is_ascii_uppercase())
        && s.bytes().any(|b| b.is_ascii_lowercase())
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn final_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Hash portion of a file name such as `page-3f2a1b9c.js`, if it has one.
fn hash_suffix(segment: &str) -> Option<regex::Match<'_>> {
    let caps = re_hashed_segment().captures(segment)?;
    let hash = caps.get(1)?;
    looks_like_hash(hash.as_str()).then_some(hash)
}

/// Bundle output: a bundle directory marker, or a content-hashed file name.
/// Bare numeric chunk ids only count under a marker, so `src/404.js` stays
/// a source file.
fn is_bundled(path: &str) -> bool {
    BUNDLE_MARKERS.iter().any(|m| path.contains(m)) || hash_suffix(final_segment(path)).is_some()
}

/// Offset of `marker/` as a whole path segment.
fn marker_offset(path: &str, marker: &str) -> Option<usize> {
    let needle = format!("{marker}/");
    if path.starts_with(&needle) {
        return Some(0);
    }
    path.find(&format!("/{needle}")).map(|i| i + 1)
}

/// Normalize bundler/debugger style file names.
fn normalize(raw: &str) -> String {
    let mut s = raw.trim().replace('\\', "/");
    s = s.replace("%5Bproject%5D", "[project]");
    s = s.replace("%5bproject%5d", "[project]");

    // Turbopack annotates locations with `[app-client] (ecmascript)`.
    if let Some(i) = s.find(" [") {
        s.truncate(i);
    }
    if let Some(i) = s.find(['?', '#']) {
        s.truncate(i);
    }

    for prefix in SCHEME_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
            break;
        }
    }
    for scheme in ["http://", "https://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = match rest.find('/') {
                Some(i) => rest[i..].to_string(),
                None => String::new(),
            };
            break;
        }
    }
    for prefix in PROJECT_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
            break;
        }
    }

    // webpack namespaces (`_N_E/./src/…`) and Next.js layer groups (`(rsc)/…`).
    if let Some(i) = s.find("/./") {
        s = s[i + 3..].to_string();
    }
    if s.starts_with('(') {
        if let Some(i) = s.find(")/") {
            s = s[i + 2..].to_string();
        }
    }
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    s
}

fn recover_bundled(path: &str) -> String {
    for marker in ROOT_MARKERS {
        if let Some(i) = marker_offset(path, marker) {
            let recovered = &path[i..];
            let last = final_segment(recovered);
            return match hash_suffix(last) {
                Some(hash) => {
                    let stem_end = recovered.len() - last.len() + hash.start() - 1;
                    let ext_start = recovered.len() - last.len() + hash.end();
                    format!("{}{}", &recovered[..stem_end], &recovered[ext_start..])
                }
                None => recovered.to_string(),
            };
        }
    }

    let last = final_segment(path);
    let stem = SOURCE_EXTENSIONS
        .iter()
        .chain([".css"].iter())
        .find_map(|ext| last.strip_suffix(ext))
        .unwrap_or(last);
    if stem.is_empty() || hash_suffix(last).is_some() || re_chunk_id().is_match(last) {
        BUNDLED_PLACEHOLDER.to_string()
    } else {
        format!("<bundled:{stem}>")
    }
}

fn collapse_to_marker(path: &str) -> String {
    ROOT_MARKERS
        .iter()
        .filter_map(|m| marker_offset(path, m))
        .min()
        .map(|i| path[i..].to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Clean a module id, file path or URL into a project-relative path.
pub fn clean_path(raw: &str) -> String {
    let s = normalize(raw);
    if s.is_empty() {
        return s;
    }
    if is_bundled(&s) {
        recover_bundled(&s)
    } else {
        collapse_to_marker(&s)
    }
}

/// Cleaned path without its JS/TS extension; what `fileName` carries.
pub fn display_path(cleaned: &str) -> String {
    if cleaned.starts_with('<') {
        return cleaned.to_string();
    }
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| cleaned.strip_suffix(ext))
        .unwrap_or(cleaned)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_relative_paths_are_kept() {
        assert_eq!(clean_path("app/page.tsx"), "app/page.tsx");
        assert_eq!(display_path(&clean_path("app/page.tsx")), "app/page");
        assert_eq!(clean_path("lib/util.ts"), "lib/util.ts");
    }

    #[test]
    fn collapses_to_src_marker() {
        assert_eq!(clean_path("/Users/me/proj/src/utils/log.ts"), "src/utils/log.ts");
        assert_eq!(clean_path(r"C:\proj\components\Button.tsx"), "components/Button.tsx");
        assert_eq!(clean_path("file:///C:/proj/src/a.ts"), "src/a.ts");
    }

    #[test]
    fn earliest_marker_wins_for_source_paths() {
        assert_eq!(clean_path("/proj/src/app/page.tsx"), "src/app/page.tsx");
        assert_eq!(clean_path("/proj/myapp/src/x.ts"), "src/x.ts");
    }

    #[test]
    fn strips_bundler_prefixes() {
        assert_eq!(
            clean_path("webpack-internal:///(app-pages-browser)/./src/app/page.tsx"),
            "src/app/page.tsx"
        );
        assert_eq!(clean_path("webpack://_N_E/./src/app/page.tsx?abcd"), "src/app/page.tsx");
        assert_eq!(clean_path("turbopack/[project]/src/app/page.tsx"), "src/app/page.tsx");
        assert_eq!(clean_path("%5Bproject%5D/src/x.ts"), "src/x.ts");
        assert_eq!(
            clean_path("[project]/app/page.tsx [app-client] (ecmascript)"),
            "app/page.tsx"
        );
        assert_eq!(clean_path("(rsc)/components/Nav.tsx"), "components/Nav.tsx");
    }

    #[test]
    fn recovers_marker_from_bundled_chunk() {
        assert_eq!(
            clean_path("http://localhost:3000/_next/static/chunks/app/page-3f2a1b9c8d.js?v=1"),
            "app/page.js"
        );
        assert_eq!(clean_path("/proj/.next/server/pages/index.js"), "pages/index.js");
    }

    #[test]
    fn hashed_bundle_without_marker_is_placeholder() {
        assert_eq!(clean_path("/assets/index-a1b2c3d4.js"), BUNDLED_PLACEHOLDER);
        assert_eq!(
            clean_path("http://localhost:3000/_next/static/chunks/4123-8f9e7d6c5b4a3210.js"),
            BUNDLED_PLACEHOLDER
        );
        assert_eq!(clean_path("https://cdn.example.com/static/js/main.4f1c2d3e.js"), BUNDLED_PLACEHOLDER);
    }

    #[test]
    fn named_chunk_is_annotated() {
        assert_eq!(
            clean_path("http://localhost:3000/_next/static/chunks/main-app.js"),
            "<bundled:main-app>"
        );
        assert_eq!(display_path("<bundled:main-app>"), "<bundled:main-app>");
    }

    #[test]
    fn plain_names_are_not_mistaken_for_hashes() {
        assert_eq!(clean_path("src/my-component.js"), "src/my-component.js");
        assert_eq!(clean_path("src/page.module.css"), "src/page.module.css");
    }

    #[test]
    fn source_names_with_digits_keep_their_suffix() {
        assert_eq!(clean_path("/proj/src/utils/date-formatter2.js"), "src/utils/date-formatter2.js");
        assert_eq!(clean_path("/proj/src/models/user.schema_v10.js"), "src/models/user.schema_v10.js");
        assert_eq!(clean_path("/proj/src/stories/Button.stories2.js"), "src/stories/Button.stories2.js");
        assert_eq!(clean_path("lib/404.js"), "lib/404.js");
        assert_eq!(
            crate::transform("useLogger()", "/proj/src/utils/date-formatter2.js").text,
            r#"useLogger({ __source: { fileName: "src/utils/date-formatter2", lineNumber: 1 } })"#
        );
    }

    #[test]
    fn vite_style_hashes() {
        assert_eq!(clean_path("http://localhost:4173/assets/index-BkQ3x9aZ.js"), BUNDLED_PLACEHOLDER);
        assert_eq!(clean_path("/proj/src/utils/formatter.js"), "src/utils/formatter.js");
        assert!(!looks_like_hash("Formatter"));
        assert!(!looks_like_hash("schema_v10"));
        assert!(looks_like_hash("8f9e7d6c"));
    }

    #[test]
    fn empty_and_url_root() {
        assert_eq!(clean_path(""), "");
        assert_eq!(clean_path("http://localhost:3000"), "");
    }
}
