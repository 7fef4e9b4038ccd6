use std::fmt::Write;

use hangar_oracle::{ProjectData, Statistics};
use hangar_types::Package;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The PEP 503-style simple-index root: one `<a>` per active package name.
pub fn simple_index_root(packages: &[Package]) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><body>\n");
    for package in packages.iter().filter(|p| p.is_active()) {
        let name = escape_html(&package.name);
        let _ = writeln!(out, "<a href=\"{name}/\">{name}</a>");
    }
    out.push_str("</body></html>\n");
    out
}

/// The per-package simple-index page: one `<a>` per file, hash in the
/// fragment, matching the pip-facing simple-repository-API shape.
pub fn simple_index_package(package: &str, data: &ProjectData) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><body>\n");
    let _ = writeln!(out, "<h1>Links for {}</h1>", escape_html(package));
    for file in &data.files {
        let filename = escape_html(&file.filename);
        let mut href = format!("../../packages/{filename}#sha256={}", file.sha256);
        if let Some(requires_python) = &file.requires_python {
            let _ = write!(href, "&requires_python={}", escape_html(requires_python));
        }
        let _ = writeln!(out, "<a href=\"{href}\">{filename}</a><br/>");
    }
    out.push_str("</body></html>\n");
    out
}

/// The per-package human-facing project page: versions, release dates,
/// yank/skip state, and the files under each version.
pub fn project_page(data: &ProjectData) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><body>\n");
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&data.package));
    for version in &data.versions {
        let label = escape_html(&version.version);
        let status = if version.yanked {
            " (yanked)"
        } else if !version.skip_reason.is_empty() {
            " (skipped)"
        } else {
            ""
        };
        let _ = writeln!(out, "<h2>{label}{status}</h2>");
        let _ = writeln!(out, "<p>released {}</p>", version.released_at.to_rfc3339());
        out.push_str("<ul>\n");
        for file in data.files.iter().filter(|f| f.tags.version == version.version) {
            let _ = writeln!(out, "<li>{} ({} bytes)</li>", escape_html(&file.filename), file.size);
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</body></html>\n");
    out
}

/// The site home page: package count and a handful of aggregate stats.
pub fn home_page(packages: &[Package], stats: &Statistics) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><body>\n");
    out.push_str("<h1>hangar</h1>\n");
    let _ = writeln!(out, "<p>{} packages, {} versions, {} files, {} builds</p>",
        stats.total_packages, stats.total_versions, stats.total_files, stats.total_builds);
    let _ = writeln!(out, "<p>{} bytes on disk</p>", stats.disk_usage_bytes);
    out.push_str("<ul>\n");
    for package in packages.iter().filter(|p| p.is_active()) {
        let name = escape_html(&package.name);
        let _ = writeln!(out, "<li><a href=\"/project/{name}/\">{name}</a></li>");
    }
    out.push_str("</ul>\n</body></html>\n");
    out
}

/// A flat JSON array of active package names, consumed by the site's
/// client-side search box.
pub fn search_index(packages: &[Package]) -> String {
    let names: Vec<&str> = packages.iter().filter(|p| p.is_active()).map(|p| p.name.as_str()).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
}

/// The per-package JSON API document (a reduced form of PyPI's `pypi/<pkg>/json`).
pub fn json_api(data: &ProjectData) -> String {
    let releases: std::collections::BTreeMap<&str, Vec<&hangar_types::BuildFile>> = data
        .versions
        .iter()
        .map(|v| {
            let files = data.files.iter().filter(|f| f.tags.version == v.version).collect();
            (v.version.as_str(), files)
        })
        .collect();

    let doc = serde_json::json!({
        "name": data.package,
        "releases": releases.iter().map(|(version, files)| {
            (version.to_string(), files.iter().map(|f| serde_json::json!({
                "filename": f.filename,
                "size": f.size,
                "sha256": f.sha256,
                "requires_python": f.requires_python,
            })).collect::<Vec<_>>())
        }).collect::<std::collections::BTreeMap<_, _>>(),
    });
    serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hangar_types::{BuildFile, FileTags, Version};

    fn sample_project() -> ProjectData {
        ProjectData {
            package: "numpy".to_string(),
            versions: vec![Version {
                package: "numpy".to_string(),
                version: "1.26.0".to_string(),
                released_at: Utc::now(),
                skip_reason: String::new(),
                yanked: false,
            }],
            files: vec![BuildFile {
                filename: "numpy-1.26.0-cp311-cp311-linux_armv7l.whl".to_string(),
                build_id: 1,
                size: 1234,
                sha256: "abc123".to_string(),
                tags: FileTags {
                    package: "numpy".to_string(),
                    version: "1.26.0".to_string(),
                    interpreter: "cp311".to_string(),
                    abi: "cp311".to_string(),
                    platform: "linux_armv7l".to_string(),
                },
                requires_python: Some(">=3.11".to_string()),
            }],
        }
    }

    #[test]
    fn simple_index_package_links_each_file_with_its_hash() {
        let html = simple_index_package("numpy", &sample_project());
        assert!(html.contains("#sha256=abc123"));
        assert!(html.contains("requires_python=&gt;=3.11"));
    }

    #[test]
    fn project_page_marks_yanked_versions() {
        let mut data = sample_project();
        data.versions[0].yanked = true;
        let html = project_page(&data);
        assert!(html.contains("(yanked)"));
    }

    #[test]
    fn home_page_skips_inactive_packages() {
        let packages = vec![
            Package { name: "active".into(), skip_reason: String::new(), description: None },
            Package { name: "blocked".into(), skip_reason: "license".into(), description: None },
        ];
        let stats = Statistics { total_packages: 2, total_versions: 0, total_files: 0, total_builds: 0, disk_usage_bytes: 0 };
        let html = home_page(&packages, &stats);
        assert!(html.contains("active"));
        assert!(!html.contains("blocked"));
    }

    #[test]
    fn search_index_is_a_json_array_of_names() {
        let packages = vec![Package { name: "numpy".into(), skip_reason: String::new(), description: None }];
        let json = search_index(&packages);
        assert_eq!(json, r#"["numpy"]"#);
    }

    #[test]
    fn json_api_nests_files_under_their_release() {
        let json = json_api(&sample_project());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["name"], "numpy");
        assert!(parsed["releases"]["1.26.0"].is_array());
    }

    #[test]
    fn simple_index_root_escapes_html_special_characters() {
        let packages = vec![Package { name: "a&b".into(), skip_reason: String::new(), description: None }];
        let html = simple_index_root(&packages);
        assert!(html.contains("a&amp;b"));
    }
}
