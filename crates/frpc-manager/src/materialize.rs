//! Rendering of the configuration document into frpc's file formats.
//!
//! Two renderings are produced from the same document:
//! - INI, with bare `key = value` lines and one `[name]` section per proxy.
//! - TOML, where every value is type-tagged and proxies are `[[proxies]]` tables.
//!
//! Both are pure functions of the document; empty values and unnamed proxies
//! never appear in either.

use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::fs;

use crate::config::{ConfigDocument, ConfigValue, ProxyEntry};

/// File name of the generated INI rendering.
pub const GENERATED_INI: &str = "frpc.generated.ini";

/// File name of the generated TOML rendering.
pub const GENERATED_TOML: &str = "frpc.generated.toml";

/// Render the document as frpc INI.
pub fn render_ini(doc: &ConfigDocument) -> String {
    let mut lines = vec!["[common]".to_string()];
    for (key, value) in doc.common.iter().filter(|(_, v)| !v.is_empty()) {
        lines.push(format!("{key} = {value}"));
    }

    for proxy in named_proxies(doc) {
        lines.push(String::new());
        lines.push(format!("[{}]", proxy.name));
        lines.push(format!("type = {}", proxy.kind_or_default()));
        for (key, value) in proxy.fields.iter().filter(|(_, v)| !v.is_empty()) {
            lines.push(format!("{key} = {value}"));
        }
    }

    finish(lines)
}

/// Render the document as type-tagged TOML.
pub fn render_toml(doc: &ConfigDocument) -> String {
    let mut lines = vec!["[common]".to_string()];
    for (key, value) in doc.common.iter().filter(|(_, v)| !v.is_empty()) {
        lines.push(format!("{key} = {}", toml_value(value)));
    }

    for proxy in named_proxies(doc) {
        lines.push(String::new());
        lines.push("[[proxies]]".to_string());
        lines.push(format!("name = {}", toml_string(&proxy.name)));
        lines.push(format!("type = {}", toml_string(proxy.kind_or_default())));
        for (key, value) in proxy.fields.iter().filter(|(_, v)| !v.is_empty()) {
            lines.push(format!("{key} = {}", toml_value(value)));
        }
    }

    finish(lines)
}

fn named_proxies(doc: &ConfigDocument) -> impl Iterator<Item = &ProxyEntry> {
    doc.proxies.iter().filter(|p| !p.name.is_empty())
}

fn finish(lines: Vec<String>) -> String {
    let mut body = lines.join("\n");
    body.push('\n');
    body
}

fn toml_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Null => "\"\"".to_string(),
        ConfigValue::Bool(b) => b.to_string(),
        ConfigValue::Number(_) => value.to_string(),
        ConfigValue::String(s) => toml_string(s),
        ConfigValue::List(items) => toml_list(items.iter().map(String::as_str)),
    }
}

/// Quote a string, expanding comma-separated values into an array.
fn toml_string(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return "\"\"".to_string();
    }
    if s.contains(',') {
        let parts: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.len() > 1 {
            return toml_list(parts.into_iter());
        }
    }
    format!("\"{}\"", s.replace('"', "\\\""))
}

fn toml_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let rendered: Vec<String> = items.map(toml_string).collect();
    format!("[{}]", rendered.join(", "))
}

/// Paths of the two generated renderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFiles {
    pub ini_path: PathBuf,
    pub toml_path: PathBuf,
}

impl GeneratedFiles {
    pub fn new(ini_path: impl Into<PathBuf>, toml_path: impl Into<PathBuf>) -> Self {
        Self {
            ini_path: ini_path.into(),
            toml_path: toml_path.into(),
        }
    }

    /// The well-known file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(GENERATED_INI), dir.join(GENERATED_TOML))
    }

    /// Render `doc` and overwrite both files.
    pub async fn write(&self, doc: &ConfigDocument) -> io::Result<()> {
        for path in [&self.ini_path, &self.toml_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.ini_path, render_ini(doc)).await?;
        fs::write(&self.toml_path, render_toml(doc)).await?;
        debug!(
            "Wrote generated config to {} and {}",
            self.ini_path.display(),
            self.toml_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::json;

    fn sample() -> ConfigDocument {
        let mut common = Settings::new();
        common.insert("server_addr".to_string(), ConfigValue::from("1.2.3.4"));
        common.insert("server_port".to_string(), ConfigValue::from(7000_i64));
        common.insert("token".to_string(), ConfigValue::from(""));
        ConfigDocument {
            common,
            proxies: vec![ProxyEntry::new("web", "http").with_field("local_port", 8080_i64)],
            executable_path: None,
        }
    }

    #[test]
    fn test_render_ini_example() {
        let ini = render_ini(&sample());
        assert_eq!(
            ini,
            "[common]\nserver_addr = 1.2.3.4\nserver_port = 7000\n\n[web]\ntype = http\nlocal_port = 8080\n"
        );
    }

    #[test]
    fn test_render_toml_example() {
        let toml = render_toml(&sample());
        assert_eq!(
            toml,
            "[common]\nserver_addr = \"1.2.3.4\"\nserver_port = 7000\n\n[[proxies]]\nname = \"web\"\ntype = \"http\"\nlocal_port = 8080\n"
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let doc = sample();
        assert_eq!(render_ini(&doc), render_ini(&doc));
        assert_eq!(render_toml(&doc), render_toml(&doc));
    }

    #[test]
    fn test_rendering_is_idempotent_for_mixed_document() {
        let doc: ConfigDocument = serde_json::from_value(json!({
            "common": {
                "user": "alice",
                "tls_enable": true,
                "server_port": 7000.0,
                "server_addr": "frps.example.com"
            },
            "proxies": [
                { "name": "", "type": "udp", "local_port": 53 },
                {
                    "name": "site",
                    "custom_domains": "a.example.com, b.example.com",
                    "use_encryption": false,
                    "type": "http"
                }
            ]
        }))
        .unwrap();

        let ini = render_ini(&doc);
        let toml = render_toml(&doc);
        assert_eq!(ini, render_ini(&doc.clone()));
        assert_eq!(toml, render_toml(&doc.clone()));

        assert_eq!(
            ini,
            "[common]\nuser = alice\ntls_enable = true\nserver_port = 7000\nserver_addr = frps.example.com\n\n[site]\ntype = http\ncustom_domains = a.example.com, b.example.com\nuse_encryption = false\n"
        );
        assert_eq!(
            toml,
            "[common]\nuser = \"alice\"\ntls_enable = true\nserver_port = 7000\nserver_addr = \"frps.example.com\"\n\n[[proxies]]\nname = \"site\"\ntype = \"http\"\ncustom_domains = [\"a.example.com\", \"b.example.com\"]\nuse_encryption = false\n"
        );
    }

    #[test]
    fn test_empty_values_are_omitted() {
        let doc: ConfigDocument = serde_json::from_value(json!({
            "common": { "a": "", "b": null, "c": [], "d": false },
            "proxies": [{ "name": "p", "x": "", "y": null, "z": 0 }]
        }))
        .unwrap();

        for body in [render_ini(&doc), render_toml(&doc)] {
            assert!(!body.contains("a ="));
            assert!(!body.contains("b ="));
            assert!(!body.contains("c ="));
            assert!(!body.contains("x ="));
            assert!(!body.contains("y ="));
            assert!(body.contains("d = false"));
            assert!(body.contains("z = 0"));
        }
    }

    #[test]
    fn test_unnamed_proxies_are_skipped() {
        let doc: ConfigDocument = serde_json::from_value(json!({
            "common": {},
            "proxies": [
                { "type": "tcp", "local_port": 22 },
                { "name": "", "type": "udp" },
                { "name": "ssh", "local_port": 22 }
            ]
        }))
        .unwrap();

        let ini = render_ini(&doc);
        assert_eq!(ini, "[common]\n\n[ssh]\ntype = tcp\nlocal_port = 22\n");

        let toml = render_toml(&doc);
        assert_eq!(toml.matches("[[proxies]]").count(), 1);
        assert!(toml.contains("type = \"tcp\""));
        assert!(!toml.contains("udp"));
    }

    #[test]
    fn test_type_line_follows_header() {
        let doc: ConfigDocument = serde_json::from_value(json!({
            "proxies": [{ "local_port": 80, "name": "web", "type": "http" }]
        }))
        .unwrap();

        let ini = render_ini(&doc);
        let lines: Vec<&str> = ini.lines().collect();
        assert_eq!(lines[2], "[web]");
        assert_eq!(lines[3], "type = http");
        assert_eq!(lines[4], "local_port = 80");
    }

    #[test]
    fn test_toml_comma_lists() {
        assert_eq!(toml_string("a.com, b.com"), "[\"a.com\", \"b.com\"]");
        assert_eq!(toml_string("a.com,"), "\"a.com,\"");
        assert_eq!(toml_string(" , ,x"), "\", ,x\"");
        assert_eq!(
            toml_value(&ConfigValue::List(vec!["a".into(), "b,c".into()])),
            "[\"a\", [\"b\", \"c\"]]"
        );
    }

    #[test]
    fn test_toml_string_escaping() {
        assert_eq!(toml_string("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(toml_string("  padded  "), "\"padded\"");
        assert_eq!(toml_string("   "), "\"\"");
        assert_eq!(toml_value(&ConfigValue::Null), "\"\"");
    }

    #[test]
    fn test_ini_lists_are_comma_joined() {
        let mut doc = ConfigDocument::default();
        doc.common.insert(
            "domains".to_string(),
            ConfigValue::List(vec!["a".into(), "b".into()]),
        );
        assert_eq!(render_ini(&doc), "[common]\ndomains = a,b\n");
    }

    #[tokio::test]
    async fn test_write_overwrites_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let files = GeneratedFiles::in_dir(&dir.path().join("out"));

        files.write(&sample()).await.unwrap();
        files.write(&ConfigDocument::default()).await.unwrap();

        let ini = std::fs::read_to_string(&files.ini_path).unwrap();
        let toml = std::fs::read_to_string(&files.toml_path).unwrap();
        assert_eq!(ini, "[common]\n");
        assert_eq!(toml, "[common]\n");
    }
}
