//! Structured frpc configuration document.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Proxy type used when an entry does not specify one.
pub const DEFAULT_PROXY_TYPE: &str = "tcp";

/// Default frps control port.
pub const DEFAULT_SERVER_PORT: u16 = 7000;

/// A scalar setting value.
///
/// JSON `null` is kept as [`ConfigValue::Null`] so documents round-trip, but it
/// is never rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<String>),
}

impl ConfigValue {
    /// Empty values are omitted from every rendering.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Interpret the value as a TCP port.
    ///
    /// Numbers and numeric strings are accepted; anything that is not a
    /// positive integer in port range yields `None`.
    pub fn as_port(&self) -> Option<u16> {
        let raw = match self {
            Self::Number(n) => n.as_f64()?,
            Self::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !raw.is_finite() || raw <= 0.0 || raw.fract() != 0.0 || raw > f64::from(u16::MAX) {
            return None;
        }
        Some(raw as u16)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&number_text(n)),
            Self::String(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Integral floats such as `7000.0` render without the fraction.
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(x) if n.is_f64() && x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => {
            format!("{}", x as i64)
        }
        _ => n.to_string(),
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        Self::Number(value.into())
    }
}

/// Ordered mapping of setting name to value.
pub type Settings = IndexMap<String, ConfigValue>;

/// One proxy section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Every other field, in document order.
    #[serde(flatten)]
    pub fields: Settings,
}

impl ProxyEntry {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind.into()),
            fields: Settings::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The proxy type, falling back to [`DEFAULT_PROXY_TYPE`].
    pub fn kind_or_default(&self) -> &str {
        match self.kind.as_deref() {
            Some(kind) if !kind.is_empty() => kind,
            _ => DEFAULT_PROXY_TYPE,
        }
    }
}

/// The persisted configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub common: Settings,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proxies: Vec<ProxyEntry>,
    #[serde(default, alias = "frpcPath", skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<String>,
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ConfigDocument {
    /// The document a fresh install starts from.
    pub fn defaults() -> Self {
        let mut common = Settings::new();
        common.insert("server_addr".to_string(), ConfigValue::from(""));
        common.insert(
            "server_port".to_string(),
            ConfigValue::from(DEFAULT_SERVER_PORT),
        );
        common.insert("token".to_string(), ConfigValue::from(""));
        common.insert("user".to_string(), ConfigValue::from(""));
        Self {
            common,
            proxies: Vec::new(),
            executable_path: None,
        }
    }

    /// Merge this document over the defaults.
    ///
    /// `common` is merged key-wise: default keys come first and keep their
    /// position when overridden. `proxies` and `executable_path` are taken
    /// from `self` as-is.
    pub fn with_defaults(self) -> Self {
        let mut common = Self::defaults().common;
        for (key, value) in self.common {
            common.insert(key, value);
        }
        Self {
            common,
            proxies: self.proxies,
            executable_path: self.executable_path,
        }
    }

    /// Configured executable path, if it is non-blank.
    pub fn executable(&self) -> Option<&str> {
        self.executable_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    /// Configured frps address, trimmed.
    pub fn server_addr(&self) -> Option<&str> {
        self.common
            .get("server_addr")
            .and_then(ConfigValue::as_str)
            .map(str::trim)
    }

    pub fn server_port(&self) -> Option<&ConfigValue> {
        self.common.get("server_port")
    }

    /// Reject documents whose proxies share a name.
    ///
    /// Entries with an empty name are never rendered and are ignored here.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for proxy in &self.proxies {
            if proxy.name.is_empty() {
                continue;
            }
            if !seen.insert(proxy.name.as_str()) {
                return Err(format!("duplicate proxy name '{}'", proxy.name));
            }
        }
        Ok(())
    }
}

/// Partial document supplied when starting frpc.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default)]
    pub common: Option<Settings>,
    #[serde(default)]
    pub proxies: Option<Vec<ProxyEntry>>,
    #[serde(default, alias = "frpcPath")]
    pub executable_path: Option<String>,
}

impl ConfigOverrides {
    /// Shallow merge: every field present here replaces the base field.
    pub fn apply_to(self, mut base: ConfigDocument) -> ConfigDocument {
        if let Some(common) = self.common {
            base.common = common;
        }
        if let Some(proxies) = self.proxies {
            base.proxies = proxies;
        }
        if let Some(path) = self.executable_path {
            base.executable_path = Some(path);
        }
        base
    }
}
