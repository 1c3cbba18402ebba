//! The rule catalog: integrations and their method replacements.
//!
//! Rules are plain data. They are deserialized once at start-up (see
//! [`crate::loader`]) and shared immutably for the lifetime of the engine.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// A named group of replacements, e.g. one per instrumented library.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Integration {
    pub name: String,
    #[serde(default)]
    pub method_replacements: Vec<MethodReplacement>,
}

/// Redirects calls to `target` made from methods matching `caller` to `wrapper`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MethodReplacement {
    #[serde(default)]
    pub caller: MethodPattern,
    pub target: MethodPattern,
    pub wrapper: WrapperSpec,
}

/// Partial method identity. Missing or empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MethodPattern {
    #[serde(default)]
    pub assembly: Option<String>,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default, rename = "method")]
    pub method_name: Option<String>,
}

fn field_matches(pattern: Option<&str>, value: &str) -> bool {
    match pattern {
        None | Some("") => true,
        Some(expected) => expected == value,
    }
}

impl MethodPattern {
    pub fn new(assembly: Option<&str>, type_name: Option<&str>, method_name: Option<&str>) -> Self {
        Self {
            assembly: assembly.map(str::to_owned),
            type_name: type_name.map(str::to_owned),
            method_name: method_name.map(str::to_owned),
        }
    }

    /// Pattern that matches every method.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref().filter(|s| !s.is_empty())
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref().filter(|s| !s.is_empty())
    }

    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref().filter(|s| !s.is_empty())
    }

    pub fn matches_assembly(&self, assembly: &str) -> bool {
        field_matches(self.assembly.as_deref(), assembly)
    }

    pub fn matches(&self, assembly: &str, type_name: &str, method_name: &str) -> bool {
        field_matches(self.assembly.as_deref(), assembly)
            && field_matches(self.type_name.as_deref(), type_name)
            && field_matches(self.method_name.as_deref(), method_name)
    }
}

/// Four-part assembly version.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

impl FromStr for Version {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u16; 4];
        let mut count = 0;
        for part in s.split('.') {
            if count == 4 {
                return Err("version has more than four parts");
            }
            parts[count] = part.trim().parse().map_err(|_| "version part is not a number")?;
            count += 1;
        }
        Ok(Version {
            major: parts[0],
            minor: parts[1],
            build: parts[2],
            revision: parts[3],
        })
    }
}

/// Identity of a referenced assembly, parsed from its display name:
/// `Name, Version=1.0.0.0, Culture=neutral, PublicKeyToken=0123456789abcdef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyRef {
    pub name: String,
    pub version: Version,
    pub locale: String,
    pub public_key_token: Option<[u8; 8]>,
}

impl AssemblyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Version::default(),
            locale: String::new(),
            public_key_token: None,
        }
    }

    pub fn parse(display_name: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::AssemblyName {
            name: display_name.to_owned(),
            reason,
        };

        let mut parts = display_name.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(invalid("missing simple name"));
        }

        let mut assembly = AssemblyRef::new(name);
        for part in parts {
            let (key, value) = part.split_once('=').ok_or_else(|| invalid("expected key=value"))?;
            let value = value.trim();
            match key.trim() {
                k if k.eq_ignore_ascii_case("Version") => {
                    assembly.version = value.parse().map_err(|reason| invalid(reason))?;
                }
                k if k.eq_ignore_ascii_case("Culture") => {
                    assembly.locale = if value.eq_ignore_ascii_case("neutral") {
                        String::new()
                    } else {
                        value.to_owned()
                    };
                }
                k if k.eq_ignore_ascii_case("PublicKeyToken") => {
                    if value.eq_ignore_ascii_case("null") {
                        assembly.public_key_token = None;
                    } else {
                        let mut token = [0u8; 8];
                        hex::decode_to_slice(value, &mut token)
                            .map_err(|_| invalid("PublicKeyToken must be 16 hex digits"))?;
                        assembly.public_key_token = Some(token);
                    }
                }
                _ => return Err(invalid("unknown assembly name attribute")),
            }
        }
        Ok(assembly)
    }
}

impl fmt::Display for AssemblyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locale = if self.locale.is_empty() { "neutral" } else { &self.locale };
        write!(f, "{}, Version={}, Culture={}, PublicKeyToken=", self.name, self.version, locale)?;
        match self.public_key_token {
            Some(token) => write!(f, "{}", hex::encode(token)),
            None => write!(f, "null"),
        }
    }
}

/// Identity of a wrapper method, used to deduplicate emitted member references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrapperKey(String);

impl WrapperKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WrapperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A concrete wrapper method that replaces a target call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WrapperDef")]
pub struct WrapperSpec {
    assembly: AssemblyRef,
    type_name: String,
    method_name: String,
    signature: Vec<u8>,
    key: WrapperKey,
}

impl WrapperSpec {
    pub fn new(
        assembly: AssemblyRef,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        signature: Vec<u8>,
    ) -> Result<Self, ConfigError> {
        let type_name = type_name.into();
        let method_name = method_name.into();
        if assembly.name.is_empty() {
            return Err(ConfigError::IncompleteWrapper("assembly"));
        }
        if type_name.is_empty() {
            return Err(ConfigError::IncompleteWrapper("type"));
        }
        if method_name.is_empty() {
            return Err(ConfigError::IncompleteWrapper("method"));
        }
        if signature.is_empty() {
            return Err(ConfigError::IncompleteWrapper("signature"));
        }

        let key = WrapperKey(format!(
            "[{}]{}.{}({})",
            assembly,
            type_name,
            method_name,
            hex::encode(&signature)
        ));
        Ok(Self {
            assembly,
            type_name,
            method_name,
            signature,
            key,
        })
    }

    pub fn assembly(&self) -> &AssemblyRef {
        &self.assembly
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn cache_key(&self) -> &WrapperKey {
        &self.key
    }
}

#[derive(Deserialize)]
struct WrapperDef {
    assembly: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(rename = "method")]
    method_name: String,
    #[serde(default)]
    signature: Vec<u8>,
}

impl TryFrom<WrapperDef> for WrapperSpec {
    type Error = ConfigError;

    fn try_from(def: WrapperDef) -> Result<Self, Self::Error> {
        let assembly = AssemblyRef::parse(&def.assembly)?;
        WrapperSpec::new(assembly, def.type_name, def.method_name, def.signature)
    }
}
