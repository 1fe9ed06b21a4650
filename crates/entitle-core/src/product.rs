use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triplet {
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl Triplet {
    pub fn new(name: impl Into<String>, version: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.name, self.version, self.arch)
    }
}

impl FromStr for Triplet {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('/').collect();
        let valid = parts.len() == 3
            && parts
                .iter()
                .all(|part| !part.is_empty() && !part.chars().any(char::is_whitespace));
        if !valid {
            return Err(Error::InvalidTriplet(value.to_string()));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub autorefresh: bool,
    #[serde(default)]
    pub installer_updates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<String>,
}

/// Two products are equal when their triplets are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawProduct")]
pub struct Product {
    #[serde(rename = "identifier")]
    pub name: String,
    pub version: String,
    pub arch: String,
    #[serde(skip)]
    pub release: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(rename = "isbase")]
    pub is_base: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub friendly_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub release_type: String,
    #[serde(skip)]
    pub product_line: String,
    pub available: bool,
    pub free: bool,
    pub recommended: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Product>,
    pub id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub eula_url: String,
    #[serde(rename = "former_identifier", skip_serializing_if = "String::is_empty")]
    pub former_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(rename = "shortname", skip_serializing_if = "String::is_empty")]
    pub short_name: String,
    #[serde(rename = "name", skip_serializing_if = "String::is_empty")]
    pub long_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub release_stage: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RemoteRepository>,
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.arch == other.arch
    }
}

impl Eq for Product {}

impl From<Triplet> for Product {
    fn from(triplet: Triplet) -> Self {
        Self {
            name: triplet.name,
            version: triplet.version,
            arch: triplet.arch,
            available: true,
            ..Self::default()
        }
    }
}

impl Product {
    pub fn triplet(&self) -> Triplet {
        Triplet::new(&self.name, &self.version, &self.arch)
    }

    pub fn to_triplet(&self) -> String {
        self.triplet().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() || self.version.is_empty() || self.arch.is_empty()
    }

    pub fn edition(&self) -> String {
        if self.release.is_empty() {
            self.version.clone()
        } else {
            format!("{}-{}", self.version, self.release)
        }
    }

    pub fn display_name(&self) -> String {
        if self.friendly_name.is_empty() {
            self.to_triplet()
        } else {
            self.friendly_name.clone()
        }
    }

    pub fn distro_target(&self) -> String {
        let mut identifier = self.name.to_lowercase();
        if identifier.starts_with("sle") {
            identifier = "sle".to_string();
        }
        let major = self.version.split('.').next().unwrap_or_default();
        format!("{identifier}-{major}-{}", self.arch)
    }

    pub fn query(&self) -> [(&'static str, &str); 4] {
        [
            ("identifier", self.name.as_str()),
            ("version", self.version.as_str()),
            ("arch", self.arch.as_str()),
            ("release_type", self.release_type.as_str()),
        ]
    }
}

/// Wire shape accepted for products: every field optional, `null` tolerated,
/// the base flag reported under three different names.
#[derive(Deserialize)]
struct RawProduct {
    identifier: Option<String>,
    version: Option<String>,
    arch: Option<String>,
    summary: Option<String>,
    isbase: Option<bool>,
    base: Option<bool>,
    friendly_name: Option<String>,
    release_type: Option<String>,
    available: Option<bool>,
    free: Option<bool>,
    recommended: Option<bool>,
    extensions: Option<Vec<Product>>,
    id: Option<Value>,
    description: Option<String>,
    eula_url: Option<String>,
    former_identifier: Option<String>,
    product_type: Option<String>,
    shortname: Option<String>,
    name: Option<String>,
    release_stage: Option<String>,
    repositories: Option<Vec<RemoteRepository>>,
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        let product_type = raw.product_type.unwrap_or_default();
        let is_base =
            raw.isbase.unwrap_or(false) || raw.base.unwrap_or(false) || product_type == "base";
        Self {
            name: raw.identifier.unwrap_or_default(),
            version: raw.version.unwrap_or_default(),
            arch: raw.arch.unwrap_or_default(),
            release: String::new(),
            summary: raw.summary.unwrap_or_default(),
            is_base,
            friendly_name: raw.friendly_name.unwrap_or_default(),
            release_type: raw.release_type.unwrap_or_default(),
            product_line: String::new(),
            // Only some servers report availability; absent means available.
            available: raw.available.unwrap_or(true),
            free: raw.free.unwrap_or(false),
            recommended: raw.recommended.unwrap_or(false),
            extensions: raw.extensions.unwrap_or_default(),
            id: raw.id.as_ref().map(parse_id).unwrap_or(0),
            description: raw.description.unwrap_or_default(),
            eula_url: raw.eula_url.unwrap_or_default(),
            former_name: raw.former_identifier.unwrap_or_default(),
            product_type,
            short_name: raw.shortname.unwrap_or_default(),
            long_name: raw.name.unwrap_or_default(),
            release_stage: raw.release_stage.unwrap_or_default(),
            repositories: raw.repositories.unwrap_or_default(),
        }
    }
}

fn parse_id(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number.as_i64().unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
