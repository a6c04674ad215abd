use crate::globals::{is_global, GlobalParams};
use crate::http::HttpConnectionProfile;
use crate::utils::Result;
use anyhow::Context;
use ini::{Ini, Properties};
use std::{collections::HashMap, path::Path};

pub const DEFAULT_INI_FILE_PATH: &str = "~/.eslog";
pub const DEFAULT_INI_SECTION: &str = "default";
pub const DEFAULT_HOST: &str = "http://localhost:9200";

const INI_HOST: &str = "host";
const INI_CA_CERT: &str = "ca_cert";
const INI_INSECURE: &str = "insecure";
const INI_HEADER_PREFIX: &str = "header.";
const INI_GLOBAL_PREFIX: &str = "global.";

/// A named section of the config file: where the log store lives and the
/// global parameters its templates see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    host: Option<String>,
    insecure: bool,
    ca_cert: Option<String>,
    headers: HashMap<String, String>,
    globals: GlobalParams,
}

impl Profile {
    /// The configured host without a trailing `/`.
    pub fn configured_host(&self) -> Option<&str> {
        self.host.as_deref().map(|h| h.trim_end_matches('/'))
    }

    pub fn globals(&self) -> &GlobalParams {
        &self.globals
    }
}

impl HttpConnectionProfile for Profile {
    fn host(&self) -> &str {
        self.configured_host().unwrap_or(DEFAULT_HOST)
    }

    fn insecure(&self) -> bool {
        self.insecure
    }

    fn ca_cert(&self) -> Option<&str> {
        self.ca_cert.as_deref()
    }

    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

pub struct IniFile;

impl IniFile {
    pub fn load_profile(file_path: &str, name: &str) -> Result<Option<Profile>> {
        let expanded_path = shellexpand::tilde(file_path).to_string();
        if !Path::new(&expanded_path).exists() {
            tracing::debug!("config file not found: {}", expanded_path);
            return Ok(None);
        }
        let ini = Ini::load_from_file(&expanded_path)
            .with_context(|| format!("Failed to load config file {}", expanded_path))?;
        let Some(section) = ini.section(Some(name)) else {
            tracing::debug!("profile '{}' not found in {}", name, expanded_path);
            return Ok(None);
        };

        let insecure = match section.get(INI_INSECURE) {
            Some(v) => v
                .trim()
                .parse::<bool>()
                .with_context(|| format!("Invalid value for {}: {}", INI_INSECURE, v))?,
            None => false,
        };

        let globals = prefixed(section, INI_GLOBAL_PREFIX)
            .filter(|(key, _)| {
                let ok = is_global(key);
                if !ok {
                    tracing::warn!("ignoring global parameter '{}' without '$' prefix", key);
                }
                ok
            })
            .collect::<GlobalParams>();

        Ok(Some(Profile {
            host: section.get(INI_HOST).map(str::to_string),
            insecure,
            ca_cert: section.get(INI_CA_CERT).map(str::to_string),
            headers: prefixed(section, INI_HEADER_PREFIX).collect(),
            globals,
        }))
    }
}

fn prefixed<'a>(
    section: &'a Properties,
    prefix: &'a str,
) -> impl Iterator<Item = (String, String)> + 'a {
    section.iter().filter_map(move |(key, value)| {
        key.strip_prefix(prefix)
            .map(|k| (k.trim().to_string(), value.to_string()))
    })
}
