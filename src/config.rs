//! Configuration Management
//!
//! Cloud credentials are read from `clouds.yaml` and overlaid with the
//! `OS_*` environment variables. A small JSON file keeps per-user display
//! preferences. Command-line flags override both.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Keystone credentials, as found under `auth:` in `clouds.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_id: Option<String>,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub project_domain_id: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<String>,
}

/// One named cloud
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CloudProfile {
    pub auth: AuthSettings,
    pub region_name: Option<String>,
    /// Catalog interface (`public`, `internal`, `admin`)
    pub interface: Option<String>,
}

/// Parsed `clouds.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: BTreeMap<String, CloudProfile>,
}

impl CloudsFile {
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid clouds.yaml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn cloud_names(&self) -> Vec<&str> {
        self.clouds.keys().map(|k| k.as_str()).collect()
    }
}

/// Places searched for `clouds.yaml`, in order
pub fn clouds_yaml_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = std::env::var_os("OS_CLIENT_CONFIG_FILE") {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from("clouds.yaml"));
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("openstack").join("clouds.yaml"));
    }
    candidates.push(PathBuf::from("/etc/openstack/clouds.yaml"));
    candidates
}

pub fn find_clouds_yaml() -> Option<PathBuf> {
    clouds_yaml_candidates().into_iter().find(|p| p.is_file())
}

/// Overlay `OS_*` variables on a profile. Set variables replace the
/// corresponding field; empty ones are ignored.
pub fn apply_env<F>(profile: &mut CloudProfile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let auth = &mut profile.auth;
    let fields: [(&str, &mut Option<String>); 12] = [
        ("OS_AUTH_URL", &mut auth.auth_url),
        ("OS_USERNAME", &mut auth.username),
        ("OS_PASSWORD", &mut auth.password),
        ("OS_USER_ID", &mut auth.user_id),
        ("OS_USER_DOMAIN_NAME", &mut auth.user_domain_name),
        ("OS_USER_DOMAIN_ID", &mut auth.user_domain_id),
        ("OS_PROJECT_ID", &mut auth.project_id),
        ("OS_PROJECT_NAME", &mut auth.project_name),
        ("OS_PROJECT_DOMAIN_NAME", &mut auth.project_domain_name),
        ("OS_PROJECT_DOMAIN_ID", &mut auth.project_domain_id),
        ("OS_APPLICATION_CREDENTIAL_ID", &mut auth.application_credential_id),
        ("OS_APPLICATION_CREDENTIAL_SECRET", &mut auth.application_credential_secret),
    ];
    for (name, field) in fields {
        if let Some(value) = get(name) {
            *field = Some(value);
        }
    }
    if let Some(region) = get("OS_REGION_NAME") {
        profile.region_name = Some(region);
    }
    if let Some(interface) = get("OS_INTERFACE").or_else(|| get("OS_ENDPOINT_TYPE")) {
        profile.interface = Some(interface.trim_end_matches("URL").to_string());
    }
}

/// Build the profile to authenticate with.
///
/// The cloud name comes from `cloud`, else `OS_CLOUD`, else
/// `default_cloud` (the preferences). Without a name the profile starts
/// empty and is filled from the environment alone.
pub fn resolve_profile<F>(
    cloud: Option<&str>,
    default_cloud: Option<&str>,
    clouds: Option<&CloudsFile>,
    lookup: F,
) -> Result<CloudProfile>
where
    F: Fn(&str) -> Option<String>,
{
    let env_cloud = lookup("OS_CLOUD").filter(|v| !v.is_empty());
    let name = cloud
        .map(|c| c.to_string())
        .or(env_cloud)
        .or_else(|| default_cloud.map(|c| c.to_string()));

    let mut profile = match name {
        Some(name) => {
            let Some(clouds) = clouds else {
                bail!("Cloud '{}' requested but no clouds.yaml was found", name);
            };
            match clouds.clouds.get(&name) {
                Some(profile) => {
                    tracing::info!("Using cloud '{}' from clouds.yaml", name);
                    profile.clone()
                }
                None => bail!(
                    "Cloud '{}' not found in clouds.yaml (available: {})",
                    name,
                    clouds.cloud_names().join(", ")
                ),
            }
        }
        None => CloudProfile::default(),
    };

    apply_env(&mut profile, lookup);

    if profile.auth.auth_url.is_none() {
        bail!("No auth URL configured. Set OS_AUTH_URL or choose a cloud with --cloud");
    }
    Ok(profile)
}

/// Convenience wrapper reading the real environment and `clouds.yaml`
pub fn load_profile(cloud: Option<&str>, default_cloud: Option<&str>) -> Result<CloudProfile> {
    let clouds = match find_clouds_yaml() {
        Some(path) => {
            tracing::debug!("Reading {:?}", path);
            Some(CloudsFile::load(&path)?)
        }
        None => None,
    };
    resolve_profile(cloud, default_cloud, clouds.as_ref(), |name| std::env::var(name).ok())
}

pub const DEFAULT_MAX_WIDTH: usize = 120;

/// User preferences
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Cloud to use when neither `--cloud` nor `OS_CLOUD` is given
    #[serde(default)]
    pub cloud: Option<String>,
    /// Overview wrap width
    #[serde(default)]
    pub max_width: Option<usize>,
    /// Default `--columns` for the port listing
    #[serde(default)]
    pub port_columns: Option<String>,
    /// `false` turns colour off
    #[serde(default)]
    pub color: Option<bool>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("osview").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Unreadable preferences fall back to defaults
    pub fn parse(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid preferences: {}", e);
            Self::default()
        })
    }

    /// CLI > preferences > 120
    pub fn effective_max_width(&self, cli: Option<usize>) -> usize {
        cli.or(self.max_width).unwrap_or(DEFAULT_MAX_WIDTH)
    }

    /// `--columns`, else the preferred list unless `--wide` asks for every column
    pub fn effective_columns(&self, cli: Option<&str>, wide: bool) -> Option<String> {
        match cli {
            Some(columns) => Some(columns.to_string()),
            None if wide => None,
            None => self.port_columns.clone(),
        }
    }

    /// `--no-color` always wins
    pub fn color_requested(&self, no_color_flag: bool) -> bool {
        !no_color_flag && self.color.unwrap_or(true)
    }
}
