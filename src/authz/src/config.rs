//! Plugin configuration loading and validation

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::engine::EngineConfig;
use crate::gateway::HttpGatewayConfig;
use crate::roles::RoleAccessTable;

/// Complete plugin configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub server: ServerSection,

    pub gateway: GatewaySection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub acl: AclSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            metrics_port: default_metrics_port(),
            metrics_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySection {
    /// Identity-provider host; mandatory
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub with_tls: bool,
    /// Login-verification path; mandatory, begins with a slash
    pub login_uri: String,
    #[serde(default)]
    pub superuser_uri: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
    /// Extra form parameters for login exchanges, `"key=value,key=value"`
    #[serde(default)]
    pub login_params: Option<String>,
    /// Extra form parameters for elevated exchanges
    #[serde(default)]
    pub superuser_params: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enforce_expiry: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enforce_expiry: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AclSection {
    /// Ordered role/mask entries
    #[serde(default)]
    pub roles: Vec<RoleEntry>,

    /// Compact alternative, `"admin=4,viewer=1"`; appended after `roles`
    #[serde(default)]
    pub role_spec: Option<String>,

    /// Optional cap on table size; absent means unbounded
    #[serde(default)]
    pub max_roles: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoleEntry {
    pub name: String,
    pub mask: i64,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_gateway_port() -> u16 {
    80
}
fn default_gateway_timeout() -> u64 {
    10
}

impl AuthzConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .context("Failed to read configuration file")?;

        let config: AuthzConfig =
            toml::from_str(&contents).context("Failed to parse configuration file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.is_empty() {
            anyhow::bail!("Mandatory parameter `gateway.host` missing");
        }

        if self.gateway.login_uri.is_empty() {
            anyhow::bail!("Mandatory parameter `gateway.login_uri` missing");
        }

        // uri begins with a slash
        if !self.gateway.login_uri.starts_with('/') {
            anyhow::bail!("`gateway.login_uri` must begin with a slash");
        }

        if self.acl.roles.is_empty() && self.acl.role_spec.is_none() {
            anyhow::bail!("No roles configured; the engine cannot serve requests");
        }

        Ok(())
    }

    /// Ordered role/mask pairs from both configured forms
    pub fn role_pairs(&self) -> crate::error::Result<Vec<(String, i64)>> {
        let mut pairs: Vec<(String, i64)> = self
            .acl
            .roles
            .iter()
            .map(|entry| (entry.name.clone(), entry.mask))
            .collect();

        if let Some(spec) = &self.acl.role_spec {
            pairs.extend(parse_role_spec(spec)?);
        }

        Ok(pairs)
    }

    /// Builds the role table from this configuration
    pub fn build_role_table(&self) -> crate::error::Result<RoleAccessTable> {
        RoleAccessTable::build(self.role_pairs()?, self.acl.max_roles)
    }

    /// Engine knobs derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache: CacheConfig {
                enforce_expiry: self.cache.enforce_expiry,
            },
            enable_metrics: self.server.metrics_enabled,
        }
    }

    /// Gateway endpoint configuration derived from this configuration
    pub fn gateway_config(&self) -> crate::error::Result<HttpGatewayConfig> {
        let login_params = match &self.gateway.login_params {
            Some(spec) => parse_param_list(spec)?,
            None => Vec::new(),
        };
        let superuser_params = match &self.gateway.superuser_params {
            Some(spec) => parse_param_list(spec)?,
            None => Vec::new(),
        };

        Ok(HttpGatewayConfig {
            host: self.gateway.host.clone(),
            port: self.gateway.port,
            with_tls: self.gateway.with_tls,
            login_uri: self.gateway.login_uri.clone(),
            superuser_uri: self.gateway.superuser_uri.clone(),
            timeout: Duration::from_secs(self.gateway.timeout_secs),
            login_params,
            superuser_params,
        })
    }
}

/// Parses a `"key=value,key=value"` parameter list.
///
/// Entries are comma-separated, each one `key=value`; whitespace around
/// keys and values is trimmed, empty entries are skipped.
pub fn parse_param_list(spec: &str) -> crate::error::Result<Vec<(String, String)>> {
    let mut params = Vec::new();

    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (key, value) = entry.split_once('=').ok_or_else(|| {
            crate::error::AuthzError::Config(format!("parameter entry `{entry}` is not key=value"))
        })?;
        params.push((key.trim().to_string(), value.trim().to_string()));
    }

    Ok(params)
}

/// Parses the `"role1=4,role2=1"` role-list form into ordered pairs.
pub fn parse_role_spec(spec: &str) -> crate::error::Result<Vec<(String, i64)>> {
    let mut pairs = Vec::new();

    for (name, value) in parse_param_list(spec)? {
        let mask = value.parse::<i64>().map_err(|_| {
            crate::error::AuthzError::Config(format!(
                "role `{name}` has non-numeric mask `{value}`"
            ))
        })?;
        pairs.push((name, mask));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
port = 8181

[gateway]
host = "idp.local"
port = 8443
with_tls = true
login_uri = "/auth/realms/broker/token"
login_params = "grant_type=password, client_id=broker"

[cache]
enforce_expiry = true

[acl]
role_spec = "admin=4,viewer=1"
max_roles = 25
"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AuthzConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.gateway.host, "idp.local");
        assert!(config.gateway.with_tls);

        let table = config.build_role_table().unwrap();
        assert_eq!(table.mask_for("admin"), 4);
        assert_eq!(table.mask_for("viewer"), 1);
    }

    #[test]
    fn test_gateway_config_derivation() {
        let config: AuthzConfig = toml::from_str(SAMPLE).unwrap();
        let gateway = config.gateway_config().unwrap();

        assert_eq!(gateway.timeout, Duration::from_secs(10));
        assert_eq!(
            gateway.login_params,
            vec![
                ("grant_type".to_string(), "password".to_string()),
                ("client_id".to_string(), "broker".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_mandatory_gateway_host() {
        let err = toml::from_str::<AuthzConfig>(
            r#"
[gateway]
login_uri = "/token"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_validate_rejects_empty_roles() {
        let config: AuthzConfig = toml::from_str(
            r#"
[gateway]
host = "idp.local"
login_uri = "/token"
"#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_uri() {
        let config: AuthzConfig = toml::from_str(
            r#"
[gateway]
host = "idp.local"
login_uri = "token"

[[acl.roles]]
name = "admin"
mask = 4
"#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_role_pairs_merges_both_forms() {
        let config: AuthzConfig = toml::from_str(
            r#"
[gateway]
host = "idp.local"
login_uri = "/token"

[acl]
role_spec = "viewer=1"

[[acl.roles]]
name = "admin"
mask = 4
"#,
        )
        .unwrap();

        let pairs = config.role_pairs().unwrap();
        assert_eq!(
            pairs,
            vec![("admin".to_string(), 4), ("viewer".to_string(), 1)]
        );
    }

    #[test]
    fn test_parse_role_spec() {
        let pairs = parse_role_spec("admin=4, viewer=1").unwrap();
        assert_eq!(
            pairs,
            vec![("admin".to_string(), 4), ("viewer".to_string(), 1)]
        );

        assert!(parse_role_spec("admin=notanumber").is_err());
        assert!(parse_role_spec("justarole").is_err());
    }
}
