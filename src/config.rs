use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Complete application configuration, loaded from environment variables or
/// default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub update: UpdateConfig,
    pub grouper: GrouperConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment
    /// variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            update: UpdateConfig::from_env(),
            grouper: GrouperConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("COMBO_BATCH_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse COMBO_BATCH_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    Self::DEFAULT_HOST
                        .parse::<IpAddr>()
                        .expect("Default host must be valid"),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("COMBO_BATCH_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    eprintln!(
                        "⚠️ COMBO_BATCH_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    eprintln!(
                        "⚠️ Could not parse COMBO_BATCH_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for the update check.
#[derive(Clone, Debug)]
pub struct UpdateConfig {
    owner: String,
    repo: String,
}

impl UpdateConfig {
    const DEFAULT_OWNER: &'static str = "combo-batch";
    const DEFAULT_REPO: &'static str = "combo-batch";

    fn from_env() -> Self {
        Self {
            owner: env_string("COMBO_BATCH_GITHUB_OWNER")
                .unwrap_or_else(|| Self::DEFAULT_OWNER.to_string()),
            repo: env_string("COMBO_BATCH_GITHUB_REPO")
                .unwrap_or_else(|| Self::DEFAULT_REPO.to_string()),
        }
    }

    /// GitHub owner (organization or user) from which releases originate.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// GitHub repository name from which releases are loaded.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Returns the URL where the latest release is queried.
    pub fn latest_release_endpoint(&self) -> String {
        format!(
            "https://api.github.com/repos/{owner}/{repo}/releases/latest",
            owner = self.owner(),
            repo = self.repo()
        )
    }
}

/// Configuration for the grouping engine.
///
/// Only the default target weight is configurable; the overshoot ceiling
/// multiplier is a fixed policy constant (`grouper::CEILING_RATIO`).
#[derive(Clone, Debug)]
pub struct GrouperConfig {
    default_target: f64,
}

impl GrouperConfig {
    const TARGET_VAR: &'static str = "COMBO_BATCH_TARGET_WEIGHT";
    pub const DEFAULT_TARGET: f64 = 1300.0;

    fn from_env() -> Self {
        let default_target = load_f64_with_warning(
            Self::TARGET_VAR,
            Self::DEFAULT_TARGET,
            |value| value > 0.0 && value.is_finite(),
            "must be a positive finite number",
            "Warning: Adjusted target weight changes which combos can form",
        );

        Self { default_target }
    }

    /// The target weight used when a request does not supply one.
    pub fn default_target(&self) -> f64 {
        self.default_target
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

/// Parses a boolean-ish environment value; unknown forms warn and fall back.
pub fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            eprintln!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    eprintln!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        println!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
