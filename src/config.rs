use std::collections::HashMap;

use crate::dispatcher::DispatcherConfig;

const PROVIDER_SECRET_PREFIX: &str = "RELAY_PROVIDER_SECRET_";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Bearer token for `/api/webhooks`; the admin API is open when unset.
    pub admin_api_token: Option<String>,
    /// Inbound shared secrets keyed by lower-cased provider name.
    pub provider_secrets: HashMap<String, String>,
    pub dispatcher: DispatcherConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut config = Self::default();

        for (key, value) in vars {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "DATABASE_URL" => config.database_url = value,
                "RELAY_BIND_ADDR" => config.bind_addr = value,
                "RELAY_ADMIN_API_TOKEN" => config.admin_api_token = Some(value),
                _ => {
                    if let Some(provider) = key.strip_prefix(PROVIDER_SECRET_PREFIX)
                        && !provider.is_empty()
                    {
                        config
                            .provider_secrets
                            .insert(provider.to_ascii_lowercase(), value);
                    }
                }
            }
        }

        config.dispatcher = DispatcherConfig::from_env();
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:relay.db?mode=rwc".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            admin_api_token: None,
            provider_secrets: HashMap::new(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}
