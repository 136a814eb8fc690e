use dotenv::dotenv;
use std::env;
use std::fmt;

use crate::rabbitmq::{ConnectionConfig, RabbitMQError, Result};

/// Deployment stage, read from the unprefixed `ENV` variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Dev,
    Uat,
    Prod,
}

impl Environment {
    /// Unknown or empty values fall back to `Local`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEV" => Environment::Dev,
            "UAT" => Environment::Uat,
            "PROD" => Environment::Prod,
            _ => Environment::Local,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Local => "LOCAL",
            Environment::Dev => "DEV",
            Environment::Uat => "UAT",
            Environment::Prod => "PROD",
        })
    }
}

/// Variable-name prefix for a raw `ENV` value: `"dev"` -> `"dev_"`, `""` -> `""`.
pub fn prefix(env_value: &str) -> String {
    if env_value.is_empty() {
        String::new()
    } else {
        format!("{}_", env_value)
    }
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_account_ids() -> Vec<String> {
    vec![
        "00120010010106019".to_string(),
        "70120010010106020".to_string(),
    ]
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub log_level: String,

    pub rabbitmq_url: String,
    pub rabbitmq_user: String,
    pub rabbitmq_password: String,

    pub tls_enabled: bool,
    pub tls_skip_verify: bool,
    pub tls_ca_cert: String,
    pub tls_cert: String,
    pub tls_key: String,

    pub deposit_exchange_name: String,
    pub withdraw_exchange_name: String,

    pub laos_deposit_topic: String,
    pub laos_withdrawal_topic: String,

    /// Accounts the producer binary publishes samples for.
    pub producer_account_ids: Vec<String>,
}

impl Config {
    /// Read the process environment, loading `.env` first when present.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        let env_value = env::var("ENV").unwrap_or_default();
        Self::from_lookup(&env_value, |key| env::var(key).ok())
    }

    /// Build a config from any key lookup. `env_value` is the raw `ENV` value
    /// and selects both the prefix and the deployment stage.
    pub fn from_lookup<F>(env_value: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reader = Reader {
            prefix: prefix(env_value),
            lookup,
            missing: std::cell::RefCell::new(Vec::new()),
        };

        let config = Config {
            environment: Environment::parse(env_value),
            log_level: reader.optional("LOG_LEVEL").unwrap_or_else(default_log_level),

            rabbitmq_url: reader.required("RABBITMQ_URL"),
            rabbitmq_user: reader.required("RABBITMQ_USER"),
            rabbitmq_password: reader.required("RABBITMQ_PASSWORD"),

            tls_enabled: reader.flag("RABBITMQ_TLS_ENABLED")?,
            tls_skip_verify: reader.flag("RABBITMQ_TLS_SKIP_VERIFY")?,
            tls_ca_cert: reader.optional("RABBITMQ_TLS_CA_CERT").unwrap_or_default(),
            tls_cert: reader.optional("RABBITMQ_TLS_CERT").unwrap_or_default(),
            tls_key: reader.optional("RABBITMQ_TLS_KEY").unwrap_or_default(),

            deposit_exchange_name: reader.required("RABBITMQ_DEPOSIT_EXCHANGE_NAME"),
            withdraw_exchange_name: reader.required("RABBITMQ_WITHDRAW_EXCHANGE_NAME"),

            laos_deposit_topic: reader.required("RABBITMQ_LAOS_DEPOSIT_TOPIC"),
            laos_withdrawal_topic: reader.required("RABBITMQ_LAOS_WITHDRAWAL_TOPIC"),

            producer_account_ids: reader
                .optional("PRODUCER_ACCOUNT_IDS")
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_else(default_account_ids),
        };

        let missing = reader.missing.into_inner();
        if !missing.is_empty() {
            return Err(RabbitMQError::Configuration(format!(
                "required environment variables not set: {}",
                missing.join(", ")
            )));
        }

        if config.tls_skip_verify && config.environment == Environment::Prod {
            return Err(RabbitMQError::Configuration(
                "RABBITMQ_TLS_SKIP_VERIFY is not allowed in PROD".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            user: self.rabbitmq_user.clone(),
            password: self.rabbitmq_password.clone(),
            host: self.rabbitmq_url.clone(),
            use_tls: self.tls_enabled,
            tls_ca_cert: non_empty(&self.tls_ca_cert),
            tls_cert: non_empty(&self.tls_cert),
            tls_key: non_empty(&self.tls_key),
            tls_skip_verify: self.tls_skip_verify,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

struct Reader<F> {
    prefix: String,
    lookup: F,
    missing: std::cell::RefCell<Vec<String>>,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(&self.key(name)).filter(|value| !value.is_empty())
    }

    // Missing names are collected so one error can list all of them.
    fn required(&self, name: &str) -> String {
        self.optional(name).unwrap_or_else(|| {
            self.missing.borrow_mut().push(self.key(name));
            String::new()
        })
    }

    fn flag(&self, name: &str) -> Result<bool> {
        match self.optional(name) {
            None => Ok(false),
            Some(value) => parse_bool(&value).ok_or_else(|| {
                RabbitMQError::Configuration(format!(
                    "{} must be a boolean, got {:?}",
                    self.key(name),
                    value
                ))
            }),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
