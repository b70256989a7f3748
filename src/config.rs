// Service configuration
// Loaded from the environment (after dotenv) once at start-up

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::orchestrator::CallPolicy;
use crate::rentals::ChargeRates;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration of the rental core
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub db_max_connections: u32,
    /// Base URL of the vehicle collaborator
    pub vehicle_service_url: String,
    /// Fraction applied to the (discounted) subtotal, 0.18 = 18%
    pub tax_rate: Decimal,
    pub charge_rates: ChargeRates,
    pub call_policy: CallPolicy,
    /// Refuse rental completion while the contract is unsigned
    pub contract_signature_required: bool,
    /// Periodic saga reconciliation, disabled when unset
    pub reconcile_interval: Option<Duration>,
}

impl AppConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let defaults = ChargeRates::default();
        let default_policy = CallPolicy::default();

        let reconcile_secs: Option<u64> = parse_optional(&lookup, "RECONCILE_INTERVAL_SECS")?;

        let tax_rate: Decimal = parse_or(&lookup, "TAX_RATE", Decimal::new(18, 2))?;
        if tax_rate.is_sign_negative() {
            return Err(ConfigError::Invalid {
                key: "TAX_RATE",
                value: tax_rate.to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            vehicle_service_url: lookup("VEHICLE_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:8082".to_string()),
            tax_rate,
            charge_rates: ChargeRates {
                included_km_per_day: parse_or(
                    &lookup,
                    "INCLUDED_KM_PER_DAY",
                    defaults.included_km_per_day,
                )?,
                extra_km_rate: parse_or(&lookup, "EXTRA_KM_RATE", defaults.extra_km_rate)?,
                fuel_tier_surcharge: parse_or(
                    &lookup,
                    "FUEL_TIER_SURCHARGE",
                    defaults.fuel_tier_surcharge,
                )?,
                late_fee_multiplier: parse_or(
                    &lookup,
                    "LATE_FEE_MULTIPLIER",
                    defaults.late_fee_multiplier,
                )?,
            },
            call_policy: CallPolicy {
                timeout: Duration::from_millis(parse_or(
                    &lookup,
                    "REMOTE_CALL_TIMEOUT_MS",
                    default_policy.timeout.as_millis() as u64,
                )?),
                retry_backoff: Duration::from_millis(parse_or(
                    &lookup,
                    "REMOTE_RETRY_BACKOFF_MS",
                    default_policy.retry_backoff.as_millis() as u64,
                )?),
            },
            contract_signature_required: parse_or(&lookup, "CONTRACT_SIGNATURE_REQUIRED", false)?,
            reconcile_interval: reconcile_secs.filter(|s| *s > 0).map(Duration::from_secs),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
