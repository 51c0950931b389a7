use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimate::pricing::EstimateRates;
use crate::export::ExportSettings;

pub const CONFIG_FILE_NAME: &str = "claimscope.toml";
pub const ENV_PREFIX: &str = "CLAIMSCOPE_";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub region_id: String,
    pub tax_rate: Decimal,
    pub overhead_pct: Decimal,
    pub profit_pct: Decimal,
}

/// Interchange export heuristics. The ratios approximate a labor/material
/// split and actual cash value; nothing in the estimate computes them.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub labor_ratio: Decimal,
    pub labor_ratio_floor: Decimal,
    pub labor_ratio_ceiling: Decimal,
    pub acv_ratio: Decimal,
    pub tax_rate: Decimal,
    pub labor_rate_per_hour: Decimal,
    pub carrier_id: String,
    pub carrier_name: String,
    pub price_list: String,
    pub adjuster_name: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub region_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let export = ExportSettings::default();
        let rates = EstimateRates::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://claimscope.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            pricing: PricingConfig {
                region_id: export.region_id.clone(),
                tax_rate: rates.tax_rate,
                overhead_pct: rates.overhead_pct,
                profit_pct: rates.profit_pct,
            },
            export: ExportConfig {
                labor_ratio: export.labor_ratio,
                labor_ratio_floor: export.labor_ratio_floor,
                labor_ratio_ceiling: export.labor_ratio_ceiling,
                acv_ratio: export.acv_ratio,
                tax_rate: export.tax_rate,
                labor_rate_per_hour: export.labor_rate_per_hour,
                carrier_id: export.carrier_id,
                carrier_name: export.carrier_name,
                price_list: export.price_list,
                adjuster_name: export.adjuster_name,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn estimate_rates(&self) -> EstimateRates {
        EstimateRates {
            tax_rate: self.pricing.tax_rate,
            overhead_pct: self.pricing.overhead_pct,
            profit_pct: self.pricing.profit_pct,
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            region_id: self.pricing.region_id.clone(),
            labor_ratio: self.export.labor_ratio,
            labor_ratio_floor: self.export.labor_ratio_floor,
            labor_ratio_ceiling: self.export.labor_ratio_ceiling,
            acv_ratio: self.export.acv_ratio,
            tax_rate: self.export.tax_rate,
            labor_rate_per_hour: self.export.labor_rate_per_hour,
            carrier_id: self.export.carrier_id.clone(),
            carrier_name: self.export.carrier_name.clone(),
            price_list: self.export.price_list.clone(),
            adjuster_name: self.export.adjuster_name.clone(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(region_id) = pricing.region_id {
                self.pricing.region_id = region_id;
            }
            if let Some(tax_rate) = pricing.tax_rate {
                self.pricing.tax_rate = tax_rate;
            }
            if let Some(overhead_pct) = pricing.overhead_pct {
                self.pricing.overhead_pct = overhead_pct;
            }
            if let Some(profit_pct) = pricing.profit_pct {
                self.pricing.profit_pct = profit_pct;
            }
        }

        if let Some(export) = patch.export {
            if let Some(labor_ratio) = export.labor_ratio {
                self.export.labor_ratio = labor_ratio;
            }
            if let Some(floor) = export.labor_ratio_floor {
                self.export.labor_ratio_floor = floor;
            }
            if let Some(ceiling) = export.labor_ratio_ceiling {
                self.export.labor_ratio_ceiling = ceiling;
            }
            if let Some(acv_ratio) = export.acv_ratio {
                self.export.acv_ratio = acv_ratio;
            }
            if let Some(tax_rate) = export.tax_rate {
                self.export.tax_rate = tax_rate;
            }
            if let Some(labor_rate_per_hour) = export.labor_rate_per_hour {
                self.export.labor_rate_per_hour = labor_rate_per_hour;
            }
            if let Some(carrier_id) = export.carrier_id {
                self.export.carrier_id = carrier_id;
            }
            if let Some(carrier_name) = export.carrier_name {
                self.export.carrier_name = carrier_name;
            }
            if let Some(price_list) = export.price_list {
                self.export.price_list = price_list;
            }
            if let Some(adjuster_name) = export.adjuster_name {
                self.export.adjuster_name = adjuster_name;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CLAIMSCOPE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CLAIMSCOPE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CLAIMSCOPE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CLAIMSCOPE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CLAIMSCOPE_PRICING_REGION_ID") {
            self.pricing.region_id = value;
        }
        if let Some(value) = read_env("CLAIMSCOPE_PRICING_TAX_RATE") {
            self.pricing.tax_rate = parse_decimal("CLAIMSCOPE_PRICING_TAX_RATE", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_PRICING_OVERHEAD_PCT") {
            self.pricing.overhead_pct = parse_decimal("CLAIMSCOPE_PRICING_OVERHEAD_PCT", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_PRICING_PROFIT_PCT") {
            self.pricing.profit_pct = parse_decimal("CLAIMSCOPE_PRICING_PROFIT_PCT", &value)?;
        }

        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_LABOR_RATIO") {
            self.export.labor_ratio = parse_decimal("CLAIMSCOPE_EXPORT_LABOR_RATIO", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_ACV_RATIO") {
            self.export.acv_ratio = parse_decimal("CLAIMSCOPE_EXPORT_ACV_RATIO", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_TAX_RATE") {
            self.export.tax_rate = parse_decimal("CLAIMSCOPE_EXPORT_TAX_RATE", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_LABOR_RATE_PER_HOUR") {
            self.export.labor_rate_per_hour =
                parse_decimal("CLAIMSCOPE_EXPORT_LABOR_RATE_PER_HOUR", &value)?;
        }
        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_CARRIER_ID") {
            self.export.carrier_id = value;
        }
        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_CARRIER_NAME") {
            self.export.carrier_name = value;
        }
        if let Some(value) = read_env("CLAIMSCOPE_EXPORT_ADJUSTER_NAME") {
            self.export.adjuster_name = value;
        }

        let log_level =
            read_env("CLAIMSCOPE_LOGGING_LEVEL").or_else(|| read_env("CLAIMSCOPE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CLAIMSCOPE_LOGGING_FORMAT").or_else(|| read_env("CLAIMSCOPE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(region_id) = overrides.region_id {
            self.pricing.region_id = region_id;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_pricing(&self.pricing)?;
        validate_export(&self.export)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), Path::new("config").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.region_id.trim().is_empty() {
        return Err(ConfigError::Validation("pricing.region_id must not be empty".to_string()));
    }

    validate_ratio("pricing.tax_rate", pricing.tax_rate)?;
    validate_ratio("pricing.overhead_pct", pricing.overhead_pct)?;
    validate_ratio("pricing.profit_pct", pricing.profit_pct)?;
    Ok(())
}

fn validate_export(export: &ExportConfig) -> Result<(), ConfigError> {
    validate_ratio("export.labor_ratio", export.labor_ratio)?;
    validate_ratio("export.labor_ratio_floor", export.labor_ratio_floor)?;
    validate_ratio("export.labor_ratio_ceiling", export.labor_ratio_ceiling)?;
    validate_ratio("export.acv_ratio", export.acv_ratio)?;
    validate_ratio("export.tax_rate", export.tax_rate)?;

    if export.labor_ratio_floor > export.labor_ratio_ceiling {
        return Err(ConfigError::Validation(format!(
            "export.labor_ratio_floor ({}) must not exceed export.labor_ratio_ceiling ({})",
            export.labor_ratio_floor, export.labor_ratio_ceiling
        )));
    }

    if export.labor_rate_per_hour <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "export.labor_rate_per_hour must be greater than zero".to_string(),
        ));
    }

    if export.carrier_id.trim().is_empty() {
        return Err(ConfigError::Validation("export.carrier_id must not be empty".to_string()));
    }

    Ok(())
}

fn validate_ratio(key: &str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ConfigError::Validation(format!(
            "{key} must be a fraction in 0..=1 (got {value}); use 0.08 for 8%"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    pricing: Option<PricingPatch>,
    export: Option<ExportPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    region_id: Option<String>,
    tax_rate: Option<Decimal>,
    overhead_pct: Option<Decimal>,
    profit_pct: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportPatch {
    labor_ratio: Option<Decimal>,
    labor_ratio_floor: Option<Decimal>,
    labor_ratio_ceiling: Option<Decimal>,
    acv_ratio: Option<Decimal>,
    tax_rate: Option<Decimal>,
    labor_rate_per_hour: Option<Decimal>,
    carrier_id: Option<String>,
    carrier_name: Option<String>,
    price_list: Option<String>,
    adjuster_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
