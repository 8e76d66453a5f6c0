use anyhow::{anyhow, bail, Context, Result};
use config::{Config, Environment, File};
use loyalty_types::{AccountId, CurrencyId};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "LOYALTY";
const DEFAULT_DISTRIBUTION_CURRENCY: &str = "MANA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    /// Account that signs operator commands; falls back to the owner.
    pub operator: Option<AccountId>,
    /// Owner recorded by `init`.
    pub owner: Option<AccountId>,
    pub distribution_currency: CurrencyId,
    pub log_level: String,
    pub log_format: String,
}

impl NodeConfig {
    /// Optional config file first, then `LOYALTY_*` environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

        Self::from_config(&builder.build()?)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let data_dir = get_string_value(config, "data_dir")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let owner = get_string_value(config, "owner")
            .map(|raw| parse_account(&raw).map_err(|err| anyhow!("owner: {err}")))
            .transpose()?;
        let operator = get_string_value(config, "operator")
            .map(|raw| parse_account(&raw).map_err(|err| anyhow!("operator: {err}")))
            .transpose()?;

        let currency = get_string_value(config, "distribution_currency")
            .unwrap_or_else(|| DEFAULT_DISTRIBUTION_CURRENCY.to_string());
        let distribution_currency =
            CurrencyId::new(&currency).context("invalid distribution_currency")?;

        Ok(Self {
            data_dir,
            operator,
            owner,
            distribution_currency,
            log_level: get_string_value(config, "log_level").unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(config, "log_format")
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            bail!("data_dir must not be empty");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!(
                "log_format must be \"pretty\" or \"json\", got {:?}",
                self.log_format
            );
        }
        Ok(())
    }

    /// Identity used for role-gated commands.
    pub fn acting_account(&self) -> Result<AccountId> {
        self.operator.or(self.owner).ok_or_else(|| {
            anyhow!("no operator configured; set operator or owner (LOYALTY_OPERATOR / LOYALTY_OWNER)")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("loyalty-ledger"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn get_string_value(config: &Config, key: &str) -> Option<String> {
    config
        .get_string(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Accounts are written either in full (`a` + 64 hex) or as `@label`, which
/// derives a deterministic account from the label.
pub fn parse_account(raw: &str) -> Result<AccountId, String> {
    match raw.strip_prefix('@') {
        Some(label) if !label.is_empty() => Ok(AccountId::from_label(label)),
        Some(_) => Err("empty account label".to_string()),
        None => raw.parse::<AccountId>().map_err(|err| err.to_string()),
    }
}
