// ============================================================================
// Configuration
// ============================================================================
// Chargée depuis les variables d'environnement (et un éventuel .env)
// Chaque valeur a un défaut : l'application démarre sans aucune config
// ============================================================================

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::feed::FeedConfig;

/// Endpoint public de la table des taux (base EUR)
pub const DEFAULT_API_URL: &str = "https://developers.paysera.com/tasks/api/currency-exchange-rates";

/// Devise de base de la table des taux
pub const DEFAULT_BASE_CURRENCY: &str = "EUR";

/// Devise d'achat sélectionnée au démarrage (distincte de la base)
pub const DEFAULT_BUY_CURRENCY: &str = "USD";

/// Solde de départ dans la devise de base
pub const DEFAULT_SEED_AMOUNT: f64 = 1000.0;

/// Intervalle entre deux pollings
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Durée max d'un appel à la source
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration de l'application
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub base_currency: String,
    pub default_buy_currency: String,
    pub seed_amount: f64,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub log_dir: PathBuf,
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement
    ///
    /// | Variable                          | Défaut            |
    /// |-----------------------------------|-------------------|
    /// | LAZYEXCHANGE_API_URL              | endpoint paysera  |
    /// | LAZYEXCHANGE_BASE_CURRENCY        | EUR               |
    /// | LAZYEXCHANGE_DEFAULT_BUY          | USD               |
    /// | LAZYEXCHANGE_SEED_AMOUNT          | 1000              |
    /// | LAZYEXCHANGE_POLL_SECS            | 5                 |
    /// | LAZYEXCHANGE_FETCH_TIMEOUT_SECS   | 10                |
    /// | LAZYEXCHANGE_LOG_DIR              | data dir / logs   |
    pub fn from_env() -> Result<Self> {
        let base_currency = env::var("LAZYEXCHANGE_BASE_CURRENCY")
            .map(|v| v.trim().to_uppercase())
            .unwrap_or_else(|_| DEFAULT_BASE_CURRENCY.to_string());

        let default_buy_currency = env::var("LAZYEXCHANGE_DEFAULT_BUY")
            .map(|v| v.trim().to_uppercase())
            .unwrap_or_else(|_| DEFAULT_BUY_CURRENCY.to_string());

        if base_currency.is_empty() || default_buy_currency.is_empty() {
            anyhow::bail!("Les codes devise ne peuvent pas être vides");
        }
        if base_currency == default_buy_currency {
            anyhow::bail!(
                "LAZYEXCHANGE_DEFAULT_BUY doit être différente de la devise de base ({})",
                base_currency
            );
        }

        let seed_amount: f64 = parse_var("LAZYEXCHANGE_SEED_AMOUNT", DEFAULT_SEED_AMOUNT)?;
        if !seed_amount.is_finite() || seed_amount < 0.0 {
            anyhow::bail!("LAZYEXCHANGE_SEED_AMOUNT doit être un nombre positif");
        }

        let poll_secs: u64 = parse_var("LAZYEXCHANGE_POLL_SECS", DEFAULT_POLL_INTERVAL.as_secs())?;
        if poll_secs == 0 {
            anyhow::bail!("LAZYEXCHANGE_POLL_SECS doit être supérieur à 0");
        }

        let timeout_secs: u64 = parse_var(
            "LAZYEXCHANGE_FETCH_TIMEOUT_SECS",
            DEFAULT_FETCH_TIMEOUT.as_secs(),
        )?;

        let log_dir = env::var("LAZYEXCHANGE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_log_dir());

        Ok(Self {
            api_url: env::var("LAZYEXCHANGE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            base_currency,
            default_buy_currency,
            seed_amount,
            poll_interval: Duration::from_secs(poll_secs),
            fetch_timeout: Duration::from_secs(timeout_secs.max(1)),
            log_dir,
        })
    }

    /// Paramètres de la boucle de polling
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            poll_interval: self.poll_interval,
            fetch_timeout: self.fetch_timeout,
            ..FeedConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            default_buy_currency: DEFAULT_BUY_CURRENCY.to_string(),
            seed_amount: DEFAULT_SEED_AMOUNT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            log_dir: default_log_dir(),
        }
    }
}

/// Lit une variable optionnelle et la parse, avec le nom de la variable en contexte
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Valeur invalide pour {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Répertoire des logs par défaut
///
/// - Linux/WSL : ~/.local/share/lazyexchange/logs
/// - macOS : ~/Library/Application Support/lazyexchange/logs
/// - Windows : C:\Users\<user>\AppData\Local\lazyexchange\logs
/// - Sinon : ./logs
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("lazyexchange").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

// ============================================================================
// Tests
// ============================================================================
