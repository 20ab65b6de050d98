// ============================================================================
// Structure : RateSnapshot
// ============================================================================
// Une table de taux complète, telle que renvoyée par un polling réussi
//
// CONCEPTS RUST :
// 1. BTreeMap : map triée par clé (les devises sortent déjà dans l'ordre)
// 2. Constructeur validant : impossible de construire un snapshot invalide
// 3. Immutabilité : pas de setters, un snapshot est remplacé en entier
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

/// Erreurs de construction d'un snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    /// Un taux nul, négatif, NaN ou infini
    #[error("invalid rate for {currency}: {rate}")]
    InvalidRate { currency: String, rate: f64 },

    /// La même devise apparaît deux fois
    #[error("duplicate currency in rate table: {0}")]
    DuplicateCurrency(String),

    /// Code devise vide
    #[error("empty currency code in rate table")]
    EmptyCurrency,
}

/// Table de taux relative à une devise de base
///
/// Chaque taux exprime combien d'unités de la devise valent 1 unité de la base
/// (ex: base EUR, USD = 1.0896 → 1 EUR = 1.0896 USD).
///
/// CONCEPT RUST : Champs privés + accesseurs
/// - L'invariant (taux finis et > 0) est vérifié une seule fois dans new()
/// - Le reste du code peut ensuite faire confiance aux valeurs
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    base: String,
    date: Option<String>,
    rates: BTreeMap<String, f64>,
}

impl RateSnapshot {
    /// Crée un snapshot en validant chaque taux
    pub fn new<I, S>(base: impl Into<String>, rates: I) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut table = BTreeMap::new();

        for (currency, rate) in rates {
            let currency = currency.into();
            if currency.is_empty() {
                return Err(SnapshotError::EmptyCurrency);
            }
            // CONCEPT : is_finite() écarte NaN et ±inf en un seul test
            if !rate.is_finite() || rate <= 0.0 {
                return Err(SnapshotError::InvalidRate { currency, rate });
            }
            if table.contains_key(&currency) {
                return Err(SnapshotError::DuplicateCurrency(currency));
            }
            table.insert(currency, rate);
        }

        Ok(Self {
            base: base.into(),
            date: None,
            rates: table,
        })
    }

    /// Attache la date de publication annoncée par la source
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Devise de base (ex: "EUR")
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Taux d'une devise relative à la base, None si absente
    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Devises présentes dans la table, triées
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
