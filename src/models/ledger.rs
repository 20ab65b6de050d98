// ============================================================================
// Structures : Balance et Ledger
// ============================================================================
// Le portefeuille de l'utilisateur : un solde par devise
//
// CONCEPTS RUST :
// 1. Vec ordonné : les soldes gardent leur ordre d'apparition
// 2. Builder pattern : with_balance() consomme self et retourne Self
// 3. Valeurs immuables : une conversion produit un NOUVEAU Ledger
// ============================================================================

/// Solde d'une devise
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// Code devise (ex: "EUR")
    pub currency: String,

    /// Montant, toujours >= 0
    pub amount: f64,
}

impl Balance {
    pub fn new(currency: impl Into<String>, amount: f64) -> Self {
        Self {
            currency: currency.into(),
            amount,
        }
    }

    /// Formatte le solde pour l'affichage dans la liste
    ///
    /// Format : "EUR      1000.00"
    /// Seul l'affichage arrondit, le montant stocké reste exact
    pub fn display(&self) -> String {
        format!("{:<6} {:>14.2}", self.currency, self.amount)
    }
}

/// Ensemble ordonné des soldes, au plus un par devise
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ledger {
    balances: Vec<Balance>,
}

impl Ledger {
    /// Crée un ledger avec un seul solde de départ
    pub fn seeded(currency: impl Into<String>, amount: f64) -> Self {
        Self {
            balances: vec![Balance::new(currency, amount.max(0.0))],
        }
    }

    /// Retourne un ledger avec le solde de `currency` fixé à `amount`
    ///
    /// Remplace le solde existant ou l'ajoute en fin de liste
    pub fn with_balance(mut self, currency: impl Into<String>, amount: f64) -> Self {
        let currency = currency.into();
        let amount = amount.max(0.0);

        match self.balances.iter_mut().find(|b| b.currency == currency) {
            Some(balance) => balance.amount = amount,
            None => self.balances.push(Balance::new(currency, amount)),
        }
        self
    }

    /// Construit un ledger depuis des soldes déjà dédoublonnés (moteur de conversion)
    pub(crate) fn from_balances(balances: Vec<Balance>) -> Self {
        Self { balances }
    }

    pub fn get(&self, currency: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.currency == currency)
    }

    /// Montant détenu dans une devise (0 si absente)
    pub fn amount_of(&self, currency: &str) -> f64 {
        self.get(currency).map(|b| b.amount).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Balance> {
        self.balances.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
