// ============================================================================
// ExchangeController : machine à états de l'échange
// ============================================================================
// Tient l'état affiché (soldes, devises, saisie, aperçu, erreurs) et le dernier
// snapshot de taux reçu. Chaque intention produit un NOUVEL état complet.
//
// CONCEPTS RUST :
// 1. Reducer pur : transition(&état, taux, &intention) -> nouvel état
// 2. Enum avec données : chaque Intent porte exactement ce dont il a besoin
// 3. PartialEq sur l'état : les tests comparent des états entiers
//
// PATTERN : Immutable value + reducer
// - Aucun champ n'est modifié "en place" depuis l'extérieur
// - Le contrôleur remplace self.state en une seule affectation
// ============================================================================

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::{self, ConversionError};
use crate::models::{Ledger, RateSnapshot};

/// Message affiché quand le flux de taux s'interrompt définitivement
pub const FEED_FAILED_MESSAGE: &str = "failed to load exchange rates";

/// Raisons d'un refus de conversion, dans l'ordre où elles sont vérifiées
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("invalid amount")]
    InvalidAmount,

    #[error("same currency")]
    SameCurrency,

    #[error("rate not available")]
    RateNotAvailable,

    #[error("insufficient balance")]
    InsufficientBalance,
}

impl From<ConversionError> for ConvertError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::InsufficientBalance { .. } => ConvertError::InsufficientBalance,
        }
    }
}

/// Intentions acceptées par le contrôleur
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// La présentation vient de s'abonner au flux de taux
    FeedAttached,

    /// Nouveau snapshot publié par le flux
    RatesReceived(RateSnapshot),

    /// Le flux s'est arrêté (distinct d'un polling raté, absorbé par le flux)
    FeedFailed,

    SellCurrencyChanged(String),
    BuyCurrencyChanged(String),

    /// Texte brut du champ montant
    AmountChanged(String),

    Swap,
    Convert,
}

/// État complet présenté à l'interface
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeState {
    pub ledger: Ledger,

    /// Devise de base puis devises du dernier snapshot, triées
    pub supported_currencies: Vec<String>,

    pub sell_currency: String,
    pub buy_currency: String,

    /// Saisie brute, "" = pas encore de montant
    pub amount_input: String,

    /// Ex: "100.00 EUR = 108.96 USD" ou "1 EUR = 1.0896 USD"
    pub preview: Option<String>,

    pub loading: bool,
    pub error: Option<String>,
}

impl ExchangeState {
    /// État de départ : un seul solde dans la devise de base
    pub fn initial(base_currency: &str, default_buy: &str, seed_amount: f64) -> Self {
        Self {
            ledger: Ledger::seeded(base_currency, seed_amount),
            supported_currencies: vec![base_currency.to_string()],
            sell_currency: base_currency.to_string(),
            buy_currency: default_buy.to_string(),
            amount_input: String::new(),
            preview: None,
            loading: false,
            error: None,
        }
    }

    /// Montant saisi, s'il est numérique
    pub fn amount(&self) -> Option<f64> {
        parse_amount(&self.amount_input)
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Calcule l'état suivant
///
/// `rates` est le snapshot en cache AVANT l'intention ; pour RatesReceived,
/// c'est le snapshot porté par l'intention qui fait foi.
pub fn transition(state: &ExchangeState, rates: Option<&RateSnapshot>, intent: &Intent) -> ExchangeState {
    match intent {
        Intent::FeedAttached => ExchangeState {
            loading: true,
            error: None,
            ..state.clone()
        },

        Intent::RatesReceived(snapshot) => {
            let base = snapshot.base().to_string();
            let mut supported = vec![base.clone()];
            supported.extend(snapshot.currencies().filter(|&c| c != base).map(String::from));

            with_preview(
                ExchangeState {
                    supported_currencies: supported,
                    loading: false,
                    ..state.clone()
                },
                Some(snapshot),
            )
        }

        Intent::FeedFailed => ExchangeState {
            loading: false,
            error: Some(FEED_FAILED_MESSAGE.to_string()),
            ..state.clone()
        },

        Intent::SellCurrencyChanged(code) => with_preview(
            ExchangeState {
                sell_currency: normalize_code(code),
                error: None,
                ..state.clone()
            },
            rates,
        ),

        Intent::BuyCurrencyChanged(code) => with_preview(
            ExchangeState {
                buy_currency: normalize_code(code),
                error: None,
                ..state.clone()
            },
            rates,
        ),

        Intent::AmountChanged(text) => {
            // Rejet à la frontière : l'état reste strictement identique
            if !is_well_formed_amount(text) {
                return state.clone();
            }
            with_preview(
                ExchangeState {
                    amount_input: text.clone(),
                    error: None,
                    ..state.clone()
                },
                rates,
            )
        }

        Intent::Swap => with_preview(
            ExchangeState {
                sell_currency: state.buy_currency.clone(),
                buy_currency: state.sell_currency.clone(),
                ..state.clone()
            },
            rates,
        ),

        Intent::Convert => match convert(state, rates) {
            Ok(ledger) => with_preview(
                ExchangeState {
                    ledger,
                    amount_input: String::new(),
                    error: None,
                    ..state.clone()
                },
                rates,
            ),
            Err(e) => ExchangeState {
                error: Some(e.to_string()),
                ..state.clone()
            },
        },
    }
}

/// Valide puis applique la conversion demandée par l'état courant
///
/// Ordre des vérifications : montant, devises, taux, solde.
pub fn convert(state: &ExchangeState, rates: Option<&RateSnapshot>) -> Result<Ledger, ConvertError> {
    let amount = state
        .amount()
        .filter(|&amount| amount > 0.0)
        .ok_or(ConvertError::InvalidAmount)?;

    let from = state.sell_currency.as_str();
    let to = state.buy_currency.as_str();

    if from == to {
        return Err(ConvertError::SameCurrency);
    }

    let rate = rates
        .and_then(|snapshot| engine::cross_rate(snapshot, from, to))
        .ok_or(ConvertError::RateNotAvailable)?;

    // Dernière vérification (solde) faite par le moteur
    engine::apply(&state.ledger, from, to, amount, rate).map_err(ConvertError::from)
}

/// Texte de l'aperçu pour l'état et les taux donnés
///
/// - taux + montant > 0 : "100.00 EUR = 108.96 USD"
/// - taux sans montant  : "1 EUR = 1.0896 USD"
/// - pas de taux        : None
pub fn preview(state: &ExchangeState, rates: Option<&RateSnapshot>) -> Option<String> {
    let from = state.sell_currency.as_str();
    let to = state.buy_currency.as_str();
    let rate = rates.and_then(|snapshot| engine::cross_rate(snapshot, from, to))?;

    match state.amount().filter(|&amount| amount > 0.0) {
        Some(amount) => Some(format!("{:.2} {} = {:.2} {}", amount, from, amount * rate, to)),
        None => Some(format!("1 {} = {:.4} {}", from, rate, to)),
    }
}

fn with_preview(state: ExchangeState, rates: Option<&RateSnapshot>) -> ExchangeState {
    ExchangeState {
        preview: preview(&state, rates),
        ..state
    }
}

/// Vrai pour "", "12", "12.5", ".5", "12." ; faux pour "abc", "-1", "1e3", "1.2.3"
///
/// Un point seul est accepté : c'est une saisie en cours, pas encore un montant.
pub fn is_well_formed_amount(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit() || c == '.') && text.matches('.').count() <= 1
}

fn parse_amount(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

// ============================================================================
// Contrôleur
// ============================================================================

/// Propriétaire unique de l'état et du snapshot en cache
///
/// CONCEPT RUST : &mut self sans Mutex
/// - Le contrôleur vit dans la boucle d'événements (un seul thread)
/// - Les transitions sont donc sérialisées par construction
#[derive(Debug, Clone)]
pub struct ExchangeController {
    state: ExchangeState,
    rates: Option<RateSnapshot>,
}

impl ExchangeController {
    pub fn new(base_currency: &str, default_buy: &str, seed_amount: f64) -> Self {
        Self {
            state: ExchangeState::initial(base_currency, default_buy, seed_amount),
            rates: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.base_currency, &config.default_buy_currency, config.seed_amount)
    }

    /// État courant (lecture seule)
    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    /// Dernier snapshot reçu
    pub fn rates(&self) -> Option<&RateSnapshot> {
        self.rates.as_ref()
    }

    /// Applique une intention : l'état est remplacé en entier
    pub fn dispatch(&mut self, intent: Intent) {
        let next = transition(&self.state, self.rates.as_ref(), &intent);

        match intent {
            Intent::RatesReceived(snapshot) => {
                debug!(currencies = snapshot.len(), date = ?snapshot.date(), "Exchange rates updated");
                // Le snapshot remplace l'ancien d'un bloc, jamais fusionné
                self.rates = Some(snapshot);
            }
            Intent::AmountChanged(text) if !is_well_formed_amount(&text) => {
                debug!(input = %text, "Rejected malformed amount input");
            }
            Intent::Convert => match &next.error {
                Some(error) => info!(error = %error, "Conversion rejected"),
                None => info!(
                    from = %self.state.sell_currency,
                    to = %self.state.buy_currency,
                    amount = %self.state.amount_input,
                    "Conversion successful"
                ),
            },
            Intent::FeedFailed => info!("Exchange rate feed stopped"),
            _ => {}
        }

        self.state = next;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> RateSnapshot {
        RateSnapshot::new(
            "EUR",
            [("USD", 1.0896), ("GBP", 0.8572), ("JPY", 159.52), ("AUD", 1.6234)],
        )
        .unwrap()
    }

    fn controller() -> ExchangeController {
        let mut controller = ExchangeController::new("EUR", "USD", 1000.0);
        controller.dispatch(Intent::RatesReceived(rates()));
        controller
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_initial_state() {
        let controller = ExchangeController::new("EUR", "USD", 1000.0);
        let state = controller.state();

        assert_eq!(state.ledger, Ledger::seeded("EUR", 1000.0));
        assert_eq!(state.supported_currencies, vec!["EUR"]);
        assert_eq!(state.sell_currency, "EUR");
        assert_eq!(state.buy_currency, "USD");
        assert_eq!(state.amount_input, "");
        assert_eq!(state.preview, None);
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert!(controller.rates().is_none());
    }

    #[test]
    fn test_rates_received_updates_supported_currencies() {
        let mut controller = ExchangeController::new("EUR", "USD", 1000.0);
        controller.dispatch(Intent::FeedAttached);
        assert!(controller.state().loading);

        controller.dispatch(Intent::RatesReceived(rates()));
        let state = controller.state();

        assert_eq!(state.supported_currencies, vec!["EUR", "AUD", "GBP", "JPY", "USD"]);
        assert!(!state.loading);
        assert_eq!(state.preview.as_deref(), Some("1 EUR = 1.0896 USD"));
    }

    #[test]
    fn test_base_currency_not_duplicated_in_supported_list() {
        let mut controller = ExchangeController::new("EUR", "USD", 1000.0);
        let snapshot = RateSnapshot::new("EUR", [("EUR", 1.0), ("USD", 1.0896)]).unwrap();
        controller.dispatch(Intent::RatesReceived(snapshot));

        assert_eq!(controller.state().supported_currencies, vec!["EUR", "USD"]);
    }

    #[test]
    fn test_new_snapshot_replaces_old_one() {
        let mut controller = controller();
        let newer = RateSnapshot::new("EUR", [("USD", 1.1)]).unwrap();
        controller.dispatch(Intent::RatesReceived(newer.clone()));

        assert_eq!(controller.rates(), Some(&newer));
        assert_eq!(controller.state().supported_currencies, vec!["EUR", "USD"]);
    }

    #[test]
    fn test_currency_changes_update_preview() {
        let mut controller = controller();

        controller.dispatch(Intent::SellCurrencyChanged("USD".to_string()));
        controller.dispatch(Intent::BuyCurrencyChanged("gbp".to_string()));

        let state = controller.state();
        assert_eq!(state.sell_currency, "USD");
        assert_eq!(state.buy_currency, "GBP");
        assert_eq!(state.preview.as_deref(), Some("1 USD = 0.7867 GBP"));
    }

    #[test]
    fn test_amount_changed_updates_preview() {
        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged("100".to_string()));

        let state = controller.state();
        assert_eq!(state.amount_input, "100");
        assert_eq!(state.preview.as_deref(), Some("100.00 EUR = 108.96 USD"));
    }

    #[test]
    fn test_malformed_amount_is_rejected_at_input() {
        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged("12".to_string()));
        let before = controller.state().clone();

        for text in ["abc", "-5", "1e3", "1.2.3", "12a"] {
            controller.dispatch(Intent::AmountChanged(text.to_string()));
            assert_eq!(controller.state(), &before, "{text:?} should be rejected");
        }
    }

    #[test]
    fn test_partial_amount_input_is_accepted() {
        assert!(is_well_formed_amount(""));
        assert!(is_well_formed_amount("."));
        assert!(is_well_formed_amount(".5"));
        assert!(is_well_formed_amount("12."));

        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged(".".to_string()));
        assert_eq!(controller.state().amount_input, ".");
        // Pas encore de montant : aperçu du taux unitaire
        assert_eq!(controller.state().preview.as_deref(), Some("1 EUR = 1.0896 USD"));
    }

    #[test]
    fn test_swap_currencies() {
        let mut controller = controller();
        controller.dispatch(Intent::Swap);

        let state = controller.state();
        assert_eq!(state.sell_currency, "USD");
        assert_eq!(state.buy_currency, "EUR");
        assert_eq!(state.preview.as_deref(), Some("1 USD = 0.9178 EUR"));
    }

    #[test]
    fn test_successful_conversion() {
        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged("100".to_string()));
        controller.dispatch(Intent::Convert);

        let state = controller.state();
        assert_eq!(state.ledger.amount_of("EUR"), 900.0);
        assert!(approx(state.ledger.amount_of("USD"), 108.96));
        assert_eq!(state.amount_input, "");
        assert_eq!(state.error, None);
        assert_eq!(state.preview.as_deref(), Some("1 EUR = 1.0896 USD"));
    }

    #[test]
    fn test_conversion_with_invalid_amount() {
        for text in ["", "0", ".", "0.00"] {
            let mut controller = controller();
            controller.dispatch(Intent::AmountChanged(text.to_string()));
            let before = controller.state().ledger.clone();
            controller.dispatch(Intent::Convert);

            assert_eq!(controller.state().error.as_deref(), Some("invalid amount"), "{text:?}");
            assert_eq!(controller.state().ledger, before);
        }
    }

    #[test]
    fn test_conversion_to_same_currency() {
        let mut controller = controller();
        controller.dispatch(Intent::BuyCurrencyChanged("EUR".to_string()));
        controller.dispatch(Intent::AmountChanged("5000".to_string()));
        controller.dispatch(Intent::Convert);

        assert_eq!(controller.state().error.as_deref(), Some("same currency"));

        // Même sans aucun taux
        let mut bare = ExchangeController::new("EUR", "USD", 1000.0);
        bare.dispatch(Intent::BuyCurrencyChanged("EUR".to_string()));
        bare.dispatch(Intent::AmountChanged("1".to_string()));
        bare.dispatch(Intent::Convert);
        assert_eq!(bare.state().error.as_deref(), Some("same currency"));
    }

    #[test]
    fn test_conversion_without_rate() {
        let mut controller = ExchangeController::new("EUR", "USD", 1000.0);
        controller.dispatch(Intent::AmountChanged("10".to_string()));
        controller.dispatch(Intent::Convert);
        assert_eq!(controller.state().error.as_deref(), Some("rate not available"));

        let mut controller = self::controller();
        controller.dispatch(Intent::BuyCurrencyChanged("CHF".to_string()));
        controller.dispatch(Intent::AmountChanged("10".to_string()));
        controller.dispatch(Intent::Convert);
        assert_eq!(controller.state().error.as_deref(), Some("rate not available"));
        assert_eq!(controller.state().preview, None);
    }

    #[test]
    fn test_conversion_with_insufficient_balance() {
        let mut controller = controller();
        controller.dispatch(Intent::SellCurrencyChanged("USD".to_string()));
        controller.dispatch(Intent::BuyCurrencyChanged("EUR".to_string()));
        controller.dispatch(Intent::AmountChanged("50".to_string()));
        controller.dispatch(Intent::Convert);

        let state = controller.state();
        assert_eq!(state.error.as_deref(), Some("insufficient balance"));
        assert_eq!(state.ledger, Ledger::seeded("EUR", 1000.0));
        assert_eq!(state.amount_input, "50");
    }

    #[test]
    fn test_convert_rejects_amount_above_existing_balance() {
        let mut state = ExchangeState::initial("EUR", "USD", 1000.0);
        state.amount_input = "1000.01".to_string();

        assert_eq!(convert(&state, Some(&rates())), Err(ConvertError::InsufficientBalance));

        // Le solde entier passe
        state.amount_input = "1000".to_string();
        let ledger = convert(&state, Some(&rates())).unwrap();
        assert_eq!(ledger.amount_of("EUR"), 0.0);
    }

    #[test]
    fn test_engine_rejection_maps_to_insufficient_balance() {
        let err = ConversionError::InsufficientBalance {
            currency: "USD".to_string(),
            available: 0.0,
            requested: 5.0,
        };
        assert_eq!(ConvertError::from(err), ConvertError::InsufficientBalance);
    }

    #[test]
    fn test_validation_order() {
        // Montant invalide ET même devise : le montant est vérifié d'abord
        let mut controller = controller();
        controller.dispatch(Intent::BuyCurrencyChanged("EUR".to_string()));
        controller.dispatch(Intent::Convert);
        assert_eq!(controller.state().error.as_deref(), Some("invalid amount"));

        // Taux absent ET solde insuffisant : le taux est vérifié d'abord
        let mut controller = self::controller();
        controller.dispatch(Intent::SellCurrencyChanged("CHF".to_string()));
        controller.dispatch(Intent::AmountChanged("10".to_string()));
        controller.dispatch(Intent::Convert);
        assert_eq!(controller.state().error.as_deref(), Some("rate not available"));
    }

    #[test]
    fn test_multiple_conversions() {
        let mut controller = controller();

        controller.dispatch(Intent::AmountChanged("100".to_string()));
        controller.dispatch(Intent::Convert);
        controller.dispatch(Intent::AmountChanged("200".to_string()));
        controller.dispatch(Intent::Convert);

        let ledger = &controller.state().ledger;
        assert_eq!(ledger.amount_of("EUR"), 700.0);
        assert!(approx(ledger.amount_of("USD"), 326.88));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_conversion_between_non_base_currencies() {
        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged("100".to_string()));
        controller.dispatch(Intent::Convert);

        controller.dispatch(Intent::SellCurrencyChanged("USD".to_string()));
        controller.dispatch(Intent::BuyCurrencyChanged("GBP".to_string()));
        controller.dispatch(Intent::AmountChanged("50".to_string()));
        controller.dispatch(Intent::Convert);

        let ledger = &controller.state().ledger;
        assert_eq!(controller.state().error, None);
        assert!(approx(ledger.amount_of("USD"), 58.96));
        assert!(approx(ledger.amount_of("GBP"), 50.0 * 0.8572 / 1.0896));
        assert_eq!(ledger.amount_of("EUR"), 900.0);
    }

    #[test]
    fn test_error_cleared_by_new_input() {
        let mut controller = controller();
        controller.dispatch(Intent::Convert);
        assert!(controller.state().error.is_some());

        controller.dispatch(Intent::AmountChanged("1".to_string()));
        assert_eq!(controller.state().error, None);

        controller.dispatch(Intent::AmountChanged("".to_string()));
        controller.dispatch(Intent::Convert);
        controller.dispatch(Intent::SellCurrencyChanged("GBP".to_string()));
        assert_eq!(controller.state().error, None);

        controller.dispatch(Intent::Convert);
        controller.dispatch(Intent::BuyCurrencyChanged("JPY".to_string()));
        assert_eq!(controller.state().error, None);
    }

    #[test]
    fn test_swap_keeps_error() {
        let mut controller = controller();
        controller.dispatch(Intent::Convert);
        controller.dispatch(Intent::Swap);
        assert_eq!(controller.state().error.as_deref(), Some("invalid amount"));
    }

    #[test]
    fn test_balances_never_negative() {
        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged("1000".to_string()));
        controller.dispatch(Intent::Convert);
        assert_eq!(controller.state().ledger.amount_of("EUR"), 0.0);

        controller.dispatch(Intent::AmountChanged("0.01".to_string()));
        controller.dispatch(Intent::Convert);
        assert_eq!(controller.state().error.as_deref(), Some("insufficient balance"));
        assert!(controller.state().ledger.iter().all(|b| b.amount >= 0.0));
    }

    #[test]
    fn test_preview_is_idempotent() {
        let mut controller = controller();
        controller.dispatch(Intent::AmountChanged("42.5".to_string()));

        let state = controller.state();
        let first = preview(state, controller.rates());
        let second = preview(state, controller.rates());
        assert_eq!(first, second);
        assert_eq!(first, state.preview);
        assert_eq!(first.as_deref(), Some("42.50 EUR = 46.31 USD"));
    }

    #[test]
    fn test_feed_failure_sets_error() {
        let mut controller = ExchangeController::new("EUR", "USD", 1000.0);
        controller.dispatch(Intent::FeedAttached);
        controller.dispatch(Intent::FeedFailed);

        let state = controller.state();
        assert_eq!(state.error.as_deref(), Some(FEED_FAILED_MESSAGE));
        assert!(!state.loading);
    }

    #[test]
    fn test_transition_is_pure() {
        let state = ExchangeState::initial("EUR", "USD", 1000.0);
        let snapshot = rates();
        let intent = Intent::AmountChanged("10".to_string());

        let first = transition(&state, Some(&snapshot), &intent);
        let second = transition(&state, Some(&snapshot), &intent);

        assert_eq!(first, second);
        assert_eq!(state, ExchangeState::initial("EUR", "USD", 1000.0));
    }
}
