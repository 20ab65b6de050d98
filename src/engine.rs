// ============================================================================
// Moteur de conversion
// ============================================================================
// Fonctions pures : calcul du taux croisé et application d'une conversion
//
// CONCEPTS RUST :
// 1. Fonctions libres sans état : faciles à tester, pas d'effets de bord
// 2. Option<f64> : "taux indisponible" sans valeur sentinelle
// 3. Result<Ledger, ConversionError> : le ledger d'origine n'est jamais touché
// ============================================================================

use thiserror::Error;

use crate::models::{Balance, Ledger, RateSnapshot};

/// Rejet d'une conversion par le moteur
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Solde absent ou inférieur au montant demandé
    #[error("insufficient {currency} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        currency: String,
        available: f64,
        requested: f64,
    },
}

/// Calcule le taux `from` → `to` à partir d'un snapshot relatif à la base
///
/// - from == base : taux coté directement
/// - to == base : inverse du taux de `from`
/// - sinon : taux croisé synthétique via la base (to / from)
///
/// Le cas from == to est filtré en amont par l'appelant.
pub fn cross_rate(snapshot: &RateSnapshot, from: &str, to: &str) -> Option<f64> {
    let base = snapshot.base();

    if from == base {
        snapshot.rate(to)
    } else if to == base {
        snapshot
            .rate(from)
            .filter(|&rate| rate != 0.0)
            .map(|rate| 1.0 / rate)
    } else {
        // CONCEPT RUST : Option chaining avec ?
        // - Dans une fonction qui retourne Option, ? fait un early return None
        let from_rate = snapshot.rate(from)?;
        let to_rate = snapshot.rate(to)?;
        Some(to_rate / from_rate)
    }
}

/// Applique une conversion et retourne le nouveau ledger
///
/// Préconditions garanties par l'appelant : amount > 0, from != to,
/// taux disponible. Aucun arrondi sur les montants stockés.
pub fn apply(
    ledger: &Ledger,
    from: &str,
    to: &str,
    amount: f64,
    rate: f64,
) -> Result<Ledger, ConversionError> {
    let available = ledger.get(from).map(|b| b.amount);

    match available {
        Some(available) if available >= amount => {}
        _ => {
            return Err(ConversionError::InsufficientBalance {
                currency: from.to_string(),
                available: available.unwrap_or(0.0),
                requested: amount,
            })
        }
    }

    let credited = amount * rate;

    // CONCEPT RUST : Iterator map + collect
    // - On reconstruit chaque Balance, le ledger d'origine reste intact
    let mut balances: Vec<Balance> = ledger
        .iter()
        .map(|balance| {
            if balance.currency == from {
                // max(0.0) : un arrondi flottant ne doit jamais rendre le solde négatif
                Balance::new(from, (balance.amount - amount).max(0.0))
            } else if balance.currency == to {
                Balance::new(to, balance.amount + credited)
            } else {
                balance.clone()
            }
        })
        .collect();

    if !balances.iter().any(|b| b.currency == to) {
        balances.push(Balance::new(to, credited));
    }

    Ok(Ledger::from_balances(balances))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RateSnapshot {
        RateSnapshot::new(
            "EUR",
            [("USD", 1.0896), ("GBP", 0.8572), ("JPY", 159.52), ("AUD", 1.6234)],
        )
        .unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cross_rate_from_base() {
        assert_eq!(cross_rate(&snapshot(), "EUR", "USD"), Some(1.0896));
    }

    #[test]
    fn test_cross_rate_to_base() {
        let rate = cross_rate(&snapshot(), "USD", "EUR").unwrap();
        assert!(approx(rate, 1.0 / 1.0896));
    }

    #[test]
    fn test_cross_rate_between_non_base() {
        let rate = cross_rate(&snapshot(), "USD", "GBP").unwrap();
        assert!(approx(rate, 0.8572 / 1.0896));
    }

    #[test]
    fn test_cross_rate_unavailable() {
        let snapshot = snapshot();
        assert_eq!(cross_rate(&snapshot, "EUR", "CHF"), None);
        assert_eq!(cross_rate(&snapshot, "CHF", "EUR"), None);
        assert_eq!(cross_rate(&snapshot, "CHF", "USD"), None);
        assert_eq!(cross_rate(&snapshot, "USD", "CHF"), None);
    }

    #[test]
    fn test_cross_rate_is_reciprocal() {
        let snapshot = snapshot();
        let codes = ["EUR", "USD", "GBP", "JPY", "AUD"];

        for from in codes {
            for to in codes {
                if from == to {
                    continue;
                }
                let forward = cross_rate(&snapshot, from, to).unwrap();
                let backward = cross_rate(&snapshot, to, from).unwrap();
                assert!(
                    (forward * backward - 1.0).abs() < 1e-12,
                    "{from}->{to}: {forward} * {backward} != 1"
                );
            }
        }
    }

    #[test]
    fn test_apply_creates_target_balance() {
        let ledger = Ledger::seeded("EUR", 1000.0);
        let updated = apply(&ledger, "EUR", "USD", 100.0, 1.0896).unwrap();

        assert_eq!(updated.amount_of("EUR"), 900.0);
        assert!(approx(updated.amount_of("USD"), 108.96));
        assert_eq!(updated.len(), 2);
        // Le ledger d'origine n'a pas bougé
        assert_eq!(ledger.amount_of("EUR"), 1000.0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_apply_credits_existing_balance() {
        let ledger = Ledger::seeded("EUR", 1000.0).with_balance("USD", 10.0);
        let updated = apply(&ledger, "EUR", "USD", 100.0, 1.0896).unwrap();

        assert_eq!(updated.len(), 2);
        assert!(approx(updated.amount_of("USD"), 118.96));
    }

    #[test]
    fn test_apply_rejects_missing_balance() {
        let ledger = Ledger::seeded("EUR", 1000.0);
        let result = apply(&ledger, "USD", "EUR", 50.0, 1.0 / 1.0896);

        assert_eq!(
            result,
            Err(ConversionError::InsufficientBalance {
                currency: "USD".to_string(),
                available: 0.0,
                requested: 50.0,
            })
        );
    }

    #[test]
    fn test_apply_rejects_overdraft() {
        let ledger = Ledger::seeded("EUR", 100.0);
        assert!(apply(&ledger, "EUR", "USD", 100.01, 1.0896).is_err());
    }

    #[test]
    fn test_apply_full_balance_never_negative() {
        let ledger = Ledger::seeded("EUR", 0.3);
        let updated = apply(&ledger, "EUR", "USD", 0.3, 1.0896).unwrap();
        assert!(updated.amount_of("EUR") >= 0.0);

        // Enchaînement de conversions jusqu'à épuisement
        let mut ledger = Ledger::seeded("EUR", 1000.0);
        for _ in 0..10 {
            ledger = apply(&ledger, "EUR", "GBP", 100.0, 0.8572).unwrap();
        }
        assert!(ledger.amount_of("EUR") >= 0.0);
        assert!(apply(&ledger, "EUR", "GBP", 0.01, 0.8572).is_err());
    }
}
