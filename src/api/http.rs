// ============================================================================
// API Client : table de taux HTTP
// ============================================================================
// Récupère la table des taux de change depuis un endpoint JSON
//
// Format attendu :
// { "base": "EUR", "date": "2025-11-19", "rates": { "USD": 1.0896, ... } }
//
// CONCEPTS RUST :
// 1. async/await : programmation asynchrone (non-bloquante)
// 2. Serde : désérialisation JSON automatique
// 3. anyhow::Context : chaque étape qui peut échouer ajoute son contexte
// ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use crate::api::RateSource;
use crate::models::RateSnapshot;

// ============================================================================
// Structure pour parser la réponse JSON
// ============================================================================

/// Réponse de l'endpoint des taux
///
/// Seul `rates` alimente le cœur de l'application, `base` sert à vérifier
/// que la source parle bien de la même devise de base que nous.
#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    base: String,
    date: Option<String>,
    rates: HashMap<String, f64>,
}

// ============================================================================
// HttpRateSource
// ============================================================================

/// Source de taux interrogée en HTTP GET
///
/// CONCEPT RUST : Réutilisation du client
/// - reqwest::Client garde un pool de connexions
/// - On le construit une fois, puis chaque fetch() le réutilise
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    url: String,
    base_currency: String,
}

impl HttpRateSource {
    /// Crée une source pour `url`, dont les taux sont relatifs à `base_currency`
    ///
    /// `timeout` borne chaque requête côté client HTTP
    pub fn new(url: impl Into<String>, base_currency: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lazyexchange/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            client,
            url: url.into(),
            base_currency: base_currency.into(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    /// Un seul GET, sans retry : la boucle de polling s'en charge
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<RateSnapshot> {
        debug!("Sending HTTP request for exchange rates");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Échec de la requête HTTP vers la source de taux")?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        // Vérifie que la réponse est un succès HTTP (200-299)
        if !status.is_success() {
            error!(status = %status, "Rate source returned error status");
            anyhow::bail!("La source de taux a retourné une erreur : HTTP {}", status);
        }

        let body = response
            .text()
            .await
            .context("Échec de la lecture du corps de la réponse")?;

        let snapshot = parse_rates_body(&body, &self.base_currency)?;
        info!(currencies = snapshot.len(), date = ?snapshot.date(), "Exchange rates fetched");
        Ok(snapshot)
    }
}

/// Parse le corps JSON et le convertit en RateSnapshot
///
/// Échoue si le JSON est malformé, si la base annoncée diffère de la base
/// attendue, ou si un taux n'est pas fini et strictement positif.
pub fn parse_rates_body(body: &str, expected_base: &str) -> Result<RateSnapshot> {
    let response: ExchangeRateResponse =
        serde_json::from_str(body).context("Échec du parsing JSON de la table des taux")?;

    if !response.base.eq_ignore_ascii_case(expected_base) {
        anyhow::bail!(
            "Devise de base inattendue : {} (attendu {})",
            response.base,
            expected_base
        );
    }

    let snapshot = RateSnapshot::new(expected_base, response.rates)
        .context("Table des taux invalide")?;

    Ok(match response.date {
        Some(date) => snapshot.with_date(date),
        None => snapshot,
    })
}

// ============================================================================
// Tests unitaires
// ============================================================================
