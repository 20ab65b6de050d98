// ============================================================================
// Module : api
// ============================================================================
// Ce module contient les sources de taux de change : le trait RateSource et
// son implémentation HTTP
// ============================================================================

pub mod http; // Client HTTP de la table des taux

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RateSnapshot;

// Re-export des éléments principaux
pub use http::{parse_rates_body, HttpRateSource};

/// Source de taux : une table complète par appel, ou un échec
///
/// CONCEPT RUST : Trait objet (dyn RateSource)
/// - La boucle de polling ne connaît que ce trait
/// - Les tests branchent une source scriptée à la place du client HTTP
/// - Send + Sync : la source est partagée avec une tâche tokio
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Récupère un snapshot. Toute erreur est traitée de la même façon
    /// par l'appelant, d'où anyhow plutôt qu'une taxonomie.
    async fn fetch(&self) -> Result<RateSnapshot>;
}
