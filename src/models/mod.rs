// ============================================================================
// Module : models
// ============================================================================
// Ce module contient toutes les structures de données de l'application
//
// CONCEPT RUST : Modules et visibilité
// - "pub mod" : déclare un sous-module publique (accessible depuis l'extérieur)
// - Sans "pub", le module serait privé au crate
// ============================================================================

pub mod ledger;   // Soldes par devise (Balance, Ledger)
pub mod snapshot; // Table de taux (RateSnapshot)

// Re-export des structures principales pour simplifier les imports
// Au lieu de : use lazyexchange::models::snapshot::RateSnapshot;
// On peut faire : use lazyexchange::models::RateSnapshot;
pub use ledger::{Balance, Ledger};
pub use snapshot::{RateSnapshot, SnapshotError};
