// ============================================================================
// LazyExchange - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;      // Sources de taux (HTTP)
pub mod app;      // État de l'application TUI
pub mod config;   // Configuration (env / .env)
pub mod engine;   // Calcul des taux croisés et des conversions
pub mod exchange; // Machine à états de l'écran d'échange
pub mod feed;     // Flux de taux partagé (polling + broadcast)
pub mod models;   // Structures de données
pub mod ui;       // Interface utilisateur
