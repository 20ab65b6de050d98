// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état global de l'application TUI
//
// CONCEPTS RUST :
// 1. State Management : l'état métier vit dans ExchangeController
// 2. App n'ajoute que l'état propre au terminal (focus, confirmation de quit)
// 3. Toutes les actions utilisateur deviennent des Intent
//
// PATTERN : Cette structure suit le pattern "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Toutes les modifications passent par les méthodes de App
// ============================================================================

use crate::exchange::{ExchangeController, ExchangeState, Intent};
use crate::feed::FeedHealth;
use crate::models::RateSnapshot;

// ============================================================================
// Enum : Focus
// ============================================================================
// CONCEPT RUST : Enums pour state machines
// - Un seul champ du formulaire a le focus à la fois
// - Tab / Shift-Tab font tourner le focus
// ============================================================================

/// Champ du formulaire qui reçoit les touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Devise vendue
    Sell,

    /// Devise achetée
    Buy,

    /// Montant à vendre
    Amount,
}

impl Focus {
    /// Champ suivant (Sell → Buy → Amount → Sell)
    pub fn next(self) -> Self {
        match self {
            Focus::Sell => Focus::Buy,
            Focus::Buy => Focus::Amount,
            Focus::Amount => Focus::Sell,
        }
    }

    /// Champ précédent
    pub fn previous(self) -> Self {
        match self {
            Focus::Sell => Focus::Amount,
            Focus::Buy => Focus::Sell,
            Focus::Amount => Focus::Buy,
        }
    }
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Indique si l'utilisateur a demandé à quitter (attend confirmation)
    /// CONCEPT : Two-step quit pour éviter les sorties accidentelles
    /// - Première pression de 'q' : confirm_quit = true
    /// - Deuxième pression de 'q' : running = false (quit réel)
    /// - N'importe quelle autre touche : confirm_quit = false (annulation)
    pub confirm_quit: bool,

    /// Champ actif du formulaire
    pub focus: Focus,

    /// Dernière liveness connue du flux de taux
    pub feed_health: FeedHealth,

    exchange: ExchangeController,
}

impl App {
    /// Crée l'application autour d'un contrôleur d'échange
    pub fn new(exchange: ExchangeController) -> Self {
        Self {
            running: true,
            confirm_quit: false,
            focus: Focus::Amount,
            feed_health: FeedHealth::default(),
            exchange,
        }
    }

    /// État d'échange à afficher
    pub fn state(&self) -> &ExchangeState {
        self.exchange.state()
    }

    /// Dernier snapshot de taux reçu
    pub fn rates(&self) -> Option<&RateSnapshot> {
        self.exchange.rates()
    }

    /// Transmet une intention au contrôleur
    pub fn dispatch(&mut self, intent: Intent) {
        self.exchange.dispatch(intent);
    }

    /// Quitte l'application
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Vérifie si l'application doit continuer
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Demande la confirmation de quitter
    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    /// Annule la demande de quit
    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    /// Vérifie si on attend la confirmation de quit
    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    pub fn next_focus(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn previous_focus(&mut self) {
        self.focus = self.focus.previous();
    }

    /// Passe à la devise suivante (ou précédente) dans le champ focalisé
    ///
    /// CONCEPT RUST : rem_euclid
    /// - Modulo toujours positif, pratique pour faire tourner un index
    /// - (0 - 1).rem_euclid(5) == 4
    pub fn cycle_currency(&mut self, forward: bool) {
        let state = self.exchange.state();
        let currencies = &state.supported_currencies;
        if currencies.is_empty() {
            return;
        }

        let current = match self.focus {
            Focus::Sell => &state.sell_currency,
            Focus::Buy => &state.buy_currency,
            Focus::Amount => return,
        };

        let len = currencies.len() as isize;
        let next_index = match currencies.iter().position(|c| c == current) {
            Some(index) => {
                let step = if forward { 1 } else { -1 };
                (index as isize + step).rem_euclid(len) as usize
            }
            None => 0,
        };
        let code = currencies[next_index].clone();

        let intent = match self.focus {
            Focus::Sell => Intent::SellCurrencyChanged(code),
            _ => Intent::BuyCurrencyChanged(code),
        };
        self.dispatch(intent);
    }

    /// Ajoute un caractère au montant (refusé par le contrôleur si malformé)
    pub fn append_char(&mut self, c: char) {
        let mut text = self.exchange.state().amount_input.clone();
        text.push(c);
        self.dispatch(Intent::AmountChanged(text));
    }

    /// Supprime le dernier caractère du montant
    pub fn backspace(&mut self) {
        let mut text = self.exchange.state().amount_input.clone();
        if text.pop().is_some() {
            self.dispatch(Intent::AmountChanged(text));
        }
    }

    pub fn swap(&mut self) {
        self.dispatch(Intent::Swap);
    }

    /// Convertir est désactivé tant que les taux chargent
    pub fn can_convert(&self) -> bool {
        !self.state().loading
    }

    pub fn convert(&mut self) {
        if self.can_convert() {
            self.dispatch(Intent::Convert);
        }
    }

    /// Met à jour la liveness affichée dans le footer
    pub fn set_feed_health(&mut self, health: FeedHealth) {
        self.feed_health = health;
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
