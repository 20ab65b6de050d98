// ============================================================================
// RateFeed : boucle de polling des taux
// ============================================================================
// Interroge la RateSource à intervalle fixe et diffuse chaque snapshot réussi
// à tous les abonnés. Un échec ne publie rien : on attend l'intervalle et on
// recommence, indéfiniment.
//
// CONCEPTS RUST :
// 1. tokio::sync::broadcast : un émetteur, N récepteurs, chacun voit tout
// 2. tokio::sync::watch : dernière valeur d'état (liveness) lisible à tout moment
// 3. Supervision : la boucle tourne dans une tâche surveillée, relancée si panic
// 4. RAII : se désabonner = dropper la RateSubscription
//
// CYCLE DE VIE :
// - Premier subscribe() : la tâche de polling démarre (premier appel immédiat)
// - Dernier abonné parti : la tâche est annulée (fetch en cours abandonné)
// - shutdown() : la tâche est annulée et le canal fermé pour de bon
// ============================================================================

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::RateSource;
use crate::config::{DEFAULT_FETCH_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::models::RateSnapshot;

/// Paramètres de la boucle de polling
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Attente entre deux appels, après un succès comme après un échec
    pub poll_interval: Duration,

    /// Durée max d'un appel à la source avant de le considérer en échec
    pub fetch_timeout: Duration,

    /// Attente avant de relancer une boucle qui a paniqué
    pub restart_delay: Duration,

    /// Taille du buffer broadcast (snapshots non lus par un abonné lent)
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            restart_delay: Duration::from_secs(1),
            capacity: 16,
        }
    }
}

/// Signal de liveness du flux (jamais une erreur)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedHealth {
    /// Horodatage du dernier polling réussi
    pub last_success: Option<DateTime<Utc>>,

    /// Échecs consécutifs depuis le dernier succès
    pub consecutive_failures: u32,

    /// Nombre total d'appels à la source
    pub polls: u64,
}

/// Erreurs d'abonnement
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    /// Le flux a été arrêté par shutdown()
    #[error("rate feed is shut down")]
    Closed,

    /// subscribe() appelé hors d'un runtime tokio
    #[error("no tokio runtime available to run the rate feed")]
    NoRuntime,
}

// ============================================================================
// État partagé entre le flux et ses abonnements
// ============================================================================

struct FeedShared {
    source: Arc<dyn RateSource>,
    config: FeedConfig,

    /// None après shutdown() : plus aucun abonnement possible
    sender: Mutex<Option<broadcast::Sender<RateSnapshot>>>,

    /// Tâche superviseur, None quand personne n'écoute
    task: Mutex<Option<JoinHandle<()>>>,

    health: Arc<watch::Sender<FeedHealth>>,
}

/// Un mutex empoisonné garde des données valides ici (Option de handles)
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FeedShared {
    fn receiver_count(&self) -> usize {
        lock(&self.sender)
            .as_ref()
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Démarre la tâche de polling si elle ne tourne pas déjà
    fn ensure_running(&self) -> Result<(), FeedError> {
        let mut task = lock(&self.task);

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let sender = lock(&self.sender).clone().ok_or(FeedError::Closed)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;

        info!(interval = ?self.config.poll_interval, "Starting rate polling");
        *task = Some(runtime.spawn(supervise(
            self.source.clone(),
            self.config.clone(),
            sender,
            self.health.clone(),
        )));
        Ok(())
    }

    /// Appelé après le drop d'un récepteur : coupe le polling si plus personne
    fn on_unsubscribe(&self) {
        // Le compte est lu sous le verrou de la tâche : un subscribe() concurrent
        // a soit déjà créé son récepteur, soit relancera la tâche après nous.
        let mut task = lock(&self.task);
        let remaining = self.receiver_count();
        debug!(subscribers = remaining, "Rate feed subscriber detached");

        if remaining == 0 {
            if let Some(handle) = task.take() {
                info!("No subscribers left, stopping rate polling");
                handle.abort();
            }
        }
    }
}

impl Drop for FeedShared {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

// ============================================================================
// RateFeed
// ============================================================================

/// Flux de taux diffusé à tous les abonnés
///
/// CONCEPT RUST : Handle clonable (Arc interne)
/// - Cloner un RateFeed partage la même boucle et le même canal
/// - Créer un NOUVEAU RateFeed donne une boucle indépendante
#[derive(Clone)]
pub struct RateFeed {
    shared: Arc<FeedShared>,
}

impl RateFeed {
    /// Crée un flux autour d'une source. Rien ne tourne avant subscribe().
    pub fn new(source: Arc<dyn RateSource>, config: FeedConfig) -> Self {
        let (sender, _receiver) = broadcast::channel(config.capacity.max(1));
        let (health, _health_rx) = watch::channel(FeedHealth::default());

        Self {
            shared: Arc::new(FeedShared {
                source,
                config,
                sender: Mutex::new(Some(sender)),
                task: Mutex::new(None),
                health: Arc::new(health),
            }),
        }
    }

    /// S'abonne au flux et démarre le polling si besoin
    ///
    /// Doit être appelé depuis un contexte tokio.
    pub fn subscribe(&self) -> Result<RateSubscription, FeedError> {
        let receiver = lock(&self.shared.sender)
            .as_ref()
            .ok_or(FeedError::Closed)?
            .subscribe();

        // CONCEPT RUST : La subscription est construite AVANT ensure_running()
        // - En cas d'erreur, son Drop nettoie comme un unsubscribe normal
        let subscription = RateSubscription {
            receiver: Some(receiver),
            shared: self.shared.clone(),
        };
        self.shared.ensure_running()?;

        info!(subscribers = self.subscriber_count(), "Rate feed subscriber attached");
        Ok(subscription)
    }

    /// Nombre d'abonnés actuellement attachés
    pub fn subscriber_count(&self) -> usize {
        self.shared.receiver_count()
    }

    /// Vrai tant que la tâche de polling tourne
    pub fn is_polling(&self) -> bool {
        lock(&self.shared.task)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Dernier état de liveness
    pub fn health(&self) -> FeedHealth {
        self.shared.health.borrow().clone()
    }

    /// Récepteur pour suivre la liveness en continu
    pub fn watch_health(&self) -> watch::Receiver<FeedHealth> {
        self.shared.health.subscribe()
    }

    /// Arrête définitivement le flux
    ///
    /// Les abonnements en cours se terminent (recv() retourne None) une fois la
    /// tâche annulée ; tout nouvel abonnement échoue avec FeedError::Closed.
    pub fn shutdown(&self) {
        if let Some(handle) = lock(&self.shared.task).take() {
            handle.abort();
        }
        if lock(&self.shared.sender).take().is_some() {
            info!("Rate feed shut down");
        }
    }
}

// ============================================================================
// RateSubscription
// ============================================================================

/// Abonnement à un RateFeed
///
/// Dropper l'abonnement (ou appeler unsubscribe()) le détache du flux.
pub struct RateSubscription {
    receiver: Option<broadcast::Receiver<RateSnapshot>>,
    shared: Arc<FeedShared>,
}

impl RateSubscription {
    /// Attend le prochain snapshot
    ///
    /// Retourne None quand le flux est fermé (shutdown). Un abonné trop lent
    /// saute les snapshots périmés et reprend avec les plus récents.
    pub async fn recv(&mut self) -> Option<RateSnapshot> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Rate subscriber lagged behind, skipping stale snapshots");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Version non bloquante de recv() : None si rien n'est disponible
    pub fn try_recv(&mut self) -> Option<RateSnapshot> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Rate subscriber lagged behind, skipping stale snapshots");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Se détache explicitement du flux
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for RateSubscription {
    fn drop(&mut self) {
        // Le récepteur doit disparaître AVANT de recompter les abonnés
        if let Some(receiver) = self.receiver.take() {
            drop(receiver);
            self.shared.on_unsubscribe();
        }
    }
}

// ============================================================================
// Tâches de fond
// ============================================================================

/// Annule la tâche enveloppée quand le guard est droppé
///
/// Si le superviseur est annulé, la boucle qu'il surveille l'est aussi.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Superviseur : relance la boucle de polling si elle panique
async fn supervise(
    source: Arc<dyn RateSource>,
    config: FeedConfig,
    sender: broadcast::Sender<RateSnapshot>,
    health: Arc<watch::Sender<FeedHealth>>,
) {
    loop {
        let mut worker = AbortOnDrop(tokio::spawn(poll_loop(
            source.clone(),
            config.clone(),
            sender.clone(),
            health.clone(),
        )));

        match (&mut worker.0).await {
            Ok(()) => {
                debug!("Rate polling loop finished");
                return;
            }
            Err(e) if e.is_panic() => {
                error!(
                    restart_in = ?config.restart_delay,
                    "Rate polling loop panicked, restarting"
                );
                tokio::time::sleep(config.restart_delay).await;
            }
            Err(e) => {
                debug!(error = %e, "Rate polling loop cancelled");
                return;
            }
        }
    }
}

/// Boucle de polling : fetch, publication si succès, attente, et on recommence
async fn poll_loop(
    source: Arc<dyn RateSource>,
    config: FeedConfig,
    sender: broadcast::Sender<RateSnapshot>,
    health: Arc<watch::Sender<FeedHealth>>,
) {
    loop {
        if sender.receiver_count() == 0 {
            info!("No subscribers left, rate polling loop exiting");
            return;
        }

        debug!("Fetching exchange rates");
        let outcome = tokio::time::timeout(config.fetch_timeout, source.fetch()).await;

        match outcome {
            Ok(Ok(snapshot)) => {
                health.send_modify(|h| {
                    h.last_success = Some(Utc::now());
                    h.consecutive_failures = 0;
                    h.polls += 1;
                });
                debug!(currencies = snapshot.len(), "Publishing exchange rates");
                // Err seulement s'il n'y a plus de récepteur : revérifié au tour suivant
                let _ = sender.send(snapshot);
            }
            Ok(Err(e)) => {
                health.send_modify(|h| {
                    h.consecutive_failures += 1;
                    h.polls += 1;
                });
                warn!(error = %format!("{:#}", e), "Exchange rate fetch failed, retrying after interval");
            }
            Err(_) => {
                health.send_modify(|h| {
                    h.consecutive_failures += 1;
                    h.polls += 1;
                });
                warn!(timeout = ?config.fetch_timeout, "Exchange rate fetch timed out, retrying after interval");
            }
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
