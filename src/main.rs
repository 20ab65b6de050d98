// ============================================================================
// LazyExchange - Écran d'échange de devises
// ============================================================================
// Programme TUI : portefeuille multi-devises alimenté par un flux de taux
// rafraîchi en continu (polling HTTP partagé)
//
// CONCEPTS RUST CLÉS :
// 1. Terminal raw mode : contrôle total du terminal
// 2. Event loop : boucle infinie qui gère événements et rendering
// 3. Async dans sync : le runtime tokio tourne sur ses propres threads
// 4. Channels : les taux arrivent dans l'event loop via mpsc
// ============================================================================

use std::io;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use lazyexchange::api::HttpRateSource;
use lazyexchange::app::{App, Focus};
use lazyexchange::config::Config;
use lazyexchange::exchange::{ExchangeController, Intent};
use lazyexchange::feed::{FeedHealth, RateFeed};
use lazyexchange::models::RateSnapshot;
use lazyexchange::ui::{events::EventHandler, render};

// ============================================================================
// FeedEvent : messages du flux vers l'event loop
// ============================================================================
// CONCEPT RUST : Channel entre async et sync
// - La tâche "bridge" vit dans le runtime tokio
// - L'event loop (sync) lit avec try_recv, sans jamais bloquer
// ============================================================================

/// Messages envoyés par la tâche bridge
#[derive(Debug)]
enum FeedEvent {
    /// Nouveau snapshot de taux
    RatesUpdated(RateSnapshot),

    /// Le flux est terminé (shutdown ou abonnement impossible)
    FeedClosed,
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// CONCEPT : Logging dans une app TUI
// - Les println! ne fonctionnent pas une fois le TUI lancé
// - On log vers un fichier à la place, avec rotation quotidienne
// ============================================================================

/// Initialise le système de logging vers fichier
///
/// # Utilisation
/// ```bash
/// # Voir les logs en temps réel
/// tail -f ~/.local/share/lazyexchange/logs/lazyexchange.log.*
///
/// # Contrôler le niveau de log
/// RUST_LOG=lazyexchange=trace cargo run
/// ```
fn init_logging(log_dir: &Path) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all(log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "lazyexchange.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender) // Écrit dans le fichier
                .with_ansi(false) // Pas de codes couleur dans le fichier
                .with_target(true) // Inclut le module (ex: lazyexchange::feed)
                .with_thread_ids(true) // Le polling tourne sur les threads tokio
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lazyexchange=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée du programme
// ============================================================================

fn main() -> Result<()> {
    // .env optionnel : absent = variables d'environnement seules
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Configuration invalide")?;

    init_logging(&config.log_dir).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(
        api_url = %config.api_url,
        base = %config.base_currency,
        poll_secs = config.poll_interval.as_secs(),
        "LazyExchange starting up"
    );

    // CONCEPT RUST : Runtime multi-thread
    // - Les tâches spawnées tournent sur les workers du runtime
    // - Le thread principal reste libre pour l'event loop synchrone
    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;

    let source = HttpRateSource::new(&config.api_url, &config.base_currency, config.fetch_timeout)?;
    let feed = RateFeed::new(Arc::new(source), config.feed_config());

    let (result_tx, result_rx) = mpsc::channel::<FeedEvent>();
    let bridge = runtime.spawn(forward_rates(feed.clone(), result_tx));

    let mut app = App::new(ExchangeController::from_config(&config));
    app.dispatch(Intent::FeedAttached);

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let events = EventHandler::new();

    info!("Starting event loop");
    let mut health_rx = feed.watch_health();
    let result = run(&mut terminal, &mut app, &events, &mut health_rx, &result_rx);

    // Restaure le terminal (même en cas d'erreur)
    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    // Arrêt du flux : le bridge d'abord, puis le polling
    bridge.abort();
    feed.shutdown();
    runtime.shutdown_timeout(Duration::from_millis(500));

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Bridge : flux async → event loop sync
// ============================================================================

/// Relaie chaque snapshot du flux vers l'event loop
///
/// S'arrête quand le flux se ferme ou quand l'event loop a disparu.
async fn forward_rates(feed: RateFeed, result_tx: mpsc::Sender<FeedEvent>) {
    let mut subscription = match feed.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(error = %e, "Failed to subscribe to rate feed");
            let _ = result_tx.send(FeedEvent::FeedClosed);
            return;
        }
    };

    while let Some(snapshot) = subscription.recv().await {
        debug!(currencies = snapshot.len(), "Forwarding rate snapshot");
        if result_tx.send(FeedEvent::RatesUpdated(snapshot)).is_err() {
            debug!("Event loop gone, bridge exiting");
            return;
        }
    }

    warn!("Rate feed closed");
    let _ = result_tx.send(FeedEvent::FeedClosed);
}

// ============================================================================
// Event Loop
// ============================================================================
// 1. Intègre les messages du flux (try_recv, non bloquant)
// 2. Dessine l'interface
// 3. Attend un événement clavier (ou un tick de 250ms)
// 4. Met à jour l'état
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    health_rx: &mut watch::Receiver<FeedHealth>,
    result_rx: &mpsc::Receiver<FeedEvent>,
) -> Result<()> {
    let mut feed_open = true;

    while app.is_running() {
        // Vide tous les messages en attente
        while feed_open {
            match result_rx.try_recv() {
                Ok(FeedEvent::RatesUpdated(snapshot)) => {
                    app.dispatch(Intent::RatesReceived(snapshot));
                }
                Ok(FeedEvent::FeedClosed) | Err(mpsc::TryRecvError::Disconnected) => {
                    error!("Rate feed terminated");
                    app.dispatch(Intent::FeedFailed);
                    feed_open = false;
                }
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }

        // Liveness du flux : copiée seulement quand elle a changé
        if health_rx.has_changed().unwrap_or(false) {
            app.set_feed_health(health_rx.borrow_and_update().clone());
        }

        terminal.draw(|frame| render(frame, app))?;

        match events.next() {
            Ok(event) => handle_event(app, event),
            Err(e) => warn!(error = ?e, "Failed to read terminal event"),
        }
    }

    Ok(())
}

// ============================================================================
// Gestion des événements
// ============================================================================

fn handle_event(app: &mut App, event: lazyexchange::ui::events::Event) {
    use lazyexchange::ui::events::{
        get_char_from_event, is_amount_char_event, is_backspace_event, is_backtab_event,
        is_enter_event, is_left_event, is_quit_event, is_right_event, is_swap_event, is_tab_event,
        Event,
    };

    // Toute touche autre que 'q' annule la confirmation de quit
    if matches!(event, Event::Key(_)) && !is_quit_event(&event) {
        app.cancel_quit();
    }

    match event {
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) if is_tab_event(&event) => app.next_focus(),
        Event::Key(_) if is_backtab_event(&event) => app.previous_focus(),

        Event::Key(_) if is_left_event(&event) && app.focus != Focus::Amount => {
            app.cycle_currency(false);
        }
        Event::Key(_) if is_right_event(&event) && app.focus != Focus::Amount => {
            app.cycle_currency(true);
        }

        Event::Key(_) if is_swap_event(&event) => {
            debug!("User swapped currencies");
            app.swap();
        }

        Event::Key(_) if is_enter_event(&event) => {
            info!(amount = %app.state().amount_input, "User requested conversion");
            app.convert();
        }

        Event::Key(_) if is_backspace_event(&event) && app.focus == Focus::Amount => {
            app.backspace();
        }

        // Le montant est le seul champ texte : la saisie y ramène le focus
        Event::Key(_) if is_amount_char_event(&event) => {
            if let Some(c) = get_char_from_event(&event) {
                app.focus = Focus::Amount;
                app.append_char(c);
            }
        }

        _ => {}
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);

    Terminal::new(backend).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;

    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;

    terminal.show_cursor()?;

    Ok(())
}
