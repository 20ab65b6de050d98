// ============================================================================
// Dashboard - Rendu de l'interface principale
// ============================================================================
// Dessine l'écran d'échange en utilisant les widgets de ratatui
//
// CONCEPTS RUST :
// 1. &App : le rendu lit l'état, il ne le modifie jamais
// 2. Builder pattern : construction fluide des widgets
//
// CONCEPTS RATATUI :
// 1. Frame : surface de dessin
// 2. Widgets : composants UI (Block, Paragraph, List)
// 3. Layout : découpage de l'espace en zones
// 4. Style : couleurs et attributs de texte
// ============================================================================

use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, Focus};

/// Dessine l'interface complète
///
/// # Arguments
/// * `frame` - Surface de dessin ratatui
/// * `app` - État de l'application
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, chunks[0]);

    // Contenu : soldes à gauche, formulaire à droite
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_balances(frame, app, body[0]);
    render_exchange_form(frame, app, body[1]);
    render_footer(frame, app, chunks[2]);
}

// ============================================================================
// Layout : Découpage de l'écran
// ============================================================================

/// Crée le layout principal (header, content, footer)
///
/// CONCEPT RUST : Rc<[T]> vs Vec<T>
/// - Layout::split() retourne Rc<[Rect]> (reference counted slice)
/// - On le convertit en Vec avec .to_vec() pour simplifier
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header : 3 lignes
            Constraint::Min(0),    // Content : tout le reste
            Constraint::Length(3), // Footer : 3 lignes
        ])
        .split(area)
        .to_vec()
}

// ============================================================================
// Header
// ============================================================================

fn render_header(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" LazyExchange ")
        .title_alignment(Alignment::Center);

    let text = vec![Line::from(Span::styled(
        "Currency Exchange",
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    ))];

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Soldes
// ============================================================================

/// Dessine la liste des soldes du portefeuille
///
/// CONCEPT RATATUI : List widget
/// - ListItem : chaque ligne de la liste
/// - Les devises vendue et achetée sont mises en évidence
fn render_balances(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" My balances ");

    let state = app.state();
    let items: Vec<ListItem> = state
        .ledger
        .iter()
        .map(|balance| {
            let style = if balance.currency == state.sell_currency {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if balance.currency == state.buy_currency {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(format!(" {}", balance.display())).style(style)
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}

// ============================================================================
// Formulaire d'échange
// ============================================================================

/// Dessine le formulaire : vente, achat, montant, aperçu, erreur
fn render_exchange_form(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Currency exchange ");

    let state = app.state();

    let mut lines = vec![
        Line::from(""),
        field_line("Sell", &format!("< {} >", state.sell_currency), app.focus == Focus::Sell),
        field_line("Receive", &format!("< {} >", state.buy_currency), app.focus == Focus::Buy),
        field_line("Amount", &amount_text(&state.amount_input, app.focus == Focus::Amount), app.focus == Focus::Amount),
        Line::from(""),
    ];

    // Aperçu du taux ou indicateur de chargement
    match &state.preview {
        Some(preview) => lines.push(Line::from(Span::styled(
            format!("  {}", preview),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))),
        None if state.loading => lines.push(Line::from(Span::styled(
            "  Loading exchange rates...",
            Style::default().fg(Color::Gray),
        ))),
        None => lines.push(Line::from(Span::styled(
            "  Rate not available",
            Style::default().fg(Color::Gray),
        ))),
    }

    if let Some(error) = &state.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    if let Some(date) = app.rates().and_then(|rates| rates.date()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Rates of {}", date),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

/// Une ligne "label : valeur", en surbrillance si le champ a le focus
fn field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let value_style = if focused {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    Line::from(vec![
        Span::styled(
            format!("  {:<8} ", label),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(value.to_string(), value_style),
    ])
}

fn amount_text(input: &str, focused: bool) -> String {
    match (input.is_empty(), focused) {
        (true, true) => "█".to_string(),
        (true, false) => "0".to_string(),
        (false, true) => format!("{}█", input),
        (false, false) => input.to_string(),
    }
}

// ============================================================================
// Footer : Instructions
// ============================================================================

/// Dessine le footer avec les raccourcis clavier
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez sur ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        let key = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        // Grisé pendant le chargement des taux
        let (convert_style, convert_label) = if app.can_convert() {
            (
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                Style::default(),
            )
        } else {
            (
                Style::default().fg(Color::DarkGray),
                Style::default().fg(Color::DarkGray),
            )
        };
        Line::from(vec![
            Span::styled("[q]", key),
            Span::raw(" Quit  "),
            Span::styled("[Tab]", key),
            Span::raw(" Field  "),
            Span::styled("[← → / h l]", key),
            Span::raw(" Currency  "),
            Span::styled("[s]", key),
            Span::raw(" Swap  "),
            Span::styled("[Enter]", convert_style),
            Span::styled(" Convert  ", convert_label),
            Span::styled(feed_status(app), Style::default().fg(Color::DarkGray)),
        ])
    };

    let paragraph = Paragraph::new(vec![shortcuts])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

/// Résumé de la liveness du flux de taux
fn feed_status(app: &App) -> String {
    let health = &app.feed_health;
    match health.last_success {
        Some(at) if health.consecutive_failures == 0 => {
            format!("updated {}", at.with_timezone(&Local).format("%H:%M:%S"))
        }
        Some(at) => format!(
            "stale since {} ({} failures)",
            at.with_timezone(&Local).format("%H:%M:%S"),
            health.consecutive_failures
        ),
        None if health.consecutive_failures > 0 => {
            format!("retrying ({} failures)", health.consecutive_failures)
        }
        None => "waiting for rates".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeController, Intent};
    use crate::models::RateSnapshot;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &App) -> String {
        let backend = TestBackend::new(120, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();

        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn app_with_rates() -> App {
        let mut app = App::new(ExchangeController::new("EUR", "USD", 1000.0));
        let rates = RateSnapshot::new("EUR", [("USD", 1.0896), ("GBP", 0.8572)])
            .unwrap()
            .with_date("2024-05-02");
        app.dispatch(Intent::RatesReceived(rates));
        app
    }

    #[test]
    fn test_render_shows_balances_and_preview() {
        let screen = draw(&app_with_rates());
        assert!(screen.contains("LazyExchange"));
        assert!(screen.contains("1000.00"));
        assert!(screen.contains("1 EUR = 1.0896 USD"));
        assert!(screen.contains("Rates of 2024-05-02"));
    }

    #[test]
    fn test_render_loading_and_error() {
        let mut app = App::new(ExchangeController::new("EUR", "USD", 1000.0));
        app.dispatch(Intent::FeedAttached);
        assert!(draw(&app).contains("Loading exchange rates"));

        app.dispatch(Intent::FeedFailed);
        assert!(draw(&app).contains("failed to load exchange rates"));
    }

    #[test]
    fn test_render_quit_confirmation() {
        let mut app = app_with_rates();
        app.request_quit();
        assert!(draw(&app).contains("pour quitter"));
    }

    #[test]
    fn test_feed_status_without_data() {
        let app = app_with_rates();
        assert_eq!(feed_status(&app), "waiting for rates");
    }
}
