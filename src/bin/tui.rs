//! Access TUI - full-screen operator dashboard
//!
//! Renders the live dashboard state maintained by the library controller:
//! - Per-gate event cards (newest first, allowed/denied, credential, reason)
//! - Zone occupancy gauges
//! - Connection / view phase header
//! - Manual gate override on digit keys (fire-and-forget)

use access_console::domain::types::{AccessEvent, ConnectionState, Gate};
use access_console::infra::{Config, Metrics};
use access_console::services::controller::{Dashboard, DashboardState, SharedState, ViewPhase};
use access_console::services::occupancy::fill_ratio;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gate cards per row in the grid
const CARDS_PER_ROW: usize = 3;

/// Access TUI - operator dashboard for gates and zones
#[derive(Parser, Debug)]
#[command(name = "access-tui", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load_from_path(&args.config);
    let tick_rate = Duration::from_millis(config.ui_tick_ms());

    let dashboard = Dashboard::activate(&config, Arc::new(Metrics::new())).await?;
    let state = dashboard.state();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_ui(&mut terminal, state, &dashboard, tick_rate);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // Close the view on every exit path so no late event reaches it
    dashboard.close();

    result
}

fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: SharedState,
    dashboard: &Dashboard,
    tick_rate: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_tick = Instant::now();

    loop {
        {
            let s = state.lock();
            terminal.draw(|f| draw_ui(f, &s))?;
        }

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char(c @ '1'..='9') => {
                            let index = (c as usize) - ('1' as usize);
                            let gate_id = state.lock().gates.get(index).map(|g| g.id);
                            if let Some(gate_id) = gate_id {
                                dashboard.send_open(gate_id);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn draw_ui(f: &mut Frame, state: &DashboardState) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Zone gauges
            Constraint::Min(0),    // Gate cards
            Constraint::Length(3), // Alerts
        ])
        .split(f.area());

    draw_header(f, main_chunks[0], state);
    draw_zone_panel(f, main_chunks[1], state);
    draw_gate_grid(f, main_chunks[2], state);
    draw_alert_panel(f, main_chunks[3], state);
}

fn phase_style(phase: ViewPhase) -> (&'static str, Color) {
    match phase {
        ViewPhase::Init => ("INIT", Color::DarkGray),
        ViewPhase::Empty => ("NOT CONFIGURED", Color::Red),
        ViewPhase::Streaming => ("STREAMING", Color::Green),
        ViewPhase::Reconnecting => ("RECONNECTING", Color::Yellow),
        ViewPhase::Stale => ("STALE", Color::Red),
    }
}

fn draw_header(f: &mut Frame, area: Rect, state: &DashboardState) {
    let (phase_text, phase_color) = phase_style(state.phase);

    let connection_color = match state.connection {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Access Console ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(phase_text, Style::default().fg(phase_color).add_modifier(Modifier::BOLD)),
        Span::raw(" | stream: "),
        Span::styled(state.connection.as_str(), Style::default().fg(connection_color)),
        Span::raw(format!(" | gates: {} | zones: {}", state.gates.len(), state.zones.len())),
        Span::raw(" | 'q' quit, 1-9 open gate"),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_zone_panel(f: &mut Frame, area: Rect, state: &DashboardState) {
    let zones = state.zones.sorted();

    if zones.is_empty() {
        let placeholder = Paragraph::new("no zones in snapshot")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title(" Occupancy ").borders(Borders::ALL));
        f.render_widget(placeholder, area);
        return;
    }

    let constraints: Vec<Constraint> =
        zones.iter().map(|_| Constraint::Ratio(1, zones.len() as u32)).collect();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (zone, chunk) in zones.iter().zip(chunks.iter()) {
        let ratio = fill_ratio(zone.occupancy, zone.capacity);
        let color = if ratio < 0.7 {
            Color::Green
        } else if ratio < 0.9 {
            Color::Yellow
        } else {
            Color::Red
        };

        let gauge = Gauge::default()
            .block(Block::default().title(format!(" {} ", zone.name)).borders(Borders::ALL))
            .gauge_style(Style::default().fg(color))
            .ratio(ratio)
            .label(format!("{}/{}", zone.occupancy, zone.capacity));
        f.render_widget(gauge, *chunk);
    }
}

fn draw_gate_grid(f: &mut Frame, area: Rect, state: &DashboardState) {
    if state.phase == ViewPhase::Empty || state.gates.is_empty() {
        let message = if state.phase == ViewPhase::Empty {
            "Snapshot unavailable - dashboard not configured.\nRestart the console to retry."
        } else {
            "No gates configured.\nAdd gates in the admin pages, then restart the console."
        };
        let placeholder = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(ratatui::layout::Alignment::Center)
            .block(Block::default().title(" Gates ").borders(Borders::ALL));
        f.render_widget(placeholder, area);
        return;
    }

    let rows: Vec<&[Gate]> = state.gates.chunks(CARDS_PER_ROW).collect();
    let row_constraints: Vec<Constraint> =
        rows.iter().map(|_| Constraint::Ratio(1, rows.len() as u32)).collect();
    let row_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row, row_area) in rows.iter().zip(row_chunks.iter()) {
        let card_constraints: Vec<Constraint> =
            row.iter().map(|_| Constraint::Ratio(1, row.len() as u32)).collect();
        let card_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(card_constraints)
            .split(*row_area);

        for (gate, card_area) in row.iter().zip(card_chunks.iter()) {
            draw_gate_card(f, *card_area, gate, state);
        }
    }
}

fn draw_gate_card(f: &mut Frame, area: Rect, gate: &Gate, state: &DashboardState) {
    let events = state.router.snapshot(gate.id);

    let status_dot = if gate.connectivity.is_online() { "●" } else { "○" };
    let border_color = if gate.connectivity.is_online() { Color::Blue } else { Color::DarkGray };
    let title = format!(
        " {} {} [{}] #{} ({}) ",
        status_dot,
        gate.name,
        gate.direction.as_str(),
        gate.id,
        events.len()
    );

    let items: Vec<ListItem> = if events.is_empty() {
        vec![ListItem::new(Span::styled("no activity yet", Style::default().fg(Color::DarkGray)))]
    } else {
        events.iter().map(event_line).collect()
    };

    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color)),
    );

    f.render_widget(list, area);
}

fn event_line(event: &AccessEvent) -> ListItem<'static> {
    let (icon, color) = if event.status.is_denied() {
        ("✗", Color::Red)
    } else {
        ("✓", Color::Green)
    };

    let mut spans = vec![
        Span::styled(icon.to_string(), Style::default().fg(color)),
        Span::raw(format!(" {} ", clock_time(&event.time))),
        Span::styled(event.user_name.clone(), Style::default().fg(Color::White)),
        Span::styled(format!(" {}", event.credential.tag), Style::default().fg(Color::Cyan)),
    ];

    if let Some(reason) = event.denial_reason() {
        spans.push(Span::styled(format!(" {}", reason), Style::default().fg(Color::Red)));
    }

    ListItem::new(Line::from(spans))
}

/// Wall-clock portion of an RFC 3339 timestamp, for compact display
fn clock_time(time: &str) -> &str {
    time.get(11..19).unwrap_or(time)
}

fn draw_alert_panel(f: &mut Frame, area: Rect, state: &DashboardState) {
    let items: Vec<ListItem> = if state.alerts.is_empty() {
        vec![ListItem::new(Span::styled("-", Style::default().fg(Color::DarkGray)))]
    } else {
        state
            .alerts
            .iter()
            .map(|alert| {
                ListItem::new(Span::styled(alert.clone(), Style::default().fg(Color::Red)))
            })
            .collect()
    };

    let list = List::new(items).block(
        Block::default()
            .title(" Alerts ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );

    f.render_widget(list, area);
}
