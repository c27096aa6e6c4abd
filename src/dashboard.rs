use crate::events::{Channel, EventSink, LogEvent, Tone};
use crate::traffic::TrafficAccountant;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const TITLE: &str = "Pulse Tunnel Console";

/// Live view over the event channels and the traffic total
pub struct Dashboard {
    events: EventSink,
    traffic: TrafficAccountant,
    started: Instant,
    shutting_down: bool,
}

impl Dashboard {
    pub fn new(events: EventSink, traffic: TrafficAccountant) -> Self {
        Self {
            events,
            traffic,
            started: Instant::now(),
            shutting_down: false,
        }
    }

    /// Render the dashboard UI
    fn render(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Logs
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);

        let panels = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[1]);

        self.render_log(f, panels[0], Channel::Connection, "Connection Log");
        self.render_log(f, panels[1], Channel::Response, "Server Responses");
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(
                TITLE,
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("Uptime: {}", format_uptime(self.started.elapsed())),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("Traffic: {}", self.traffic.snapshot()),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
        ];
        if self.shutting_down {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                "Shutting down...",
                Style::default().fg(Color::Red),
            ));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );
        f.render_widget(header, area);
    }

    fn render_log(&self, f: &mut Frame, area: Rect, channel: Channel, title: &str) {
        let entries = self.events.snapshot(channel);
        // 只显示能放下的最新几行
        let visible = area.height.saturating_sub(2) as usize;
        let skip = entries.len().saturating_sub(visible);
        let lines: Vec<Line> = entries.iter().skip(skip).map(event_line).collect();

        let panel = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Blue))
                .title(Span::styled(
                    title.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
        );
        f.render_widget(panel, area);
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Plain => Color::White,
        Tone::Muted => Color::Gray,
        Tone::Cyan => Color::Cyan,
        Tone::Magenta => Color::Magenta,
        Tone::Green => Color::Green,
        Tone::Yellow => Color::Yellow,
        Tone::Red => Color::Red,
    }
}

/// `• [HH:MM:SS] [Acc. id] message`
fn event_line(event: &LogEvent) -> Line<'static> {
    let dim = Style::default().fg(Color::Rgb(0xcc, 0xcc, 0xcc));
    Line::from(vec![
        Span::styled("• [", dim),
        Span::styled(event.timestamp.format("%H:%M:%S").to_string(), dim),
        Span::styled("] ", dim),
        Span::styled(
            format!("[Acc. {}]", event.account_id),
            Style::default().fg(Color::Rgb(0xff, 0xff, 0x85)),
        ),
        Span::styled(
            format!(" {}", event.message),
            Style::default().fg(tone_color(event.tone)),
        ),
    ])
}

/// `q`, `Esc` or Ctrl-C; raw mode turns Ctrl-C into a key event instead of SIGINT
fn is_shutdown_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Format uptime as `HHh MMm SSs`
pub fn format_uptime(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!(
        "{:02}h {:02}m {:02}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Run the dashboard until the workers have stopped
///
/// Blocking; run it on a blocking thread. `q`/`Esc`/Ctrl-C cancels `shutdown`,
/// the loop keeps drawing until `stopped` is cancelled.
pub fn run_dashboard(
    events: EventSink,
    traffic: TrafficAccountant,
    shutdown: CancellationToken,
    stopped: CancellationToken,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut dashboard = Dashboard::new(events, traffic);
    let tick_rate = Duration::from_millis(250);

    let result: Result<()> = loop {
        dashboard.shutting_down = shutdown.is_cancelled();
        if let Err(e) = terminal.draw(|f| dashboard.render(f)) {
            break Err(e).context("Failed to draw terminal");
        }

        if stopped.is_cancelled() {
            break Ok(());
        }

        match event::poll(tick_rate) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if is_shutdown_key(&key) {
                        shutdown.cancel();
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e).context("Failed to read event"),
            },
            Ok(false) => {}
            Err(e) => break Err(e).context("Event poll failed"),
        }
    };

    // Restore terminal
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "00h 00m 00s");
        assert_eq!(format_uptime(Duration::from_secs(3725)), "01h 02m 05s");
        assert_eq!(format_uptime(Duration::from_secs(100 * 3600)), "100h 00m 00s");
    }

    #[test]
    fn test_shutdown_keys() {
        let press = |code, modifiers| KeyEvent::new(code, modifiers);

        assert!(is_shutdown_key(&press(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_shutdown_key(&press(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_shutdown_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)));

        assert!(!is_shutdown_key(&press(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_shutdown_key(&press(KeyCode::Char('x'), KeyModifiers::CONTROL)));
        assert!(!is_shutdown_key(&press(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn test_render_shows_both_channels_and_traffic() {
        let events = EventSink::new();
        let traffic = TrafficAccountant::new();
        events.connection("7", Tone::Green, "Connection established");
        events.response("7", Tone::Cyan, "[Pulse] Today: 5 Total: 100 HB: 3");
        traffic.add(2048);

        let dashboard = Dashboard::new(events, traffic);
        let mut terminal = Terminal::new(TestBackend::new(120, 12)).unwrap();
        terminal.draw(|f| dashboard.render(f)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains(TITLE));
        assert!(text.contains("Traffic: 2.0kB"));
        assert!(text.contains("Connection established"));
        assert!(text.contains("HB: 3"));
        assert!(text.contains("[Acc. 7]"));
    }
}
