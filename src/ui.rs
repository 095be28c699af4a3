use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::config::Activity;
use crate::fix::Metrics;
use crate::format;
use crate::session::SessionSummary;
use crate::tracker::TrackerPhase;

/// Everything the dashboard needs, pulled from the tracker on demand.
pub struct SessionView<'a> {
    pub activity: Activity,
    pub phase: TrackerPhase,
    pub warmup_remaining: u32,
    pub warmup_count: u32,
    pub disabled: bool,
    pub metrics: Metrics,
    pub accuracy_m: Option<f64>,
    pub recent: &'a [SessionSummary],
}

fn phase_banner(view: &SessionView) -> (String, Color) {
    if view.disabled {
        return ("NO POSITION SOURCE".into(), Color::Red);
    }
    match view.phase {
        TrackerPhase::Idle => ("PAUSED".into(), Color::Gray),
        TrackerPhase::Warmup => (
            format!(
                "ACQUIRING {}/{}",
                view.warmup_count.saturating_sub(view.warmup_remaining),
                view.warmup_count
            ),
            Color::Yellow,
        ),
        TrackerPhase::Active => ("TRACKING".into(), Color::Green),
    }
}

fn metric_tile<'a>(title: &'a str, value: String) -> Paragraph<'a> {
    Paragraph::new(vec![
        Line::from(Span::styled(
            value,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL))
}

pub fn draw_dashboard(f: &mut Frame, view: &SessionView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // banner
            Constraint::Length(4), // metric tiles
            Constraint::Length(3), // status
            Constraint::Min(0),    // recent sessions
            Constraint::Length(2), // hints
        ])
        .split(f.area());

    let (banner, color) = phase_banner(view);
    let title = Paragraph::new(format!("{} — {}", view.activity, banner))
        .block(Block::default().borders(Borders::ALL).title("pacer"))
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let m = &view.metrics;
    let tiles = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ])
        .split(chunks[1]);

    f.render_widget(metric_tile("duration", format::duration(m.duration_ms)), tiles[0]);
    f.render_widget(metric_tile("km", format::distance(m.distance_m)), tiles[1]);
    f.render_widget(metric_tile("km/h", format::speed(m.current_speed_mps)), tiles[2]);
    f.render_widget(
        metric_tile("avg km/h", format::speed(m.average_speed_mps)),
        tiles[3],
    );
    f.render_widget(
        metric_tile("climb m", format::climb(m.altitude_gain_m, m.altitude_loss_m)),
        tiles[4],
    );

    let accuracy = view
        .accuracy_m
        .map_or_else(|| "--".to_string(), |a| format!("{a:.0} m"));
    let status = Paragraph::new(format!("fix accuracy: {accuracy}"))
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(status, chunks[2]);

    render_recent_sessions(f, view, chunks[3]);

    let hints = Paragraph::new("(space) start/pause | (s) finish | (q/esc) quit")
        .style(
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center);
    f.render_widget(hints, chunks[4]);
}

fn render_recent_sessions(f: &mut Frame, view: &SessionView, area: ratatui::layout::Rect) {
    if view.recent.is_empty() {
        let empty = Paragraph::new("No previous sessions.")
            .block(Block::default().borders(Borders::ALL).title("History"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Date"),
        Cell::from("Activity"),
        Cell::from("Duration"),
        Cell::from("km"),
        Cell::from("avg km/h"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = view
        .recent
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.ended_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(s.activity.clone()),
                Cell::from(format::duration(s.duration_ms)),
                Cell::from(format::distance(s.distance_m)),
                Cell::from(format::speed(s.average_speed_mps)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        &[
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(table, area);
}

/// Results screen shown after finishing a session.
pub fn draw_summary(f: &mut Frame, summary: &SessionSummary) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(2),
        ])
        .split(f.area());

    let title = Paragraph::new(format!("{} session finished", summary.activity))
        .block(Block::default().borders(Borders::ALL).title("Results"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let lines = vec![
        Line::from(format!("duration   {}", format::duration(summary.duration_ms))),
        Line::from(format!("distance   {} km", format::distance(summary.distance_m))),
        Line::from(format!(
            "avg speed  {} km/h",
            format::speed(summary.average_speed_mps)
        )),
        Line::from(format!(
            "climb      {} m",
            format::climb(summary.altitude_gain_m, summary.altitude_loss_m)
        )),
    ];
    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(body, chunks[1]);

    let hints = Paragraph::new("(n) new session | (q/esc) quit")
        .style(
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center);
    f.render_widget(hints, chunks[2]);
}
