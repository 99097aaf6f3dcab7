use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph, Tabs,
        Wrap,
    },
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

use crate::api::{DashboardApi, HttpDashboardApi};
use crate::charts::{RankedTopic, SentimentSlice, TimelinePoint, TopicPolarity};
use crate::fallback::{DataSource, Sourced};
use crate::loader::{Page, PageLoader, PageSession, SnapshotStore};
use crate::models::{Priority, Sentiment, SummaryQuery};
use crate::view::{self, AnalysisView, ImportView, ReportsView, StatCard};

const TICK: Duration = Duration::from_millis(100);

struct AppState {
    page: Page,
    session: PageSession,
    scroll_offset: u16,
    query: SummaryQuery,
    api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    Open(Page),
    Reload,
    ScrollDown,
    ScrollUp,
}

impl AppState {
    fn new(query: SummaryQuery, api_url: String) -> Self {
        Self {
            page: Page::Overview,
            session: PageSession::default(),
            scroll_offset: 0,
            query,
            api_url,
        }
    }

    /// Every visit starts from a fresh session.
    fn open<A: DashboardApi>(&mut self, page: Page, loader: &mut PageLoader<A>) {
        self.page = page;
        self.session = PageSession::default();
        self.scroll_offset = 0;
        let generation = loader.start(page, self.query.clone());
        info!("Opened {} (load generation {})", page.title(), generation);
    }

    fn action_for(&self, key: KeyEvent) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => Some(Action::Open(self.page.next())),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => Some(Action::Open(self.page.prev())),
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                Some(Action::Open(Page::ALL[index]))
            }
            KeyCode::Char('r') => Some(Action::Reload),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::ScrollDown),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::ScrollUp),
            _ => None,
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_dashboard(
    store: &dyn SnapshotStore,
    runtime: Handle,
    api_url: &str,
    query: SummaryQuery,
) -> Result<()> {
    let api = Arc::new(HttpDashboardApi::new(api_url));
    let mut loader = PageLoader::new(api, runtime);
    let mut state = AppState::new(query, api_url.to_string());
    state.open(Page::Overview, &mut loader);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = Terminal::new(CrosstermBackend::new(stdout()))
        .map_err(anyhow::Error::from)
        .and_then(|mut terminal| run_loop(&mut terminal, &mut state, &mut loader, store));

    // Restore terminal
    loader.cancel();
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    loader: &mut PageLoader<HttpDashboardApi>,
    store: &dyn SnapshotStore,
) -> Result<()> {
    loop {
        for update in loader.poll() {
            if update.page == state.page {
                state.session.apply(update.event, store);
            }
        }

        terminal.draw(|frame| draw(frame, state))?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            match state.action_for(key) {
                Some(Action::Quit) => break,
                Some(Action::Open(page)) => state.open(page, loader),
                Some(Action::Reload) => state.open(state.page, loader),
                Some(Action::ScrollDown) => state.scroll_down(),
                Some(Action::ScrollUp) => state.scroll_up(),
                None => {}
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let tabs = Tabs::new(
        Page::ALL
            .iter()
            .enumerate()
            .map(|(i, page)| format!("{} {}", i + 1, page.title())),
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Review Insight | {} | {} ",
        state.api_url,
        view::timeframe(&state.query)
    )))
    .select(state.page.index())
    .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, chunks[0]);

    match state.page {
        Page::Overview => draw_overview(frame, chunks[1], state),
        Page::Import => draw_import(frame, chunks[1], state),
        Page::Analysis => draw_analysis(frame, chunks[1], state),
        Page::Reports => draw_reports(frame, chunks[1], state),
    }

    // Footer help
    let help = Paragraph::new(format!(
        " 1-4/Tab:switch page  r:reload  j/k:scroll  q:quit   [{}]",
        state.session.phase.label()
    ))
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[2]);
}

fn titled(title: String) -> Block<'static> {
    Block::default().borders(Borders::ALL).title(title)
}

fn sourced_title<T>(title: &str, data: &Sourced<T>) -> String {
    sourced_label(title, data.source)
}

fn sourced_label(title: &str, source: DataSource) -> String {
    format!(" {} ({}) ", title, source.label())
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn dim(text: String) -> Line<'static> {
    Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))
}

fn error_lines(errors: &[String]) -> Vec<Line<'static>> {
    errors
        .iter()
        .map(|e| Line::from(Span::styled(format!("! {}", e), Style::default().fg(Color::Red))))
        .collect()
}

/// `#rrggbb` to a terminal colour; anything else renders grey.
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Color::Gray;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

fn sentiment_color(sentiment: Sentiment) -> Color {
    hex_color(sentiment.color())
}

fn polarity_color(polarity: TopicPolarity) -> Color {
    match polarity {
        TopicPolarity::Positive => sentiment_color(Sentiment::Positive),
        TopicPolarity::Negative => sentiment_color(Sentiment::Negative),
        TopicPolarity::Mixed => sentiment_color(Sentiment::Neutral),
    }
}

fn slice_lines(slices: &[SentimentSlice], width: u16) -> Vec<Line<'static>> {
    let bar_room = width.saturating_sub(22) as u32;
    slices
        .iter()
        .map(|slice| {
            let filled = (slice.value.min(100) * bar_room / 100) as usize;
            Line::from(vec![
                Span::raw(format!("{:<9} {:>3}% ", slice.name, slice.value)),
                Span::styled("█".repeat(filled), Style::default().fg(hex_color(&slice.color))),
            ])
        })
        .collect()
}

// --- Overview ---

fn draw_overview(frame: &mut Frame, area: Rect, state: &AppState) {
    let mut lines = vec![
        heading("Understand your customers through their reviews"),
        Line::from(""),
    ];
    lines.push(Line::from(
        view::OVERVIEW_STATS
            .iter()
            .flat_map(|(label, value)| {
                [
                    Span::styled(format!("{} ", value), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                    Span::raw(format!("{}   ", label)),
                ]
            })
            .collect::<Vec<_>>(),
    ));
    lines.push(Line::from(""));

    lines.push(heading("How it works"));
    for step in &view::WORKFLOW {
        lines.push(Line::from(Span::styled(
            format!("  {}. {}", step.number, step.title),
            Style::default().fg(Color::Cyan),
        )));
        lines.push(Line::from(format!("     {}", step.description)));
    }
    lines.push(Line::from(""));

    lines.push(heading("Features"));
    for (title, description) in &view::FEATURES {
        lines.push(Line::from(format!("  * {}: {}", title, description)));
    }

    let widget = Paragraph::new(lines)
        .block(titled(" Overview ".to_string()))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(widget, area);
}

// --- Import ---

fn draw_import(frame: &mut Frame, area: Rect, state: &AppState) {
    let import = ImportView::from_session(&state.session);

    let mut lines = vec![
        Line::from("Upload a CSV, Excel or JSON file of reviews from the command line:"),
        Line::from(Span::styled(
            "  review-insight import <FILE> [--source csv] [--delimiter ,] [--encoding utf-8]",
            Style::default().fg(Color::Cyan),
        )),
        Line::from(""),
        heading("Recent imports"),
    ];
    if import.busy {
        lines.push(dim("  Loading...".to_string()));
    } else if import.batches.value.is_empty() {
        lines.push(dim("  No imports yet".to_string()));
    } else {
        lines.extend(import.batches.value.iter().map(|b| Line::from(format!("  {}", b))));
    }
    lines.push(Line::from(""));
    lines.extend(error_lines(&import.errors));

    let widget = Paragraph::new(lines)
        .block(titled(sourced_title("Import", &import.batches)))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(widget, area);
}

// --- Analysis ---

fn draw_analysis(frame: &mut Frame, area: Rect, state: &AppState) {
    let analysis = AnalysisView::from_session(&state.session);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(if analysis.errors.is_empty() && !analysis.analyzing { 0 } else { 3 }),
            Constraint::Length(4),
            Constraint::Percentage(45),
            Constraint::Min(6),
        ])
        .split(area);

    let mut notice = error_lines(&analysis.errors);
    if analysis.analyzing {
        notice.insert(0, Line::from(Span::styled(view::ANALYZING_NOTICE, Style::default().fg(Color::Yellow))));
    }
    frame.render_widget(Paragraph::new(notice).wrap(Wrap { trim: true }), rows[0]);

    draw_stat_cards(frame, rows[1], &analysis.stats, analysis.stats_source);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[2]);
    let distribution = Paragraph::new(slice_lines(&analysis.slices.value, middle[0].width))
        .block(titled(sourced_title("Sentiment distribution", &analysis.slices)));
    frame.render_widget(distribution, middle[0]);
    draw_timeline(frame, middle[1], &analysis.timeline);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[3]);
    draw_topics(frame, bottom[0], &analysis.topics);

    let mut lists = vec![heading(&sourced_label("Top complaints", analysis.complaints.source))];
    lists.extend(analysis.complaints.value.iter().map(|c| Line::from(format!("  - {}", c))));
    lists.push(Line::from(""));
    lists.push(heading(&sourced_label("Positive aspects", analysis.strengths.source)));
    lists.extend(analysis.strengths.value.iter().map(|s| Line::from(format!("  + {}", s))));
    let widget = Paragraph::new(lists)
        .block(titled(" Feedback ".to_string()))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(widget, bottom[1]);
}

fn draw_stat_cards(frame: &mut Frame, area: Rect, cards: &[StatCard], source: DataSource) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, cards.len().max(1) as u32); cards.len()])
        .split(area);
    for (card, column) in cards.iter().zip(columns.iter()) {
        let widget = Paragraph::new(vec![
            Line::from(Span::styled(
                card.value.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            dim(card.note.to_string()),
        ])
        .block(titled(sourced_label(card.label, source)));
        frame.render_widget(widget, *column);
    }
}

fn draw_timeline(frame: &mut Frame, area: Rect, timeline: &Sourced<Vec<TimelinePoint>>) {
    let block = titled(sourced_title("Sentiment over time", timeline));
    let points = &timeline.value;
    if points.is_empty() {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    }

    let series = |pick: fn(&TimelinePoint) -> u64| -> Vec<(f64, f64)> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, pick(p) as f64))
            .collect()
    };
    let positive = series(|p| p.positive);
    let neutral = series(|p| p.neutral);
    let negative = series(|p| p.negative);

    let y_max = points
        .iter()
        .map(|p| p.positive.max(p.neutral).max(p.negative))
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let x_max = (points.len() - 1).max(1) as f64;
    let first = points.first().map(|p| p.date.clone()).unwrap_or_default();
    let last = points.last().map(|p| p.date.clone()).unwrap_or_default();

    let datasets = [
        (Sentiment::Positive, &positive),
        (Sentiment::Neutral, &neutral),
        (Sentiment::Negative, &negative),
    ]
    .into_iter()
    .map(|(sentiment, data)| {
        Dataset::default()
            .name(sentiment.display_name())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(sentiment_color(sentiment)))
            .data(data)
    })
    .collect::<Vec<_>>();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(vec![Line::from(first), Line::from(last)]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels(vec![Line::from("0"), Line::from(format!("{}", y_max as u64))]),
        );
    frame.render_widget(chart, area);
}

fn draw_topics(frame: &mut Frame, area: Rect, topics: &Sourced<Vec<RankedTopic>>) {
    let bars: Vec<Bar> = topics
        .value
        .iter()
        .map(|topic| {
            Bar::default()
                .value(topic.count)
                .label(Line::from(format!("{} [{}]", topic.name, topic.sentiment.display_name())))
                .style(Style::default().fg(polarity_color(topic.sentiment)))
        })
        .collect();
    let chart = BarChart::default()
        .block(titled(sourced_title("Top topics", topics)))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

// --- Reports ---

fn draw_reports(frame: &mut Frame, area: Rect, state: &AppState) {
    let reports = ReportsView::from_session(&state.session, &state.query);
    let width = area.width.saturating_sub(6).max(20) as usize;

    let mut lines = Vec::new();
    if reports.analyzing {
        lines.push(Line::from(Span::styled(view::ANALYZING_NOTICE, Style::default().fg(Color::Yellow))));
        lines.push(Line::from(""));
    }
    lines.extend(error_lines(&reports.errors));

    let summary = &reports.summary.value;
    lines.push(heading(&sourced_label("Executive summary", reports.summary.source)));
    lines.push(Line::from(format!("  Period:         {}", summary.timeframe)));
    lines.push(Line::from(format!("  Total reviews:  {}", summary.total_reviews)));
    lines.push(Line::from(format!("  Average rating: {}", summary.avg_rating)));
    if !summary.challenges.is_empty() {
        lines.push(Line::from("  Key challenges:"));
        lines.extend(summary.challenges.iter().map(|c| Line::from(format!("    - {}", c))));
    }
    if !summary.strengths.is_empty() {
        lines.push(Line::from("  Strengths:"));
        lines.extend(summary.strengths.iter().map(|s| Line::from(format!("    + {}", s))));
    }
    lines.push(Line::from(""));

    lines.push(heading(&sourced_label("Sentiment health", reports.sentiment_health.source)));
    lines.extend(slice_lines(&reports.sentiment_health.value, area.width.min(80)));
    lines.push(Line::from(""));

    lines.push(heading(&sourced_label("AI recommendations", reports.recommendations.source)));
    for rec in &reports.recommendations.value {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  [{}] ", rec.priority.display_name()),
                Style::default().fg(priority_color(rec.priority)),
            ),
            Span::styled(rec.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
        ]));
        for line in textwrap::fill(&rec.description, width).lines() {
            lines.push(Line::from(format!("    {}", line)));
        }
        if let (Some(impact), Some(effort)) = (&rec.impact, &rec.effort) {
            lines.push(dim(format!("    Impact: {}  Effort: {}", impact, effort)));
        }
    }
    lines.push(Line::from(""));

    lines.push(heading(&sourced_label("Next steps", reports.next_steps.source)));
    for (i, step) in reports.next_steps.value.iter().enumerate() {
        for (j, line) in textwrap::fill(step, width).lines().enumerate() {
            if j == 0 {
                lines.push(Line::from(format!("  {}. {}", i + 1, line)));
            } else {
                lines.push(Line::from(format!("     {}", line)));
            }
        }
    }

    let widget = Paragraph::new(lines)
        .block(titled(" Reports ".to_string()))
        .scroll((state.scroll_offset, 0));
    frame.render_widget(widget, area);
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{query, sample_summary};
    use crate::loader::LoadPhase;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    fn state(page: Page) -> AppState {
        let mut state = AppState::new(query(), "http://localhost:8000".to_string());
        state.page = page;
        state
    }

    fn render(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 50)).unwrap();
        terminal.draw(|frame| draw(frame, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#00b4d8"), Color::Rgb(0x00, 0xb4, 0xd8));
        assert_eq!(hex_color("#0096c7"), Color::Rgb(0x00, 0x96, 0xc7));
        assert_eq!(hex_color("teal"), Color::Gray);
        assert_eq!(hex_color("#zzzzzz"), Color::Gray);
    }

    #[test]
    fn test_key_bindings() {
        let state = state(Page::Overview);
        assert_eq!(state.action_for(press(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(state.action_for(press(KeyCode::Esc)), Some(Action::Quit));
        assert_eq!(state.action_for(press(KeyCode::Tab)), Some(Action::Open(Page::Import)));
        assert_eq!(state.action_for(press(KeyCode::BackTab)), Some(Action::Open(Page::Reports)));
        assert_eq!(state.action_for(press(KeyCode::Char('3'))), Some(Action::Open(Page::Analysis)));
        assert_eq!(state.action_for(press(KeyCode::Char('r'))), Some(Action::Reload));
        assert_eq!(state.action_for(press(KeyCode::Char('j'))), Some(Action::ScrollDown));
        assert_eq!(state.action_for(press(KeyCode::Char('5'))), None);
    }

    #[test]
    fn test_scroll_never_underflows() {
        let mut state = state(Page::Reports);
        state.scroll_up();
        assert_eq!(state.scroll_offset, 0);
        state.scroll_down();
        assert_eq!(state.scroll_offset, 3);
    }

    #[test]
    fn test_overview_renders_static_content() {
        let screen = render(&state(Page::Overview));
        assert!(screen.contains("How it works"));
        assert!(screen.contains("50K+"));
    }

    #[test]
    fn test_analysis_renders_sample_labels_without_data() {
        let mut state = state(Page::Analysis);
        state.session.phase = LoadPhase::Error;
        state.session.errors.push("Failed to load analysis data".to_string());

        let screen = render(&state);
        assert!(screen.contains("Failed to load analysis data"));
        assert!(screen.contains("Sentiment distribution (sample)"));
        assert!(screen.contains("1247"));
    }

    #[test]
    fn test_analysis_renders_live_stats() {
        let mut state = state(Page::Analysis);
        state.session.phase = LoadPhase::Success;
        state.session.live.summary = Some(sample_summary());

        let screen = render(&state);
        assert!(screen.contains("Sentiment distribution (live)"));
        assert!(screen.contains("3.8/5.0"));
    }

    #[test]
    fn test_analyzing_shows_notice_and_placeholders() {
        let mut state = state(Page::Reports);
        state.session.phase = LoadPhase::Analyzing;

        let screen = render(&state);
        assert!(screen.contains("Analysis in progress"));
        assert!(screen.contains(view::PLACEHOLDER));
    }
}
