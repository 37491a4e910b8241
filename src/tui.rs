use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::ai::{analyze_post, AIProvider, AnalysisFailed, ChatCompletionProvider};
use crate::app::{Action, AnalyzerView, App, CatalogView, CopyTarget, Effect, LeaderboardView, LoadState, Screen};
use crate::catalog::{self, Tge};
use crate::clipboard;
use crate::config::Config;
use crate::leaderboard::LeaderboardClient;
use crate::models::LeaderboardEntry;
use crate::table::{self, SortKey};

const TICK: Duration = Duration::from_millis(100);

/// Collaborators the effects run against.
struct Shell {
    handle: Handle,
    leaderboard: Arc<LeaderboardClient>,
    provider: Option<Arc<dyn AIProvider>>,
    config: Config,
    tx: UnboundedSender<Action>,
}

impl Shell {
    /// Run an effect. Async work reports back over the channel; local work
    /// returns its follow-up action directly.
    fn run(&self, effect: Effect) -> Option<Action> {
        match effect {
            Effect::FetchLeaderboard { request, project_id } => {
                let client = Arc::clone(&self.leaderboard);
                let tx = self.tx.clone();
                self.handle.spawn(async move {
                    let board = client.fetch(&project_id).await;
                    let _ = tx.send(Action::LeaderboardLoaded { request, board });
                });
                None
            }
            Effect::AnalyzePost { request, text } => {
                let provider = self.provider.clone();
                let tx = self.tx.clone();
                self.handle.spawn(async move {
                    let result = match provider {
                        Some(provider) => analyze_post(provider.as_ref(), &text).await,
                        None => {
                            log::warn!("[tui] Post analysis requested but no LLM API key is configured");
                            Err(AnalysisFailed)
                        }
                    };
                    let _ = tx.send(Action::AnalysisFinished { request, result });
                });
                None
            }
            Effect::ExportCsv { filename, bytes } => {
                let path = self.config.export_dir.join(&filename);
                let notice = match std::fs::write(&path, &bytes) {
                    Ok(()) => {
                        log::info!("[tui] Exported {} bytes to {}", bytes.len(), path.display());
                        format!("Exported {}", path.display())
                    }
                    Err(e) => {
                        log::error!("[tui] Failed to write {}: {}", path.display(), e);
                        format!("Export failed: {}", e)
                    }
                };
                Some(Action::Notice(notice))
            }
            Effect::CopyText(text) => {
                let notice = match clipboard::copy_to_clipboard(&text) {
                    Ok(()) => "Copied!".to_string(),
                    Err(e) => {
                        log::warn!("[tui] {:#}", e);
                        "Clipboard unavailable".to_string()
                    }
                };
                Some(Action::Notice(notice))
            }
        }
    }
}

pub fn run_dashboard(handle: Handle, config: &Config) -> Result<()> {
    let leaderboard = Arc::new(LeaderboardClient::new(config)?);
    let provider: Option<Arc<dyn AIProvider>> = match ChatCompletionProvider::new(config) {
        Ok(p) => Some(Arc::new(p)),
        Err(e) => {
            log::warn!("[tui] Post analyzer disabled: {:#}", e);
            None
        }
    };
    let (tx, rx) = unbounded_channel();
    let shell = Shell {
        handle,
        leaderboard,
        provider,
        config: config.clone(),
        tx,
    };
    let mut app = App::new(catalog::projects());

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut app, &shell, rx);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn dispatch(app: &mut App, shell: &Shell, action: Action) {
    let mut next = Some(action);
    while let Some(action) = next.take() {
        if let Some(effect) = app.update(action) {
            next = shell.run(effect);
        }
    }
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    shell: &Shell,
    mut rx: UnboundedReceiver<Action>,
) -> Result<()> {
    let mut list_state = ListState::default();
    let mut table_state = TableState::default();

    while !app.should_quit {
        while let Ok(action) = rx.try_recv() {
            dispatch(app, shell, action);
        }

        terminal
            .draw(|frame| draw(frame, app, &mut list_state, &mut table_state))
            .context("Failed to draw dashboard")?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(action) = map_key(app, key) {
                dispatch(app, shell, action);
            }
        }
    }
    Ok(())
}

pub fn map_key(app: &App, key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    match &app.screen {
        Screen::Catalog(_) => match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Tab => Some(Action::OpenAnalyzer),
            KeyCode::Up => Some(Action::CursorUp),
            KeyCode::Down => Some(Action::CursorDown),
            KeyCode::Enter => Some(Action::Confirm),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Char('u') if ctrl => Some(Action::ClearInput),
            KeyCode::Char(c) if !ctrl => Some(Action::InputChar(c)),
            _ => None,
        },
        Screen::Leaderboard(view) if view.searching => match key.code {
            KeyCode::Esc | KeyCode::Enter => Some(Action::EndSearch),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Char('u') if ctrl => Some(Action::ClearInput),
            KeyCode::Char(c) if !ctrl => Some(Action::InputChar(c)),
            _ => None,
        },
        Screen::Leaderboard(view) => match key.code {
            KeyCode::Esc if view.show_query => Some(Action::ToggleQuery),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') => Some(Action::OpenCatalog),
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Tab | KeyCode::Char('p') => Some(Action::OpenAnalyzer),
            KeyCode::Char('/') => Some(Action::StartSearch),
            KeyCode::Char('x') => Some(Action::ClearInput),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::CursorUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::CursorDown),
            KeyCode::Left => Some(Action::ColumnLeft),
            KeyCode::Right => Some(Action::ColumnRight),
            KeyCode::Enter | KeyCode::Char('s') => Some(Action::Confirm),
            KeyCode::Char('g') => Some(Action::ToggleQuery),
            KeyCode::Char('c') => Some(Action::CopyQuery),
            KeyCode::Char('e') => Some(Action::ExportCsv {
                today: chrono::Utc::now().date_naive(),
            }),
            _ => None,
        },
        Screen::PostAnalyzer(_) => match key.code {
            KeyCode::Esc => Some(Action::OpenCatalog),
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => Some(Action::InputChar('\n')),
            KeyCode::Enter => Some(Action::SubmitPost),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Char('l') if ctrl => Some(Action::ClearInput),
            KeyCode::Char('a') if ctrl => Some(Action::CopyAnalysis(CopyTarget::Additions)),
            KeyCode::Char('t') if ctrl => Some(Action::CopyAnalysis(CopyTarget::AfterTweet)),
            KeyCode::Char(c) if !ctrl => Some(Action::InputChar(c)),
            _ => None,
        },
    }
}

fn draw(frame: &mut Frame, app: &App, list_state: &mut ListState, table_state: &mut TableState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    draw_navbar(frame, app, chunks[0]);

    let help = match &app.screen {
        Screen::Catalog(view) => {
            draw_catalog(frame, app, view, chunks[1], list_state);
            " type:search  ↑/↓:select  enter:open  tab:post analyzer  esc:quit"
        }
        Screen::Leaderboard(view) if view.searching => {
            draw_leaderboard(frame, view, chunks[1], table_state);
            " type:filter  ctrl-u:clear  enter/esc:done"
        }
        Screen::Leaderboard(view) => {
            draw_leaderboard(frame, view, chunks[1], table_state);
            " j/k:rows  ←/→:column  s:sort  /:search  g:command  c:copy command  e:export csv  esc:home  q:quit"
        }
        Screen::PostAnalyzer(view) => {
            draw_analyzer(frame, view, chunks[1]);
            " enter:analyze  alt-enter:newline  ctrl-l:clear  ctrl-a:copy additions  ctrl-t:copy after  esc:home"
        }
    };

    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn draw_navbar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        " Yapboard ",
        Style::default().fg(Color::Black).bg(Color::Blue).add_modifier(Modifier::BOLD),
    )];
    let tab = |label: &'static str, active: bool| {
        if active {
            Span::styled(format!(" {} ", label), Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED))
        } else {
            Span::styled(format!(" {} ", label), Style::default().fg(Color::DarkGray))
        }
    };
    spans.push(tab("Projects", !matches!(app.screen, Screen::PostAnalyzer(_))));
    if let Some(project) = app.current_project() {
        spans.push(Span::raw("› "));
        spans.push(Span::styled(project.display_name.clone(), Style::default().fg(Color::Cyan)));
    }
    spans.push(tab("Post Analyzer", matches!(app.screen, Screen::PostAnalyzer(_))));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_catalog(frame: &mut Frame, app: &App, view: &CatalogView, area: Rect, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let search = Paragraph::new(format!("{}▏", view.search)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Search projects "),
    );
    frame.render_widget(search, chunks[0]);

    let visible = view.visible(&app.projects);
    if visible.is_empty() {
        let empty = Paragraph::new("No projects found")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Projects "));
        frame.render_widget(empty, chunks[1]);
        return;
    }

    let items: Vec<ListItem> = visible
        .iter()
        .map(|p| {
            let tge_style = match p.tge {
                Tge::Pre => Style::default().fg(Color::Yellow),
                Tge::Post => Style::default().fg(Color::Green),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<16}", p.display_name), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format!("{:<12}", p.name), Style::default().fg(Color::DarkGray)),
                Span::styled(p.tge.label(), tge_style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Project Analytics Dashboard ({}) ",
            visible.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    list_state.select(Some(view.selected));
    frame.render_stateful_widget(list, chunks[1], list_state);
}

fn rank_style(rank: u32) -> Style {
    match rank {
        1 => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        2 => Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        3 => Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
        _ => Style::default(),
    }
}

fn entry_cells(e: &LeaderboardEntry) -> Vec<Cell<'static>> {
    vec![
        Cell::from(Span::styled(e.rank.to_string(), rank_style(e.rank))),
        Cell::from(e.name.clone()),
        Cell::from(Span::styled(e.username.clone(), Style::default().fg(Color::Cyan))),
        Cell::from(table::format_score(e.community_score)),
        Cell::from(table::format_score(e.mindshare)),
        Cell::from(table::format_compact(e.mention_count)),
        Cell::from(table::format_compact(e.follower_count)),
        Cell::from(table::format_compact(e.smart_follower_count)),
        Cell::from(table::format_score(e.insightfulness_score_7d)),
        Cell::from(table::format_score(e.originality_score_7d)),
        Cell::from(table::format_date(&e.created_at)),
    ]
}

/// One-line detail for the highlighted contributor.
fn entry_detail(e: &LeaderboardEntry) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {} ", e.name), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(e.profile_url(), Style::default().fg(Color::Cyan)),
        Span::styled(format!("  {}", e.bio), Style::default().fg(Color::DarkGray)),
    ])
}

fn draw_leaderboard(frame: &mut Frame, view: &LeaderboardView, area: Rect, table_state: &mut TableState) {
    let title = format!(" {} Leaderboard ", view.project.display_name);
    let board = match &view.load {
        LoadState::Loading => {
            let loading = Paragraph::new("Loading leaderboard data...")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(loading, area);
            return;
        }
        LoadState::Ready(board) => board,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let mut summary = vec![Span::raw(format!(
        " {} contributors · 7-day analytics",
        board.entries.len()
    ))];
    if board.is_synthetic() {
        summary.push(Span::styled(
            "  ⚠ upstream unavailable, showing sample data",
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(notice) = &view.notice {
        summary.push(Span::styled(format!("  {}", notice), Style::default().fg(Color::Green)));
    }
    frame.render_widget(Paragraph::new(Line::from(summary)), chunks[0]);

    let search_style = if view.searching {
        Style::default().fg(Color::Blue)
    } else {
        Style::default()
    };
    let cursor = if view.searching { "▏" } else { "" };
    let search = Paragraph::new(format!("{}{}", view.params.search_term, cursor)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(search_style)
            .title(" Search contributors (/) "),
    );
    frame.render_widget(search, chunks[1]);

    let rows = view.rows();
    if rows.is_empty() {
        let empty = Paragraph::new("No contributors found\nTry adjusting your search terms")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(empty, chunks[2]);
    } else {
        let highlighted = view.highlighted_column();
        let header = Row::new(SortKey::COLUMNS.iter().map(|key| {
            let mut label = key.label().to_string();
            if *key == view.params.sort_key {
                label.push(' ');
                label.push_str(view.params.sort_direction.arrow());
            }
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            if *key == highlighted {
                style = style.bg(Color::Blue).fg(Color::Black);
            }
            Cell::from(label).style(style)
        }));

        let widths = [
            Constraint::Length(6),
            Constraint::Min(14),
            Constraint::Min(14),
            Constraint::Length(17),
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Length(11),
            Constraint::Length(17),
            Constraint::Length(21),
            Constraint::Length(18),
            Constraint::Length(14),
        ];
        let table_rows: Vec<Row> = rows.iter().map(|e| Row::new(entry_cells(e))).collect();
        let table = Table::new(table_rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");

        table_state.select(Some(view.selected));
        frame.render_stateful_widget(table, chunks[2], table_state);
    }

    if let Some(entry) = rows.get(view.selected) {
        frame.render_widget(Paragraph::new(entry_detail(entry)), chunks[3]);
    }

    if view.show_query {
        draw_query_popup(frame, view, rows.len(), area);
    }
}

fn draw_query_popup(frame: &mut Frame, view: &LeaderboardView, count: usize, area: Rect) {
    let popup = centered_rect(70, 50, area);
    let text = vec![
        Line::from(format!(
            "Copy this command to search for tweets from all {} contributors in the last 60 minutes:",
            count
        )),
        Line::from(""),
        Line::from(Span::styled(view.search_query(), Style::default().fg(Color::Green))),
        Line::from(""),
        Line::from(Span::styled(
            view.notice.clone().unwrap_or_else(|| "c:copy  esc:close".to_string()),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Twitter Search Command "));
    frame.render_widget(Clear, popup);
    frame.render_widget(widget, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_analyzer(frame: &mut Frame, view: &AnalyzerView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let input = Paragraph::new(format!("{}▏", view.input))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Paste your X post here "),
        );
    frame.render_widget(input, chunks[0]);

    let status = if view.is_loading() {
        Line::from(Span::styled("Analyzing...", Style::default().fg(Color::Blue)))
    } else if let Some(err) = &view.error {
        Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red)))
    } else if let Some(notice) = &view.notice {
        Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Green)))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(status), chunks[1]);

    let width = chunks[2].width.saturating_sub(6).max(20) as usize;
    let text = match &view.result {
        Some(result) => analysis_text(result, width),
        None => Text::from(Span::styled(
            "Analyze your X (Twitter) post Web3-style. Get feedback, score, and suggestions to improve engagement!",
            Style::default().fg(Color::DarkGray),
        )),
    };
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Kaito Post Analyzer "));
    frame.render_widget(widget, chunks[2]);
}

fn analysis_text(result: &crate::models::PostAnalysis, width: usize) -> Text<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(vec![
        Span::styled("Mention ", bold),
        Span::raw(format!("{}/10   ", result.mention_score)),
        Span::styled("Insightfulness ", bold),
        Span::raw(format!("{}/10   ", result.insightfulness_score)),
        Span::styled("Originality ", bold),
        Span::raw(format!("{}/10", result.originality_score)),
    ]));
    lines.push(Line::from(""));

    let sections: [(&str, &Vec<String>); 4] = [
        ("Suggestions (EN)", &result.suggestions_en),
        ("Saran (ID)", &result.suggestions_id),
        ("Additions (EN)", &result.additions.en),
        ("Tambahan (ID)", &result.additions.id),
    ];
    for (label, items) in sections {
        if items.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(label.to_string(), Style::default().fg(Color::Cyan))));
        for item in items {
            for (i, line) in textwrap::wrap(item, width).iter().enumerate() {
                let bullet = if i == 0 { "  • " } else { "    " };
                lines.push(Line::from(format!("{}{}", bullet, line)));
            }
        }
        lines.push(Line::from(""));
    }

    if !result.after_tweet.is_empty() {
        lines.push(Line::from(Span::styled("After", Style::default().fg(Color::Cyan))));
        for line in textwrap::fill(&result.after_tweet, width).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}
