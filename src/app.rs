//! Dashboard state: one tagged [`Screen`] changed only through
//! [`App::update`]. Side effects are handed back as [`Effect`]s for the
//! terminal shell to run; their results come back in as actions carrying the
//! [`RequestId`] they were issued with, and anything not matching the current
//! screen's request is dropped.

use chrono::NaiveDate;

use crate::ai::{AnalysisFailed, ANALYSIS_FAILED_MESSAGE};
use crate::catalog::{self, Project};
use crate::models::{Leaderboard, LeaderboardEntry, PostAnalysis};
use crate::table::{self, SortKey, ViewParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

/// Which piece of an analysis result to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    Additions,
    AfterTweet,
}

#[derive(Debug, Clone)]
pub enum Action {
    OpenCatalog,
    OpenAnalyzer,
    Quit,

    // text input for whichever field has focus
    InputChar(char),
    Backspace,
    ClearInput,

    CursorUp,
    CursorDown,
    ColumnLeft,
    ColumnRight,
    /// Catalog: open the highlighted project. Leaderboard: sort by highlighted column.
    Confirm,
    SelectProject(Project),
    LeaderboardLoaded {
        request: RequestId,
        board: Leaderboard,
    },

    StartSearch,
    EndSearch,
    ToggleQuery,
    CopyQuery,
    ExportCsv { today: NaiveDate },

    SubmitPost,
    AnalysisFinished {
        request: RequestId,
        result: Result<PostAnalysis, AnalysisFailed>,
    },
    CopyAnalysis(CopyTarget),

    Notice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchLeaderboard { request: RequestId, project_id: String },
    AnalyzePost { request: RequestId, text: String },
    ExportCsv { filename: String, bytes: Vec<u8> },
    CopyText(String),
}

#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    pub search: String,
    pub selected: usize,
}

impl CatalogView {
    pub fn visible<'a>(&self, projects: &'a [Project]) -> Vec<&'a Project> {
        catalog::filter_projects(projects, &self.search)
    }
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Ready(Leaderboard),
}

#[derive(Debug, Clone)]
pub struct LeaderboardView {
    pub project: Project,
    pub request: RequestId,
    pub load: LoadState,
    pub params: ViewParameters,
    pub column: usize,
    pub selected: usize,
    pub searching: bool,
    pub show_query: bool,
    pub notice: Option<String>,
}

impl LeaderboardView {
    pub fn board(&self) -> Option<&Leaderboard> {
        match &self.load {
            LoadState::Ready(board) => Some(board),
            LoadState::Loading => None,
        }
    }

    pub fn rows(&self) -> Vec<&LeaderboardEntry> {
        match self.board() {
            Some(board) => table::view(&board.entries, &self.params),
            None => Vec::new(),
        }
    }

    pub fn highlighted_column(&self) -> SortKey {
        SortKey::COLUMNS[self.column.min(SortKey::COLUMNS.len() - 1)]
    }

    pub fn search_query(&self) -> String {
        table::to_search_query(self.rows())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzerView {
    pub input: String,
    pub in_flight: Option<RequestId>,
    pub result: Option<PostAnalysis>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl AnalyzerView {
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum Screen {
    Catalog(CatalogView),
    Leaderboard(LeaderboardView),
    PostAnalyzer(AnalyzerView),
}

pub struct App {
    pub screen: Screen,
    pub projects: Vec<Project>,
    pub should_quit: bool,
    next_request: u64,
}

impl App {
    pub fn new(projects: Vec<Project>) -> Self {
        Self {
            screen: Screen::Catalog(CatalogView::default()),
            projects,
            should_quit: false,
            next_request: 0,
        }
    }

    fn issue_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    pub fn update(&mut self, action: Action) -> Option<Effect> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                None
            }
            Action::OpenCatalog => {
                self.screen = Screen::Catalog(CatalogView::default());
                None
            }
            Action::OpenAnalyzer => {
                if !matches!(self.screen, Screen::PostAnalyzer(_)) {
                    self.screen = Screen::PostAnalyzer(AnalyzerView::default());
                }
                None
            }
            Action::SelectProject(project) => Some(self.open_leaderboard(project)),
            Action::LeaderboardLoaded { request, board } => {
                if let Screen::Leaderboard(view) = &mut self.screen {
                    if view.request == request {
                        view.load = LoadState::Ready(board);
                        view.selected = 0;
                        return None;
                    }
                }
                log::debug!("[app] Dropping stale leaderboard for {}", board.project_id);
                None
            }
            Action::AnalysisFinished { request, result } => {
                if let Screen::PostAnalyzer(view) = &mut self.screen {
                    if view.in_flight == Some(request) {
                        view.in_flight = None;
                        match result {
                            Ok(analysis) => view.result = Some(analysis),
                            Err(_) => view.error = Some(ANALYSIS_FAILED_MESSAGE.to_string()),
                        }
                        return None;
                    }
                }
                log::debug!("[app] Dropping stale analysis result");
                None
            }
            Action::Notice(text) => {
                match &mut self.screen {
                    Screen::Leaderboard(view) => view.notice = Some(text),
                    Screen::PostAnalyzer(view) => view.notice = Some(text),
                    Screen::Catalog(_) => {}
                }
                None
            }
            other => self.update_screen(other),
        }
    }

    fn open_leaderboard(&mut self, project: Project) -> Effect {
        let request = self.issue_request();
        let project_id = project.name.clone();
        self.screen = Screen::Leaderboard(LeaderboardView {
            project,
            request,
            load: LoadState::Loading,
            params: ViewParameters::default(),
            column: 0,
            selected: 0,
            searching: false,
            show_query: false,
            notice: None,
        });
        Effect::FetchLeaderboard { request, project_id }
    }

    fn update_screen(&mut self, action: Action) -> Option<Effect> {
        let projects = &self.projects;
        let mut open: Option<Project> = None;
        let mut submit: Option<String> = None;

        let effect = match &mut self.screen {
            Screen::Catalog(view) => {
                match action {
                    Action::InputChar(c) => {
                        view.search.push(c);
                        view.selected = 0;
                    }
                    Action::Backspace => {
                        view.search.pop();
                        view.selected = 0;
                    }
                    Action::ClearInput => {
                        view.search.clear();
                        view.selected = 0;
                    }
                    Action::CursorUp => view.selected = view.selected.saturating_sub(1),
                    Action::CursorDown => {
                        let len = view.visible(projects).len();
                        if view.selected + 1 < len {
                            view.selected += 1;
                        }
                    }
                    Action::Confirm => {
                        open = view.visible(projects).get(view.selected).map(|p| (*p).clone());
                    }
                    _ => {}
                }
                None
            }
            Screen::Leaderboard(view) => update_leaderboard(view, action),
            Screen::PostAnalyzer(view) => {
                match action {
                    Action::InputChar(c) => view.input.push(c),
                    Action::Backspace => {
                        view.input.pop();
                    }
                    Action::ClearInput => {
                        view.input.clear();
                        view.result = None;
                        view.error = None;
                    }
                    Action::SubmitPost if !view.is_loading() => {
                        submit = Some(view.input.clone());
                    }
                    Action::CopyAnalysis(target) => {
                        return view.result.as_ref().map(|r| {
                            Effect::CopyText(match target {
                                CopyTarget::Additions => r.additions.en.join("\n"),
                                CopyTarget::AfterTweet => r.after_tweet.clone(),
                            })
                        });
                    }
                    _ => {}
                }
                None
            }
        };

        if let Some(project) = open {
            return self.update(Action::SelectProject(project));
        }
        if let Some(text) = submit {
            let request = self.issue_request();
            if let Screen::PostAnalyzer(view) = &mut self.screen {
                view.in_flight = Some(request);
                view.result = None;
                view.error = None;
                view.notice = None;
            }
            return Some(Effect::AnalyzePost { request, text });
        }
        effect
    }

    pub fn current_project(&self) -> Option<&Project> {
        match &self.screen {
            Screen::Leaderboard(view) => Some(&view.project),
            _ => None,
        }
    }
}

fn update_leaderboard(view: &mut LeaderboardView, action: Action) -> Option<Effect> {
    // a notice lasts until the next key
    view.notice = None;
    if view.searching {
        match action {
            Action::InputChar(c) => view.params.search_term.push(c),
            Action::Backspace => {
                view.params.search_term.pop();
            }
            Action::ClearInput => view.params.search_term.clear(),
            Action::EndSearch | Action::Confirm => view.searching = false,
            _ => return None,
        }
        view.selected = 0;
        return None;
    }

    match action {
        Action::StartSearch => {
            view.searching = true;
            view.show_query = false;
        }
        Action::ClearInput => {
            view.params.search_term.clear();
            view.selected = 0;
        }
        Action::CursorUp => view.selected = view.selected.saturating_sub(1),
        Action::CursorDown => {
            if view.selected + 1 < view.rows().len() {
                view.selected += 1;
            }
        }
        Action::ColumnLeft => view.column = view.column.saturating_sub(1),
        Action::ColumnRight => {
            if view.column + 1 < SortKey::COLUMNS.len() {
                view.column += 1;
            }
        }
        Action::Confirm => {
            let key = view.highlighted_column();
            view.params.toggle_sort(key);
        }
        Action::ToggleQuery => view.show_query = !view.show_query,
        Action::EndSearch => view.show_query = false,
        Action::CopyQuery => {
            view.board()?;
            return Some(Effect::CopyText(view.search_query()));
        }
        Action::ExportCsv { today } => {
            view.board()?;
            let rows = view.rows();
            return match table::to_csv(rows) {
                Ok(bytes) => Some(Effect::ExportCsv {
                    filename: table::csv_filename(&view.project.display_name, today),
                    bytes,
                }),
                Err(e) => {
                    log::error!("[app] CSV export failed: {:#}", e);
                    view.notice = Some("CSV export failed".to_string());
                    None
                }
            };
        }
        _ => {}
    }
    None
}
