use std::collections::HashSet;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthStr;

use crate::api::{ApiError, Comment, Item, SortMode, VoteReceipt};
use crate::data::{CommentService, FeedService, InteractionService};
use crate::feed::{FeedIndex, CATEGORIES};
use crate::session;
use crate::thread as comment_thread;
use crate::thread::RenderNode;
use crate::votes::{VoteStore, VoteTarget};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const THREAD_INDENT: &str = "  ";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pane {
    Feed,
    Thread,
}

#[derive(Clone, PartialEq, Eq)]
enum InputMode {
    Search { previous: String },
    Compose { parent_id: Option<String> },
}

struct InputState {
    mode: InputMode,
    buffer: String,
}

struct PendingItems {
    request_id: u64,
}

struct PendingComments {
    request_id: u64,
    item_id: String,
}

enum AsyncResponse {
    Items {
        request_id: u64,
        result: Result<Vec<Item>, ApiError>,
    },
    Comments {
        request_id: u64,
        item_id: String,
        result: Result<Vec<Comment>, ApiError>,
    },
    VoteResult {
        target: VoteTarget,
        result: Result<VoteReceipt, ApiError>,
    },
    CommentPosted {
        item_id: String,
        result: Result<Comment, ApiError>,
    },
    CommentDeleted {
        item_id: String,
        result: Result<(), ApiError>,
    },
}

struct Spinner {
    frame: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            frame: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        if self.last_tick.elapsed() >= Duration::from_millis(120) {
            self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
            self.last_tick = Instant::now();
            return true;
        }
        false
    }
}

pub struct Options {
    pub status_message: String,
    pub feed_service: Arc<dyn FeedService>,
    pub comment_service: Arc<dyn CommentService>,
    pub interaction_service: Arc<dyn InteractionService>,
    pub votes: VoteStore,
    pub session: Arc<session::Manager>,
    pub default_sort: SortMode,
    pub page_size: usize,
    pub fetch_limit: usize,
    pub refresh_interval: Duration,
    pub config_path: String,
}

pub struct Model {
    feed: FeedIndex,
    votes: VoteStore,
    session: Arc<session::Manager>,
    feed_service: Arc<dyn FeedService>,
    comment_service: Arc<dyn CommentService>,
    interaction_service: Arc<dyn InteractionService>,

    focused_pane: Pane,
    selected_item: usize,
    selected_node: usize,
    category_index: usize,
    status_message: String,

    comments: Vec<Comment>,
    nodes: Vec<RenderNode>,
    open_item: Option<String>,
    reply_target: Option<String>,
    input: Option<InputState>,
    confirm_delete: Option<String>,

    pending_items: Option<PendingItems>,
    pending_comments: Option<PendingComments>,
    pending_votes: HashSet<String>,
    pending_post: bool,
    pending_delete: Option<String>,

    last_refresh: Option<Instant>,
    refresh_interval: Duration,
    fetch_limit: usize,

    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    needs_redraw: bool,
    spinner: Spinner,
    config_path: String,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut feed = FeedIndex::new(options.page_size);
        feed.set_sort(options.default_sort);
        Self {
            feed,
            votes: options.votes,
            session: options.session,
            feed_service: options.feed_service,
            comment_service: options.comment_service,
            interaction_service: options.interaction_service,
            focused_pane: Pane::Feed,
            selected_item: 0,
            selected_node: 0,
            category_index: 0,
            status_message: options.status_message,
            comments: Vec::new(),
            nodes: Vec::new(),
            open_item: None,
            reply_target: None,
            input: None,
            confirm_delete: None,
            pending_items: None,
            pending_comments: None,
            pending_votes: HashSet::new(),
            pending_post: false,
            pending_delete: None,
            last_refresh: None,
            refresh_interval: options.refresh_interval,
            fetch_limit: options.fetch_limit.max(1),
            response_tx,
            response_rx,
            next_request_id: 1,
            needs_redraw: true,
            spinner: Spinner::new(),
            config_path: options.config_path,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        self.refresh_items();
        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {err}");
                                self.mark_dirty();
                            }
                        }
                    }
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() && self.spinner.advance() {
                    self.mark_dirty();
                }
                self.maybe_auto_refresh();
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_items.is_some()
            || self.pending_comments.is_some()
            || self.pending_post
            || self.pending_delete.is_some()
            || !self.pending_votes.is_empty()
    }

    fn maybe_auto_refresh(&mut self) {
        if self.refresh_interval.is_zero() || self.pending_items.is_some() {
            return;
        }
        let due = match self.last_refresh {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => false,
        };
        if due {
            self.refresh_items();
            self.mark_dirty();
        }
    }

    fn poll_async(&mut self) -> bool {
        let mut received = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            received = true;
        }
        received
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    fn refresh_items(&mut self) {
        let request_id = self.next_request_id();
        self.pending_items = Some(PendingItems { request_id });
        let service = Arc::clone(&self.feed_service);
        let sort = self.feed.sort();
        let limit = self.fetch_limit;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.list_items(sort, limit);
            let _ = tx.send(AsyncResponse::Items { request_id, result });
        });
        self.status_message = format!("Refreshing feed ({})…", sort.label());
    }

    fn load_comments(&mut self, item_id: String) {
        let request_id = self.next_request_id();
        self.pending_comments = Some(PendingComments {
            request_id,
            item_id: item_id.clone(),
        });
        let service = Arc::clone(&self.comment_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.list_comments(&item_id);
            let _ = tx.send(AsyncResponse::Comments {
                request_id,
                item_id,
                result,
            });
        });
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Items { request_id, result } => {
                let Some(pending) = &self.pending_items else {
                    return;
                };
                // a stale refresh must never overwrite a newer one
                if pending.request_id != request_id {
                    return;
                }
                self.pending_items = None;
                match result {
                    Ok(items) => {
                        self.last_refresh = Some(Instant::now());
                        let count = items.len();
                        self.feed.replace_items(items);
                        self.clamp_feed_selection();
                        self.status_message = format!("Loaded {count} papers.");
                    }
                    Err(err) => {
                        self.status_message = describe_error("load the feed", &err);
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::Comments {
                request_id,
                item_id,
                result,
            } => {
                let Some(pending) = &self.pending_comments else {
                    return;
                };
                if pending.request_id != request_id || pending.item_id != item_id {
                    return;
                }
                if self.open_item.as_deref() != Some(item_id.as_str()) {
                    return;
                }
                self.pending_comments = None;
                match result {
                    Ok(comments) => {
                        self.comments = comment_thread::flatten(&comments);
                        // comment counts reconcile from the fetched thread,
                        // not from a local increment
                        self.feed
                            .apply_comment_count(&item_id, self.comments.len() as i64);
                        self.rebuild_nodes();
                        self.clamp_thread_selection();
                        self.status_message = format!("{} comments.", self.comments.len());
                    }
                    Err(err) => {
                        self.comments.clear();
                        self.nodes.clear();
                        self.status_message = describe_error("load comments", &err);
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::VoteResult { target, result } => {
                self.pending_votes.remove(&target.key());
                match result {
                    Ok(receipt) => {
                        if let Err(err) = self.votes.apply(&target, &receipt) {
                            self.status_message = format!("Vote recorded but not persisted: {err}");
                        } else {
                            self.status_message = if receipt.user_voted {
                                "Vote recorded.".to_string()
                            } else {
                                "Vote removed.".to_string()
                            };
                        }
                        match &target {
                            VoteTarget::Item(id) => {
                                self.feed.apply_vote_count(id, receipt.vote_count);
                            }
                            VoteTarget::Comment(id) => {
                                if let Some(comment) =
                                    self.comments.iter_mut().find(|comment| comment.id == *id)
                                {
                                    comment.vote_count = receipt.vote_count.max(0);
                                }
                                self.rebuild_nodes();
                            }
                        }
                    }
                    Err(err) => {
                        self.status_message = describe_error("vote", &err);
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::CommentPosted { item_id, result } => {
                self.pending_post = false;
                match result {
                    Ok(_) => {
                        self.reply_target = None;
                        self.input = None;
                        self.status_message = "Comment posted.".to_string();
                        if self.open_item.as_deref() == Some(item_id.as_str()) {
                            self.load_comments(item_id);
                        }
                    }
                    Err(err) => {
                        self.status_message = describe_error("post the comment", &err);
                    }
                }
                self.mark_dirty();
            }
            AsyncResponse::CommentDeleted { item_id, result } => {
                self.pending_delete = None;
                match result {
                    Ok(()) => {
                        self.status_message = "Comment deleted.".to_string();
                        if self.open_item.as_deref() == Some(item_id.as_str()) {
                            self.load_comments(item_id);
                        }
                    }
                    Err(err) => {
                        self.status_message = describe_error("delete the comment", &err);
                    }
                }
                self.mark_dirty();
            }
        }
    }

    fn rebuild_nodes(&mut self) {
        let viewer = self.session.username();
        self.nodes = comment_thread::build(
            &self.comments,
            self.reply_target.as_deref(),
            viewer.as_deref(),
        );
    }

    fn clamp_feed_selection(&mut self) {
        let len = self.visible_len();
        if self.selected_item >= len {
            self.selected_item = len.saturating_sub(1);
        }
    }

    fn clamp_thread_selection(&mut self) {
        if self.selected_node >= self.nodes.len() {
            self.selected_node = self.nodes.len().saturating_sub(1);
        }
    }

    fn visible_len(&self) -> usize {
        self.feed.visible_items(Utc::now()).len()
    }

    fn selected_item_id(&self) -> Option<String> {
        self.feed
            .visible_items(Utc::now())
            .get(self.selected_item)
            .map(|item| item.id.clone())
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.input.is_some() {
            self.handle_input_key(code);
            return Ok(false);
        }
        if let Some(comment_id) = self.confirm_delete.take() {
            if code == KeyCode::Char('y') {
                self.dispatch_delete(comment_id);
            } else {
                self.status_message = "Delete cancelled.".to_string();
            }
            self.mark_dirty();
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('R') => self.refresh_items(),
            KeyCode::Char('1') => self.change_sort(SortMode::Hot),
            KeyCode::Char('2') => self.change_sort(SortMode::New),
            KeyCode::Char('3') => self.change_sort(SortMode::Discussed),
            KeyCode::Char('c') => self.cycle_category(),
            KeyCode::Char('/') => self.open_search(),
            KeyCode::Char('n') => self.load_more(),
            KeyCode::Char('v') => self.vote_selected(),
            KeyCode::Char('o') => self.open_selected_link(),
            KeyCode::Enter => self.open_comments(),
            KeyCode::Char('a') => self.open_compose(None),
            KeyCode::Char('r') => self.open_reply(),
            KeyCode::Char('d') => self.request_delete(),
            KeyCode::Esc | KeyCode::Char('h') => self.close_thread(),
            KeyCode::Char('l') | KeyCode::Tab => self.switch_pane(),
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                if let Some(input) = self.input.take() {
                    match input.mode {
                        InputMode::Search { previous } => {
                            self.feed.set_search(previous);
                            self.clamp_feed_selection();
                        }
                        InputMode::Compose { .. } => {
                            self.reply_target = None;
                            self.rebuild_nodes();
                        }
                    }
                }
            }
            KeyCode::Enter => {
                let action = self
                    .input
                    .as_ref()
                    .map(|input| (input.mode.clone(), input.buffer.clone()));
                match action {
                    Some((InputMode::Search { .. }, buffer)) => {
                        self.input = None;
                        self.feed.set_search(buffer);
                        self.clamp_feed_selection();
                    }
                    Some((InputMode::Compose { parent_id }, buffer)) => {
                        // submit_comment closes the editor only once it
                        // actually dispatches; rejected input stays editable
                        self.submit_comment(buffer, parent_id);
                    }
                    None => {}
                }
            }
            KeyCode::Backspace => {
                let live_search = match self.input.as_mut() {
                    Some(input) => {
                        input.buffer.pop();
                        matches!(input.mode, InputMode::Search { .. })
                            .then(|| input.buffer.clone())
                    }
                    None => None,
                };
                if let Some(buffer) = live_search {
                    self.feed.set_search(buffer);
                    self.clamp_feed_selection();
                }
            }
            KeyCode::Char(ch) => {
                let live_search = match self.input.as_mut() {
                    Some(input) => {
                        input.buffer.push(ch);
                        matches!(input.mode, InputMode::Search { .. })
                            .then(|| input.buffer.clone())
                    }
                    None => None,
                };
                if let Some(buffer) = live_search {
                    self.feed.set_search(buffer);
                    self.clamp_feed_selection();
                }
            }
            _ => {}
        }
        self.mark_dirty();
    }

    fn move_selection(&mut self, delta: i32) {
        match self.focused_pane {
            Pane::Feed => {
                let len = self.visible_len() as i32;
                if len == 0 {
                    return;
                }
                let next = (self.selected_item as i32 + delta).clamp(0, len - 1);
                self.selected_item = next as usize;
            }
            Pane::Thread => {
                let len = self.nodes.len() as i32;
                if len == 0 {
                    return;
                }
                let next = (self.selected_node as i32 + delta).clamp(0, len - 1);
                self.selected_node = next as usize;
            }
        }
    }

    fn change_sort(&mut self, sort: SortMode) {
        if self.feed.sort() != sort {
            self.feed.set_sort(sort);
            self.clamp_feed_selection();
            self.status_message = format!("Sorted by {}.", sort.label());
        }
    }

    fn cycle_category(&mut self) {
        self.category_index = (self.category_index + 1) % CATEGORIES.len();
        let (id, name) = CATEGORIES[self.category_index];
        self.feed.set_category(id);
        self.clamp_feed_selection();
        self.status_message = format!("Category: {name}.");
    }

    fn open_search(&mut self) {
        self.input = Some(InputState {
            mode: InputMode::Search {
                previous: self.feed.search().to_string(),
            },
            buffer: self.feed.search().to_string(),
        });
    }

    fn load_more(&mut self) {
        let now = Utc::now();
        if self.feed.has_more(now) {
            self.feed.load_more();
            self.status_message = format!(
                "Showing {} of {} papers.",
                self.feed.visible_items(now).len(),
                self.feed.filtered_len(now)
            );
        } else {
            self.status_message = "No more papers for this view.".to_string();
        }
    }

    fn vote_selected(&mut self) {
        let target = match self.focused_pane {
            Pane::Feed => match self.selected_item_id() {
                Some(id) => VoteTarget::Item(id),
                None => {
                    self.status_message = "No paper selected to vote on.".to_string();
                    return;
                }
            },
            Pane::Thread => match self.nodes.get(self.selected_node) {
                Some(node) => VoteTarget::Comment(node.comment.id.clone()),
                None => {
                    self.status_message = "No comment selected to vote on.".to_string();
                    return;
                }
            },
        };
        let key = target.key();
        // one outstanding toggle per target; repeat presses are ignored
        if self.pending_votes.contains(&key) {
            self.status_message = "Vote already in flight for this target.".to_string();
            return;
        }
        self.pending_votes.insert(key);
        let service = Arc::clone(&self.interaction_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = match &target {
                VoteTarget::Item(id) => service.vote_item(id),
                VoteTarget::Comment(id) => service.vote_comment(id),
            };
            let _ = tx.send(AsyncResponse::VoteResult { target, result });
        });
        self.status_message = "Voting…".to_string();
    }

    fn open_selected_link(&mut self) {
        let Some(id) = self.selected_item_id() else {
            return;
        };
        let Some(item) = self.feed.item(&id) else {
            return;
        };
        if item.url.is_empty() {
            self.status_message = "No link for this paper.".to_string();
            return;
        }
        match webbrowser::open(&item.url) {
            Ok(()) => self.status_message = format!("Opened {}.", item.url),
            Err(err) => self.status_message = format!("Failed to open link: {err}"),
        }
    }

    fn open_comments(&mut self) {
        if self.focused_pane == Pane::Thread {
            return;
        }
        let Some(id) = self.selected_item_id() else {
            return;
        };
        self.focused_pane = Pane::Thread;
        self.selected_node = 0;
        self.reply_target = None;
        self.comments.clear();
        self.nodes.clear();
        self.open_item = Some(id.clone());
        self.load_comments(id);
    }

    fn close_thread(&mut self) {
        if self.focused_pane == Pane::Thread {
            self.focused_pane = Pane::Feed;
            self.open_item = None;
            self.reply_target = None;
            self.comments.clear();
            self.nodes.clear();
            self.pending_comments = None;
        }
    }

    fn switch_pane(&mut self) {
        if self.open_item.is_some() {
            self.focused_pane = match self.focused_pane {
                Pane::Feed => Pane::Thread,
                Pane::Thread => Pane::Feed,
            };
        }
    }

    fn open_compose(&mut self, parent_id: Option<String>) {
        if self.open_item.is_none() {
            self.status_message = "Open a paper before commenting.".to_string();
            return;
        }
        self.reply_target = parent_id.clone();
        self.rebuild_nodes();
        self.input = Some(InputState {
            mode: InputMode::Compose { parent_id },
            buffer: String::new(),
        });
    }

    fn open_reply(&mut self) {
        if self.focused_pane != Pane::Thread {
            return;
        }
        let Some(node) = self.nodes.get(self.selected_node) else {
            return;
        };
        // a single shared reply target: opening a reply here closes any
        // reply form open elsewhere in the tree
        let parent_id = node.comment.id.clone();
        self.open_compose(Some(parent_id));
    }

    fn submit_comment(&mut self, body: String, parent_id: Option<String>) {
        if self.session.current().is_none() {
            self.status_message =
                "Login required to comment (set session credentials in the config).".to_string();
            return;
        }
        if body.trim().is_empty() {
            self.status_message = "Comment body is required.".to_string();
            return;
        }
        let Some(item_id) = self.open_item.clone() else {
            return;
        };
        self.input = None;
        self.pending_post = true;
        let service = Arc::clone(&self.interaction_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.post_comment(&item_id, &body, parent_id.as_deref());
            let _ = tx.send(AsyncResponse::CommentPosted { item_id, result });
        });
        self.status_message = "Posting comment…".to_string();
    }

    fn request_delete(&mut self) {
        if self.focused_pane != Pane::Thread {
            return;
        }
        let Some(node) = self.nodes.get(self.selected_node) else {
            return;
        };
        if !node.can_delete {
            self.status_message = if self.session.current().is_none() {
                "Login required to delete comments.".to_string()
            } else {
                "Only your own comments can be deleted.".to_string()
            };
            return;
        }
        self.confirm_delete = Some(node.comment.id.clone());
        self.status_message = "Delete this comment? Press y to confirm.".to_string();
    }

    fn dispatch_delete(&mut self, comment_id: String) {
        let Some(item_id) = self.open_item.clone() else {
            return;
        };
        self.pending_delete = Some(comment_id.clone());
        let service = Arc::clone(&self.interaction_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.delete_comment(&comment_id);
            let _ = tx.send(AsyncResponse::CommentDeleted { item_id, result });
        });
        self.status_message = "Deleting comment…".to_string();
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.size());

        self.draw_header(frame, chunks[0]);

        if self.open_item.is_some() {
            let panes = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(chunks[1]);
            self.draw_feed(frame, panes[0]);
            self.draw_thread(frame, panes[1]);
        } else {
            self.draw_feed(frame, chunks[1]);
        }

        self.draw_status(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let (_, category_name) = CATEGORIES[self.category_index];
        let mut spans = vec![
            Span::styled("AN-TUI", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
        ];
        for sort in [SortMode::Hot, SortMode::New, SortMode::Discussed] {
            let style = if self.feed.sort() == sort {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(sort.label(), style));
            spans.push(Span::raw(" "));
        }
        spans.push(Span::raw(format!(" category: {category_name}")));
        if !self.feed.search().is_empty() {
            spans.push(Span::raw(format!("  search: {}", self.feed.search())));
        }
        if self.is_loading() {
            spans.push(Span::raw(format!("  {}", self.spinner.frame())));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_feed(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let now = Utc::now();
        let width = area.width.saturating_sub(2) as usize;
        let visible = self.feed.visible_items(now);
        let mut rows: Vec<ListItem> = Vec::with_capacity(visible.len() + 1);
        for item in &visible {
            rows.push(feed_row(
                item,
                self.votes.has_voted(&VoteTarget::Item(item.id.clone())),
                width,
                now,
            ));
        }
        let has_more = self.feed.has_more(now);
        drop(visible);
        if has_more {
            rows.push(ListItem::new(Line::from(Span::styled(
                "… press n for more",
                Style::default().fg(Color::DarkGray),
            ))));
        }

        let border_style = if self.focused_pane == Pane::Feed {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let list = List::new(rows)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title("Papers"),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        if self.visible_len() > 0 {
            state.select(Some(self.selected_item));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_thread(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let border_style = if self.focused_pane == Pane::Thread {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let title = self
            .open_item
            .as_deref()
            .and_then(|id| self.feed.item(id))
            .map(|item| truncate_to_width(&item.title, area.width.saturating_sub(4) as usize))
            .unwrap_or_else(|| "Comments".to_string());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);

        let compose_height = if matches!(
            self.input.as_ref().map(|input| &input.mode),
            Some(InputMode::Compose { .. })
        ) {
            3
        } else {
            0
        };
        let inner_area = if compose_height > 0 {
            let halves = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(compose_height)])
                .split(area);
            self.draw_compose(frame, halves[1]);
            halves[0]
        } else {
            area
        };

        if self.nodes.is_empty() {
            let message = if self.pending_comments.is_some() {
                format!("{} Loading comments…", self.spinner.frame())
            } else {
                "No comments yet.".to_string()
            };
            frame.render_widget(
                Paragraph::new(message).block(block).wrap(Wrap { trim: true }),
                inner_area,
            );
            return;
        }

        let width = inner_area.width.saturating_sub(2) as usize;
        let now = Utc::now();
        let rows: Vec<ListItem> = self
            .nodes
            .iter()
            .map(|node| {
                thread_row(
                    node,
                    self.votes
                        .has_voted(&VoteTarget::Comment(node.comment.id.clone())),
                    width,
                    now,
                )
            })
            .collect();
        let list = List::new(rows)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        state.select(Some(self.selected_node.min(self.nodes.len() - 1)));
        frame.render_stateful_widget(list, inner_area, &mut state);
    }

    fn draw_compose(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(input) = self.input.as_ref() else {
            return;
        };
        let title = match &input.mode {
            InputMode::Compose {
                parent_id: Some(parent),
            } => {
                let author = self
                    .nodes
                    .iter()
                    .find(|node| node.comment.id == *parent)
                    .map(|node| node.comment.author.clone())
                    .unwrap_or_default();
                format!("Reply to {author} (Enter sends, Esc cancels)")
            }
            _ => "New comment (Enter sends, Esc cancels)".to_string(),
        };
        frame.render_widget(
            Paragraph::new(input.buffer.as_str())
                .block(Block::default().borders(Borders::ALL).title(title))
                .wrap(Wrap { trim: false }),
            area,
        );
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let text = if let Some(input) = self.input.as_ref() {
            match &input.mode {
                InputMode::Search { .. } => format!("search: {}▏", input.buffer),
                InputMode::Compose { .. } => self.status_message.clone(),
            }
        } else {
            self.status_message.clone()
        };
        let hint = match self.session.username() {
            Some(username) => format!(" {username} · {}", self.config_path),
            None => format!(" anonymous · {}", self.config_path),
        };
        let hint_width = hint.width();
        let available = (area.width as usize).saturating_sub(hint_width);
        let line = Line::from(vec![
            Span::raw(truncate_to_width(&text, available)),
            Span::styled(hint, Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(Color::Black)),
            area,
        );
    }
}

fn feed_row(item: &Item, voted: bool, width: usize, now: DateTime<Utc>) -> ListItem<'static> {
    let marker = if voted { "▲" } else { "△" };
    let marker_style = if voted {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title_width = width.saturating_sub(12);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{marker} {:>3} ", item.vote_count), marker_style),
        Span::styled(
            truncate_to_width(&item.title, title_width),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ])];
    let byline = format!(
        "      {} · {} · {} comments",
        short_authors(&item.authors),
        time_ago(now, item.created_at),
        item.comment_count
    );
    lines.push(Line::from(Span::styled(
        truncate_to_width(&byline, width),
        Style::default().fg(Color::DarkGray),
    )));
    ListItem::new(lines)
}

fn thread_row(node: &RenderNode, voted: bool, width: usize, now: DateTime<Utc>) -> ListItem<'static> {
    let indent = THREAD_INDENT.repeat(node.depth.min(24));
    let marker = if voted { "▲" } else { "△" };
    let mut header = format!(
        "{indent}{marker} {} {} · {} points · {}",
        node.label,
        node.comment.author,
        node.comment.vote_count,
        time_ago(now, node.comment.created_at)
    );
    if let Some(parent_author) = &node.in_reply_to {
        header.push_str(&format!(" · re: {parent_author}"));
    }
    if node.replying {
        header.push_str(" · replying…");
    }
    let mut lines = vec![Line::from(Span::styled(
        truncate_to_width(&header, width),
        Style::default().fg(Color::Cyan),
    ))];

    let body_indent = format!("{indent}{THREAD_INDENT}");
    let body_width = width.saturating_sub(body_indent.width()).max(16);
    for wrapped in textwrap::wrap(node.comment.body.trim(), body_width) {
        lines.push(Line::from(format!("{body_indent}{wrapped}")));
    }
    ListItem::new(lines)
}

fn describe_error(action: &str, err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized => {
            "Login required (set session.username and session.token in the config).".to_string()
        }
        ApiError::Forbidden(_) => "Only your own comments can be deleted.".to_string(),
        ApiError::Validation(message) => message.clone(),
        ApiError::Network(_) => {
            format!("Network error while trying to {action}; press R to retry.")
        }
        ApiError::Api { status, .. } => {
            format!("Board error {status} while trying to {action}; press R to retry.")
        }
    }
}

fn short_authors(authors: &[String]) -> String {
    match authors.len() {
        0 => "unknown".to_string(),
        1 => authors[0].clone(),
        2 => format!("{}, {}", authors[0], authors[1]),
        _ => format!("{} et al.", authors[0]),
    }
}

fn time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let hours = now.signed_duration_since(then).num_hours();
    if hours < 1 {
        return "just now".to_string();
    }
    if hours < 24 {
        return format!("{hours} hours ago");
    }
    let days = hours / 24;
    if days < 30 {
        return format!("{days} days ago");
    }
    format!("{} months ago", days / 30)
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let ellipsis = "…";
    let mut out = String::new();
    let budget = max_width.saturating_sub(ellipsis.width());
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = ch.to_string().width();
        if used + ch_width > budget {
            break;
        }
        used += ch_width;
        out.push(ch);
    }
    out.push_str(ellipsis);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn time_ago_matches_the_board_phrasing() {
        let now = Utc::now();
        assert_eq!(time_ago(now, now - ChronoDuration::minutes(10)), "just now");
        assert_eq!(time_ago(now, now - ChronoDuration::hours(5)), "5 hours ago");
        assert_eq!(time_ago(now, now - ChronoDuration::days(3)), "3 days ago");
        assert_eq!(
            time_ago(now, now - ChronoDuration::days(90)),
            "3 months ago"
        );
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        let truncated = truncate_to_width("a very long title indeed", 10);
        assert!(truncated.width() <= 10);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn short_authors_summarizes_long_lists() {
        assert_eq!(short_authors(&[]), "unknown");
        assert_eq!(short_authors(&["Ada".into()]), "Ada");
        assert_eq!(
            short_authors(&["Ada".into(), "Alan".into(), "Grace".into()]),
            "Ada et al."
        );
    }

    #[test]
    fn unauthorized_errors_point_at_login() {
        let message = describe_error("vote", &ApiError::Unauthorized);
        assert!(message.contains("Login required"));
        let forbidden = describe_error("delete the comment", &ApiError::Forbidden("x".into()));
        assert!(forbidden.contains("your own comments"));
    }
}
