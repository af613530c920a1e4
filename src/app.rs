use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::api::{Group, GroupService, Id, Member, TagGroupSummary};
use crate::error::{ApiError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    GroupList,
    GroupDetail { chat_id: Id, title: String },
}

/// Which box in the group detail screen receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Members,
    TagGroups,
    NameInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
    Alert(String),
}

/// Result of a background request, delivered back to the UI loop.
///
/// Loads carry the sequence number they were issued under so a response that
/// lost the race to a newer request (or to navigation) is dropped.
#[derive(Debug)]
pub enum AppEvent {
    GroupsLoaded {
        seq: u64,
        result: Result<Vec<Group>, ApiError>,
    },
    MembersLoaded {
        chat_id: Id,
        seq: u64,
        result: Result<Vec<Member>, ApiError>,
    },
    TagGroupsLoaded {
        chat_id: Id,
        seq: u64,
        result: Result<Vec<TagGroupSummary>, ApiError>,
    },
    TagGroupCreated {
        chat_id: Id,
        name: String,
        result: Result<(), ApiError>,
    },
    Triggered {
        chat_id: Id,
        tag_name: String,
        result: Result<(), ApiError>,
    },
}

/// One fetched list plus its load bookkeeping
#[derive(Debug)]
pub struct Panel<T> {
    pub items: Option<Vec<T>>,
    pub loading: bool,
    pub error: Option<String>,
    pub cursor: usize,
    seq: u64,
}

impl<T> Default for Panel<T> {
    fn default() -> Self {
        Self {
            items: None,
            loading: false,
            error: None,
            cursor: 0,
            seq: 0,
        }
    }
}

impl<T> Panel<T> {
    /// Start a load; the returned number identifies it
    fn begin(&mut self) -> u64 {
        self.seq += 1;
        self.loading = true;
        self.error = None;
        self.seq
    }

    /// Drop content and invalidate anything in flight
    fn reset(&mut self) {
        self.seq += 1;
        self.items = None;
        self.loading = false;
        self.error = None;
        self.cursor = 0;
    }

    fn accepts(&self, seq: u64) -> bool {
        seq == self.seq
    }

    /// Store a finished load. On failure the previous items stay.
    fn finish(&mut self, result: Result<Vec<T>, ApiError>) -> Result<(), ApiError> {
        self.loading = false;
        match result {
            Ok(items) => {
                self.cursor = self.cursor.min(items.len().saturating_sub(1));
                self.items = Some(items);
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn items(&self) -> &[T] {
        self.items.as_deref().unwrap_or(&[])
    }

    pub fn current(&self) -> Option<&T> {
        self.items().get(self.cursor)
    }

    pub fn is_settled(&self) -> bool {
        !self.loading && (self.items.is_some() || self.error.is_some())
    }

    fn move_down(&mut self) {
        let len = self.items().len();
        if len > 0 {
            self.cursor = (self.cursor + 1) % len;
        }
    }

    fn move_up(&mut self) {
        let len = self.items().len();
        if len > 0 {
            self.cursor = self.cursor.checked_sub(1).unwrap_or(len - 1);
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub status_timeout: Duration,
    pub notifications: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            status_timeout: Duration::from_secs(3),
            notifications: false,
        }
    }
}

/// Trim and check a tag group submission, returning the name to send
pub fn validate_tag_group(name: &str, selection: &BTreeSet<Id>) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if selection.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    Ok(name.to_string())
}

pub struct App {
    pub screen: Screen,
    pub focus: Focus,
    pub popup: Popup,

    pub groups: Panel<Group>,
    pub members: Panel<Member>,
    pub tag_groups: Panel<TagGroupSummary>,

    /// Always a subset of the truthy ids in `members`
    pub selection: BTreeSet<Id>,

    pub name_input: String,
    /// Chat with a create request in flight
    pub create_pending: Option<Id>,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    options: AppOptions,
    service: Arc<dyn GroupService>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(service: Arc<dyn GroupService>, options: AppOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            screen: Screen::GroupList,
            focus: Focus::Members,
            popup: Popup::None,

            groups: Panel::default(),
            members: Panel::default(),
            tag_groups: Panel::default(),
            selection: BTreeSet::new(),

            name_input: String::new(),
            create_pending: None,

            status_message: None,
            status_message_time: None,

            options,
            service,
            events_tx,
            events_rx,
        }
    }

    /// Set a status message (auto-clears after the configured timeout)
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    fn alert(&mut self, msg: impl Into<String>) {
        self.popup = Popup::Alert(msg.into());
    }

    pub fn current_chat(&self) -> Option<&Id> {
        match &self.screen {
            Screen::GroupDetail { chat_id, .. } => Some(chat_id),
            Screen::GroupList => None,
        }
    }

    fn is_current(&self, chat_id: &Id) -> bool {
        self.current_chat() == Some(chat_id)
    }

    /// Both detail panels have resolved, successfully or not
    pub fn is_ready(&self) -> bool {
        self.current_chat().is_some() && self.members.is_settled() && self.tag_groups.is_settled()
    }

    /// A create for the open group has not come back yet
    pub fn is_create_pending(&self) -> bool {
        self.current_chat().is_some() && self.create_pending.as_ref() == self.current_chat()
    }

    pub fn is_editing(&self) -> bool {
        self.current_chat().is_some() && self.focus == Focus::NameInput && self.popup == Popup::None
    }

    /// Run `request` in the background and feed its outcome back as an event
    fn spawn<F>(&self, request: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            // The receiver lives as long as the app; a send error means we're shutting down
            let _ = tx.send(request.await);
        });
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub fn load_groups(&mut self) {
        let seq = self.groups.begin();
        let service = self.service.clone();
        tracing::info!("Loading groups");
        self.spawn(async move {
            let result = service.list_groups().await;
            AppEvent::GroupsLoaded { seq, result }
        });
    }

    pub fn open_group(&mut self, chat_id: Id, title: String) {
        tracing::info!(chat_id = %chat_id, "Opening group");
        self.screen = Screen::GroupDetail {
            chat_id: chat_id.clone(),
            title,
        };
        self.focus = Focus::Members;
        self.selection.clear();
        self.name_input.clear();
        self.members.reset();
        self.tag_groups.reset();

        // Independent loads, either may land first
        self.load_tag_groups(chat_id.clone());
        self.load_members(chat_id);
    }

    pub fn load_tag_groups(&mut self, chat_id: Id) {
        let seq = self.tag_groups.begin();
        let service = self.service.clone();
        self.spawn(async move {
            let result = service.list_tag_groups(&chat_id).await;
            AppEvent::TagGroupsLoaded { chat_id, seq, result }
        });
    }

    pub fn load_members(&mut self, chat_id: Id) {
        let seq = self.members.begin();
        let service = self.service.clone();
        self.spawn(async move {
            let result = service.list_members(&chat_id).await;
            AppEvent::MembersLoaded { chat_id, seq, result }
        });
    }

    /// Flip `id` in the selection. Ids not in the loaded member list are ignored.
    pub fn toggle_member(&mut self, id: &Id) {
        let known = self.members.items().iter().any(|m| m.id.as_ref() == Some(id));
        if !known {
            return;
        }
        if !self.selection.remove(id) {
            self.selection.insert(id.clone());
        }
    }

    pub fn toggle_select_all(&mut self) {
        let selectable: BTreeSet<Id> = self
            .members
            .items()
            .iter()
            .filter_map(|m| m.id.clone())
            .collect();

        if self.selection.len() == selectable.len() {
            self.selection.clear();
        } else {
            self.selection = selectable;
        }
    }

    pub fn create_tag_group(&mut self) -> Result<(), ValidationError> {
        let chat_id = self.current_chat().cloned().ok_or(ValidationError::NoGroupOpen)?;
        let name = match validate_tag_group(&self.name_input, &self.selection) {
            Ok(name) => name,
            Err(e) => {
                tracing::info!("Tag group rejected: {}", e);
                self.alert(e.to_string());
                return Err(e);
            }
        };
        if self.is_create_pending() {
            self.set_status("Still saving the previous tag group...");
            return Ok(());
        }

        let members: Vec<Id> = self.selection.iter().cloned().collect();
        tracing::info!(chat_id = %chat_id, name = %name, count = members.len(), "Creating tag group");
        self.create_pending = Some(chat_id.clone());
        self.set_status(format!("Saving {}...", name));

        let service = self.service.clone();
        self.spawn(async move {
            let result = service.create_tag_group(&chat_id, &name, &members).await;
            AppEvent::TagGroupCreated { chat_id, name, result }
        });
        Ok(())
    }

    pub fn trigger_tag(&mut self, tag_name: String) {
        let Some(chat_id) = self.current_chat().cloned() else {
            return;
        };
        tracing::info!(chat_id = %chat_id, tag = %tag_name, "Triggering tag group");
        self.set_status(format!("Triggering {}...", tag_name));

        let service = self.service.clone();
        self.spawn(async move {
            let result = service.trigger(&chat_id, &tag_name).await;
            AppEvent::Triggered { chat_id, tag_name, result }
        });
    }

    pub fn back(&mut self) {
        self.screen = Screen::GroupList;
        self.focus = Focus::Members;
        self.selection.clear();
        self.name_input.clear();
        self.members.reset();
        self.tag_groups.reset();
    }

    // ------------------------------------------------------------------
    // Background results
    // ------------------------------------------------------------------

    #[cfg(test)]
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events_rx.recv().await
    }

    /// Apply every result that has arrived so far without waiting
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::GroupsLoaded { seq, result } => {
                if !self.groups.accepts(seq) {
                    return;
                }
                match self.groups.finish(result) {
                    Ok(()) => tracing::info!("Loaded {} groups", self.groups.items().len()),
                    Err(e) => {
                        tracing::error!("Failed to load groups: {}", e);
                        self.set_status(format!("Could not load groups: {}", e));
                    }
                }
            }
            AppEvent::MembersLoaded { chat_id, seq, result } => {
                if !self.members.accepts(seq) || !self.is_current(&chat_id) {
                    tracing::debug!(chat_id = %chat_id, "Dropping stale member list");
                    return;
                }
                let loaded = result.is_ok();
                match self.members.finish(result) {
                    Ok(()) => tracing::info!(chat_id = %chat_id, "Loaded {} members", self.members.items().len()),
                    Err(e) => {
                        tracing::error!(chat_id = %chat_id, "Failed to load members: {}", e);
                        self.set_status(format!("Could not load members: {}", e));
                    }
                }
                if loaded {
                    // New snapshot, start from nothing selected
                    self.selection.clear();
                }
            }
            AppEvent::TagGroupsLoaded { chat_id, seq, result } => {
                if !self.tag_groups.accepts(seq) || !self.is_current(&chat_id) {
                    tracing::debug!(chat_id = %chat_id, "Dropping stale tag group list");
                    return;
                }
                if let Err(e) = self.tag_groups.finish(result) {
                    tracing::error!(chat_id = %chat_id, "Failed to load tag groups: {}", e);
                    self.set_status(format!("Could not load tag groups: {}", e));
                }
            }
            AppEvent::TagGroupCreated { chat_id, name, result } => {
                if self.create_pending.as_ref() == Some(&chat_id) {
                    self.create_pending = None;
                }
                match result {
                    Ok(()) => {
                        tracing::info!(chat_id = %chat_id, name = %name, "Tag group created");
                        self.set_status(format!("Tag group {} created", name));
                        if self.is_current(&chat_id) {
                            self.name_input.clear();
                            self.load_tag_groups(chat_id);
                        }
                    }
                    Err(e) => {
                        tracing::error!(chat_id = %chat_id, name = %name, "Failed to create tag group: {}", e);
                        let msg = format!("Could not create {}: {}", name, e);
                        if self.is_current(&chat_id) {
                            self.alert(msg);
                        } else {
                            // The group is closed, there is no input left to keep
                            self.set_status(msg);
                        }
                    }
                }
            }
            AppEvent::Triggered { chat_id, tag_name, result } => match result {
                Ok(()) => {
                    tracing::info!(chat_id = %chat_id, tag = %tag_name, "Triggered");
                    self.set_status(format!("Triggered {}", tag_name));
                    if self.options.notifications {
                        if let Err(e) = crate::notify("tagdeck", &format!("Triggered {}", tag_name)) {
                            tracing::warn!("Notification failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(chat_id = %chat_id, tag = %tag_name, "Trigger failed: {}", e);
                    self.set_status(format!("Trigger {} failed: {}", tag_name, e));
                }
            },
        }
    }

    /// Periodic housekeeping
    pub fn tick(&mut self) {
        if let Some(since) = self.status_message_time {
            if since.elapsed() >= self.options.status_timeout {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent) {
        // Handle popups first
        match self.popup {
            Popup::None => {}
            Popup::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')) {
                    self.popup = Popup::None;
                }
                return;
            }
            Popup::Alert(_) => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                    self.popup = Popup::None;
                }
                return;
            }
        }

        match self.screen {
            Screen::GroupList => self.handle_list_key(key),
            Screen::GroupDetail { .. } => self.handle_detail_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.groups.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.groups.move_up(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(group) = self.groups.current() {
                    let (chat_id, title) = (group.chat_id.clone(), group.display_title());
                    self.open_group(chat_id, title);
                }
            }
            KeyCode::Char('R') => self.load_groups(),
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab {
            self.focus = match self.focus {
                Focus::Members => Focus::TagGroups,
                Focus::TagGroups => Focus::NameInput,
                Focus::NameInput => Focus::Members,
            };
            return;
        }
        if key.code == KeyCode::BackTab {
            self.focus = match self.focus {
                Focus::Members => Focus::NameInput,
                Focus::TagGroups => Focus::Members,
                Focus::NameInput => Focus::TagGroups,
            };
            return;
        }

        if self.focus == Focus::NameInput {
            self.handle_input_key(key);
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Backspace => self.back(),
            KeyCode::Char('n') => self.focus = Focus::NameInput,
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,
            KeyCode::Char('r') => {
                if let Some(chat_id) = self.current_chat().cloned() {
                    self.load_members(chat_id);
                }
            }
            _ => match self.focus {
                Focus::Members => self.handle_members_key(key),
                Focus::TagGroups => self.handle_tags_key(key),
                Focus::NameInput => {}
            },
        }
    }

    fn handle_members_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.members.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.members.move_up(),
            KeyCode::Char(' ') | KeyCode::Enter => {
                let Some((id, name)) = self.members.current().map(|m| (m.id.clone(), m.display_name())) else {
                    return;
                };
                match id {
                    Some(id) => self.toggle_member(&id),
                    None => self.set_status(format!("{} has no id and can't be selected", name)),
                }
            }
            KeyCode::Char('a') => self.toggle_select_all(),
            _ => {}
        }
    }

    fn handle_tags_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.tag_groups.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.tag_groups.move_up(),
            KeyCode::Enter | KeyCode::Char('t') => {
                if let Some(tag) = self.tag_groups.current() {
                    let name = tag.name.clone();
                    self.trigger_tag(name);
                }
            }
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.focus = Focus::Members,
            KeyCode::Enter => {
                // Rejections are already surfaced as an alert
                let _ = self.create_tag_group();
            }
            KeyCode::Backspace => {
                self.name_input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.name_input.push(c);
            }
            _ => {}
        }
    }
}
