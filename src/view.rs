//! Pure mapping from controller state to what the screen should show.
//!
//! Nothing here touches the terminal; `ui` draws whatever this returns.

use crate::api::Member;
use crate::app::{App, Focus, Panel, Popup, Screen};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub status: StatusLine,
    pub body: Body,
    pub hints: Vec<(&'static str, &'static str)>,
    pub popup: Option<PopupView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Message(String),
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    GroupList(ListView),
    GroupDetail(DetailView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub title: String,
    pub chat_id: String,
    pub members: ListView,
    pub tag_groups: ListView,
    pub name_input: InputView,
    pub selected: usize,
    pub selectable: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub title: &'static str,
    pub focused: bool,
    pub rows: Vec<RowView>,
    /// Shown instead of rows: loading, failed or empty
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub label: String,
    pub detail: String,
    /// `Some` for selectable rows
    pub checked: Option<bool>,
    pub cursor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputView {
    pub value: String,
    pub focused: bool,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupView {
    Help,
    Alert(String),
}

pub fn render(app: &App) -> View {
    let body = match &app.screen {
        Screen::GroupList => Body::GroupList(group_list(app)),
        Screen::GroupDetail { chat_id, title } => Body::GroupDetail(DetailView {
            title: title.clone(),
            chat_id: chat_id.to_string(),
            members: member_list(app),
            tag_groups: tag_group_list(app),
            name_input: InputView {
                value: app.name_input.clone(),
                focused: app.focus == Focus::NameInput,
                pending: app.is_create_pending(),
            },
            selected: app.selection.len(),
            selectable: app.members.items().iter().filter(|m| m.id.is_some()).count(),
        }),
    };

    let status = if let Some(msg) = &app.status_message {
        StatusLine::Message(msg.clone())
    } else if app.groups.loading || (app.current_chat().is_some() && !app.is_ready()) {
        StatusLine::Loading
    } else {
        StatusLine::Ready
    };

    let popup = match &app.popup {
        Popup::None => None,
        Popup::Help => Some(PopupView::Help),
        Popup::Alert(msg) => Some(PopupView::Alert(msg.clone())),
    };

    View {
        status,
        body,
        hints: hints(app),
        popup,
    }
}

fn placeholder<T>(panel: &Panel<T>, what: &str, empty: &str) -> Option<String> {
    match &panel.items {
        None if panel.loading => Some(format!("Loading {}...", what)),
        None if panel.error.is_some() => Some(format!("Could not load {}", what)),
        None => Some(format!("Loading {}...", what)),
        Some(items) if items.is_empty() => Some(empty.to_string()),
        Some(_) => None,
    }
}

fn group_list(app: &App) -> ListView {
    let rows = app
        .groups
        .items()
        .iter()
        .enumerate()
        .map(|(i, group)| RowView {
            label: group.display_title(),
            detail: group.chat_id.to_string(),
            checked: None,
            cursor: i == app.groups.cursor,
        })
        .collect();

    let placeholder = match &app.groups.items {
        None if app.groups.error.is_some() && !app.groups.loading => {
            Some("Could not load groups (R to retry)".to_string())
        }
        _ => placeholder(&app.groups, "groups", "No groups yet. Add the bot to a group first."),
    };

    ListView {
        title: "Groups",
        focused: true,
        rows,
        placeholder,
    }
}

fn member_row(app: &App, i: usize, member: &Member) -> RowView {
    let focused = app.focus == Focus::Members;
    RowView {
        label: member.display_name(),
        detail: member.id.as_ref().map(|id| id.to_string()).unwrap_or_else(|| "no id".to_string()),
        checked: member.id.as_ref().map(|id| app.selection.contains(id)),
        cursor: focused && i == app.members.cursor,
    }
}

fn member_list(app: &App) -> ListView {
    ListView {
        title: "Members",
        focused: app.focus == Focus::Members,
        rows: app
            .members
            .items()
            .iter()
            .enumerate()
            .map(|(i, m)| member_row(app, i, m))
            .collect(),
        placeholder: placeholder(&app.members, "members", "No members found"),
    }
}

fn tag_group_list(app: &App) -> ListView {
    let focused = app.focus == Focus::TagGroups;
    ListView {
        title: "Tag groups",
        focused,
        rows: app
            .tag_groups
            .items()
            .iter()
            .enumerate()
            .map(|(i, tag)| RowView {
                label: tag.name.clone(),
                detail: match tag.member_count {
                    Some(1) => "1 member".to_string(),
                    Some(n) => format!("{} members", n),
                    None => String::new(),
                },
                checked: None,
                cursor: focused && i == app.tag_groups.cursor,
            })
            .collect(),
        placeholder: placeholder(&app.tag_groups, "tag groups", "No tag groups yet"),
    }
}

fn hints(app: &App) -> Vec<(&'static str, &'static str)> {
    if app.current_chat().is_none() {
        return vec![("↑↓", "Nav"), ("Enter", "Open"), ("R", "Reload"), ("h", "Help"), ("q", "Quit")];
    }
    match app.focus {
        Focus::Members => vec![
            ("↑↓", "Nav"),
            ("Space", "Select"),
            ("a", "All"),
            ("r", "Reload"),
            ("n", "Name"),
            ("Tab", "Next"),
            ("Esc", "Back"),
        ],
        Focus::TagGroups => vec![("↑↓", "Nav"), ("t", "Trigger"), ("Tab", "Next"), ("Esc", "Back")],
        Focus::NameInput => vec![("Enter", "Create"), ("Tab", "Next"), ("Esc", "Done")],
    }
}
