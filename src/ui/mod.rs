use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::theme::Theme;
use crate::view::{Body, DetailView, InputView, ListView, PopupView, StatusLine, View};

// Colors are fixed for the lifetime of the process
static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the theme; later calls are ignored
pub fn init_theme(theme: Theme) {
    let _ = THEME.set(theme);
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, view: &View) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Min(4),    // Body
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    draw_info_line(f, &view.status, chunks[0]);
    match &view.body {
        Body::GroupList(list) => draw_list(f, list, chunks[1]),
        Body::GroupDetail(detail) => draw_detail(f, detail, chunks[1]),
    }
    draw_footer(f, &view.hints, chunks[2]);

    // Draw popups on top
    match &view.popup {
        None => {}
        Some(PopupView::Help) => draw_help_popup(f),
        Some(PopupView::Alert(msg)) => draw_alert_popup(f, msg),
    }
}

fn draw_info_line(f: &mut Frame, status: &StatusLine, area: Rect) {
    let line = match status {
        StatusLine::Message(msg) => Line::from(Span::styled(msg.as_str(), Style::default().fg(warning()))),
        StatusLine::Loading => Line::from(Span::styled("Loading...", Style::default().fg(text_dim()))),
        StatusLine::Ready => Line::from(Span::styled("Ready", Style::default().fg(text_dim()))),
    };
    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn boxed(title: String, focused: bool) -> Block<'static> {
    let border_color = if focused { accent() } else { inactive() };
    let title_style = if focused {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };
    Block::default()
        .title(Span::styled(format!(" {} ", title), title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
}

fn draw_list(f: &mut Frame, list: &ListView, area: Rect) {
    draw_list_titled(f, list, list.title.to_string(), area);
}

fn draw_list_titled(f: &mut Frame, list: &ListView, title: String, area: Rect) {
    let block = boxed(title, list.focused);

    if let Some(placeholder) = &list.placeholder {
        let empty = Paragraph::new(format!("  {}", placeholder))
            .style(Style::default().fg(text_dim()))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = list
        .rows
        .iter()
        .map(|row| {
            let (mark, mark_color) = match row.checked {
                Some(true) => ("[x]", success()),
                Some(false) => ("[ ]", text_dim()),
                None => ("", text_dim()),
            };
            let style = if row.cursor {
                Style::default().bg(bg_selected()).fg(text())
            } else {
                Style::default()
            };
            Row::new(vec![
                Span::styled(mark, Style::default().fg(mark_color)),
                Span::styled(row.label.as_str(), Style::default().fg(text())),
                Span::styled(row.detail.as_str(), Style::default().fg(text_dim())),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Percentage(60),
        Constraint::Percentage(35),
    ];
    let table = Table::new(rows, widths).block(block);
    f.render_widget(table, area);
}

fn draw_detail(f: &mut Frame, detail: &DetailView, area: Rect) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Group title
            Constraint::Min(3),    // Members | Tag groups
            Constraint::Length(3), // Name input
        ])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(detail.title.as_str(), Style::default().fg(header()).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  ({})", detail.chat_id), Style::default().fg(text_dim())),
    ]));
    f.render_widget(title, outer[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(outer[1]);

    let members_title = format!("{} ({}/{} selected)", detail.members.title, detail.selected, detail.selectable);
    draw_list_titled(f, &detail.members, members_title, columns[0]);
    draw_list(f, &detail.tag_groups, columns[1]);

    draw_name_input(f, &detail.name_input, outer[2]);
}

fn draw_name_input(f: &mut Frame, input: &InputView, area: Rect) {
    let title = if input.pending { "New tag group (saving...)" } else { "New tag group" };
    let cursor = if input.focused { "_" } else { "" };
    let content = if input.value.is_empty() && !input.focused {
        Span::styled("press n to name a tag group", Style::default().fg(text_dim()))
    } else {
        Span::styled(format!("{}{}", input.value, cursor), Style::default().fg(text()))
    };
    let widget = Paragraph::new(Line::from(content)).block(boxed(title.to_string(), input.focused));
    f.render_widget(widget, area);
}

fn draw_footer(f: &mut Frame, hints: &[(&str, &str)], area: Rect) {
    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 5 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans)).alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), Style::default().fg(accent())),
        Span::raw(desc),
    ])
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 30 { 95 } else { 75 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
    };

    let help_text = vec![
        section("═══ Groups ═══"),
        help_line("↑/↓ j/k", "Move up/down"),
        help_line("Enter", "Open group"),
        help_line("R", "Reload group list"),
        Line::from(""),
        section("═══ Group ═══"),
        help_line("Tab", "Members → Tag groups → Name"),
        help_line("Space", "Select/deselect member"),
        help_line("a", "Select all / clear selection"),
        help_line("r", "Reload members"),
        help_line("n", "Name a new tag group, Enter to save"),
        help_line("t/Enter", "Trigger the tag group under the cursor"),
        help_line("Esc", "Back to groups"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("h", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" tagdeck Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_alert_popup(f: &mut Frame, message: &str) {
    let popup_area = centered_rect(50, 25, f.area());

    f.render_widget(Clear, popup_area);

    let alert = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(danger()))),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(accent()).add_modifier(Modifier::BOLD)),
            Span::raw(" OK"),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(" Attention ", Style::default().fg(danger())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(danger())),
    )
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });

    f.render_widget(alert, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{RowView, StatusLine};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_draws_detail_with_empty_tag_groups() {
        let view = View {
            status: StatusLine::Ready,
            body: Body::GroupDetail(DetailView {
                title: "Team".to_string(),
                chat_id: "1".to_string(),
                members: ListView {
                    title: "Members",
                    focused: true,
                    rows: vec![RowView {
                        label: "Ana".to_string(),
                        detail: "10".to_string(),
                        checked: Some(true),
                        cursor: true,
                    }],
                    placeholder: None,
                },
                tag_groups: ListView {
                    title: "Tag groups",
                    focused: false,
                    rows: vec![],
                    placeholder: Some("No tag groups yet".to_string()),
                },
                name_input: InputView {
                    value: String::new(),
                    focused: false,
                    pending: false,
                },
                selected: 1,
                selectable: 1,
            }),
            hints: vec![("Esc", "Back")],
            popup: None,
        };

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| draw(f, &view)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("Team"));
        assert!(text.contains("[x]"));
        assert!(text.contains("Ana"));
        assert!(text.contains("No tag groups yet"));
        assert!(text.contains("Members (1/1 selected)"));
    }
}
