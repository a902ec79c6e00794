use chrono::{DateTime, Local};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, FocusPane, InputMode, Popup, Screen};
use philotrans_core::{HistoryEntry, Mode, ProcessingResult, Style as TranslationStyle};

const SPINNER: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];

/// Parse a line of model output, turning **bold** runs and `#` headings into styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('#') {
        let heading = trimmed.trim_start_matches('#').trim().to_string();
        return Line::from(Span::styled(
            heading,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        if end > 0 {
            spans.push(Span::styled(
                after[..end].to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Hard-wrap text to `width` display columns. CJK text carries no spaces, so
/// wrapping is per character; the cursor math below relies on the same rule.
fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let mut row = String::new();
        let mut row_width = 0;
        for c in line.chars() {
            let w = char_width(c);
            if row_width + w > width && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                row_width = 0;
            }
            row.push(c);
            row_width += w;
        }
        rows.push(row);
    }
    rows
}

fn char_width(c: char) -> usize {
    match c {
        '\t' => 4,
        _ => Span::raw(c.to_string()).width(),
    }
}

/// Visual (row, column) of the cursor after `wrap_chars`.
fn cursor_position(text: &str, cursor: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let before: String = text.chars().take(cursor).collect();
    let mut row = 0;
    let mut lines = before.split('\n').peekable();
    while let Some(line) = lines.next() {
        let mut col = 0;
        for c in line.chars() {
            let w = char_width(c);
            if col + w > width && col > 0 {
                row += 1;
                col = 0;
            }
            col += w;
        }
        if lines.peek().is_none() {
            if col >= width {
                return (row + 1, 0);
            }
            return (row, col);
        }
        row += 1;
    }
    (row, 0)
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Home => render_home_screen(app, frame, body_area),
        Screen::History => render_history_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    match app.popup.clone() {
        Some(Popup::ModePicker) => render_mode_picker(app, frame, area),
        Some(Popup::StylePicker) => render_style_picker(app, frame, area),
        Some(Popup::Settings) => render_settings(app, frame, area),
        Some(Popup::ConfirmClear) => render_confirm_clear(app, frame, area),
        Some(Popup::Alert {
            title,
            message,
            hint,
        }) => render_alert(frame, area, &title, &message, hint.as_deref()),
        None => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" PhiloTrans ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.mode.display_name()),
            Style::default().fg(Color::White),
        ),
    ];
    if app.mode.uses_style() {
        spans.push(Span::styled(
            format!(" [{}]", app.style.display_name()),
            Style::default().fg(Color::White),
        ));
    }

    let token_indicator = match app.settings.token_source() {
        Some("env") => Span::styled(" token: env ", Style::default().fg(Color::Green)),
        Some(_) => Span::styled(" token: saved ", Style::default().fg(Color::Green)),
        None => Span::styled(" no token (S) ", Style::default().fg(Color::Red)),
    };
    spans.push(Span::styled(
        format!(" {}", app.dispatcher.model()),
        Style::default().fg(Color::Gray),
    ));
    spans.push(Span::raw(" "));
    spans.push(token_indicator);
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
        InputMode::Command => Style::default().bg(Color::Magenta).fg(Color::White),
    };

    let mode_text = match (app.input_mode, app.screen) {
        (InputMode::Editing, _) => " EDIT ",
        (InputMode::Command, _) => " CMD ",
        (_, Screen::Home) => " HOME ",
        (_, Screen::History) => " HISTORY ",
    };

    if app.input_mode == InputMode::Command {
        let line = Line::from(vec![
            Span::styled(mode_text, mode_style),
            Span::raw(" :"),
            Span::raw(app.command_input.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        let typed = Span::raw(app.command_input.as_str()).width() as u16;
        let x = area.x + 2 + mode_text.len() as u16 + typed;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        return;
    }

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let pairs: Vec<[Span; 2]> = match (app.screen, app.input_mode) {
        (_, InputMode::Editing) => vec![
            hint(" Ctrl+S ", " submit "),
            hint(" Esc ", " done "),
        ],
        (Screen::Home, _) => {
            let mut pairs = vec![
                hint(" i ", " edit "),
                hint(" p ", " process "),
                hint(" m ", " mode "),
            ];
            if app.mode.uses_style() {
                pairs.push(hint(" s ", " style "));
            }
            pairs.extend([
                hint(" Tab ", " focus "),
                hint(" h ", " history "),
                hint(" S ", " settings "),
                hint(" : ", " cmd "),
                hint(" q ", " quit "),
            ]);
            pairs
        }
        (Screen::History, _) if app.show_history_detail => vec![
            hint(" j/k ", " scroll "),
            hint(" r ", " restore "),
            hint(" Esc ", " back "),
        ],
        (Screen::History, _) => vec![
            hint(" j/k ", " nav "),
            hint(" Enter ", " detail "),
            hint(" r ", " restore "),
            hint(" d ", " delete "),
            hint(" D ", " clear "),
            hint(" Esc ", " back "),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(pairs.into_iter().flatten());

    if let Some(status) = &app.status {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_home_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, result_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);

    render_input(app, frame, input_area);
    render_result(app, frame, result_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => Color::Yellow,
        (_, FocusPane::Input) => Color::Cyan,
        _ => Color::DarkGray,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Source Text ")
        .title_bottom(format!(" {} chars ", app.input.chars().count()));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.input.is_empty() && app.input_mode != InputMode::Editing {
        let placeholder = Paragraph::new(vec![
            Line::from("Press i to type, paste text,"),
            Line::from("or :open <file> to load a text file."),
            Line::from(":transcribe <audio> appends speech."),
        ])
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(placeholder, inner);
        return;
    }

    let width = inner.width as usize;
    let height = inner.height as usize;
    let rows = wrap_chars(&app.input, width);
    let (cursor_row, cursor_col) = cursor_position(&app.input, app.input_cursor, width);
    let scroll = (cursor_row + 1).saturating_sub(height);

    let lines: Vec<Line> = rows.into_iter().map(Line::from).collect();
    let paragraph = Paragraph::new(lines).scroll((scroll as u16, 0));
    frame.render_widget(paragraph, inner);

    if app.input_mode == InputMode::Editing && app.popup.is_none() && height > 0 {
        let x = inner.x + cursor_col.min(width.saturating_sub(1)) as u16;
        let y = inner.y + cursor_row.saturating_sub(scroll) as u16;
        frame.set_cursor_position((x, y));
    }
}

fn result_lines(result: &ProcessingResult) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = result
        .translated_text
        .lines()
        .map(parse_markdown_line)
        .collect();

    if !result.terms.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "术语 Terms",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        for term in &result.terms {
            lines.push(Line::from(vec![
                Span::styled(term.original.clone(), Style::default().fg(Color::Yellow).bold()),
                Span::raw(" → "),
                Span::styled(term.translation.clone(), Style::default().fg(Color::Green)),
            ]));
            if !term.definition.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("  {}", term.definition),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
    }

    if !result.context_note.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "背景 Context",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            result.context_note.clone(),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_result(app: &App, frame: &mut Frame, area: Rect) {
    let border_color = if app.focus == FocusPane::Result {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let title = match &app.pending_request {
        Some(request) if app.is_processing() => format!(" {} … ", request.mode.display_name()),
        _ => " Result ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let text = if app.is_processing() {
        let frame_str = SPINNER[app.animation_frame as usize % SPINNER.len()];
        Text::from(Line::from(Span::styled(
            format!("{} Processing, retrying automatically on transient errors", frame_str),
            Style::default().fg(Color::Yellow),
        )))
    } else if let Some(result) = &app.result {
        Text::from(result_lines(result))
    } else {
        Text::from(Line::from(Span::styled(
            "Results appear here after processing (p).",
            Style::default().fg(Color::DarkGray),
        )))
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.result_scroll, 0));
    frame.render_widget(paragraph, area);

    if app.is_transcribing() {
        let frame_str = SPINNER[app.animation_frame as usize % SPINNER.len()];
        let badge = Paragraph::new(format!(" {} transcribing ", frame_str))
            .style(Style::default().fg(Color::Black).bg(Color::Yellow));
        let badge_area = Rect::new(
            area.x + 1,
            area.bottom().saturating_sub(1),
            18.min(area.width.saturating_sub(2)),
            1,
        );
        frame.render_widget(badge, badge_area);
    }
}

fn history_item(entry: &HistoryEntry, width: usize) -> ListItem<'static> {
    let header = Line::from(vec![
        Span::styled(format_timestamp(entry.timestamp), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(entry.mode.display_name(), Style::default().fg(Color::Cyan)),
    ]);
    let preview = Line::from(entry.preview(width.saturating_sub(4).max(8) / 2));
    ListItem::new(vec![header, preview])
}

fn entry_detail_lines(entry: &HistoryEntry) -> Vec<Line<'static>> {
    let mut meta = format!("{}  {}", format_timestamp(entry.timestamp), entry.mode.display_name());
    if entry.mode.uses_style() {
        meta.push_str(&format!(" / {}", entry.style.display_name()));
    }

    let mut lines = vec![
        Line::from(Span::styled(meta, Style::default().fg(Color::DarkGray))),
        Line::default(),
        Line::from(Span::styled(
            "原文 Original",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
    ];
    lines.extend(entry.original_text.lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "结果 Result",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    lines.extend(result_lines(&entry.result()));
    lines
}

fn render_history_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.show_history_detail {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" History Entry ");
        let lines = app
            .selected_history_entry()
            .map(entry_detail_lines)
            .unwrap_or_default();
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((app.detail_scroll, 0));
        frame.render_widget(paragraph, area);
        return;
    }

    let [list_area, preview_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" History ({}) ", app.history_entries.len()));

    if app.history_entries.is_empty() {
        let empty = Paragraph::new("No history yet. Processed texts are kept here.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, list_area);
    } else {
        let width = list_area.width as usize;
        let items: Vec<ListItem> = app
            .history_entries
            .iter()
            .map(|entry| history_item(entry, width))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut app.history_state);
    }

    let preview_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Preview ");
    let lines = app
        .selected_history_entry()
        .map(entry_detail_lines)
        .unwrap_or_default();
    let preview = Paragraph::new(lines)
        .block(preview_block)
        .wrap(Wrap { trim: false });
    frame.render_widget(preview, preview_area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn picker_list<'a>(items: Vec<ListItem<'a>>, title: &'a str) -> List<'a> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ")
}

fn render_mode_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let modes = Mode::all();
    let popup_area = centered_rect(area, 44, modes.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = modes
        .iter()
        .map(|mode| {
            let style = if *mode == app.mode {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", mode.display_name())).style(style)
        })
        .collect();

    let list = picker_list(items, " Select Mode (Enter to select, Esc to cancel) ");
    frame.render_stateful_widget(list, popup_area, &mut app.picker_state);
}

fn render_style_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let styles = TranslationStyle::all();
    let popup_area = centered_rect(area, 64, styles.len() as u16 * 2 + 2);

    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = styles
        .iter()
        .map(|style| {
            let name_style = if *style == app.style {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(Span::styled(format!(" {} ", style.display_name()), name_style)),
                Line::from(Span::styled(
                    format!("   {}", style.description()),
                    Style::default().fg(Color::Gray),
                )),
            ])
        })
        .collect();

    let list = picker_list(items, " Translation Style ");
    frame.render_stateful_widget(list, popup_area, &mut app.picker_state);
}

/// Mask a token, keeping the last four characters visible.
fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let last_four: String = token.chars().skip(len - 4).collect();
    format!("{}...{}", "*".repeat((len - 4).min(20)), last_four)
}

fn render_settings(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 64, 8);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Settings: API Token ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API token. Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let display_text = mask_token(&app.token_input);
    let cursor_x = (display_text.chars().count() as u16).min(input_area.width.saturating_sub(1));
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let note = if app.settings.token_source() == Some("env") {
        "PHILOTRANS_API_TOKEN is set and takes priority over the saved token."
    } else {
        "The token is stored locally and sent only to the model endpoint."
    };
    let status = Paragraph::new(vec![
        Line::from(format!("{} characters", app.token_input.chars().count())),
        Line::from(note),
    ])
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 2));
}

fn render_confirm_clear(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 48, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear History ");

    let text = vec![
        Line::from(format!("Delete all {} history entries?", app.history_entries.len())),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::Red).fg(Color::White)),
            Span::raw(" yes  "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ];
    frame.render_widget(Paragraph::new(text).block(block), popup_area);
}

fn render_alert(frame: &mut Frame, area: Rect, title: &str, message: &str, hint: Option<&str>) {
    let popup_area = centered_rect(area, 64, 9);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(format!(" {} ", title));

    let mut lines = vec![Line::from(message.to_string())];
    if let Some(hint) = hint {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            hint.to_string(),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Enter/Esc to dismiss",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup_area);
}
