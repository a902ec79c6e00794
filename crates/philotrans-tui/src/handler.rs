use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, FocusPane, InputMode, Popup, Screen};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.code == KeyCode::Char(c) && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Ctrl+S, or Ctrl+Enter on terminals that report it
fn is_submit(key: &KeyEvent) -> bool {
    is_ctrl(key, 's')
        || (key.code == KeyCode::Enter && key.modifiers.contains(KeyModifiers::CONTROL))
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if is_ctrl(&key, 'c') {
        app.should_quit = true;
        return Ok(());
    }

    // Popups swallow all input while open
    if app.popup.is_some() {
        handle_popup(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
        InputMode::Command => handle_command_mode(app, key).await,
    }

    Ok(())
}

fn handle_popup(app: &mut App, key: KeyEvent) {
    let Some(popup) = app.popup.clone() else {
        return;
    };

    match popup {
        Popup::ModePicker | Popup::StylePicker => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.picker_nav_up(),
            KeyCode::Enter => app.picker_confirm(),
            KeyCode::Esc | KeyCode::Char('q') => app.popup = None,
            _ => {}
        },
        Popup::Settings => match key.code {
            KeyCode::Enter => app.save_settings(),
            KeyCode::Esc => {
                app.token_input.clear();
                app.popup = None;
            }
            KeyCode::Backspace => {
                app.token_input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.token_input.push(c);
            }
            _ => {}
        },
        Popup::ConfirmClear => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.clear_history(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.popup = None,
            _ => {}
        },
        Popup::Alert { .. } => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                app.popup = None;
            }
        }
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Keys shared by both screens
    match key.code {
        KeyCode::Char(':') => {
            app.command_input.clear();
            app.input_mode = InputMode::Command;
            return;
        }
        KeyCode::Char('S') => {
            app.open_settings();
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Home => handle_home_normal(app, key),
        Screen::History => handle_history_normal(app, key),
    }
}

fn handle_home_normal(app: &mut App, key: KeyEvent) {
    if is_submit(&key) {
        app.submit();
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Enter if app.focus == FocusPane::Input => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::Result,
                FocusPane::Result => FocusPane::Input,
            };
        }

        KeyCode::Char('p') => app.submit(),
        KeyCode::Char('m') => app.open_mode_picker(),
        KeyCode::Char('s') => app.open_style_picker(),
        KeyCode::Char('h') => app.open_history(),
        KeyCode::Char('x') => {
            if !app.is_processing() {
                app.clear_input();
                app.result = None;
            }
        }

        KeyCode::Char('j') | KeyCode::Down if app.focus == FocusPane::Result => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up if app.focus == FocusPane::Result => app.scroll_up(),
        KeyCode::PageDown if app.focus == FocusPane::Result => {
            app.result_scroll = app.result_scroll.saturating_add(10);
        }
        KeyCode::PageUp if app.focus == FocusPane::Result => {
            app.result_scroll = app.result_scroll.saturating_sub(10);
        }
        _ => {}
    }
}

fn handle_history_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace => {
            if app.show_history_detail {
                app.show_history_detail = false;
            } else {
                app.screen = Screen::Home;
            }
        }

        KeyCode::Char('j') | KeyCode::Down => {
            if app.show_history_detail {
                app.scroll_down();
            } else {
                app.history_nav_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.show_history_detail {
                app.scroll_up();
            } else {
                app.history_nav_up();
            }
        }

        KeyCode::Enter => {
            if app.selected_history_entry().is_some() {
                app.show_history_detail = !app.show_history_detail;
                app.detail_scroll = 0;
            }
        }
        KeyCode::Char('r') => app.restore_selected_history(),
        KeyCode::Char('d') => app.delete_selected_history(),
        KeyCode::Char('D') => {
            if !app.history_entries.is_empty() {
                app.popup = Some(Popup::ConfirmClear);
            }
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    if is_submit(&key) {
        app.submit();
        return;
    }

    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.insert_char('\n'),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete_forward(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Tab => app.insert_char('\t'),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.insert_char(c),
        _ => {}
    }
}

async fn handle_command_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.command_input.clear();
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            let line = std::mem::take(&mut app.command_input);
            app.input_mode = InputMode::Normal;
            app.run_command(&line).await;
        }
        KeyCode::Backspace => {
            if app.command_input.pop().is_none() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Char(c) => app.command_input.push(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.popup == Some(Popup::Settings) {
        app.token_input.push_str(text.trim());
        return;
    }
    if app.popup.is_some() {
        return;
    }

    match app.input_mode {
        InputMode::Command => app.command_input.push_str(text.lines().next().unwrap_or_default()),
        _ if app.screen == Screen::Home => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
            app.insert_str(text);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use philotrans_core::{Config, MemoryStorage, Mode, ProcessingRequest, ProcessingResult, Style};

    fn app() -> App {
        let config = Config {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        App::new(&config, Arc::new(MemoryStorage::new()))
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    async fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    fn seed_history(app: &mut App, count: usize) {
        for i in 0..count {
            app.pending_request = Some(ProcessingRequest::new(
                format!("text {}", i),
                Mode::Translation,
                Style::Academic,
            ));
            app.complete_processing(Ok(ProcessingResult {
                translated_text: format!("译文 {}", i),
                terms: Vec::new(),
                context_note: String::new(),
            }));
        }
    }

    #[tokio::test]
    async fn editing_then_escape_returns_to_normal() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('i'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        type_str(&mut app, "Dasein").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        type_str(&mut app, "q").await;
        assert_eq!(app.input, "Dasein\nq");
        assert!(!app.should_quit);

        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn ctrl_s_without_token_prompts_for_settings() {
        let mut app = app();
        app.insert_str("Sein");
        app.input_mode = InputMode::Editing;

        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        handle_event(&mut app, AppEvent::Key(ctrl_s)).await.unwrap();
        assert_eq!(app.popup, Some(Popup::Settings));

        type_str(&mut app, "sk-123").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.popup.is_none());
        assert_eq!(app.settings.api_token().as_deref(), Some("sk-123"));
    }

    #[tokio::test]
    async fn mode_picker_changes_mode() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('m'))).await.unwrap();
        assert_eq!(app.popup, Some(Popup::ModePicker));

        handle_event(&mut app, key(KeyCode::Down)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.mode, Mode::all()[1]);
        assert!(app.popup.is_none());
    }

    #[tokio::test]
    async fn command_line_runs_on_enter() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char(':'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Command);

        type_str(&mut app, "mode meeting").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.mode, Mode::Meeting);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.command_input.is_empty());
    }

    #[tokio::test]
    async fn clear_history_requires_confirmation() {
        let mut app = app();
        seed_history(&mut app, 3);
        handle_event(&mut app, key(KeyCode::Char('h'))).await.unwrap();
        assert_eq!(app.screen, Screen::History);

        handle_event(&mut app, key(KeyCode::Char('D'))).await.unwrap();
        assert_eq!(app.popup, Some(Popup::ConfirmClear));
        handle_event(&mut app, key(KeyCode::Char('n'))).await.unwrap();
        assert_eq!(app.history_entries.len(), 3);

        handle_event(&mut app, key(KeyCode::Char('D'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('y'))).await.unwrap();
        assert!(app.history_entries.is_empty());
    }

    #[tokio::test]
    async fn history_detail_toggles_and_backs_out() {
        let mut app = app();
        seed_history(&mut app, 2);
        app.open_history();

        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.show_history_detail);
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert!(!app.show_history_detail);
        assert_eq!(app.screen, Screen::History);
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.screen, Screen::Home);
    }

    #[tokio::test]
    async fn paste_goes_to_active_target() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Paste("Vernunft\r\nKritik".to_string()))
            .await
            .unwrap();
        assert_eq!(app.input, "Vernunft\nKritik");
        assert_eq!(app.input_mode, InputMode::Editing);

        app.open_settings();
        handle_event(&mut app, AppEvent::Paste("  sk-pasted \n".to_string()))
            .await
            .unwrap();
        assert_eq!(app.token_input, "sk-pasted");
    }

    #[tokio::test]
    async fn alert_dismisses_on_escape() {
        let mut app = app();
        app.popup = Some(Popup::Alert {
            title: "t".to_string(),
            message: "m".to_string(),
            hint: None,
        });
        handle_event(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert!(app.popup.is_none());
        assert!(!app.should_quit);
    }
}
