use std::path::Path;
use std::sync::Arc;

use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use philotrans_core::ai::append_transcript;
use philotrans_core::{
    ChatClient, Config, Dispatcher, HistoryEntry, HistoryStore, Mode, ProcessError,
    ProcessingRequest, ProcessingResult, Settings, SettingsStore, Storage, Style,
    TranscriptionClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    ModePicker,
    StylePicker,
    Settings,
    ConfirmClear,
    Alert {
        title: String,
        message: String,
        hint: Option<String>,
    },
}

pub type ProcessTask = JoinHandle<Result<ProcessingResult, ProcessError>>;
pub type TranscribeTask = JoinHandle<Result<String, ProcessError>>;

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Input editor
    pub input: String,
    pub input_cursor: usize, // char index into input
    pub command_input: String,
    pub mode: Mode,
    pub style: Style,

    // Result pane
    pub result: Option<ProcessingResult>,
    pub result_scroll: u16,
    pub status: Option<String>,
    pub animation_frame: u8,

    // In-flight work; at most one of each
    pub process_task: Option<ProcessTask>,
    pub pending_request: Option<ProcessingRequest>,
    pub transcribe_task: Option<TranscribeTask>,

    // History screen
    pub history_entries: Vec<HistoryEntry>,
    pub history_state: ListState,
    pub show_history_detail: bool,
    pub detail_scroll: u16,

    // Popups
    pub popup: Option<Popup>,
    pub picker_state: ListState,
    pub token_input: String,

    pub dispatcher: Dispatcher<ChatClient>,
    pub transcriber: TranscriptionClient,
    pub history: HistoryStore,
    pub settings: SettingsStore,
}

impl App {
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Self {
        let settings =
            SettingsStore::new(storage.clone()).with_token_override(config.token_override.clone());
        let history = HistoryStore::with_limit(storage, config.history_limit);
        let dispatcher = Dispatcher::from_config(config, settings.clone());
        let transcriber = TranscriptionClient::new(&config.base_url, &config.asr_model);

        let history_entries = history.list();
        let mut history_state = ListState::default();
        if !history_entries.is_empty() {
            history_state.select(Some(0));
        }

        Self {
            should_quit: false,
            screen: Screen::Home,
            input_mode: InputMode::Normal,
            focus: FocusPane::Input,

            input: String::new(),
            input_cursor: 0,
            command_input: String::new(),
            mode: Mode::default(),
            style: Style::default(),

            result: None,
            result_scroll: 0,
            status: None,
            animation_frame: 0,

            process_task: None,
            pending_request: None,
            transcribe_task: None,

            history_entries,
            history_state,
            show_history_detail: false,
            detail_scroll: 0,

            popup: None,
            picker_state: ListState::default(),
            token_input: String::new(),

            dispatcher,
            transcriber,
            history,
            settings,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.process_task.is_some()
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribe_task.is_some()
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert_str(byte_pos, &normalized);
        self.input_cursor += normalized.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_forward(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.input_cursor = 0;
    }

    /// (line, column) of the cursor, both in chars, for placing the terminal cursor.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.input.chars().take(self.input_cursor).collect();
        let line = before.matches('\n').count();
        let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
        (line, col)
    }

    // Processing

    /// Kick off a request for the current input. Refused while one is in
    /// flight; a missing token opens the settings popup instead.
    pub fn submit(&mut self) {
        if self.is_processing() {
            self.status = Some("A request is already running".to_string());
            return;
        }
        if self.input.trim().is_empty() {
            self.status = Some("Nothing to process: enter or load some text first".to_string());
            return;
        }
        if self.settings.api_token().is_none() {
            self.status = Some("An API token is required before processing".to_string());
            self.open_settings();
            return;
        }

        let request = ProcessingRequest::new(self.input.clone(), self.mode, self.style);
        let dispatcher = self.dispatcher.clone();
        let task_request = request.clone();

        info!(
            mode = request.mode.as_str(),
            style = request.style.as_str(),
            chars = request.text.chars().count(),
            "submitting request"
        );

        self.process_task = Some(tokio::spawn(async move {
            dispatcher.process_request(&task_request).await
        }));
        self.pending_request = Some(request);
        self.input_mode = InputMode::Normal;
        self.status = None;
        self.animation_frame = 0;
    }

    /// Collect finished background work. Called once per event loop turn.
    pub async fn poll_tasks(&mut self) {
        if self.process_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.process_task.take() {
                let outcome = task.await.unwrap_or_else(|e| {
                    Err(ProcessError::Network(format!("request task failed: {}", e)))
                });
                self.complete_processing(outcome);
            }
        }

        if self.transcribe_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.transcribe_task.take() {
                let outcome = task.await.unwrap_or_else(|e| {
                    Err(ProcessError::Network(format!("transcription task failed: {}", e)))
                });
                self.complete_transcription(outcome);
            }
        }
    }

    /// Show the outcome and, only on success, record it in history.
    pub fn complete_processing(&mut self, outcome: Result<ProcessingResult, ProcessError>) {
        let request = self.pending_request.take();
        match outcome {
            Ok(result) => {
                if let Some(request) = request {
                    match self.history.append(&request, &result) {
                        Ok(entry) => info!(id = %entry.id, "saved to history"),
                        Err(e) => {
                            error!("Failed to save history entry: {}", e);
                            self.status = Some(format!("Result not saved to history: {}", e));
                        }
                    }
                }
                self.result = Some(result);
                self.result_scroll = 0;
                self.focus = FocusPane::Result;
                self.refresh_history();
            }
            Err(e) => {
                warn!("Processing failed: {}", e);
                if matches!(e, ProcessError::MissingCredential) {
                    self.open_settings();
                } else {
                    self.show_error(&e);
                }
            }
        }
    }

    pub fn complete_transcription(&mut self, outcome: Result<String, ProcessError>) {
        match outcome {
            Ok(text) => {
                self.input = append_transcript(&self.input, &text);
                self.cursor_end();
                self.status = Some(format!("Transcribed {} characters", text.chars().count()));
            }
            Err(e) => {
                warn!("Transcription failed: {}", e);
                self.show_error(&e);
            }
        }
    }

    pub async fn load_file(&mut self, path: &str) {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                self.clear_input();
                self.insert_str(&text);
                self.status = Some(format!("Loaded {}", path));
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path, e);
                self.popup = Some(Popup::Alert {
                    title: "Cannot Open File".to_string(),
                    message: format!("{}: {}", path, e),
                    hint: Some("Only plain UTF-8 text files can be loaded".to_string()),
                });
            }
        }
    }

    pub async fn start_transcription(&mut self, path: &str) {
        if self.is_transcribing() {
            self.status = Some("A transcription is already running".to_string());
            return;
        }
        let Some(token) = self.settings.api_token() else {
            self.status = Some("An API token is required for transcription".to_string());
            self.open_settings();
            return;
        };

        let audio = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.popup = Some(Popup::Alert {
                    title: "Cannot Open File".to_string(),
                    message: format!("{}: {}", path, e),
                    hint: None,
                });
                return;
            }
        };

        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recording.webm")
            .to_string();
        let transcriber = self.transcriber.clone();
        self.transcribe_task = Some(tokio::spawn(async move {
            transcriber.transcribe(audio, &file_name, &token).await
        }));
        self.status = Some(format!("Transcribing {}", path));
    }

    /// Run a `:` command line.
    pub async fn run_command(&mut self, line: &str) {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "q" | "quit" => self.should_quit = true,
            "open" | "o" if !arg.is_empty() => self.load_file(arg).await,
            "transcribe" | "t" if !arg.is_empty() => self.start_transcription(arg).await,
            "mode" => match Mode::parse(arg) {
                Some(mode) => self.mode = mode,
                None => self.status = Some(format!("Unknown mode '{}'", arg)),
            },
            "style" => match Style::parse(arg) {
                Some(style) => self.style = style,
                None => self.status = Some(format!("Unknown style '{}'", arg)),
            },
            "open" | "o" | "transcribe" | "t" => {
                self.status = Some(format!("Usage: :{} <path>", command));
            }
            other => self.status = Some(format!("Unknown command '{}'", other)),
        }
    }

    pub fn show_error(&mut self, e: &ProcessError) {
        self.popup = Some(Popup::Alert {
            title: e.title().to_string(),
            message: e.to_string(),
            hint: e.suggested_action().map(str::to_string),
        });
    }

    // Pickers

    pub fn open_mode_picker(&mut self) {
        let idx = Mode::all().iter().position(|m| *m == self.mode).unwrap_or(0);
        self.picker_state.select(Some(idx));
        self.popup = Some(Popup::ModePicker);
    }

    pub fn open_style_picker(&mut self) {
        if !self.mode.uses_style() {
            self.status = Some("Styles only apply to translation mode".to_string());
            return;
        }
        let idx = Style::all().iter().position(|s| *s == self.style).unwrap_or(0);
        self.picker_state.select(Some(idx));
        self.popup = Some(Popup::StylePicker);
    }

    pub fn picker_len(&self) -> usize {
        match self.popup {
            Some(Popup::ModePicker) => Mode::all().len(),
            Some(Popup::StylePicker) => Style::all().len(),
            _ => 0,
        }
    }

    pub fn picker_nav_down(&mut self) {
        let len = self.picker_len();
        if len > 0 {
            let i = self.picker_state.selected().unwrap_or(0);
            self.picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn picker_nav_up(&mut self) {
        let i = self.picker_state.selected().unwrap_or(0);
        self.picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn picker_confirm(&mut self) {
        let selected = self.picker_state.selected().unwrap_or(0);
        match self.popup {
            Some(Popup::ModePicker) => {
                if let Some(mode) = Mode::all().get(selected) {
                    self.mode = *mode;
                }
            }
            Some(Popup::StylePicker) => {
                if let Some(style) = Style::all().get(selected) {
                    self.style = *style;
                }
            }
            _ => {}
        }
        self.popup = None;
    }

    // Settings

    pub fn open_settings(&mut self) {
        self.token_input = self.settings.get().api_token;
        self.popup = Some(Popup::Settings);
    }

    pub fn save_settings(&mut self) {
        let settings = Settings {
            api_token: self.token_input.trim().to_string(),
        };
        match self.settings.save(&settings) {
            Ok(()) => {
                self.status = Some("Settings saved".to_string());
                self.popup = None;
            }
            Err(e) => {
                error!("Failed to save settings: {}", e);
                self.show_error(&ProcessError::Storage(e));
            }
        }
        self.token_input.clear();
    }

    // History

    pub fn refresh_history(&mut self) {
        self.history_entries = self.history.list();
        let len = self.history_entries.len();
        match self.history_state.selected() {
            _ if len == 0 => self.history_state.select(None),
            Some(i) if i >= len => self.history_state.select(Some(len - 1)),
            None => self.history_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn open_history(&mut self) {
        self.refresh_history();
        self.screen = Screen::History;
        self.show_history_detail = false;
    }

    pub fn selected_history_entry(&self) -> Option<&HistoryEntry> {
        self.history_state
            .selected()
            .and_then(|i| self.history_entries.get(i))
    }

    pub fn history_nav_down(&mut self) {
        let len = self.history_entries.len();
        if len > 0 {
            let i = self.history_state.selected().unwrap_or(0);
            self.history_state.select(Some((i + 1).min(len - 1)));
            self.detail_scroll = 0;
        }
    }

    pub fn history_nav_up(&mut self) {
        let i = self.history_state.selected().unwrap_or(0);
        self.history_state.select(Some(i.saturating_sub(1)));
        self.detail_scroll = 0;
    }

    pub fn delete_selected_history(&mut self) {
        let Some(id) = self.selected_history_entry().map(|e| e.id.clone()) else {
            return;
        };
        match self.history.remove(&id) {
            Ok(remaining) => {
                self.history_entries = remaining;
                self.show_history_detail = false;
                self.refresh_history();
            }
            Err(e) => {
                error!("Failed to delete history entry: {}", e);
                self.show_error(&ProcessError::Storage(e));
            }
        }
    }

    pub fn clear_history(&mut self) {
        match self.history.clear() {
            Ok(()) => {
                self.history_entries.clear();
                self.history_state.select(None);
                self.show_history_detail = false;
                self.popup = None;
            }
            Err(e) => {
                error!("Failed to clear history: {}", e);
                self.show_error(&ProcessError::Storage(e));
            }
        }
    }

    /// Bring a stored entry back into the editor and result pane.
    pub fn restore_selected_history(&mut self) {
        let Some(entry) = self.selected_history_entry().cloned() else {
            return;
        };
        self.clear_input();
        self.insert_str(&entry.original_text);
        self.mode = entry.mode;
        self.style = entry.style;
        self.result = Some(entry.result());
        self.result_scroll = 0;
        self.screen = Screen::Home;
        self.focus = FocusPane::Result;
    }

    // Scrolling

    pub fn scroll_down(&mut self) {
        match self.screen {
            Screen::Home => self.result_scroll = self.result_scroll.saturating_add(1),
            Screen::History => self.detail_scroll = self.detail_scroll.saturating_add(1),
        }
    }

    pub fn scroll_up(&mut self) {
        match self.screen {
            Screen::Home => self.result_scroll = self.result_scroll.saturating_sub(1),
            Screen::History => self.detail_scroll = self.detail_scroll.saturating_sub(1),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_processing() || self.is_transcribing() {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }
}
