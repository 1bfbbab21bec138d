use termagent_core::{
    DEFAULT_GREETING, RequestState, ServerStatus, StreamEvent, is_valid_request_state_transition,
};

use crate::transcript::Transcript;

pub const WELCOME_MESSAGE: &str =
    "Terminal Agent ready. Type a command or a question and press Enter.";

/// Events delivered to the controller from worker threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// One decoded event of the running stream.
    Stream(StreamEvent),
    /// The stream body was fully read.
    StreamFinished,
    /// The stream request failed (non-2xx status, transport or read error).
    StreamFailed(String),
    StatusChecked(Result<ServerStatus, String>),
    Cleared,
    ClearFailed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusIndicator {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl StatusIndicator {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "checking",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub greeting: String,
    /// Zero disables the local length check.
    pub max_message_length: usize,
    pub reduced_motion: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            max_message_length: 1000,
            reduced_motion: false,
        }
    }
}

/// The single owner of everything the chat screen shows: transcript, input
/// line, request state and server indicator.
///
/// It never performs I/O. `submit` hands back the message to send and the
/// caller reports the outcome through `apply`.
#[derive(Debug, Clone)]
pub struct TerminalController {
    transcript: Transcript,
    input: String,
    cursor: usize,
    state: RequestState,
    status: StatusIndicator,
    server_model: Option<String>,
    info_line: String,
    /// Rows scrolled up from the bottom; zero keeps the newest output in view.
    scroll_back: u16,
    /// Largest useful `scroll_back`, as measured by the last render.
    scroll_limit: u16,
    spinner_tick: usize,
    options: ControllerOptions,
}

impl TerminalController {
    pub fn new(options: ControllerOptions) -> Self {
        let mut transcript = Transcript::default();
        transcript.push_ai(WELCOME_MESSAGE);
        Self {
            transcript,
            input: String::new(),
            cursor: 0,
            state: RequestState::Idle,
            status: StatusIndicator::Unknown,
            server_model: None,
            info_line: String::new(),
            scroll_back: 0,
            scroll_limit: u16::MAX,
            spinner_tick: 0,
            options,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Byte offset of the cursor inside `input`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn status(&self) -> StatusIndicator {
        self.status
    }

    pub fn server_model(&self) -> Option<&str> {
        self.server_model.as_deref()
    }

    pub fn info_line(&self) -> &str {
        &self.info_line
    }

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.is_busy() && !self.input.trim().is_empty()
    }

    /// Validate the input line and, if it may be sent, record it in the
    /// transcript and enter `Sending`. Returns the message to send.
    pub fn submit(&mut self) -> Option<String> {
        if self.is_busy() {
            self.info_line = "still waiting for the previous reply".to_string();
            return None;
        }
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }
        let max = self.options.max_message_length;
        let len = message.chars().count();
        if max > 0 && len > max {
            self.transcript.push_error(format!(
                "Error: Message too long ({len} characters, limit {max})"
            ));
            self.scroll_to_bottom();
            return None;
        }

        self.transcript.push_user(message.clone());
        self.clear_input();
        self.transcript.close_streaming();
        self.transition(RequestState::Sending);
        self.info_line = "sending...".to_string();
        self.scroll_to_bottom();
        Some(message)
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Stream(stream_event) => {
                if self.state == RequestState::Sending {
                    self.transition(RequestState::Streaming);
                    self.info_line = "streaming...".to_string();
                }
                match stream_event {
                    StreamEvent::Message { content } => {
                        self.transcript.append_streaming(&content);
                    }
                    StreamEvent::Error { content } => {
                        self.transcript.push_error(format!("Error: {content}"));
                    }
                    StreamEvent::End => {}
                }
                self.scroll_to_bottom();
            }
            UiEvent::StreamFinished => {
                self.finish_request();
                self.info_line = "ok".to_string();
            }
            UiEvent::StreamFailed(msg) => {
                self.transcript.push_error(format!("Error: {msg}"));
                self.finish_request();
                self.info_line = "request failed".to_string();
                self.scroll_to_bottom();
            }
            UiEvent::StatusChecked(Ok(status)) => {
                self.status = StatusIndicator::Online;
                if status.model.is_some() {
                    self.server_model = status.model;
                }
            }
            UiEvent::StatusChecked(Err(_)) => {
                self.status = StatusIndicator::Offline;
            }
            UiEvent::Cleared => {
                self.transcript.reset_to(self.options.greeting.clone());
                self.scroll_back = 0;
                self.info_line = "history cleared".to_string();
            }
            UiEvent::ClearFailed(msg) => {
                self.transcript
                    .push_error(format!("Error clearing history: {msg}"));
                self.scroll_to_bottom();
            }
        }
    }

    fn finish_request(&mut self) {
        self.transcript.close_streaming();
        self.transition(RequestState::Idle);
    }

    fn transition(&mut self, to: RequestState) {
        debug_assert!(
            is_valid_request_state_transition(self.state, to),
            "invalid request state transition {:?} -> {:?}",
            self.state,
            to
        );
        self.state = to;
    }

    // ─── Input line ─────────────────────────────────────────────────────────

    pub fn insert_char(&mut self, ch: char) {
        if self.is_busy() {
            return;
        }
        self.input.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn insert_str(&mut self, text: &str) {
        if self.is_busy() {
            return;
        }
        // The input is a single line.
        let text = text.replace(['\r', '\n'], " ");
        self.input.insert_str(self.cursor, &text);
        self.cursor += text.len();
    }

    pub fn backspace(&mut self) {
        if self.is_busy() || self.cursor == 0 {
            return;
        }
        let prev = self.prev_boundary();
        self.input.replace_range(prev..self.cursor, "");
        self.cursor = prev;
    }

    pub fn delete(&mut self) {
        if self.is_busy() || self.cursor >= self.input.len() {
            return;
        }
        let next = self.next_boundary();
        self.input.replace_range(self.cursor..next, "");
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary();
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.len();
    }

    /// Empty the input line. Allowed while busy.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    fn prev_boundary(&self) -> usize {
        self.input[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.input[self.cursor..]
            .chars()
            .next()
            .map(|ch| self.cursor + ch.len_utf8())
            .unwrap_or(self.input.len())
    }

    // ─── Scrolling / animation ──────────────────────────────────────────────

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_add(rows).min(self.scroll_limit);
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    /// Record how far the transcript can scroll at the current size.
    pub fn set_scroll_limit(&mut self, limit: u16) {
        self.scroll_limit = limit;
        self.scroll_back = self.scroll_back.min(limit);
    }

    pub fn tick(&mut self) {
        self.spinner_tick = self.spinner_tick.wrapping_add(1);
    }

    pub fn spinner_frame(&self) -> &'static str {
        if self.options.reduced_motion {
            return "●";
        }
        const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        FRAMES[(self.spinner_tick / 3) % FRAMES.len()]
    }
}

impl Default for TerminalController {
    fn default() -> Self {
        Self::new(ControllerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{EntryKind, TranscriptEntry};

    fn type_text(controller: &mut TerminalController, text: &str) {
        for ch in text.chars() {
            controller.insert_char(ch);
        }
    }

    fn message(text: &str) -> UiEvent {
        UiEvent::Stream(StreamEvent::Message {
            content: text.to_string(),
        })
    }

    fn ai_entries(controller: &TerminalController) -> Vec<&TranscriptEntry> {
        controller
            .transcript()
            .entries()
            .iter()
            .filter(|e| e.kind == EntryKind::Ai)
            .collect()
    }

    #[test]
    fn consecutive_messages_concatenate_into_one_ai_entry() {
        let mut c = TerminalController::default();
        type_text(&mut c, "hello");
        assert_eq!(c.submit().as_deref(), Some("hello"));

        c.apply(message("a"));
        c.apply(message("b"));
        c.apply(UiEvent::Stream(StreamEvent::End));
        c.apply(UiEvent::StreamFinished);

        let entries = c.transcript().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], TranscriptEntry::new(EntryKind::User, "hello"));
        assert_eq!(entries[2], TranscriptEntry::new(EntryKind::Ai, "ab"));
        assert_eq!(c.state(), RequestState::Idle);
    }

    #[test]
    fn empty_or_whitespace_input_is_never_sent() {
        let mut c = TerminalController::default();
        assert_eq!(c.submit(), None);
        type_text(&mut c, "   \t ");
        assert!(!c.can_submit());
        assert_eq!(c.submit(), None);
        assert_eq!(c.state(), RequestState::Idle);
        assert_eq!(c.transcript().len(), 1);
    }

    #[test]
    fn input_is_trimmed_before_sending() {
        let mut c = TerminalController::default();
        type_text(&mut c, "  ls -la  ");
        assert_eq!(c.submit().as_deref(), Some("ls -la"));
        assert_eq!(c.input(), "");
        assert_eq!(c.cursor(), 0);
    }

    #[test]
    fn second_submission_is_rejected_until_the_first_completes() {
        let mut c = TerminalController::default();
        type_text(&mut c, "first");
        assert!(c.submit().is_some());
        assert!(c.is_busy());

        // Input is disabled while busy.
        type_text(&mut c, "second");
        assert_eq!(c.input(), "");
        assert_eq!(c.submit(), None);

        c.apply(message("reply"));
        assert_eq!(c.state(), RequestState::Streaming);
        assert_eq!(c.submit(), None);

        c.apply(UiEvent::StreamFinished);
        assert!(!c.is_busy());
        type_text(&mut c, "second");
        assert_eq!(c.submit().as_deref(), Some("second"));
    }

    #[test]
    fn failed_request_adds_exactly_one_error_and_clears_busy() {
        let mut c = TerminalController::default();
        type_text(&mut c, "hi");
        c.submit();
        let before = c.transcript().len();

        c.apply(UiEvent::StreamFailed("HTTP error! status: 500".to_string()));

        let entries = c.transcript().entries();
        assert_eq!(entries.len(), before + 1);
        assert_eq!(
            entries.last(),
            Some(&TranscriptEntry::new(
                EntryKind::Error,
                "Error: HTTP error! status: 500"
            ))
        );
        assert!(!c.is_busy());
    }

    #[test]
    fn each_stream_opens_its_own_ai_entry() {
        let mut c = TerminalController::default();
        type_text(&mut c, "one");
        c.submit();
        c.apply(message("first"));
        c.apply(UiEvent::StreamFinished);

        type_text(&mut c, "two");
        c.submit();
        c.apply(message("second"));
        c.apply(UiEvent::StreamFinished);

        let texts: Vec<&str> = ai_entries(&c).iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec![WELCOME_MESSAGE, "first", "second"]);
    }

    #[test]
    fn error_events_become_separate_error_entries() {
        let mut c = TerminalController::default();
        type_text(&mut c, "run it");
        c.submit();
        c.apply(UiEvent::Stream(StreamEvent::Error {
            content: "quota exceeded".to_string(),
        }));
        assert_eq!(
            c.transcript().last(),
            Some(&TranscriptEntry::new(EntryKind::Error, "Error: quota exceeded"))
        );
        // A stream error event alone does not end the request.
        assert!(c.is_busy());
    }

    #[test]
    fn clearing_history_leaves_exactly_the_greeting() {
        let mut c = TerminalController::new(ControllerOptions {
            greeting: "fresh start".to_string(),
            ..ControllerOptions::default()
        });
        type_text(&mut c, "hi");
        c.submit();
        c.apply(message("hello"));
        c.apply(UiEvent::StreamFinished);

        c.apply(UiEvent::Cleared);

        assert_eq!(
            c.transcript().entries(),
            &[TranscriptEntry::new(EntryKind::Ai, "fresh start")]
        );
    }

    #[test]
    fn clear_failure_is_reported_in_transcript() {
        let mut c = TerminalController::default();
        c.apply(UiEvent::ClearFailed("HTTP error! status: 500".to_string()));
        assert_eq!(
            c.transcript().last().map(|e| e.text.as_str()),
            Some("Error clearing history: HTTP error! status: 500")
        );
    }

    #[test]
    fn status_check_updates_indicator() {
        let mut c = TerminalController::default();
        assert_eq!(c.status(), StatusIndicator::Unknown);
        c.apply(UiEvent::StatusChecked(Ok(ServerStatus {
            model: Some("gemini".to_string()),
            ..ServerStatus::default()
        })));
        assert_eq!(c.status(), StatusIndicator::Online);
        assert_eq!(c.server_model(), Some("gemini"));

        c.apply(UiEvent::StatusChecked(Err("connection refused".to_string())));
        assert_eq!(c.status(), StatusIndicator::Offline);
        // Failing checks never touch the transcript.
        assert_eq!(c.transcript().len(), 1);
    }

    #[test]
    fn overlong_message_is_rejected_locally() {
        let mut c = TerminalController::new(ControllerOptions {
            max_message_length: 5,
            ..ControllerOptions::default()
        });
        type_text(&mut c, "123456");
        assert_eq!(c.submit(), None);
        assert!(!c.is_busy());
        assert_eq!(c.input(), "123456");
        assert_eq!(c.transcript().last().map(|e| e.kind), Some(EntryKind::Error));
    }

    #[test]
    fn clear_input_works_while_busy() {
        let mut c = TerminalController::default();
        type_text(&mut c, "x");
        c.submit();
        c.clear_input();
        assert_eq!(c.input(), "");
    }

    #[test]
    fn editing_respects_multibyte_boundaries() {
        let mut c = TerminalController::default();
        type_text(&mut c, "h\u{e9}llo");
        c.move_home();
        c.move_right();
        c.move_right();
        c.backspace();
        assert_eq!(c.input(), "hllo");
        c.move_end();
        c.insert_str("\nworld");
        assert_eq!(c.input(), "hllo world");
        c.move_home();
        c.delete();
        assert_eq!(c.input(), "llo world");
    }

    #[test]
    fn scrolling_up_stops_at_the_rendered_limit() {
        let mut c = TerminalController::default();
        c.set_scroll_limit(30);
        for _ in 0..50 {
            c.scroll_up(10);
        }
        assert_eq!(c.scroll_back(), 30);
        c.scroll_down(10);
        assert_eq!(c.scroll_back(), 20);

        // Growing the window shrinks the limit and pulls the view along.
        c.set_scroll_limit(5);
        assert_eq!(c.scroll_back(), 5);
        c.set_scroll_limit(0);
        c.scroll_up(10);
        assert_eq!(c.scroll_back(), 0);
    }

    #[test]
    fn new_output_scrolls_back_to_bottom() {
        let mut c = TerminalController::default();
        c.scroll_up(10);
        assert_eq!(c.scroll_back(), 10);
        type_text(&mut c, "hi");
        c.submit();
        c.scroll_up(4);
        c.apply(message("x"));
        assert_eq!(c.scroll_back(), 0);
    }
}
