use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use serde_json::json;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use termagent_client::AgentClient;
use termagent_core::{StreamCallback, StreamEvent};
use termagent_observe::Observer;

use crate::controller::{TerminalController, UiEvent};
use crate::keymap::{KeyBindings, UiAction};
use crate::render::{TuiTheme, draw};

const POLL_INTERVAL: Duration = Duration::from_millis(33);
const SCROLL_PAGE_ROWS: u16 = 10;
const WORKER_STOPPED: &str = "request worker stopped unexpectedly";

type PanicHook = dyn Fn(&std::panic::PanicHookInfo<'_>) + Sync + Send + 'static;

/// Restores the terminal on drop (including panics).
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            io::stdout(),
            DisableFocusChange,
            DisableBracketedPaste,
            LeaveAlternateScreen,
            crossterm::cursor::Show
        );
        let _ = disable_raw_mode();
    }
}

/// Run a stream request on a worker thread. Every decoded event, then
/// exactly one of `StreamFinished` / `StreamFailed`, is sent on `tx`.
pub fn spawn_stream(
    client: Arc<dyn AgentClient>,
    message: String,
    tx: mpsc::Sender<UiEvent>,
    observer: Option<Observer>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let event_tx = tx.clone();
        let cb: StreamCallback = Arc::new(move |ev: StreamEvent| {
            let _ = event_tx.send(UiEvent::Stream(ev));
        });
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| client.stream(&message, cb)));
        let event = match outcome {
            Ok(Ok(_)) => UiEvent::StreamFinished,
            Ok(Err(e)) => {
                if let Some(observer) = &observer {
                    observer.warn_log(&format!("stream request failed: {e}"));
                }
                UiEvent::StreamFailed(e.to_string())
            }
            Err(_) => {
                if let Some(observer) = &observer {
                    observer.warn_log("stream worker panicked");
                }
                UiEvent::StreamFailed(WORKER_STOPPED.to_string())
            }
        };
        let _ = tx.send(event);
    })
}

pub fn spawn_status_check(
    client: Arc<dyn AgentClient>,
    tx: mpsc::Sender<UiEvent>,
    observer: Option<Observer>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = client.status().map_err(|e| {
            if let Some(observer) = &observer {
                observer.warn_log(&format!("status check failed: {e}"));
            }
            e.to_string()
        });
        let _ = tx.send(UiEvent::StatusChecked(result));
    })
}

pub fn spawn_clear(
    client: Arc<dyn AgentClient>,
    tx: mpsc::Sender<UiEvent>,
    observer: Option<Observer>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let event = match client.clear() {
            Ok(()) => UiEvent::Cleared,
            Err(e) => {
                if let Some(observer) = &observer {
                    observer.warn_log(&format!("clear history failed: {e}"));
                }
                UiEvent::ClearFailed(e.to_string())
            }
        };
        let _ = tx.send(event);
    })
}

/// Event handling for the chat screen, independent of the real terminal.
pub struct ChatSession {
    controller: TerminalController,
    bindings: KeyBindings,
    client: Arc<dyn AgentClient>,
    observer: Option<Observer>,
    tx: mpsc::Sender<UiEvent>,
    rx: mpsc::Receiver<UiEvent>,
    stream_worker: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(
        controller: TerminalController,
        bindings: KeyBindings,
        client: Arc<dyn AgentClient>,
        observer: Option<Observer>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            controller,
            bindings,
            client,
            observer,
            tx,
            rx,
            stream_worker: None,
        }
    }

    pub fn controller(&self) -> &TerminalController {
        &self.controller
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn refresh_status(&self) {
        spawn_status_check(
            Arc::clone(&self.client),
            self.tx.clone(),
            self.observer.clone(),
        );
    }

    /// Apply everything workers reported since the last call.
    pub fn pump(&mut self) {
        // Checked before draining so that every event the worker sent is
        // already in the channel when it is seen as finished.
        let worker_done = self
            .stream_worker
            .as_ref()
            .is_some_and(JoinHandle::is_finished);

        while let Ok(ev) = self.rx.try_recv() {
            self.controller.apply(ev);
        }

        if worker_done {
            self.stream_worker = None;
            if self.controller.is_busy() {
                self.warn("request worker stopped without reporting a result");
                self.controller
                    .apply(UiEvent::StreamFailed(WORKER_STOPPED.to_string()));
            }
        }
        self.controller.tick();
    }

    /// Returns `false` when the session should end.
    pub fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Paste(text) => {
                self.controller.insert_str(&text);
                true
            }
            Event::FocusGained => {
                self.refresh_status();
                true
            }
            _ => true,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.bindings.action_for(&key) {
            UiAction::Exit => return false,
            UiAction::Submit => self.submit(),
            UiAction::ClearInput => self.controller.clear_input(),
            UiAction::ClearHistory => {
                self.verbose("clearing conversation history");
                spawn_clear(
                    Arc::clone(&self.client),
                    self.tx.clone(),
                    self.observer.clone(),
                );
            }
            UiAction::ScrollUp => self.controller.scroll_up(SCROLL_PAGE_ROWS),
            UiAction::ScrollDown => self.controller.scroll_down(SCROLL_PAGE_ROWS),
            UiAction::Edit => self.edit(key),
        }
        true
    }

    fn edit(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.controller.insert_char(ch);
            }
            KeyCode::Backspace => self.controller.backspace(),
            KeyCode::Delete => self.controller.delete(),
            KeyCode::Left => self.controller.move_left(),
            KeyCode::Right => self.controller.move_right(),
            KeyCode::Home => self.controller.move_home(),
            KeyCode::End => self.controller.move_end(),
            _ => {}
        }
    }

    fn submit(&mut self) {
        let Some(message) = self.controller.submit() else {
            return;
        };
        self.verbose(&format!(
            "submitting message ({} chars)",
            message.chars().count()
        ));
        self.stream_worker = Some(spawn_stream(
            Arc::clone(&self.client),
            message,
            self.tx.clone(),
            self.observer.clone(),
        ));
    }

    fn verbose(&self, msg: &str) {
        if let Some(observer) = &self.observer {
            observer.verbose_log(msg);
        }
    }

    fn warn(&self, msg: &str) {
        if let Some(observer) = &self.observer {
            observer.warn_log(msg);
        }
    }
}

/// Take over the terminal and run the interactive chat until the exit key
/// or SIGINT.
pub fn run_tui(session: ChatSession, theme: TuiTheme) -> Result<()> {
    // SIGINT sets a flag instead of killing the process.
    let sigint_flag = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        let flag = Arc::clone(&sigint_flag);
        signal_hook::flag::register(signal_hook::consts::SIGINT, flag)?;
    }

    // The hook is process-wide; only a panic on the UI thread tears down the
    // terminal. Worker panics are caught in the worker.
    let ui_thread = thread::current().id();
    let prev_hook: Arc<PanicHook> = Arc::from(std::panic::take_hook());
    let chained = Arc::clone(&prev_hook);
    std::panic::set_hook(Box::new(move |info| {
        if thread::current().id() == ui_thread {
            let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            let _ = disable_raw_mode();
        }
        (*chained)(info);
    }));

    let result = run_terminal(session, &theme, &sigint_flag);
    std::panic::set_hook(Box::new(move |info| (*prev_hook)(info)));
    result
}

fn run_terminal(
    mut session: ChatSession,
    theme: &TuiTheme,
    sigint_flag: &AtomicBool,
) -> Result<()> {
    enable_raw_mode()?;
    let _guard = TerminalGuard;
    crossterm::execute!(
        io::stdout(),
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableFocusChange
    )?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    terminal.clear()?;

    if let Some(observer) = &session.observer {
        let _ = observer.record("session.started", json!({}));
    }
    session.refresh_status();
    let hint = session.bindings().hint();

    loop {
        session.pump();
        let mut scroll_limit = 0;
        terminal.draw(|frame| {
            scroll_limit = draw(frame, session.controller(), theme, &hint);
        })?;
        session.controller.set_scroll_limit(scroll_limit);

        if sigint_flag.swap(false, Ordering::Relaxed) {
            break;
        }
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if !session.handle_event(event::read()?) {
            break;
        }
    }

    if let Some(observer) = &session.observer {
        let _ = observer.record(
            "session.finished",
            json!({ "entries": session.controller().transcript().len() }),
        );
    }
    terminal.show_cursor()?;
    Ok(())
}
