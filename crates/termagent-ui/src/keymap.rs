use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub exit: KeyEvent,
    pub submit: KeyEvent,
    pub clear_input: KeyEvent,
    pub clear_history: KeyEvent,
    pub scroll_up: KeyEvent,
    pub scroll_down: KeyEvent,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct KeyBindingsFile {
    exit: Option<String>,
    submit: Option<String>,
    clear_input: Option<String>,
    clear_history: Option<String>,
    scroll_up: Option<String>,
    scroll_down: Option<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            exit: KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            submit: KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE),
            clear_input: KeyEvent::new(KeyCode::Char('k'), KeyModifiers::CONTROL),
            clear_history: KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL),
            scroll_up: KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE),
            scroll_down: KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE),
        }
    }
}

/// What a key press means to the chat screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Exit,
    Submit,
    ClearInput,
    ClearHistory,
    ScrollUp,
    ScrollDown,
    /// Not bound; handled as plain input editing.
    Edit,
}

impl KeyBindings {
    fn apply_overrides(mut self, raw: KeyBindingsFile) -> Result<Self> {
        if let Some(value) = raw.exit {
            self.exit = parse_key_event(&value)?;
        }
        if let Some(value) = raw.submit {
            self.submit = parse_key_event(&value)?;
        }
        if let Some(value) = raw.clear_input {
            self.clear_input = parse_key_event(&value)?;
        }
        if let Some(value) = raw.clear_history {
            self.clear_history = parse_key_event(&value)?;
        }
        if let Some(value) = raw.scroll_up {
            self.scroll_up = parse_key_event(&value)?;
        }
        if let Some(value) = raw.scroll_down {
            self.scroll_down = parse_key_event(&value)?;
        }
        Ok(self)
    }

    /// Resolve a key press. Exit wins over every other binding.
    pub fn action_for(&self, key: &KeyEvent) -> UiAction {
        let table = [
            (&self.exit, UiAction::Exit),
            (&self.submit, UiAction::Submit),
            (&self.clear_input, UiAction::ClearInput),
            (&self.clear_history, UiAction::ClearHistory),
            (&self.scroll_up, UiAction::ScrollUp),
            (&self.scroll_down, UiAction::ScrollDown),
        ];
        table
            .into_iter()
            .find(|(binding, _)| matches_binding(binding, key))
            .map(|(_, action)| action)
            .unwrap_or(UiAction::Edit)
    }

    /// Short hint shown in the status bar, e.g. `Ctrl+L clear`.
    pub fn hint(&self) -> String {
        format!(
            "{} send · {} clear input · {} clear history · {} quit",
            describe_key(&self.submit),
            describe_key(&self.clear_input),
            describe_key(&self.clear_history),
            describe_key(&self.exit),
        )
    }
}

fn matches_binding(binding: &KeyEvent, key: &KeyEvent) -> bool {
    // Shift is reported inconsistently for characters; only require it when
    // the binding names it.
    let relevant = KeyModifiers::CONTROL | KeyModifiers::ALT;
    let same_code = match (binding.code, key.code) {
        (KeyCode::Char(a), KeyCode::Char(b)) => a.eq_ignore_ascii_case(&b),
        (a, b) => a == b,
    };
    same_code
        && (binding.modifiers & relevant) == (key.modifiers & relevant)
        && (!binding.modifiers.contains(KeyModifiers::SHIFT)
            || key.modifiers.contains(KeyModifiers::SHIFT))
}

pub fn load_keybindings(path: &Path) -> Result<KeyBindings> {
    let raw = fs::read_to_string(path)?;
    let parsed: KeyBindingsFile = serde_json::from_str(&raw)?;
    KeyBindings::default().apply_overrides(parsed)
}

pub fn parse_key_event(value: &str) -> Result<KeyEvent> {
    let mut modifiers = KeyModifiers::NONE;
    let mut key_code: Option<KeyCode> = None;
    for token in value
        .split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
    {
        let normalized = token.to_ascii_lowercase();
        match normalized.as_str() {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            "alt" | "option" => modifiers |= KeyModifiers::ALT,
            other => {
                key_code = Some(
                    parse_key_code(other)
                        .ok_or_else(|| anyhow::anyhow!("unsupported keybinding token: {token}"))?,
                );
            }
        }
    }
    let code = key_code.ok_or_else(|| anyhow::anyhow!("missing key code in keybinding"))?;
    Ok(KeyEvent::new(code, modifiers))
}

fn parse_key_code(value: &str) -> Option<KeyCode> {
    match value {
        "enter" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        "home" => Some(KeyCode::Home),
        "end" => Some(KeyCode::End),
        "pageup" | "pgup" => Some(KeyCode::PageUp),
        "pagedown" | "pgdn" => Some(KeyCode::PageDown),
        "backspace" => Some(KeyCode::Backspace),
        "delete" | "del" => Some(KeyCode::Delete),
        "space" => Some(KeyCode::Char(' ')),
        value if value.chars().count() == 1 => value.chars().next().map(KeyCode::Char),
        _ => None,
    }
}

fn describe_key(key: &KeyEvent) -> String {
    let mut parts = Vec::new();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        parts.push("Ctrl".to_string());
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        parts.push("Alt".to_string());
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        parts.push("Shift".to_string());
    }
    parts.push(match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
        KeyCode::PageUp => "PgUp".to_string(),
        KeyCode::PageDown => "PgDn".to_string(),
        other => format!("{other:?}"),
    });
    parts.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_keys() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.submit.code, KeyCode::Enter);
        assert_eq!(bindings.clear_input.code, KeyCode::Char('k'));
        assert_eq!(bindings.clear_input.modifiers, KeyModifiers::CONTROL);
        assert_eq!(bindings.clear_history.code, KeyCode::Char('l'));
        assert_eq!(bindings.exit.code, KeyCode::Char('c'));
    }

    #[test]
    fn overrides_replace_only_named_bindings() {
        let raw = KeyBindingsFile {
            clear_history: Some("alt+x".to_string()),
            ..Default::default()
        };
        let bindings = KeyBindings::default().apply_overrides(raw).unwrap();
        assert_eq!(bindings.clear_history.code, KeyCode::Char('x'));
        assert_eq!(bindings.clear_history.modifiers, KeyModifiers::ALT);
        assert_eq!(bindings.submit.code, KeyCode::Enter);
    }

    #[test]
    fn parse_key_event_accepts_modifier_chains() {
        let key = parse_key_event("Ctrl + Shift + PageUp").unwrap();
        assert_eq!(key.code, KeyCode::PageUp);
        assert_eq!(key.modifiers, KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert!(parse_key_event("ctrl+").is_err());
        assert!(parse_key_event("ctrl+hyper").is_err());
    }

    #[test]
    fn action_for_dispatches_bound_keys() {
        let bindings = KeyBindings::default();
        let ctrl_l = KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL);
        let plain_l = KeyEvent::new(KeyCode::Char('l'), KeyModifiers::NONE);
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(bindings.action_for(&ctrl_l), UiAction::ClearHistory);
        assert_eq!(bindings.action_for(&plain_l), UiAction::Edit);
        assert_eq!(bindings.action_for(&enter), UiAction::Submit);
        assert_eq!(bindings.action_for(&ctrl_c), UiAction::Exit);
    }

    #[test]
    fn load_keybindings_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keybindings.json");
        fs::write(&path, r#"{"submit":"ctrl+enter","scroll_up":"up"}"#).unwrap();
        let bindings = load_keybindings(&path).unwrap();
        assert_eq!(bindings.submit.modifiers, KeyModifiers::CONTROL);
        assert_eq!(bindings.scroll_up.code, KeyCode::Up);

        fs::write(&path, r#"{"exit":"ctrl+nope"}"#).unwrap();
        assert!(load_keybindings(&path).is_err());
    }

    #[test]
    fn hint_names_the_bound_keys() {
        let hint = KeyBindings::default().hint();
        assert!(hint.contains("Ctrl+L clear history"));
        assert!(hint.contains("Enter send"));
    }
}
