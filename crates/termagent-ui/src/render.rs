use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::parsing::SyntaxSet;
use termagent_core::ThemeConfig;
use unicode_width::UnicodeWidthStr;

use crate::controller::{StatusIndicator, TerminalController};
use crate::transcript::{EntryKind, Transcript, TranscriptEntry};

const CODE_GUTTER: &str = "│ ";

struct SyntectAssets {
    syntax_set: SyntaxSet,
    theme: Option<SyntectTheme>,
}

/// Shared syntect assets, loaded on first use.
fn syntect_assets() -> &'static SyntectAssets {
    use std::sync::OnceLock;
    static ASSETS: OnceLock<SyntectAssets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get("base16-eighties.dark")
            .or_else(|| theme_set.themes.values().next())
            .cloned();
        SyntectAssets { syntax_set, theme }
    })
}

fn syntect_color_to_ratatui(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

pub fn parse_theme_color(name: &str) -> Color {
    match name.to_ascii_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        _ => Color::Cyan,
    }
}

#[derive(Debug, Clone)]
pub struct TuiTheme {
    /// Prompt marker, borders and the online indicator.
    pub primary: Color,
    /// Inline code and code-block gutter.
    pub secondary: Color,
    pub error: Color,
}

impl Default for TuiTheme {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            secondary: Color::Green,
            error: Color::Red,
        }
    }
}

impl TuiTheme {
    pub fn from_config(cfg: &ThemeConfig) -> Self {
        Self {
            primary: parse_theme_color(&cfg.primary),
            secondary: parse_theme_color(&cfg.secondary),
            error: parse_theme_color(&cfg.error),
        }
    }
}

/// Language token of a code fence (```` ```rust ```` gives `"rust"`).
fn extract_fence_lang(fence: &str) -> &str {
    fence.trim().trim_start_matches('`').trim()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Highlight one line inside a fenced block. Unknown languages render as
/// plain code.
fn highlight_code_line(line: &str, lang: &str, theme: &TuiTheme) -> Vec<Span<'static>> {
    let assets = syntect_assets();
    let syntax = if lang.is_empty() {
        None
    } else {
        assets
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| assets.syntax_set.find_syntax_by_extension(lang))
    };

    if let (Some(syntax), Some(syn_theme)) = (syntax, assets.theme.as_ref()) {
        use syntect::easy::HighlightLines;
        let mut h = HighlightLines::new(syntax, syn_theme);
        if let Ok(ranges) = h.highlight_line(line, &assets.syntax_set) {
            let spans: Vec<Span<'static>> = ranges
                .into_iter()
                .map(|(style, text)| {
                    let mut ratatui_style =
                        Style::default().fg(syntect_color_to_ratatui(style.foreground));
                    if style
                        .font_style
                        .contains(syntect::highlighting::FontStyle::BOLD)
                    {
                        ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
                    }
                    Span::styled(text.to_string(), ratatui_style)
                })
                .collect();
            if !spans.is_empty() {
                return spans;
            }
        }
    }

    vec![Span::styled(
        line.to_string(),
        Style::default().fg(theme.secondary),
    )]
}

/// Split a prose line into plain and `` `code` `` spans. An unmatched
/// backtick is kept as literal text.
pub fn parse_inline_code(text: &str, base: Style, code: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('`') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('`') else {
            break;
        };
        if open > 0 {
            spans.push(Span::styled(rest[..open].to_string(), base));
        }
        spans.push(Span::styled(after[..close].to_string(), code));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() || spans.is_empty() {
        spans.push(Span::styled(rest.to_string(), base));
    }
    spans
}

/// Format AI text: fence lines are hidden, lines between fences become code
/// lines, everything else gets inline code styling.
pub fn format_ai_text(text: &str, theme: &TuiTheme) -> Vec<Line<'static>> {
    let base = Style::default();
    let inline = Style::default()
        .fg(theme.secondary)
        .add_modifier(Modifier::BOLD);
    let gutter = Style::default().fg(Color::DarkGray);

    let mut lines = Vec::new();
    let mut code_lang: Option<String> = None;
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if is_fence(raw) {
            code_lang = match code_lang {
                Some(_) => None,
                None => Some(extract_fence_lang(raw).to_ascii_lowercase()),
            };
            continue;
        }
        match &code_lang {
            Some(lang) => {
                let mut spans = vec![Span::styled(CODE_GUTTER, gutter)];
                spans.extend(highlight_code_line(raw, lang, theme));
                lines.push(Line::from(spans));
            }
            None => lines.push(Line::from(parse_inline_code(raw, base, inline))),
        }
    }
    lines
}

pub fn entry_lines(entry: &TranscriptEntry, theme: &TuiTheme) -> Vec<Line<'static>> {
    match entry.kind {
        EntryKind::User => {
            let prompt = Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD);
            entry
                .text
                .split('\n')
                .enumerate()
                .map(|(i, line)| {
                    let marker = if i == 0 { "❯ " } else { "  " };
                    Line::from(vec![
                        Span::styled(marker, prompt),
                        Span::styled(line.to_string(), Style::default().fg(Color::White)),
                    ])
                })
                .collect()
        }
        EntryKind::Ai => format_ai_text(&entry.text, theme)
            .into_iter()
            .map(|line| {
                let mut spans = vec![Span::raw("  ")];
                spans.extend(line.spans);
                Line::from(spans)
            })
            .collect(),
        EntryKind::Error => {
            let style = Style::default().fg(theme.error);
            entry
                .text
                .split('\n')
                .enumerate()
                .map(|(i, line)| {
                    let marker = if i == 0 { "✗ " } else { "  " };
                    Line::from(vec![
                        Span::styled(marker, style.add_modifier(Modifier::BOLD)),
                        Span::styled(line.to_string(), style),
                    ])
                })
                .collect()
        }
    }
}

pub fn transcript_lines(transcript: &Transcript, theme: &TuiTheme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, entry) in transcript.entries().iter().enumerate() {
        if idx > 0 {
            lines.push(Line::default());
        }
        lines.extend(entry_lines(entry, theme));
    }
    lines
}

pub fn status_line(
    controller: &TerminalController,
    theme: &TuiTheme,
    hint: &str,
) -> Line<'static> {
    let status = controller.status();
    let dot_color = match status {
        StatusIndicator::Online => theme.primary,
        StatusIndicator::Offline => theme.error,
        StatusIndicator::Unknown => Color::DarkGray,
    };
    let mut spans = vec![
        Span::styled(" ● ", Style::default().fg(dot_color)),
        Span::styled(status.label(), Style::default().add_modifier(Modifier::BOLD)),
    ];
    if let Some(model) = controller.server_model() {
        spans.push(Span::styled(
            format!(" · {model}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if controller.is_busy() {
        spans.push(Span::styled(
            format!("  {} {}", controller.spinner_frame(), controller.state().label()),
            Style::default().fg(theme.secondary),
        ));
    } else if !controller.info_line().is_empty() {
        spans.push(Span::styled(
            format!("  {}", controller.info_line()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if controller.scroll_back() > 0 {
        spans.push(Span::styled(
            format!("  ↑{}", controller.scroll_back()),
            Style::default().fg(Color::Yellow),
        ));
    }
    spans.push(Span::styled(
        format!("  {hint}"),
        Style::default().fg(Color::DarkGray),
    ));
    Line::from(spans)
}

/// Number of transcript rows scrolled past, given the rendered height.
fn scroll_limit(total_rows: usize, viewport_rows: u16) -> u16 {
    let max = total_rows.saturating_sub(viewport_rows as usize);
    u16::try_from(max).unwrap_or(u16::MAX)
}

fn scroll_offset(total_rows: usize, viewport_rows: u16, scroll_back: u16) -> u16 {
    scroll_limit(total_rows, viewport_rows).saturating_sub(scroll_back)
}

/// Render the whole chat screen. Returns how many rows the transcript can
/// be scrolled back at this size.
pub fn draw(
    frame: &mut Frame,
    controller: &TerminalController,
    theme: &TuiTheme,
    hint: &str,
) -> u16 {
    let [transcript_area, input_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let scroll_limit = draw_transcript(frame, controller, theme, transcript_area);
    draw_input(frame, controller, theme, input_area);
    frame.render_widget(
        Paragraph::new(status_line(controller, theme, hint)),
        status_area,
    );
    scroll_limit
}

fn draw_transcript(
    frame: &mut Frame,
    controller: &TerminalController,
    theme: &TuiTheme,
    area: Rect,
) -> u16 {
    let paragraph =
        Paragraph::new(transcript_lines(controller.transcript(), theme)).wrap(Wrap { trim: false });
    let total = paragraph.line_count(area.width);
    let offset = scroll_offset(total, area.height, controller.scroll_back());
    frame.render_widget(paragraph.scroll((offset, 0)), area);
    scroll_limit(total, area.height)
}

fn draw_input(frame: &mut Frame, controller: &TerminalController, theme: &TuiTheme, area: Rect) {
    let busy = controller.is_busy();
    let (title, border, text_style) = if busy {
        (
            " waiting for reply ",
            Style::default().fg(Color::DarkGray),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (
            " message ",
            Style::default().fg(theme.primary),
            Style::default(),
        )
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title);
    let inner = block.inner(area);

    let before_cursor = controller.input()[..controller.cursor()].width();
    let inner_width = inner.width.saturating_sub(1) as usize;
    let hscroll = before_cursor.saturating_sub(inner_width);
    let hscroll = u16::try_from(hscroll).unwrap_or(u16::MAX);

    frame.render_widget(
        Paragraph::new(Span::styled(controller.input().to_string(), text_style))
            .block(block)
            .scroll((0, hscroll)),
        area,
    );

    if !busy && inner.width > 0 && inner.height > 0 {
        let col = u16::try_from(before_cursor)
            .unwrap_or(u16::MAX)
            .saturating_sub(hscroll);
        frame.set_cursor_position((inner.x.saturating_add(col), inner.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerOptions, UiEvent};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use termagent_core::{ServerStatus, StreamEvent};

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn fenced_blocks_render_as_gutter_code_lines() {
        let theme = TuiTheme::default();
        let lines = format_ai_text("Run this:\n```sh\nls -la\n```\ndone", &theme);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["Run this:", "│ ls -la", "done"]);
    }

    #[test]
    fn unknown_language_falls_back_to_plain_code() {
        let theme = TuiTheme::default();
        let spans = highlight_code_line("frobnicate()", "no-such-lang", &theme);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "frobnicate()");
        assert_eq!(spans[0].style.fg, Some(theme.secondary));
    }

    #[test]
    fn known_language_is_highlighted() {
        let theme = TuiTheme::default();
        let spans = highlight_code_line("fn main() {}", "rust", &theme);
        let joined: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(joined, "fn main() {}");
        assert!(spans.len() > 1);
    }

    #[test]
    fn unterminated_fence_keeps_formatting_streamed_code() {
        let theme = TuiTheme::default();
        let lines = format_ai_text("```python\nprint(1)", &theme);
        assert_eq!(lines.len(), 1);
        assert!(line_text(&lines[0]).starts_with(CODE_GUTTER));
    }

    #[test]
    fn inline_code_spans_are_styled() {
        let base = Style::default();
        let code = Style::default().fg(Color::Green);
        let spans = parse_inline_code("use `git status` now", base, code);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].content, "git status");
        assert_eq!(spans[1].style, code);

        let spans = parse_inline_code("a ` lone tick", base, code);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "a ` lone tick");
    }

    #[test]
    fn error_entries_use_error_color() {
        let theme = TuiTheme::default();
        let lines = entry_lines(
            &TranscriptEntry::new(EntryKind::Error, "Error: boom"),
            &theme,
        );
        assert_eq!(line_text(&lines[0]), "✗ Error: boom");
        assert_eq!(lines[0].spans[1].style.fg, Some(Color::Red));
    }

    #[test]
    fn theme_from_config_parses_names() {
        let theme = TuiTheme::from_config(&ThemeConfig {
            primary: "LightBlue".to_string(),
            secondary: "yellow".to_string(),
            error: "nonsense".to_string(),
        });
        assert_eq!(theme.primary, Color::LightBlue);
        assert_eq!(theme.secondary, Color::Yellow);
        assert_eq!(theme.error, Color::Cyan);
    }

    #[test]
    fn draw_reports_how_far_the_transcript_can_scroll() {
        let theme = TuiTheme::default();
        let mut c = TerminalController::new(ControllerOptions::default());
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        let mut limit = u16::MAX;
        terminal
            .draw(|f| limit = draw(f, &c, &theme, ""))
            .unwrap();
        assert_eq!(limit, 0);

        for i in 0..20 {
            c.insert_str(&format!("line {i}"));
            c.submit();
            c.apply(UiEvent::StreamFinished);
        }
        terminal
            .draw(|f| limit = draw(f, &c, &theme, ""))
            .unwrap();
        // 21 entries above a 12-row screen with 4 rows of input and status.
        assert!(limit >= 21 - 8, "limit was {limit}");
    }

    #[test]
    fn scroll_offset_pins_to_bottom_and_clamps() {
        assert_eq!(scroll_offset(50, 10, 0), 40);
        assert_eq!(scroll_offset(50, 10, 15), 25);
        assert_eq!(scroll_offset(50, 10, 500), 0);
        assert_eq!(scroll_offset(5, 10, 0), 0);
    }

    #[test]
    fn status_line_shows_indicator_and_model() {
        let mut c = TerminalController::default();
        let theme = TuiTheme::default();
        assert!(line_text(&status_line(&c, &theme, "")).contains("checking"));
        c.apply(UiEvent::StatusChecked(Ok(ServerStatus {
            model: Some("gemini-pro".to_string()),
            ..ServerStatus::default()
        })));
        let text = line_text(&status_line(&c, &theme, "Ctrl+C quit"));
        assert!(text.contains("online"));
        assert!(text.contains("gemini-pro"));
        assert!(text.contains("Ctrl+C quit"));
    }

    #[test]
    fn draw_shows_latest_output_and_busy_input() {
        let mut c = TerminalController::new(ControllerOptions {
            reduced_motion: true,
            ..ControllerOptions::default()
        });
        for ch in "hello".chars() {
            c.insert_char(ch);
        }
        c.submit();
        c.apply(UiEvent::Stream(StreamEvent::Message {
            content: "hi there".to_string(),
        }));

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        let theme = TuiTheme::default();
        terminal
            .draw(|f| {
                draw(f, &c, &theme, "");
            })
            .unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("❯ hello"));
        assert!(screen.contains("hi there"));
        assert!(screen.contains("waiting for reply"));
        assert!(screen.contains("streaming"));
    }
}
