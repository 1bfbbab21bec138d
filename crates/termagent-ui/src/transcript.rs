#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Ai,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub kind: EntryKind,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Ordered, in-memory conversation as shown on screen.
///
/// At most one AI entry is "open" at a time: the entry the current stream
/// appends to. It is created by the first message of a stream and closed
/// when the stream ends, fails, or the transcript is reset.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    open_ai: Option<usize>,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::new(EntryKind::User, text));
    }

    pub fn push_ai(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::new(EntryKind::Ai, text));
    }

    pub fn push_error(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::new(EntryKind::Error, text));
    }

    /// Append streamed text to the open AI entry, opening one if needed.
    pub fn append_streaming(&mut self, text: &str) {
        if let Some(idx) = self.open_ai
            && let Some(entry) = self.entries.get_mut(idx)
        {
            entry.text.push_str(text);
            return;
        }
        self.entries.push(TranscriptEntry::new(EntryKind::Ai, text));
        self.open_ai = Some(self.entries.len() - 1);
    }

    /// Stop appending to the current AI entry. The next streamed text
    /// starts a new one.
    pub fn close_streaming(&mut self) {
        self.open_ai = None;
    }

    pub fn has_open_streaming(&self) -> bool {
        self.open_ai.is_some()
    }

    /// Replace everything with a single AI entry.
    pub fn reset_to(&mut self, greeting: impl Into<String>) {
        self.entries.clear();
        self.open_ai = None;
        self.push_ai(greeting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_appends_to_one_entry_until_closed() {
        let mut t = Transcript::default();
        t.push_user("hi");
        t.append_streaming("a");
        t.append_streaming("b");
        assert_eq!(t.len(), 2);
        assert_eq!(t.entries()[1], TranscriptEntry::new(EntryKind::Ai, "ab"));

        t.close_streaming();
        t.append_streaming("c");
        assert_eq!(t.len(), 3);
        assert_eq!(t.entries()[2].text, "c");
    }

    #[test]
    fn streaming_never_extends_an_ai_entry_it_did_not_open() {
        let mut t = Transcript::default();
        t.reset_to("greeting");
        t.append_streaming("reply");
        assert_eq!(t.len(), 2);
        assert_eq!(t.entries()[0].text, "greeting");
        assert_eq!(t.entries()[1].text, "reply");
    }

    #[test]
    fn error_between_chunks_keeps_appending_to_the_open_entry() {
        let mut t = Transcript::default();
        t.append_streaming("part one");
        t.push_error("Error: tool failed");
        t.append_streaming(", part two");
        assert_eq!(t.len(), 2);
        assert_eq!(t.entries()[0].text, "part one, part two");
        assert_eq!(t.entries()[1].kind, EntryKind::Error);
    }

    #[test]
    fn reset_leaves_exactly_one_entry() {
        let mut t = Transcript::default();
        t.push_user("a");
        t.append_streaming("b");
        t.push_error("c");
        t.reset_to("fresh");
        assert_eq!(t.entries(), &[TranscriptEntry::new(EntryKind::Ai, "fresh")]);
        assert!(!t.has_open_streaming());
    }
}
