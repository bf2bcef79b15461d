use super::rules::{Response, RuleTable};
use super::tokenizer::Command;

/// Shortest partial input that gets a completion hint.
const MIN_SUGGEST_LEN: usize = 2;

type Listener = Box<dyn FnMut(&str) + Send>;

/// One executed command as shown in the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub input: String,
    pub response: Response,
    /// Whether the explanation panel for this entry is open.
    pub show_note: bool,
}

/// What a submit did to the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank input; nothing recorded.
    Ignored,
    /// The clear sentinel fired and the display history was wiped.
    Cleared,
    Displayed(Response),
}

/// The console shell for one lab: dispatch, display history, recall of
/// previously typed lines and inline completion.
pub struct Interpreter {
    table: RuleTable,
    vocabulary: Vec<&'static str>,
    entries: Vec<HistoryEntry>,
    submitted: Vec<String>,
    /// Recall position counted back from the newest line. `None` is the draft.
    cursor: Option<usize>,
    listeners: Vec<Listener>,
}

impl Interpreter {
    pub fn new(table: RuleTable, vocabulary: Vec<&'static str>) -> Self {
        Self {
            table,
            vocabulary,
            entries: Vec::new(),
            submitted: Vec::new(),
            cursor: None,
            listeners: Vec::new(),
        }
    }

    /// Register a callback that receives every trimmed command that produced
    /// output.
    pub fn subscribe(&mut self, listener: impl FnMut(&str) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn submit(&mut self, input: &str) -> Submission {
        let Some(cmd) = Command::parse(input) else {
            return Submission::Ignored;
        };

        let response = self.table.resolve(&cmd);
        self.submitted.push(cmd.raw.clone());
        self.cursor = None;

        if response.is_clear_screen() {
            tracing::debug!("console cleared");
            self.entries.clear();
            return Submission::Cleared;
        }

        self.entries.push(HistoryEntry {
            input: cmd.raw.clone(),
            response: response.clone(),
            show_note: false,
        });

        for listener in &mut self.listeners {
            listener(&cmd.raw);
        }

        Submission::Displayed(response)
    }

    /// Step toward older input. Returns the line to place in the prompt.
    pub fn history_back(&mut self) -> &str {
        let Some(last) = self.submitted.len().checked_sub(1) else {
            return "";
        };
        let pos = self.cursor.map_or(0, |c| (c + 1).min(last));
        self.cursor = Some(pos);
        &self.submitted[last - pos]
    }

    /// Step toward newer input, ending at an empty draft.
    pub fn history_forward(&mut self) -> &str {
        self.cursor = match self.cursor {
            None | Some(0) => None,
            Some(c) => Some(c - 1),
        };
        match self.cursor {
            Some(pos) => &self.submitted[self.submitted.len() - 1 - pos],
            None => "",
        }
    }

    /// The remaining characters of the first known command extending
    /// `partial`, if it is still a single word of at least two characters.
    pub fn suggest(&self, partial: &str) -> Option<&'static str> {
        if partial.len() < MIN_SUGGEST_LEN || partial.contains(char::is_whitespace) {
            return None;
        }
        let base = partial.to_lowercase();
        self.vocabulary
            .iter()
            .find(|c| c.starts_with(base.as_str()) && **c != base)
            .and_then(|c| c.get(base.len()..))
    }

    /// The completed command name. Does not execute anything.
    pub fn accept_suggestion(&self, partial: &str) -> Option<String> {
        self.suggest(partial)
            .map(|rest| format!("{}{}", partial.to_lowercase(), rest))
    }

    /// Flip the explanation panel of one entry. Returns the new state, or
    /// `None` when the entry does not exist or has no note.
    pub fn toggle_note(&mut self, index: usize) -> Option<bool> {
        let entry = self.entries.get_mut(index)?;
        entry.response.note.as_ref()?;
        entry.show_note = !entry.show_note;
        Some(entry.show_note)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Every non-blank line submitted this session, oldest first.
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }

    pub fn vocabulary(&self) -> &[&'static str] {
        &self.vocabulary
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::console::rules::predicates::*;
    use crate::console::rules::Rule;

    fn shell() -> Interpreter {
        let table = RuleTable::new(vec![
            Rule::fixed("whoami", cmd("whoami"), Response::lines(["student"]))
                .example("whoami"),
            Rule::fixed("clear", cmd("clear"), Response::clear_screen()).example("clear"),
            Rule::fixed(
                "ping",
                cmd("ping"),
                Response::lines(["64 bytes"]).with_note_en("ICMP echo"),
            ),
        ]);
        Interpreter::new(table, vec!["whoami", "whois", "ping", "clear"])
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut sh = shell();
        assert_eq!(sh.submit("   "), Submission::Ignored);
        assert!(sh.entries().is_empty());
        assert!(sh.submitted().is_empty());
    }

    #[test]
    fn clear_wipes_display_but_keeps_recall() {
        let mut sh = shell();
        sh.submit("whoami");
        assert_eq!(sh.submit("clear"), Submission::Cleared);
        assert!(sh.entries().is_empty());
        assert_eq!(sh.submitted(), ["whoami", "clear"]);
        assert_eq!(sh.history_back(), "clear");
    }

    #[test]
    fn recall_is_clamped_at_both_ends() {
        let mut sh = shell();
        assert_eq!(sh.history_back(), "");
        sh.submit("whoami");
        sh.submit("ping x");

        assert_eq!(sh.history_back(), "ping x");
        assert_eq!(sh.history_back(), "whoami");
        assert_eq!(sh.history_back(), "whoami");
        assert_eq!(sh.history_forward(), "ping x");
        assert_eq!(sh.history_forward(), "");
        assert_eq!(sh.history_forward(), "");
    }

    #[test]
    fn suggestions_skip_exact_matches_and_multiword_input() {
        let sh = shell();
        assert_eq!(sh.suggest("w"), None);
        assert_eq!(sh.suggest("wh"), Some("oami"));
        assert_eq!(sh.suggest("whoami"), None);
        assert_eq!(sh.suggest("whoi"), Some("s"));
        assert_eq!(sh.suggest("ping "), None);
        assert_eq!(sh.accept_suggestion("pi").as_deref(), Some("ping"));
    }

    #[test]
    fn listeners_see_trimmed_commands_but_not_clears() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut sh = shell();
        sh.subscribe(move |c| sink.lock().unwrap().push(c.to_string()));

        sh.submit("  whoami  ");
        sh.submit("clear");
        sh.submit("nope");

        assert_eq!(*seen.lock().unwrap(), vec!["whoami", "nope"]);
    }

    #[test]
    fn notes_toggle_only_where_present() {
        let mut sh = shell();
        sh.submit("whoami");
        sh.submit("ping 8.8.8.8");
        assert_eq!(sh.toggle_note(0), None);
        assert_eq!(sh.toggle_note(1), Some(true));
        assert_eq!(sh.toggle_note(1), Some(false));
        assert_eq!(sh.toggle_note(7), None);
    }
}
