use std::fmt;

use super::tokenizer::Command;

/// First line of the response that wipes the console instead of printing.
pub const CLEAR_SCREEN: &str = "__CLEAR__";

/// Bilingual explanation attached to a response, shown on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub en: String,
    pub ar: Option<String>,
}

/// Canned output for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub lines: Vec<String>,
    pub note: Option<Note>,
    pub is_error: bool,
}

impl Response {
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            note: None,
            is_error: false,
        }
    }

    pub fn with_note(mut self, en: impl Into<String>, ar: impl Into<String>) -> Self {
        self.note = Some(Note {
            en: en.into(),
            ar: Some(ar.into()),
        });
        self
    }

    pub fn with_note_en(mut self, en: impl Into<String>) -> Self {
        self.note = Some(Note {
            en: en.into(),
            ar: None,
        });
        self
    }

    pub fn error(mut self) -> Self {
        self.is_error = true;
        self
    }

    pub fn clear_screen() -> Self {
        Self::lines([CLEAR_SCREEN])
    }

    pub fn is_clear_screen(&self) -> bool {
        self.lines.first().is_some_and(|l| l == CLEAR_SCREEN)
    }

    /// The response for a command name no rule knows about.
    pub fn not_found(name: &str) -> Self {
        Self::lines([
            format!("{}: command not found", name),
            "Type 'help' to see available commands.".to_string(),
        ])
        .error()
    }
}

/// A pure condition over a tokenized [`Command`].
///
/// `Contains` and `Equals` compare against [`Command::lowered`], so their
/// needles must be written in lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    /// Case-folded command name equals.
    Name(&'static str),
    Flag(&'static str),
    FlagIgnoreCase(&'static str),
    NoFlags,
    /// The set of flags given is exactly this set (order and repeats ignored).
    FlagsExactly(&'static [&'static str]),
    /// Some positional argument equals this value.
    Arg(&'static str),
    NoArgs,
    Contains(&'static str),
    Equals(&'static str),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn matches(&self, cmd: &Command) -> bool {
        match self {
            Self::Always => true,
            Self::Name(name) => cmd.name == *name,
            Self::Flag(flag) => cmd.has_flag(flag),
            Self::FlagIgnoreCase(flag) => cmd.has_flag_ignore_case(flag),
            Self::NoFlags => cmd.flags.is_empty(),
            Self::FlagsExactly(set) => {
                cmd.flags.iter().all(|f| set.contains(&f.as_str()))
                    && set.iter().all(|f| cmd.has_flag(f))
            }
            Self::Arg(value) => cmd.args.iter().any(|a| a == value),
            Self::NoArgs => cmd.args.is_empty(),
            Self::Contains(needle) => cmd.lowered.contains(needle),
            Self::Equals(text) => cmd.lowered == *text,
            Self::All(all) => all.iter().all(|p| p.matches(cmd)),
            Self::Any(any) => any.iter().any(|p| p.matches(cmd)),
            Self::Not(inner) => !inner.matches(cmd),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::All(mut all) => {
                all.push(other);
                Self::All(all)
            }
            first => Self::All(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Any(mut any) => {
                any.push(other);
                Self::Any(any)
            }
            first => Self::Any(vec![first, other]),
        }
    }

    pub fn and_not(self, other: Predicate) -> Self {
        self.and(Self::Not(Box::new(other)))
    }
}

/// Short constructors for authoring rule tables and step sets.
pub mod predicates {
    use super::Predicate;

    pub fn always() -> Predicate {
        Predicate::Always
    }

    pub fn cmd(name: &'static str) -> Predicate {
        Predicate::Name(name)
    }

    pub fn flag(flag: &'static str) -> Predicate {
        Predicate::Flag(flag)
    }

    pub fn flag_ci(flag: &'static str) -> Predicate {
        Predicate::FlagIgnoreCase(flag)
    }

    pub fn no_flags() -> Predicate {
        Predicate::NoFlags
    }

    pub fn flags_exactly(set: &'static [&'static str]) -> Predicate {
        Predicate::FlagsExactly(set)
    }

    pub fn arg(value: &'static str) -> Predicate {
        Predicate::Arg(value)
    }

    pub fn no_args() -> Predicate {
        Predicate::NoArgs
    }

    pub fn contains(needle: &'static str) -> Predicate {
        Predicate::Contains(needle)
    }

    pub fn equals(text: &'static str) -> Predicate {
        Predicate::Equals(text)
    }

    pub fn any(preds: Vec<Predicate>) -> Predicate {
        Predicate::Any(preds)
    }

    pub fn not(pred: Predicate) -> Predicate {
        Predicate::Not(Box::new(pred))
    }
}

/// How a matched rule produces its output.
#[derive(Clone)]
pub enum Reply {
    Fixed(Response),
    /// Pure function of the command, for output that echoes arguments.
    Render(fn(&Command) -> Response),
}

impl Reply {
    fn produce(&self, cmd: &Command) -> Response {
        match self {
            Self::Fixed(response) => response.clone(),
            Self::Render(render) => render(cmd),
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(response) => f.debug_tuple("Fixed").field(response).finish(),
            Self::Render(_) => f.write_str("Render(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub label: &'static str,
    pub when: Predicate,
    pub reply: Reply,
    /// An input this rule is meant to answer; checked by [`RuleTable::shadowed_rules`].
    pub example: Option<&'static str>,
}

impl Rule {
    pub fn fixed(label: &'static str, when: Predicate, response: Response) -> Self {
        Self {
            label,
            when,
            reply: Reply::Fixed(response),
            example: None,
        }
    }

    pub fn render(label: &'static str, when: Predicate, render: fn(&Command) -> Response) -> Self {
        Self {
            label,
            when,
            reply: Reply::Render(render),
            example: None,
        }
    }

    pub fn example(mut self, input: &'static str) -> Self {
        self.example = Some(input);
        self
    }
}

/// A rule whose example input does not resolve to the rule itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedRule {
    pub label: &'static str,
    pub example: &'static str,
    /// Label of the rule that answered instead, `None` if nothing matched.
    pub resolved_to: Option<&'static str>,
}

/// Ordered rule list for one lab console. First match wins, so narrower
/// rules must come before broader ones.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn matching_rule(&self, cmd: &Command) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.when.matches(cmd))
    }

    pub fn resolve(&self, cmd: &Command) -> Response {
        match self.matching_rule(cmd) {
            Some((_, rule)) => rule.reply.produce(cmd),
            None => Response::not_found(&cmd.name),
        }
    }

    /// Tokenize and resolve. `None` for blank input.
    pub fn resolve_input(&self, input: &str) -> Option<Response> {
        Command::parse(input).map(|cmd| self.resolve(&cmd))
    }

    /// Rules whose own example is answered by a different rule (or none).
    pub fn shadowed_rules(&self) -> Vec<ShadowedRule> {
        self.rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| {
                let example = rule.example?;
                let cmd = Command::parse(example)?;
                match self.matching_rule(&cmd) {
                    Some((hit, _)) if hit == index => None,
                    Some((_, other)) => Some(ShadowedRule {
                        label: rule.label,
                        example,
                        resolved_to: Some(other.label),
                    }),
                    None => Some(ShadowedRule {
                        label: rule.label,
                        example,
                        resolved_to: None,
                    }),
                }
            })
            .collect()
    }
}
