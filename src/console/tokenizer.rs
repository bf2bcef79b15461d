/// Tokens starting with this character are flags.
pub const FLAG_PREFIX: char = '-';

/// One submitted console line, split into name, flags and positional args.
///
/// Flags and args keep their original case and relative order. The command
/// name is case-folded. Quoting is not interpreted: rules that care about
/// quoted payloads match against [`Command::lowered`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The trimmed input exactly as typed.
    pub raw: String,
    /// `raw` lower-cased, used for substring predicates.
    pub lowered: String,
    pub name: String,
    pub flags: Vec<String>,
    pub args: Vec<String>,
}

impl Command {
    /// Tokenize a raw line. Returns `None` for empty or whitespace-only input.
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return None;
        }

        let mut tokens = raw.split_whitespace();
        let name = tokens.next()?.to_lowercase();

        let mut flags = Vec::new();
        let mut args = Vec::new();
        for token in tokens {
            if token.starts_with(FLAG_PREFIX) {
                flags.push(token.to_string());
            } else {
                args.push(token.to_string());
            }
        }

        Some(Self {
            raw: raw.to_string(),
            lowered: raw.to_lowercase(),
            name,
            flags,
            args,
        })
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn has_flag_ignore_case(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    /// First positional argument, if any.
    pub fn target(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Positional argument following `flag` in the raw token stream,
    /// e.g. the port list in `nmap -p 22,80 host`.
    pub fn value_after(&self, flag: &str) -> Option<&str> {
        let mut tokens = self.raw.split_whitespace();
        tokens.find(|t| *t == flag)?;
        tokens.next().filter(|t| !t.starts_with(FLAG_PREFIX))
    }
}
