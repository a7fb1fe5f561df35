//! Slash command names and input line parsing.

/// Built-in slash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlashCommand {
    Me,
    Quit,
    ClearCache,
    Help,
    Leave,
    Join,
    Send,
    SetState,
    UiToggle,
    Logout,
}

impl SlashCommand {
    pub fn builtins() -> Vec<Self> {
        vec![
            Self::Me,
            Self::Quit,
            Self::ClearCache,
            Self::Help,
            Self::Leave,
            Self::Join,
            Self::Send,
            Self::SetState,
            Self::UiToggle,
            Self::Logout,
        ]
    }

    /// Command name (without the leading /).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Me => "me",
            Self::Quit => "quit",
            Self::ClearCache => "clearcache",
            Self::Help => "help",
            Self::Leave => "leave",
            Self::Join => "join",
            Self::Send => "send",
            Self::SetState => "setstate",
            Self::UiToggle => "uitoggle",
            Self::Logout => "logout",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Self::Me => "Usage: /me <action>",
            Self::Quit => "Usage: /quit",
            Self::ClearCache => "Usage: /clearcache",
            Self::Help => "Usage: /help",
            Self::Leave => "Usage: /leave (in a room)",
            Self::Join => "Usage: /join <room> [server]",
            Self::Send => "Usage: /send <room id> <event type> <content>",
            Self::SetState => "Usage: /setstate <room id> <event type> <state key/`-`> <content>",
            Self::UiToggle => "Usage: /uitoggle <rooms/users/baremessages/images>",
            Self::Logout => "Usage: /logout",
        }
    }
}

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    /// Untokenized text after the name
    pub raw: Option<String>,
}

impl ParsedCommand {
    /// A command built from already-split arguments.
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            raw: None,
        }
    }

    /// Parse `/name arg1 arg2 ...`. Returns `None` for lines that are not commands.
    pub fn parse(line: &str) -> Option<Self> {
        let body = line.trim().strip_prefix('/')?;
        let (name, rest) = match body.find(char::is_whitespace) {
            Some(end) => (&body[..end], body[end..].trim()),
            None => (body, ""),
        };
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            args: rest.split_whitespace().map(String::from).collect(),
            raw: Some(rest.to_string()),
        })
    }

    pub fn remainder(&self, index: usize) -> String {
        remainder(self.raw.as_deref(), &self.args, index)
    }
}

/// Text of the line from argument `index` onward.
///
/// With the raw line available the spacing as typed is kept. Without it the
/// arguments are concatenated with no separator.
pub(crate) fn remainder(raw: Option<&str>, args: &[String], index: usize) -> String {
    match raw {
        Some(raw) => {
            let mut rest = raw.trim_start();
            for _ in 0..index {
                match rest.find(char::is_whitespace) {
                    Some(end) => rest = rest[end..].trim_start(),
                    None => return String::new(),
                }
            }
            rest.trim_end().to_string()
        }
        None => args.get(index..).map(|tail| tail.concat()).unwrap_or_default(),
    }
}
