//! System flags and keywords.

/// One message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`, set by the server only.
    Recent,
    /// Anything else, kept as sent.
    Keyword(String),
}

const SYSTEM: [(Flag, &str); 6] = [
    (Flag::Seen, "\\Seen"),
    (Flag::Answered, "\\Answered"),
    (Flag::Flagged, "\\Flagged"),
    (Flag::Deleted, "\\Deleted"),
    (Flag::Draft, "\\Draft"),
    (Flag::Recent, "\\Recent"),
];

impl Flag {
    /// Reads a flag atom. System flags match case-insensitively.
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        SYSTEM
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(atom))
            .map_or_else(|| Self::Keyword(atom.to_string()), |(flag, _)| flag.clone())
    }

    /// The flag as written in commands.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Keyword(keyword) => keyword,
            system => SYSTEM
                .iter()
                .find(|(flag, _)| flag == system)
                .map_or("", |(_, name)| name),
        }
    }

    const fn bit(&self) -> Option<u8> {
        match self {
            Self::Seen => Some(1),
            Self::Answered => Some(1 << 1),
            Self::Flagged => Some(1 << 2),
            Self::Deleted => Some(1 << 3),
            Self::Draft => Some(1 << 4),
            Self::Recent => Some(1 << 5),
            Self::Keyword(_) => None,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The flags of one message, as a FLAGS item reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    system: u8,
    keywords: Vec<String>,
}

impl Flags {
    /// Adds a flag; duplicates are ignored.
    pub fn insert(&mut self, flag: Flag) {
        match (flag.bit(), flag) {
            (Some(bit), _) => self.system |= bit,
            (None, Flag::Keyword(keyword)) => {
                if !self.keywords.contains(&keyword) {
                    self.keywords.push(keyword);
                }
            }
            (None, _) => {}
        }
    }

    /// Returns true if the flag is set.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        match (flag.bit(), flag) {
            (Some(bit), _) => self.system & bit != 0,
            (None, Flag::Keyword(keyword)) => self.keywords.contains(keyword),
            (None, _) => false,
        }
    }

    /// Keywords in the order the server sent them.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Returns true if nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.system == 0 && self.keywords.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::default();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}
