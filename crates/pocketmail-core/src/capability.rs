//! Server feature table.

use std::collections::BTreeMap;

/// Features a server advertised on the current connection.
///
/// Names are upper-cased. Values are whatever followed the name: the
/// `PLAIN LOGIN` of POP3 `SASL PLAIN LOGIN`, the `35882577` of SMTP
/// `SIZE 35882577`, or the joined right-hand sides of IMAP `AUTH=...`
/// atoms. The table is rebuilt on every open and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    features: BTreeMap<String, Option<String>>,
}

impl Capabilities {
    /// Builds the table from IMAP capability atoms.
    #[must_use]
    pub fn from_imap<S: AsRef<str>>(atoms: &[S]) -> Self {
        let mut table = Self::default();
        for atom in atoms {
            match atom.as_ref().split_once('=') {
                Some((name, value)) => table.append(name, value),
                None => table.insert(atom.as_ref(), None),
            }
        }
        table
    }

    /// Builds the table from POP3 CAPA lines or SMTP EHLO keywords.
    #[must_use]
    pub fn from_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Self {
        let mut table = Self::default();
        for line in lines {
            let line = line.as_ref().trim();
            match line.split_once(' ') {
                Some((name, value)) => table.insert(name, Some(value.trim())),
                None if !line.is_empty() => table.insert(line, None),
                None => {}
            }
        }
        table
    }

    fn insert(&mut self, name: &str, value: Option<&str>) {
        self.features
            .insert(name.to_ascii_uppercase(), value.map(str::to_string));
    }

    fn append(&mut self, name: &str, value: &str) {
        let entry = self.features.entry(name.to_ascii_uppercase()).or_default();
        match entry {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(value);
            }
            None => *entry = Some(value.to_string()),
        }
    }

    /// Returns true if the feature was advertised.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(&name.to_ascii_uppercase())
    }

    /// The feature's value, if it had one.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.features.get(&name.to_ascii_uppercase())?.as_deref()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.features
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imap_atoms() {
        let table = Capabilities::from_imap(&["IMAP4rev1", "idle", "AUTH=PLAIN", "AUTH=LOGIN"]);
        assert!(table.contains("IDLE"));
        assert_eq!(table.value("idle"), None);
        assert_eq!(table.value("AUTH"), Some("PLAIN LOGIN"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_lines() {
        let table = Capabilities::from_lines(["TOP", "UIDL", "SASL PLAIN LOGIN", ""]);
        assert!(table.contains("top"));
        assert_eq!(table.value("SASL"), Some("PLAIN LOGIN"));
        assert_eq!(table.len(), 3);

        let smtp = Capabilities::from_lines(["SIZE 35882577", "8BITMIME", "STARTTLS"]);
        assert_eq!(smtp.value("size"), Some("35882577"));
        assert_eq!(
            smtp.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["8BITMIME", "SIZE", "STARTTLS"]
        );
        assert!(Capabilities::default().is_empty());
    }
}
