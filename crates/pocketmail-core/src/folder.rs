//! Folder tree.

use serde::{Deserialize, Serialize};

/// Name of the only POP3 folder, and of the IMAP inbox.
pub const INBOX: &str = "INBOX";

/// Message counters of one folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStatus {
    /// Number of messages.
    pub messages: u32,
    /// Messages without `\Seen`; POP3 has no such notion.
    pub unseen: Option<u32>,
}

/// One node of an account's folder tree.
///
/// The root has an empty name and path and owns every folder. A child of
/// the root has `path == name`; deeper nodes have
/// `path == parent.path + delimiter + name`. Children can only be added
/// through [`insert`](Self::insert), which keeps that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderItem {
    /// Last path segment.
    pub name: String,
    /// Full mailbox name as the server knows it.
    pub path: String,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// False for `\Noselect` folders and for intermediate nodes the server
    /// never listed.
    pub selectable: bool,
    /// Last known counters.
    pub status: Option<FolderStatus>,
    children: Vec<Self>,
}

impl FolderItem {
    /// Creates an empty root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            delimiter: None,
            selectable: false,
            status: None,
            children: Vec::new(),
        }
    }

    /// Tree holding a single selectable INBOX.
    #[must_use]
    pub fn synthetic_inbox(status: Option<FolderStatus>) -> Self {
        let mut root = Self::root();
        let inbox = root.insert(INBOX, None, true);
        inbox.status = status;
        root
    }

    /// Returns true for the tree root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Child folders.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Adds the mailbox `path`, creating missing ancestors as
    /// non-selectable nodes. An existing node is updated in place.
    pub fn insert(&mut self, path: &str, delimiter: Option<char>, selectable: bool) -> &mut Self {
        let segments: Vec<&str> = match delimiter {
            Some(delim) => path.split(delim).filter(|s| !s.is_empty()).collect(),
            None => vec![path],
        };

        let mut node = self;
        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.into_iter().enumerate() {
            let position = match node.children.iter().position(|c| c.name == segment) {
                Some(position) => position,
                None => {
                    let child = node.child(segment, delimiter);
                    node.children.push(child);
                    node.children.len() - 1
                }
            };
            node = &mut node.children[position];
            if i == last {
                node.selectable = selectable;
                node.delimiter = delimiter;
            }
        }
        node
    }

    fn child(&self, name: &str, delimiter: Option<char>) -> Self {
        let path = match delimiter {
            _ if self.is_root() => name.to_string(),
            Some(delim) => format!("{}{delim}{name}", self.path),
            None => format!("{}{name}", self.path),
        };
        Self {
            name: name.to_string(),
            path,
            delimiter,
            selectable: false,
            status: None,
            children: Vec::new(),
        }
    }

    /// Finds a folder by full path.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Self> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Finds a folder by full path for updating.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Self> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(path))
    }

    /// Visits every node depth-first, the root included.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Paths of every selectable folder, in tree order.
    #[must_use]
    pub fn selectable_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.walk(&mut |item| {
            if item.selectable {
                paths.push(item.path.as_str());
            }
        });
        paths
    }

    /// Number of folders below this node.
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

impl Default for FolderItem {
    fn default() -> Self {
        Self::root()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn assert_paths(item: &FolderItem) {
        for child in item.children() {
            let expected = match (item.is_root(), child.delimiter) {
                (true, _) => child.name.clone(),
                (false, Some(delim)) => format!("{}{delim}{}", item.path, child.name),
                (false, None) => format!("{}{}", item.path, child.name),
            };
            assert_eq!(child.path, expected);
            assert_paths(child);
        }
    }

    #[test]
    fn test_insert_builds_ancestors() {
        let mut root = FolderItem::root();
        root.insert("INBOX", Some('/'), true);
        root.insert("Work/Projects/2024", Some('/'), true);

        let work = root.find("Work").unwrap();
        assert!(!work.selectable);
        assert_eq!(work.children().len(), 1);

        let year = root.find("Work/Projects/2024").unwrap();
        assert_eq!(year.name, "2024");
        assert!(year.selectable);
        assert_eq!(root.descendant_count(), 4);
        assert_paths(&root);

        root.insert("Work", Some('/'), true);
        assert!(root.find("Work").unwrap().selectable);
        assert_eq!(root.descendant_count(), 4);
    }

    #[test]
    fn test_selectable_paths() {
        let mut root = FolderItem::root();
        root.insert("INBOX", Some('.'), true);
        root.insert("Archive", Some('.'), false);
        root.insert("Archive.2023", Some('.'), true);
        assert_eq!(root.selectable_paths(), vec!["INBOX", "Archive.2023"]);
    }

    #[test]
    fn test_synthetic_inbox() {
        let status = FolderStatus {
            messages: 4,
            unseen: None,
        };
        let root = FolderItem::synthetic_inbox(Some(status));
        assert_eq!(root.descendant_count(), 1);
        let inbox = root.find(INBOX).unwrap();
        assert!(inbox.selectable);
        assert_eq!(inbox.status, Some(status));
    }

    #[test]
    fn test_find_mut_updates_status() {
        let mut root = FolderItem::root();
        root.insert("Sent", None, true);
        root.find_mut("Sent").unwrap().status = Some(FolderStatus::default());
        assert!(root.find("Sent").unwrap().status.is_some());
        assert!(root.find_mut("Drafts").is_none());
    }

    proptest! {
        #[test]
        fn prop_paths_follow_parents(
            names in prop::collection::vec(
                prop::collection::vec("[A-Za-z0-9]{1,6}", 1..4),
                1..12,
            )
        ) {
            let mut root = FolderItem::root();
            for segments in &names {
                root.insert(&segments.join("/"), Some('/'), true);
            }
            assert_paths(&root);
            for segments in &names {
                let path = segments.join("/");
                prop_assert!(root.find(&path).is_some_and(|f| f.selectable));
            }
        }
    }
}
