//! Command tags.

/// Hands out `A0`, `A1`, `A2`, ... for one connection.
///
/// The number wraps to zero after `u32::MAX`; by then no reply to an old
/// tag can still be outstanding.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    next: u32,
}

impl TagGenerator {
    /// Starts at zero with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, next: 0 }
    }

    /// Takes the next tag.
    pub fn next_tag(&mut self) -> String {
        let tag = format!("{}{}", self.prefix, self.next);
        self.next = self.next.wrapping_add(1);
        tag
    }

    /// Tags issued so far, modulo wrap-around.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.next
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}
