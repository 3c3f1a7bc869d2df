//! Idle-timeout timer registry: an insertion-ordered set of `(connection, last-activity)` pairs.
//!
//! Every refresh removes and re-appends at the tail with a fresh timestamp, so the head is always
//! the oldest entry — `expire` only ever has to look at a prefix of the list, not walk the whole
//! thing. Per the design notes' arena+index guidance, entries never hold a raw connection
//! pointer; they key on [`mio::Token`], and the dispatcher resolves a token back to its
//! `Connection` through the same slab that owns it.

use std::collections::HashMap;

use mio::Token;

/// Returned by [`TimerRegistry::append`] when the token is already present.
#[derive(Debug, PartialEq, Eq)]
pub struct Duplicate;

#[derive(Debug)]
struct Node {
    token: Token,
    timestamp: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A doubly linked list of `(Token, timestamp)` nodes ordered by last activity, plus a side index
/// for O(1) arbitrary-key lookup.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<Token, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl TimerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(node);
            slot
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.nodes[slot].as_ref().expect("unlink of freed slot");
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.nodes[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_tail(&mut self, token: Token, timestamp: u64) -> usize {
        let slot = self.alloc(Node {
            token,
            timestamp,
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(t) => self.nodes[t].as_mut().unwrap().next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.index.insert(token, slot);
        slot
    }

    /// Inserts `token` at the tail with timestamp `now`. Fails with [`Duplicate`] if `token` is
    /// already tracked.
    pub fn append(&mut self, token: Token, now: u64) -> Result<(), Duplicate> {
        if self.index.contains_key(&token) {
            return Err(Duplicate);
        }
        self.push_tail(token, now);
        Ok(())
    }

    /// Refreshes `token`'s timestamp by removing and re-appending it at the tail. A token that
    /// isn't tracked is left untouched — this is not an insertion path.
    pub fn update(&mut self, token: Token, now: u64) {
        if let Some(slot) = self.index.remove(&token) {
            self.unlink(slot);
            self.free.push(slot);
            self.push_tail(token, now);
        }
    }

    /// Removes `token`. Silent no-op if it isn't tracked.
    pub fn remove(&mut self, token: Token) {
        if let Some(slot) = self.index.remove(&token) {
            self.unlink(slot);
            self.nodes[slot] = None;
            self.free.push(slot);
        }
    }

    /// The oldest tracked token and its timestamp, if any.
    pub fn first(&self) -> Option<(Token, u64)> {
        self.head
            .map(|slot| self.nodes[slot].as_ref().unwrap())
            .map(|node| (node.token, node.timestamp))
    }

    /// Walks from the head, invoking `on_expire` for every entry whose idle time has reached
    /// `limit_ms`, and removing it. Stops at the first entry that is still live — because the
    /// list is kept in timestamp order, everything after it is live too, giving O(k) work for k
    /// expirations regardless of how many live entries remain.
    pub fn expire(&mut self, now: u64, limit_ms: u64, mut on_expire: impl FnMut(Token)) {
        while let Some(slot) = self.head {
            let node = self.nodes[slot].as_ref().unwrap();
            if now.saturating_sub(node.timestamp) < limit_ms {
                break;
            }
            let token = node.token;

            self.unlink(slot);
            self.index.remove(&token);
            self.nodes[slot] = None;
            self.free.push(slot);

            on_expire(token);
        }
    }

    /// Iterates tokens from oldest to newest (head to tail).
    pub fn iter(&self) -> impl Iterator<Item = (Token, u64)> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let slot = cur?;
            let node = self.nodes[slot].as_ref().unwrap();
            cur = node.next;
            Some((node.token, node.timestamp))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_remove() {
        let mut reg = TimerRegistry::new();
        reg.append(Token(1), 10).unwrap();
        assert_eq!(reg.len(), 1);
        reg.remove(Token(1));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_append_is_rejected() {
        let mut reg = TimerRegistry::new();
        reg.append(Token(1), 10).unwrap();
        assert_eq!(reg.append(Token(1), 20), Err(Duplicate));
    }

    #[test]
    fn update_moves_entry_to_tail() {
        let mut reg = TimerRegistry::new();
        reg.append(Token(1), 10).unwrap();
        reg.append(Token(2), 20).unwrap();
        reg.update(Token(1), 30);

        let order: Vec<Token> = reg.iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec![Token(2), Token(1)]);
    }

    #[test]
    fn update_of_untracked_token_is_a_noop() {
        let mut reg = TimerRegistry::new();
        reg.update(Token(99), 10);
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_of_untracked_token_is_silent() {
        let mut reg = TimerRegistry::new();
        reg.remove(Token(42));
        assert!(reg.is_empty());
    }

    #[test]
    fn expire_stops_at_first_live_entry() {
        let mut reg = TimerRegistry::new();
        reg.append(Token(1), 0).unwrap();
        reg.append(Token(2), 5).unwrap();
        reg.append(Token(3), 100).unwrap();

        let mut expired = Vec::new();
        reg.expire(110, 10, |t| expired.push(t));

        assert_eq!(expired, vec![Token(1), Token(2)]);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.first(), Some((Token(3), 100)));
    }

    #[test]
    fn traversal_is_timestamp_ordered() {
        let mut reg = TimerRegistry::new();
        reg.append(Token(1), 5).unwrap();
        reg.append(Token(2), 2).unwrap();
        reg.append(Token(3), 9).unwrap();

        let stamps: Vec<u64> = reg.iter().map(|(_, ts)| ts).collect();
        let mut sorted = stamps.clone();
        sorted.sort_unstable();
        assert_eq!(stamps, sorted, "insertion order must track append order, which callers keep time-sorted");
    }

    #[test]
    fn slots_are_reused_after_removal() {
        let mut reg = TimerRegistry::new();
        reg.append(Token(1), 0).unwrap();
        reg.remove(Token(1));
        reg.append(Token(2), 1).unwrap();
        assert_eq!(reg.nodes.len(), 1, "freed slot should be reused rather than growing the vec");
    }
}
