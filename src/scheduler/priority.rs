//! Request prioritization.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Urgency label driving scheduling order.
///
/// Ordering: `Emergency > Medical > Legal > Translation > Chat > Background`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Background = 0,
    Chat = 1,
    Translation = 2,
    Legal = 3,
    Medical = 4,
    Emergency = 5,
}

impl PriorityClass {
    pub const ALL: [PriorityClass; 6] = [
        Self::Emergency,
        Self::Medical,
        Self::Legal,
        Self::Translation,
        Self::Chat,
        Self::Background,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Chat => "chat",
            Self::Translation => "translation",
            Self::Legal => "legal",
            Self::Medical => "medical",
            Self::Emergency => "emergency",
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl Default for PriorityClass {
    fn default() -> Self {
        Self::Chat
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emergency" => Ok(Self::Emergency),
            "medical" => Ok(Self::Medical),
            "legal" => Ok(Self::Legal),
            "translation" => Ok(Self::Translation),
            "chat" => Ok(Self::Chat),
            "background" => Ok(Self::Background),
            other => Err(format!("unknown priority class: {other}")),
        }
    }
}

/// Ordering key: priority first, then insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: PriorityClass,
    sequence: u64,
}

/// Priority queue with strict-priority dequeue and FIFO tie-break.
///
/// Keys order by `(priority, sequence)`; the lowest-priority and oldest
/// entries are removable for overflow handling.
pub struct PriorityQueue<T> {
    entries: BTreeMap<QueueKey, T>,
    next_sequence: u64,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    /// Push an item; returns the sequence number assigned to it.
    pub fn push(&mut self, item: T, priority: PriorityClass) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(QueueKey { priority, sequence }, item);
        sequence
    }

    /// Remove the highest-priority item, earliest first among equals.
    pub fn pop(&mut self) -> Option<(PriorityClass, T)> {
        let key = self.highest_key()?;
        self.entries.remove(&key).map(|item| (key.priority, item))
    }

    pub fn peek(&self) -> Option<(PriorityClass, &T)> {
        let key = self.highest_key()?;
        self.entries.get(&key).map(|item| (key.priority, item))
    }

    /// Lowest priority currently queued.
    pub fn lowest_priority(&self) -> Option<PriorityClass> {
        self.entries.keys().next().map(|k| k.priority)
    }

    /// Remove the oldest entry among those with the lowest priority.
    pub fn pop_lowest(&mut self) -> Option<(PriorityClass, T)> {
        let key = *self.entries.keys().next()?;
        self.entries.remove(&key).map(|item| (key.priority, item))
    }

    /// Remove the oldest entry regardless of priority.
    pub fn pop_oldest(&mut self) -> Option<(PriorityClass, T)> {
        let key = *self.entries.keys().min_by_key(|k| k.sequence)?;
        self.entries.remove(&key).map(|item| (key.priority, item))
    }

    /// Keep only items matching the predicate. Returns how many were removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, item| keep(item));
        before - self.entries.len()
    }

    /// Items in dequeue order.
    pub fn iter(&self) -> impl Iterator<Item = (PriorityClass, &T)> {
        let mut keys: Vec<&QueueKey> = self.entries.keys().collect();
        keys.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));
        keys.into_iter()
            .filter_map(move |k| self.entries.get(k).map(|item| (k.priority, item)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the highest-priority, earliest-sequenced entry.
    fn highest_key(&self) -> Option<QueueKey> {
        let top = self.entries.keys().next_back()?.priority;
        self.entries
            .range(QueueKey { priority: top, sequence: 0 }..)
            .next()
            .map(|(k, _)| *k)
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ordering_matches_urgency() {
        assert!(PriorityClass::Emergency > PriorityClass::Medical);
        assert!(PriorityClass::Medical > PriorityClass::Legal);
        assert!(PriorityClass::Legal > PriorityClass::Translation);
        assert!(PriorityClass::Translation > PriorityClass::Chat);
        assert!(PriorityClass::Chat > PriorityClass::Background);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("EMERGENCY".parse::<PriorityClass>(), Ok(PriorityClass::Emergency));
        assert!("urgent".parse::<PriorityClass>().is_err());
    }

    #[test]
    fn pop_is_strict_priority_then_fifo() {
        let mut q = PriorityQueue::new();
        q.push("chat-1", PriorityClass::Chat);
        q.push("legal-1", PriorityClass::Legal);
        q.push("chat-2", PriorityClass::Chat);
        q.push("emergency", PriorityClass::Emergency);
        q.push("legal-2", PriorityClass::Legal);

        let order: Vec<&str> = std::iter::from_fn(|| q.pop().map(|(_, v)| v)).collect();
        assert_eq!(order, vec!["emergency", "legal-1", "legal-2", "chat-1", "chat-2"]);
    }

    #[test]
    fn pop_lowest_takes_oldest_of_lowest_class() {
        let mut q = PriorityQueue::new();
        q.push("bg-old", PriorityClass::Background);
        q.push("chat", PriorityClass::Chat);
        q.push("bg-new", PriorityClass::Background);

        assert_eq!(q.lowest_priority(), Some(PriorityClass::Background));
        assert_eq!(q.pop_lowest(), Some((PriorityClass::Background, "bg-old")));
        assert_eq!(q.pop_lowest(), Some((PriorityClass::Background, "bg-new")));
        assert_eq!(q.lowest_priority(), Some(PriorityClass::Chat));
    }

    #[test]
    fn pop_oldest_ignores_priority() {
        let mut q = PriorityQueue::new();
        q.push("medical", PriorityClass::Medical);
        q.push("chat", PriorityClass::Chat);
        assert_eq!(q.pop_oldest(), Some((PriorityClass::Medical, "medical")));
    }

    #[test]
    fn iter_follows_dequeue_order() {
        let mut q = PriorityQueue::new();
        q.push(1, PriorityClass::Chat);
        q.push(2, PriorityClass::Medical);
        q.push(3, PriorityClass::Chat);
        let items: Vec<i32> = q.iter().map(|(_, v)| *v).collect();
        assert_eq!(items, vec![2, 1, 3]);
    }
}
