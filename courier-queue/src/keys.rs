//! Store key layout for a logical queue.

/// Suffix of the sorted set holding jobs scheduled for later.
pub const DELAYED_SUFFIX: &str = ":delayed";

/// Suffix of the sorted set holding jobs handed to a worker.
pub const RESERVED_SUFFIX: &str = ":reserved";

/// Physical keys backing one logical queue.
///
/// - `ready`: list of payloads eligible now, FIFO
/// - `delayed`: sorted set, score = Unix time the job becomes eligible
/// - `reserved`: sorted set, score = Unix time the lease expires
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKeys {
    /// Ready list key
    pub ready: String,
    /// Delayed set key
    pub delayed: String,
    /// Reserved set key
    pub reserved: String,
}

impl QueueKeys {
    /// Derive the keys for `queue` under `prefix`.
    pub fn new(prefix: &str, queue: &str) -> Self {
        let ready = format!("{}{}", prefix, queue);
        Self {
            delayed: format!("{}{}", ready, DELAYED_SUFFIX),
            reserved: format!("{}{}", ready, RESERVED_SUFFIX),
            ready,
        }
    }

    /// All three keys, ready list first.
    pub fn all(&self) -> [&str; 3] {
        [&self.ready, &self.delayed, &self.reserved]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation() {
        let keys = QueueKeys::new("queues:", "emails");
        assert_eq!(keys.ready, "queues:emails");
        assert_eq!(keys.delayed, "queues:emails:delayed");
        assert_eq!(keys.reserved, "queues:emails:reserved");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            QueueKeys::new("queues:", "default"),
            QueueKeys::new("queues:", "default")
        );
    }

    #[test]
    fn test_different_queues_do_not_collide() {
        let a = QueueKeys::new("queues:", "a");
        let b = QueueKeys::new("queues:", "b");
        for key in a.all() {
            assert!(!b.all().contains(&key));
        }
    }

    #[test]
    fn test_empty_prefix() {
        let keys = QueueKeys::new("", "jobs");
        assert_eq!(keys.ready, "jobs");
        assert_eq!(keys.delayed, "jobs:delayed");
    }
}
