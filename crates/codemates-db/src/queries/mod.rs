pub mod challenges;
pub mod friendships;
pub mod messages;
pub mod notifications;
pub mod sessions;
pub mod users;

/// `?1, ?2, ... ?n` for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}
