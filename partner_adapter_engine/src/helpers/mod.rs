mod keyed_locks;
mod tokens;

pub use keyed_locks::{KeyedLockGuard, KeyedLocks};
pub use tokens::new_session_token;
