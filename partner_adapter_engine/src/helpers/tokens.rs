use rand::{distributions::Alphanumeric, Rng};

pub const SESSION_TOKEN_LENGTH: usize = 32;

/// A random alphanumeric session token for the partner UI.
pub fn new_session_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(SESSION_TOKEN_LENGTH).map(char::from).collect()
}
