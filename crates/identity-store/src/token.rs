//! Unguessable token generation.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

const MIN_LEN: usize = 12;
const MAX_LEN: usize = 30;

/// Generate a random alphanumeric token of 12 to 30 characters.
///
/// Used for pending-registration correlation keys and download tokens.
pub fn generate_token() -> String {
    let mut rng = thread_rng();
    let len = rng.gen_range(MIN_LEN..=MAX_LEN);
    (&mut rng)
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length_bounds() {
        for _ in 0..100 {
            let token = generate_token();
            assert!(token.len() >= MIN_LEN && token.len() <= MAX_LEN);
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
