//! Session identifiers.
//!
//! Every [`Session::start`](crate::session::Session::start) draws a new
//! identifier. The poll task tags its results with it, so results that
//! arrive after their session stopped are recognized and dropped.

use std::fmt;

/// Random identifier of one session run.
///
/// Generated with `fastrand`: identifiers only need to differ between runs
/// of the same process, not to be unpredictable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        let bytes = fastrand::u128(..).to_ne_bytes();
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// First group of the identifier, enough to tell runs apart in logs.
    #[must_use]
    pub fn short(&self) -> String {
        let mut buf = uuid::Uuid::encode_buffer();
        let hyphenated = self.0.hyphenated().encode_lower(&mut buf);
        hyphenated
            .split('-')
            .next()
            .unwrap_or_default()
            .to_owned()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_differ_between_runs() {
        let first = SessionId::generate();
        let second = SessionId::generate();
        assert_ne!(first, second);
        assert_eq!(first.0.get_version_num(), 4);
    }

    #[test]
    fn short_form_is_first_group() {
        let id = SessionId::generate();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&format!("{short}-")));
    }
}
