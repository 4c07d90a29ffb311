//! Submissions and results tables, stored as JSON.

pub mod error;
pub mod results;
pub mod submissions;

pub use error::*;
pub use results::*;
pub use submissions::*;

use std::fmt;

/// A trimmed, non-blank student name: the key both tables are joined on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StudentName(String);

impl StudentName {
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_are_trimmed_and_never_blank() {
        assert_eq!(StudentName::parse("  Jane Doe ").unwrap().as_str(), "Jane Doe");
        assert_eq!(StudentName::parse(""), None);
        assert_eq!(StudentName::parse(" \t"), None);
    }
}
