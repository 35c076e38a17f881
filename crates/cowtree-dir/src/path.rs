//! Path name parsing.
//!
//! A path is a user name followed by slash-separated elements:
//! `alice@example.com/docs/notes.txt`. The user's root is `alice@example.com/`.
//! Parsing collapses repeated and trailing slashes so every accepted spelling
//! of a path has one canonical form.

use thiserror::Error;

use crate::types::UserName;

/// Errors that can occur during path parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Path is empty
    #[error("empty path")]
    Empty,

    /// Path does not start with a user name
    #[error("missing user name")]
    MissingUser,

    /// User name is not of the form `local@domain`
    #[error("invalid user name {0:?}")]
    InvalidUser(String),

    /// Relative elements are not supported
    #[error("invalid path element {0:?}")]
    InvalidElement(String),

    /// Path is deeper than the service allows
    #[error("{count} path elements exceed the limit of {max}")]
    TooManyElements {
        /// Number of elements in the path
        count: usize,
        /// Configured limit
        max: usize,
    },
}

/// A parsed path: the user plus the ordered elements below the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
    user: UserName,
    elems: Vec<String>,
}

/// Parse a path name into user and elements.
pub fn parse(name: &str) -> Result<Parsed, PathError> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }
    let (user, rest) = name.split_once('/').unwrap_or((name, ""));
    if user.is_empty() {
        return Err(PathError::MissingUser);
    }
    validate_user(user)?;

    let mut elems = Vec::new();
    for elem in rest.split('/').filter(|e| !e.is_empty()) {
        if elem == "." || elem == ".." {
            return Err(PathError::InvalidElement(elem.to_string()));
        }
        elems.push(elem.to_string());
    }

    Ok(Parsed {
        user: UserName::new(user),
        elems,
    })
}

fn validate_user(user: &str) -> Result<(), PathError> {
    match user.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(PathError::InvalidUser(user.to_string())),
    }
}

/// Join a directory path and one element.
pub fn join(dir: &str, elem: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{elem}")
    } else {
        format!("{dir}/{elem}")
    }
}

impl Parsed {
    /// The owner of the path
    pub fn user(&self) -> &UserName {
        &self.user
    }

    /// The elements below the root, in order
    pub fn elems(&self) -> &[String] {
        &self.elems
    }

    /// Number of elements below the root
    pub fn nelem(&self) -> usize {
        self.elems.len()
    }

    /// True for the bare user root
    pub fn is_root(&self) -> bool {
        self.elems.is_empty()
    }

    /// The final element, if any
    pub fn last_elem(&self) -> Option<&str> {
        self.elems.last().map(String::as_str)
    }

    /// Canonical path: `user/` for the root, `user/a/b` otherwise.
    pub fn path(&self) -> String {
        let mut out = String::with_capacity(
            self.user.as_str().len() + 1 + self.elems.iter().map(|e| e.len() + 1).sum::<usize>(),
        );
        out.push_str(self.user.as_str());
        out.push('/');
        out.push_str(&self.elems.join("/"));
        out
    }

    /// The path made of the root and the first `n` elements.
    pub fn first(&self, n: usize) -> Parsed {
        Parsed {
            user: self.user.clone(),
            elems: self.elems[..n.min(self.elems.len())].to_vec(),
        }
    }

    /// The path with the last `n` elements removed.
    pub fn drop_last(&self, n: usize) -> Parsed {
        self.first(self.elems.len().saturating_sub(n))
    }

    /// Reject paths deeper than `max` elements.
    pub fn check_depth(&self, max: usize) -> Result<(), PathError> {
        if self.elems.len() > max {
            return Err(PathError::TooManyElements {
                count: self.elems.len(),
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        let p = parse("alice@x/").unwrap();
        assert_eq!(p.user().as_str(), "alice@x");
        assert!(p.is_root());
        assert_eq!(p.path(), "alice@x/");

        let bare = parse("alice@x").unwrap();
        assert_eq!(bare, p);
    }

    #[test]
    fn test_parse_canonicalizes() {
        let p = parse("alice@x//a///b/").unwrap();
        assert_eq!(p.elems(), ["a", "b"]);
        assert_eq!(p.path(), "alice@x/a/b");
        assert_eq!(p.last_elem(), Some("b"));
    }

    #[test]
    fn test_first_and_drop_last() {
        let p = parse("alice@x/a/b/c").unwrap();
        assert_eq!(p.first(0).path(), "alice@x/");
        assert_eq!(p.first(2).path(), "alice@x/a/b");
        assert_eq!(p.first(9).path(), "alice@x/a/b/c");
        assert_eq!(p.drop_last(1).path(), "alice@x/a/b");
        assert_eq!(p.drop_last(5).path(), "alice@x/");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(PathError::Empty));
        assert_eq!(parse("/a/b"), Err(PathError::MissingUser));
        assert_eq!(
            parse("alice/a"),
            Err(PathError::InvalidUser("alice".to_string()))
        );
        assert_eq!(
            parse("a@b@c/a"),
            Err(PathError::InvalidUser("a@b@c".to_string()))
        );
        assert_eq!(
            parse("alice@x/a/../b"),
            Err(PathError::InvalidElement("..".to_string()))
        );
    }

    #[test]
    fn test_join() {
        assert_eq!(join("alice@x/", "a"), "alice@x/a");
        assert_eq!(join("alice@x/a", "b"), "alice@x/a/b");
    }

    #[test]
    fn test_check_depth() {
        let p = parse("alice@x/a/b/c").unwrap();
        assert!(p.check_depth(3).is_ok());
        assert_eq!(
            p.check_depth(2),
            Err(PathError::TooManyElements { count: 3, max: 2 })
        );
    }

    #[test]
    fn test_user_segment_is_literal() {
        let p = parse("*@x/*.txt").unwrap();
        assert_eq!(p.user().as_str(), "*@x");
        assert_eq!(p.elems(), ["*.txt"]);
    }
}
