//! Shared rules for user generated content: ownership and text validation.

use crate::error::BlogError;
use crate::session::Identity;

/// Content with an immutable author.
pub trait Authored {
    fn author_id(&self) -> &str;
}

/// True only when a signed-in viewer wrote `item`.
pub fn is_owner(viewer: Option<&Identity>, item: &impl Authored) -> bool {
    matches!(viewer, Some(identity) if identity.id == item.author_id())
}

/// Rejects anyone but the author of `item`.
pub fn require_owner<'a>(
    viewer: Option<&'a Identity>,
    item: &impl Authored,
    message: &str,
) -> Result<&'a Identity, BlogError> {
    match viewer {
        None => Err(BlogError::unauthenticated("Please login first.")),
        Some(identity) if identity.id == item.author_id() => Ok(identity),
        Some(_) => Err(BlogError::forbidden(message)),
    }
}

/// Rejects anonymous viewers.
pub fn require_identity<'a>(
    viewer: Option<&'a Identity>,
    message: &str,
) -> Result<&'a Identity, BlogError> {
    viewer.ok_or_else(|| BlogError::unauthenticated(message))
}

/// Trims `input` and fails with `message` when nothing is left.
pub fn clean_text(input: &str, message: &str) -> Result<String, BlogError> {
    let clean = input.trim();
    if clean.is_empty() {
        return Err(BlogError::validation(message));
    }
    Ok(clean.to_owned())
}

/// What a form submission wants done with an attached image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Replace(String),
    Remove,
}

impl Default for ImageChange {
    fn default() -> Self {
        ImageChange::Keep
    }
}

impl ImageChange {
    /// Applies the change to the currently stored URL.
    pub fn apply(&self, current: Option<String>) -> Option<String> {
        match self {
            ImageChange::Keep => current,
            ImageChange::Replace(url) => Some(url.to_owned()),
            ImageChange::Remove => None,
        }
    }

    /// Image URL for content that has nothing stored yet.
    pub fn into_new(self) -> Option<String> {
        self.apply(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note(&'static str);

    impl Authored for Note {
        fn author_id(&self) -> &str {
            self.0
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_owned(),
            name: id.to_lowercase(),
        }
    }

    #[test]
    fn test_is_owner() {
        let u1 = identity("U1");
        let u2 = identity("U2");
        let note = Note("U1");

        assert!(is_owner(Some(&u1), &note));
        assert!(!is_owner(Some(&u2), &note));
        assert!(!is_owner(None, &note));
    }

    #[test]
    fn test_require_owner_kinds() {
        use crate::error::ErrorKind;

        let note = Note("U1");
        let u2 = identity("U2");

        let err = require_owner(None, &note, "nope").unwrap_err();
        assert!(err.is(ErrorKind::Unauthenticated));

        let err = require_owner(Some(&u2), &note, "nope").unwrap_err();
        assert!(err.is(ErrorKind::Forbidden));
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  hi \n", "empty").unwrap(), "hi");
        assert!(clean_text(" \t\n ", "empty").is_err());
        assert!(clean_text("", "empty").is_err());
    }

    #[test]
    fn test_image_change_apply() {
        let current = Some("a.png".to_owned());
        assert_eq!(ImageChange::Keep.apply(current.clone()), current);
        assert_eq!(
            ImageChange::Replace("b.png".to_owned()).apply(current.clone()),
            Some("b.png".to_owned())
        );
        assert_eq!(ImageChange::Remove.apply(current), None);
        assert_eq!(ImageChange::Keep.into_new(), None);
    }
}
