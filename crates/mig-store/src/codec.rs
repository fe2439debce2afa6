//! Textual encodings used by the question store
//!
//! Multi-valued answers travel as a single string joined with `", "`.
//! Choice lists returned by `metaget` may additionally escape a literal
//! comma as `\,`. Values preseeded in escaped mode have backslashes and
//! newlines escaped so they survive the line-oriented protocol.

/// Separator between list elements
pub const LIST_SEPARATOR: &str = ", ";

/// Join list elements into the store encoding
#[must_use]
pub fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push_str(LIST_SEPARATOR);
        }
        out.push_str(item.as_ref());
    }
    out
}

/// Split a stored value into its elements
///
/// An empty value is an empty list, never a list with one empty element.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(LIST_SEPARATOR).map(str::to_string).collect()
}

/// Split a `metaget` choices field
///
/// Separators preceded by a backslash are part of the element and `\,` is
/// unescaped to `,`.
#[must_use]
pub fn split_choices(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }

    let mut choices = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                chars.next();
                current.push(',');
            }
            ',' if chars.peek() == Some(&' ') => {
                chars.next();
                choices.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    choices.push(current);
    choices
}

/// Escape a value for escaped-mode preseeding
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_value_is_empty_list() {
        assert!(split_list("").is_empty());
        assert!(split_choices("").is_empty());
        assert_eq!(join_list(Vec::<String>::new()), "");
    }

    #[test]
    fn split_list_keeps_inner_spaces() {
        assert_eq!(
            split_list("Windows XP (/dev/hda1), Ubuntu (/dev/hda2)"),
            vec!["Windows XP (/dev/hda1)", "Ubuntu (/dev/hda2)"]
        );
    }

    #[test]
    fn split_choices_honours_escaped_commas() {
        assert_eq!(
            split_choices(r"Documents\, Settings, Wallpaper"),
            vec!["Documents, Settings", "Wallpaper"]
        );
    }

    #[test]
    fn escape_value_escapes_backslash_and_newline() {
        assert_eq!(escape_value("a\\b\nc"), "a\\\\b\\nc");
        assert_eq!(escape_value("plain"), "plain");
    }

    proptest! {
        #[test]
        fn join_then_split_restores_elements(
            items in prop::collection::vec("[a-zA-Z0-9:()/._-]{1,12}", 0..8)
        ) {
            let joined = join_list(&items);
            prop_assert_eq!(split_list(&joined), items);
        }
    }
}
