//! Small text validation helpers shared by the session, guild, and
//! repository layers. Kept dependency-free on purpose: these are plain
//! length/charset checks, not a full text-component system.

/// Display name rules enforced at character creation.
#[must_use]
pub fn is_valid_display_name(name: &str) -> bool {
    let len = name.chars().count();
    (1..=100).contains(&len)
}

/// Guild name rules from the `createGuild` message catalog entry (3-20 chars).
#[must_use]
pub fn is_valid_guild_name(name: &str) -> bool {
    let len = name.chars().count();
    (3..=20).contains(&len)
}

/// Guild tag rules (2-4 chars); tags are stored uppercased and compared
/// case-insensitively.
#[must_use]
pub fn is_valid_guild_tag(tag: &str) -> bool {
    let len = tag.chars().count();
    (2..=4).contains(&len) && tag.chars().all(|c| c.is_ascii_alphanumeric())
}

#[must_use]
pub fn normalize_guild_tag(tag: &str) -> String {
    tag.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_bounds() {
        assert!(!is_valid_display_name(""));
        assert!(is_valid_display_name("Alice"));
        assert!(is_valid_display_name(&"a".repeat(100)));
        assert!(!is_valid_display_name(&"a".repeat(101)));
    }

    #[test]
    fn guild_tag_is_normalized_and_bounded() {
        assert!(is_valid_guild_tag("abc"));
        assert!(!is_valid_guild_tag("a"));
        assert!(!is_valid_guild_tag("abcde"));
        assert_eq!(normalize_guild_tag("abc"), "ABC");
    }
}
