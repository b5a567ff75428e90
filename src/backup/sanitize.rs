//! Name segment sanitization for destination keys.

/// Strip characters whose UTF-8 encoding needs 4 bytes (astral-plane symbols,
/// emoji); everything else passes through unchanged.
///
/// This reproduces the historical behavior of the service. Whether dropping
/// rather than transliterating such characters is the right policy is an open
/// product question; do not "fix" this without one.
pub fn sanitize(name: &str) -> String {
    name.chars().filter(|c| c.len_utf8() <= 3).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(sanitize("final_shot.mov"), "final_shot.mov");
    }

    #[test]
    fn test_three_byte_chars_kept() {
        // CJK and accented characters encode in at most 3 bytes.
        assert_eq!(sanitize("épisode_千"), "épisode_千");
    }

    #[test]
    fn test_four_byte_chars_dropped() {
        assert_eq!(sanitize("shot_🎬_v2.mov"), "shot__v2.mov");
        assert_eq!(sanitize("𝕊hot"), "hot");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(sanitize(""), "");
    }
}
