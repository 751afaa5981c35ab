//! Glob-style name matching: `*` matches any run of characters, `?` exactly one.

/// Match `name` against `pattern`, ignoring ASCII case.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let name: Vec<char> = name.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut p, mut n) = (0, 0);
    // Position of the last `*` and the name index it was tried against.
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_extension() {
        assert!(wildcard_match("*.ogg", "music/theme.ogg"));
        assert!(!wildcard_match("*.ogg", "music/theme.ogg.bak"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything/at/all"));
    }

    #[test]
    fn test_literal_and_question_mark() {
        assert!(wildcard_match("hero.dat", "hero.dat"));
        assert!(!wildcard_match("hero.dat", "other.dat"));
        assert!(wildcard_match("level?.xml", "level1.xml"));
        assert!(!wildcard_match("level?.xml", "level12.xml"));
    }

    #[test]
    fn test_multiple_stars_backtrack() {
        assert!(wildcard_match("art/*/*.dds", "art/ui/button.dds"));
        assert!(wildcard_match("*a*b", "xxaxxab"));
        assert!(!wildcard_match("*a*b", "xxaxxa"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(wildcard_match("*.JPG", "Textures/Grass.jpg"));
    }
}
