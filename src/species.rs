/// Canonical form of a therian type used for scoping packs, posts and meetups.
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackTheme {
    pub name: &'static str,
    pub emoji: &'static str,
    pub accent: &'static str,
}

pub fn theme(therian_type: &str) -> PackTheme {
    let t = therian_type.to_lowercase();
    let (name, emoji, accent) = if t.contains("wolf") || t.contains("dog") {
        ("Wolf Pack", "🐺", "amber")
    } else if t.contains("cat") || t.contains("feline") {
        ("Feline Pack", "🐈", "pink")
    } else if t.contains("fox") {
        ("Fox Pack", "🦊", "orange")
    } else if t.contains("bird") {
        ("Sky Pack", "🦅", "sky")
    } else {
        ("Pack", "🏕️", "violet")
    };
    PackTheme { name, emoji, accent }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("  Arctic   WOLF \t"), "arctic wolf");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn themes_match_on_keywords() {
        assert_eq!(theme("Timber Wolf").name, "Wolf Pack");
        assert_eq!(theme("snow leopard / feline").emoji, "🐈");
        assert_eq!(theme("red fox").name, "Fox Pack");
        assert_eq!(theme("raven").name, "Pack");
    }
}
