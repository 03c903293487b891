use std::collections::HashSet;

pub const DEFAULT_KEYWORD_CAP: usize = 10;

/// Trimmed, case-sensitive, de-duplicated keywords. First-seen order is kept
/// so that capping is deterministic.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `keyword` was empty after trimming or already present.
    pub fn insert(&mut self, keyword: &str) -> bool {
        let keyword = clean_keyword(keyword);
        if keyword.is_empty() || self.seen.contains(keyword) {
            return false;
        }
        self.seen.insert(keyword.to_string());
        self.ordered.push(keyword.to_string());
        true
    }

    /// Splits a model answer such as `"1. bag, #summer sale\n- tote"` and adds each entry.
    pub fn extend_from_answer(&mut self, answer: &str) -> usize {
        answer
            .split([',', '\n', '、'])
            .filter(|raw| self.insert(raw))
            .count()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn capped(&self, cap: usize) -> &[String] {
        &self.ordered[..self.ordered.len().min(cap)]
    }
}

fn clean_keyword(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.trim_start_matches(['-', '*', '•']).trim_start();
    let trimmed = strip_numbering(trimmed);
    trimmed
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '#' || c == '`')
        .trim()
}

fn strip_numbering(s: &str) -> &str {
    let digits = s.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return s;
    }
    match s[digits..].strip_prefix(['.', ')']) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            rest.trim_start()
        }
        _ => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_dedupes_case_sensitively() {
        let mut set = KeywordSet::new();
        assert!(set.insert("  tote bag "));
        assert!(!set.insert("tote bag"));
        assert!(set.insert("Tote Bag"));
        assert!(!set.insert("   "));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn parses_bulleted_and_numbered_answers() {
        let mut set = KeywordSet::new();
        let added =
            set.extend_from_answer("1. summer dress\n2) linen shirt\n- \"#beach\", linen shirt");
        assert_eq!(added, 3);
        assert_eq!(set.capped(10), ["summer dress", "linen shirt", "beach"]);
    }

    #[test]
    fn keeps_numeric_keywords() {
        let mut set = KeywordSet::new();
        set.extend_from_answer("2024 trends, 50% off");
        assert_eq!(set.capped(10), ["2024 trends", "50% off"]);
    }

    #[test]
    fn keeps_decimal_keywords_intact() {
        let mut set = KeywordSet::new();
        set.extend_from_answer("1.5L tumbler, 2.4GHz router\n3. 1.5L tumbler");
        assert_eq!(set.capped(10), ["1.5L tumbler", "2.4GHz router"]);
    }

    #[test]
    fn cap_keeps_first_seen() {
        let mut set = KeywordSet::new();
        for i in 0..15 {
            set.insert(&format!("kw{i}"));
        }
        let capped = set.capped(DEFAULT_KEYWORD_CAP);
        assert_eq!(capped.len(), 10);
        assert_eq!(capped[0], "kw0");
        assert_eq!(capped[9], "kw9");
    }
}
