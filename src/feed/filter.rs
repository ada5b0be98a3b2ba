use regex::Regex;

/// Hangul script: jamo, compatibility jamo and syllables. Han ideographs and
/// kana are not Hangul.
pub const HANGUL_PATTERN: &str = r"\p{Hangul}";

/// Cheap local gate: text must contain at least one character of the target
/// script before it is worth a network round trip.
#[derive(Debug, Clone)]
pub struct ScriptFilter {
    pattern: Regex,
}

impl ScriptFilter {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn admits(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hangul() -> ScriptFilter {
        ScriptFilter::new(Regex::new(HANGUL_PATTERN).unwrap())
    }

    #[test]
    fn admits_text_with_any_hangul() {
        let filter = hangul();
        assert!(filter.admits("오늘 날씨"));
        assert!(filter.admits("check this ㅋㅋ"));
        assert!(filter.admits("漢字 섞인 문장"));
    }

    #[test]
    fn rejects_text_without_target_script() {
        let filter = hangul();
        assert!(!filter.admits("just english here"));
        assert!(!filter.admits("日本語のテキスト"));
        assert!(!filter.admits("中文内容"));
        assert!(!filter.admits("🔥🔥"));
    }
}
