//! Supported languages and display-name lookup.

use serde::Serialize;

/// One entry of the language table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
}

pub const SUPPORTED_LANGUAGES: [Language; 10] = [
    Language { code: "en", name: "English", native_name: "English" },
    Language { code: "es", name: "Spanish", native_name: "Español" },
    Language { code: "fr", name: "French", native_name: "Français" },
    Language { code: "de", name: "German", native_name: "Deutsch" },
    Language { code: "it", name: "Italian", native_name: "Italiano" },
    Language { code: "pt", name: "Portuguese", native_name: "Português" },
    Language { code: "ru", name: "Russian", native_name: "Русский" },
    Language { code: "zh", name: "Chinese (Simplified)", native_name: "中文" },
    Language { code: "ja", name: "Japanese", native_name: "日本語" },
    Language { code: "ko", name: "Korean", native_name: "한국어" },
];

/// Look up a language by code (case-insensitive).
pub fn find_language(code: &str) -> Option<&'static Language> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(code.trim()))
}

/// English display name for a code; unknown codes are returned unchanged.
pub fn language_name(code: &str) -> &str {
    find_language(code).map(|l| l.name).unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        assert_eq!(language_name("es"), "Spanish");
        assert_eq!(language_name("ZH"), "Chinese (Simplified)");
        assert_eq!(find_language("ja").map(|l| l.native_name), Some("日本語"));
    }

    #[test]
    fn unknown_code_falls_back_to_itself() {
        assert_eq!(language_name("tlh"), "tlh");
        assert!(find_language("").is_none());
    }
}
