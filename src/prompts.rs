//! Prompts for the LLM translation collaborator.
//!
//! Every piece of text sent to the model lives here so the message layout in
//! [`crate::pipeline::translate`] stays free of string literals. Callers can
//! replace the guidelines via [`crate::config::TranslationConfig::system_prompt`];
//! `{sourceLanguage}` and `{targetLanguage}` are substituted in either case.

/// Default translator guidelines.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a professional translator specialized in document translation with format preservation.
Your task is to translate documents from {sourceLanguage} to {targetLanguage}.

Translation guidelines:
- Provide a faithful translation that maintains the tone and style of the original text.
- Adapt the text to the cultural context of {targetLanguage} readers when necessary.
- Translate or interpret abbreviations that would not be understood in {targetLanguage}, according to context (like OB = obstetrician, OB/GYN = obstetrician/gynecologist, etc).
- Maintain all punctuation marks, including question marks (¿?), exclamation marks (¡!), quotation marks, parentheses, and any other symbols in the original text.
- Any text matching the structure of a biblical reference (e.g., "John 3:16" or "Mateo 5:3") should NOT be translated. Instead, detect the Bible version used in the original text and replace the verse with the exact text of a {targetLanguage} Bible version.
"#;

/// Appended to the system message when formatting must be preserved.
pub const FORMATTING_INSTRUCTIONS: &str = r#"IMPORTANT: This document uses Markdown formatting. You MUST preserve all Markdown syntax in your translation:
- Keep all '#' for headings of any level
- Preserve '**text**' for bold
- Maintain '*text*' for italic
- Keep all list markers ('- ' or '1. ')
- Preserve line breaks and paragraph structure
- Maintain any other Markdown formatting markers
- Fix broken sentences if there are strange characters or line breaks"#;

/// Last line of every system message.
pub const RESPONSE_INSTRUCTION: &str =
    "Respond ONLY with the translated text, maintaining all formatting markers.";

/// Few-shot pairs shown to the model when formatting must be preserved.
pub const TRANSLATION_EXAMPLES: [(&str, &str); 2] = [
    (
        "Please join us for the **church dinner** this Sunday.",
        "Por favor, acompáñenos en la **cena de la iglesia** este domingo.",
    ),
    (
        "We all put time and effort into selecting the outfits we wear",
        "Todos ponemos tiempo y esfuerzo en seleccionar las ropas que usamos",
    ),
];

/// Substitute the language placeholders.
pub fn fill_languages(template: &str, source: &str, target: &str) -> String {
    template
        .replace("{sourceLanguage}", source)
        .replace("{targetLanguage}", target)
}

/// Section carrying the caller's own instructions.
pub fn custom_instructions(custom_prompt: &str, target: &str) -> String {
    format!(
        "Additional Translation Instructions:\n{}\n\nPreserve all Markdown formatting in your translation.",
        custom_prompt.replace("{targetLanguage}", target)
    )
}

/// Assistant turn acknowledging the task and showing the few-shot pairs.
pub fn examples_message(source: &str, target: &str) -> String {
    let mut msg = format!(
        "I understand. I'll translate the document from {source} to {target} while preserving \
all formatting and following your guidelines. Here are examples of how I'll handle different elements:"
    );
    for (original, translated) in TRANSLATION_EXAMPLES {
        msg.push_str(&format!(
            "\n\nOriginal: \"{original}\"\nTranslation: \"{translated}\""
        ));
    }
    msg
}

/// User turn wrapping the document.
pub fn document_message(markup: &str) -> String {
    format!("Please translate the following document:\n\n{markup}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn languages_are_substituted_everywhere() {
        let s = fill_languages(DEFAULT_SYSTEM_PROMPT, "English", "Spanish");
        assert!(s.contains("from English to Spanish"));
        assert!(!s.contains("{targetLanguage}"));
        assert!(!s.contains("{sourceLanguage}"));
    }

    #[test]
    fn custom_prompt_gets_target_language() {
        let s = custom_instructions("Use formal {targetLanguage}.", "French");
        assert!(s.starts_with("Additional Translation Instructions:\nUse formal French."));
        assert!(s.ends_with("Preserve all Markdown formatting in your translation."));
    }

    #[test]
    fn examples_message_lists_both_pairs() {
        let s = examples_message("English", "Spanish");
        assert_eq!(s.matches("Original: ").count(), 2);
        assert!(s.contains("**cena de la iglesia**"));
    }
}
