//! Prompt template variables.
//!
//! Templates reference runtime values with `@name` tokens. Only the
//! variables listed in [`TemplateVariable`] are valid; anything else is
//! rejected when the settings file is loaded.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateVariable {
    Categories,
    Tags,
    OcrText,
    CurrentYear,
}

impl TemplateVariable {
    pub const ALL: [TemplateVariable; 4] = [
        TemplateVariable::Categories,
        TemplateVariable::Tags,
        TemplateVariable::OcrText,
        TemplateVariable::CurrentYear,
    ];

    pub fn token(self) -> &'static str {
        match self {
            TemplateVariable::Categories => "@categories",
            TemplateVariable::Tags => "@tags",
            TemplateVariable::OcrText => "@ocrText",
            TemplateVariable::CurrentYear => "@currentYear",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.token() == token)
    }
}

/// Regex matching any `@word` token in a template.
pub fn variable_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"@\w+").expect("static regex is valid"))
}

/// Returns every `@token` in the template that is not a known variable.
pub fn unknown_variables(template: &str) -> Vec<String> {
    let mut unknown: Vec<String> = variable_regex()
        .find_iter(template)
        .map(|m| m.as_str())
        .filter(|token| TemplateVariable::from_token(token).is_none())
        .map(str::to_string)
        .collect();
    unknown.dedup();
    unknown
}
