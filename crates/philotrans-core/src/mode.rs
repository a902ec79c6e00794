use serde::{Deserialize, Serialize};

/// What the model is asked to do with the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Translation,
    Note,
    Meeting,
    Polish,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Translation => "translation",
            Mode::Note => "note",
            Mode::Meeting => "meeting",
            Mode::Polish => "polish",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "translation" => Some(Mode::Translation),
            "note" => Some(Mode::Note),
            "meeting" => Some(Mode::Meeting),
            "polish" => Some(Mode::Polish),
            _ => None,
        }
    }

    pub fn all() -> Vec<Mode> {
        vec![Mode::Translation, Mode::Note, Mode::Meeting, Mode::Polish]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Translation => "哲学深译 (Translation)",
            Mode::Note => "学术笔记 (Notes)",
            Mode::Meeting => "会议纪要 (Minutes)",
            Mode::Polish => "灵感润色 (Polish)",
        }
    }

    /// Style only shapes the instruction for translations.
    pub fn uses_style(&self) -> bool {
        matches!(self, Mode::Translation)
    }
}

/// Fidelity-vs-fluency trade-off for translation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Academic,
    Literal,
    Liberal,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Academic => "academic",
            Style::Literal => "literal",
            Style::Liberal => "liberal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "academic" => Some(Style::Academic),
            "literal" => Some(Style::Literal),
            "liberal" => Some(Style::Liberal),
            _ => None,
        }
    }

    pub fn all() -> Vec<Style> {
        vec![Style::Academic, Style::Literal, Style::Liberal]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Style::Academic => "学术严谨 (Academic)",
            Style::Literal => "原典直译 (Literal)",
            Style::Liberal => "流畅意译 (Liberal)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Style::Academic => "注重术语精确与学术规范",
            Style::Literal => "保留原文句法结构与语文学特征",
            Style::Liberal => "侧重中文表达的通顺与可读性",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Mode::parse("Meeting"), Some(Mode::Meeting));
        assert_eq!(Style::parse(" LITERAL "), Some(Style::Literal));
        assert_eq!(Mode::parse("summary"), None);
    }

    #[test]
    fn as_str_round_trips_through_parse() {
        for mode in Mode::all() {
            assert_eq!(Mode::parse(mode.as_str()), Some(mode));
        }
        for style in Style::all() {
            assert_eq!(Style::parse(style.as_str()), Some(style));
        }
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Polish).unwrap(), "\"polish\"");
        assert_eq!(serde_json::to_string(&Style::Liberal).unwrap(), "\"liberal\"");
    }

    #[test]
    fn only_translation_uses_style() {
        assert!(Mode::Translation.uses_style());
        assert!(!Mode::Note.uses_style());
        assert!(!Mode::Meeting.uses_style());
        assert!(!Mode::Polish.uses_style());
    }
}
