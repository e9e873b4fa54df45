use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    Syntax,
    Type,
    Import,
    Unused,
    Scope,
    Style,
    Logic,
    Performance,
    Security,
    FrameworkSpecific,
    Generic,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Syntax => "syntax",
            ErrorType::Type => "type",
            ErrorType::Import => "import",
            ErrorType::Unused => "unused",
            ErrorType::Scope => "scope",
            ErrorType::Style => "style",
            ErrorType::Logic => "logic",
            ErrorType::Performance => "performance",
            ErrorType::Security => "security",
            ErrorType::FrameworkSpecific => "framework-specific",
            ErrorType::Generic => "generic",
        }
    }
}

/// One taxonomy entry. The table is iterated in declared order and the first
/// entry with any matching pattern wins, so ordering is part of the contract.
pub struct TypeSpec {
    pub error_type: ErrorType,
    pub patterns: Vec<Regex>,
    pub severity_label: &'static str,
    pub severity_score: u8,
    pub complexity_label: &'static str,
    pub complexity_score: u8,
    pub auto_fixable: bool,
    pub category: &'static str,
    pub description: &'static str,
}

pub fn build_taxonomy() -> Result<Vec<TypeSpec>> {
    Ok(vec![
        TypeSpec {
            error_type: ErrorType::Syntax,
            patterns: vec![
                Regex::new(r"(?i)unexpected token")?,
                Regex::new(r"(?i)parsing error")?,
                Regex::new(r"(?i)syntax ?error")?,
                Regex::new(r"(?i)unterminated")?,
                Regex::new(r"(?i)unexpected end of")?,
                Regex::new(r"(?i)expected [\w'\x22{}()\[\];,]+")?,
            ],
            severity_label: "critical",
            severity_score: 5,
            complexity_label: "low",
            complexity_score: 2,
            auto_fixable: false,
            category: "syntax",
            description: "Malformed code that prevents parsing or compilation",
        },
        TypeSpec {
            error_type: ErrorType::Type,
            patterns: vec![
                Regex::new(r"(?i)is not assignable to")?,
                Regex::new(r"(?i)cannot read propert")?,
                Regex::new(r"(?i)is not a function")?,
                Regex::new(r"(?i)type mismatch")?,
                Regex::new(r"(?i)mismatched types")?,
                Regex::new(r"(?i)argument of type")?,
                Regex::new(r"(?i)property .+ does not exist on type")?,
            ],
            severity_label: "high",
            severity_score: 4,
            complexity_label: "medium",
            complexity_score: 3,
            auto_fixable: false,
            category: "types",
            description: "Value used in a way its type does not allow",
        },
        TypeSpec {
            error_type: ErrorType::Import,
            patterns: vec![
                Regex::new(r"(?i)cannot find module")?,
                Regex::new(r"(?i)module not found")?,
                Regex::new(r"(?i)cannot resolve")?,
                Regex::new(r"(?i)failed to resolve")?,
                Regex::new(r"(?i)no-unresolved")?,
                Regex::new(r"(?i)import/")?,
            ],
            severity_label: "high",
            severity_score: 4,
            complexity_label: "low",
            complexity_score: 2,
            auto_fixable: true,
            category: "imports",
            description: "Module or dependency cannot be located",
        },
        TypeSpec {
            error_type: ErrorType::Unused,
            patterns: vec![
                Regex::new(r"(?i)is declared but")?,
                Regex::new(r"(?i)is defined but never used")?,
                Regex::new(r"(?i)assigned a value but never used")?,
                Regex::new(r"(?i)unused (variable|import|parameter)")?,
                Regex::new(r"(?i)no-unused")?,
            ],
            severity_label: "low",
            severity_score: 2,
            complexity_label: "trivial",
            complexity_score: 1,
            auto_fixable: true,
            category: "maintenance",
            description: "Declared identifier that is never read",
        },
        TypeSpec {
            error_type: ErrorType::Scope,
            patterns: vec![
                Regex::new(r"(?i)is not defined")?,
                Regex::new(r"(?i)cannot find name")?,
                Regex::new(r"(?i)no-undef")?,
                Regex::new(r"(?i)used before")?,
                Regex::new(r"(?i)block-scoped")?,
                Regex::new(r"(?i)out of scope")?,
            ],
            severity_label: "high",
            severity_score: 4,
            complexity_label: "medium",
            complexity_score: 3,
            auto_fixable: false,
            category: "scope",
            description: "Identifier referenced outside any visible declaration",
        },
        TypeSpec {
            error_type: ErrorType::Style,
            patterns: vec![
                Regex::new(r"(?i)semi(colon)?")?,
                Regex::new(r"(?i)indent")?,
                Regex::new(r"(?i)quote")?,
                Regex::new(r"(?i)spacing")?,
                Regex::new(r"(?i)line too long")?,
                Regex::new(r"(?i)max-len")?,
                Regex::new(r"(?i)trailing")?,
                Regex::new(r"(?i)prettier")?,
            ],
            severity_label: "info",
            severity_score: 1,
            complexity_label: "trivial",
            complexity_score: 1,
            auto_fixable: true,
            category: "style",
            description: "Formatting or convention violation",
        },
        TypeSpec {
            error_type: ErrorType::Logic,
            patterns: vec![
                Regex::new(r"(?i)unreachable code")?,
                Regex::new(r"(?i)no-constant-condition")?,
                Regex::new(r"(?i)always (true|false)")?,
                Regex::new(r"(?i)no-fallthrough")?,
                Regex::new(r"(?i)self-compar")?,
                Regex::new(r"(?i)no-dupe")?,
            ],
            severity_label: "high",
            severity_score: 4,
            complexity_label: "high",
            complexity_score: 4,
            auto_fixable: false,
            category: "logic",
            description: "Code that cannot behave as intended",
        },
        TypeSpec {
            error_type: ErrorType::Performance,
            patterns: vec![
                Regex::new(r"(?i)inefficient")?,
                Regex::new(r"(?i)unnecessary re-?render")?,
                Regex::new(r"(?i)no-await-in-loop")?,
                Regex::new(r"(?i)prefer-spread")?,
            ],
            severity_label: "medium",
            severity_score: 3,
            complexity_label: "high",
            complexity_score: 4,
            auto_fixable: false,
            category: "performance",
            description: "Pattern with avoidable runtime cost",
        },
        TypeSpec {
            error_type: ErrorType::Security,
            patterns: vec![
                Regex::new(r"(?i)\bsecurity\b")?,
                Regex::new(r"(?i)\bxss\b")?,
                Regex::new(r"(?i)injection")?,
                Regex::new(r"(?i)no-eval")?,
                Regex::new(r"(?i)\beval\b")?,
                Regex::new(r"(?i)dangerouslysetinnerhtml")?,
                Regex::new(r"(?i)\bunsafe\b")?,
            ],
            severity_label: "critical",
            severity_score: 5,
            complexity_label: "high",
            complexity_score: 4,
            auto_fixable: false,
            category: "security",
            description: "Potentially exploitable construct",
        },
        TypeSpec {
            error_type: ErrorType::FrameworkSpecific,
            patterns: vec![
                Regex::new(r"(?i)react-hooks/")?,
                Regex::new(r"(?i)exhaustive-deps")?,
                Regex::new(r"(?i)\bjsx\b")?,
                Regex::new(r"(?i)\bhook\b")?,
                Regex::new(r"(?i)vue/")?,
                Regex::new(r"(?i)@angular")?,
            ],
            severity_label: "medium",
            severity_score: 3,
            complexity_label: "medium",
            complexity_score: 3,
            auto_fixable: false,
            category: "framework",
            description: "Violation of a framework-specific rule",
        },
        TypeSpec {
            error_type: ErrorType::Generic,
            patterns: Vec::new(),
            severity_label: "medium",
            severity_score: 3,
            complexity_label: "medium",
            complexity_score: 3,
            auto_fixable: false,
            category: "general",
            description: "Unrecognized diagnostic",
        },
    ])
}

/// Diagnostic-code range overrides for code-bearing sources. These force a
/// type even when no taxonomy regex matches, because the compiler has already
/// told us exactly what went wrong.
pub fn type_from_code(code: &str) -> Option<ErrorType> {
    let digits: u32 = code.trim_start_matches(|c: char| c.is_ascii_alphabetic()).parse().ok()?;
    if !code.starts_with("TS") {
        return None;
    }
    match digits {
        2306 | 2307 | 2792 => Some(ErrorType::Import),
        6133 | 6138 | 6192 | 6196 | 6198 => Some(ErrorType::Unused),
        2000..=2999 => Some(ErrorType::Type),
        1000..=1999 => Some(ErrorType::Syntax),
        _ => None,
    }
}

/// Rule-name prefix overrides. Linter rule ids are unambiguous, so they beat
/// message-pattern matching.
pub fn type_from_rule(rule: &str) -> Option<ErrorType> {
    const FRAMEWORK_PREFIXES: &[&str] =
        &["react/", "react-hooks/", "vue/", "@typescript-eslint/", "@angular"];
    const STYLE_PREFIXES: &[&str] = &[
        "semi",
        "no-extra-semi",
        "indent",
        "quotes",
        "quote-props",
        "comma-",
        "space-",
        "keyword-spacing",
        "object-curly",
        "max-len",
        "eol-last",
    ];

    if rule.starts_with("no-unused") {
        return Some(ErrorType::Unused);
    }
    if rule == "no-undef" || rule == "no-use-before-define" {
        return Some(ErrorType::Scope);
    }
    if FRAMEWORK_PREFIXES.iter().any(|p| rule.starts_with(p)) {
        return Some(ErrorType::FrameworkSpecific);
    }
    if STYLE_PREFIXES.iter().any(|p| rule.starts_with(p)) {
        return Some(ErrorType::Style);
    }

    None
}
