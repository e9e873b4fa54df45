use anyhow::Result;
use regex::Regex;

use super::Severity;

/// A single tool output format, described as data: an ordered list of line
/// patterns (first match wins) plus a severity-token table. Adding support
/// for a new tool is a matter of adding a profile here, not new control flow.
pub struct SourceProfile {
    pub name: &'static str,
    pub patterns: Vec<Regex>,
    severity_tokens: Vec<(&'static str, Severity)>,
    default_severity: Severity,
}

impl SourceProfile {
    /// Resolve a severity from either an explicit severity token or the
    /// leading letter of a diagnostic code (flake8-style), falling back to
    /// the profile default.
    pub fn severity_for(&self, token: Option<&str>, code: Option<&str>) -> Severity {
        if let Some(token) = token {
            let token = token.to_lowercase();
            for (known, severity) in &self.severity_tokens {
                if token == *known {
                    return *severity;
                }
            }
        }
        if let Some(code) = code {
            if let Some(first) = code.chars().next() {
                let first = first.to_lowercase().to_string();
                for (known, severity) in &self.severity_tokens {
                    if first == *known {
                        return *severity;
                    }
                }
            }
        }
        self.default_severity
    }
}

pub fn build_profiles() -> Result<Vec<SourceProfile>> {
    let eslint = SourceProfile {
        name: "eslint",
        patterns: vec![
            // src/app.js:10:5: Unexpected token (no-extra-semi)
            Regex::new(
                r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+):\s*(?P<message>.*?)\s*\((?P<rule>[@\w./-]+)\)\s*$",
            )?,
            // src/app.js: line 10, col 5, Error - Missing semicolon. (semi)
            Regex::new(
                r"^(?P<file>[^\s:][^:]*):\s*line\s+(?P<line>\d+),\s*col\s+(?P<col>\d+),\s*(?P<severity>\w+)\s*-\s*(?P<message>.*?)\s*(?:\((?P<rule>[@\w./-]+)\))?$",
            )?,
            // src/app.js:10:5: error: Unexpected token
            Regex::new(
                r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+):\s*(?P<severity>error|warning)[:\s]+(?P<message>.+)$",
            )?,
            // src/app.js:10:5: Unexpected token  (parse errors carry no rule)
            Regex::new(r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+):\s*(?P<message>.+)$")?,
        ],
        severity_tokens: vec![
            ("error", Severity::Error),
            ("warning", Severity::Warning),
            ("warn", Severity::Warning),
            ("off", Severity::Off),
        ],
        default_severity: Severity::Error,
    };

    let typescript = SourceProfile {
        name: "typescript",
        patterns: vec![
            // src/app.ts(10,5): error TS2307: Cannot find module './foo'.
            Regex::new(
                r"^(?P<file>[^\s(][^(]*)\((?P<line>\d+),(?P<col>\d+)\):\s*(?P<severity>error|warning)\s+(?P<code>[Tt][Ss]\d+):\s*(?P<message>.+)$",
            )?,
            // src/app.ts:10:5 - error TS2307: Cannot find module './foo'.
            Regex::new(
                r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+)\s*-\s*(?P<severity>error|warning)\s+(?P<code>[Tt][Ss]\d+):\s*(?P<message>.+)$",
            )?,
        ],
        severity_tokens: vec![
            ("error", Severity::Error),
            ("warning", Severity::Warning),
        ],
        default_severity: Severity::Error,
    };

    let flake8 = SourceProfile {
        name: "flake8",
        patterns: vec![
            // src/app.py:10:5: E501 line too long (88 > 79 characters)
            Regex::new(
                r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?P<col>\d+):\s*(?P<code>[A-Z]\d{2,4})\s+(?P<message>.+)$",
            )?,
        ],
        // flake8 has no severity token; derive from the code's leading letter
        severity_tokens: vec![
            ("e", Severity::Error),
            ("f", Severity::Error),
            ("w", Severity::Warning),
            ("c", Severity::Warning),
        ],
        default_severity: Severity::Error,
    };

    let generic = SourceProfile {
        name: "generic",
        patterns: vec![
            // [error] src/app.c:10:5: something went wrong
            Regex::new(
                r"^\[(?P<severity>\w+)\]\s*(?P<file>[^\s:]+):(?P<line>\d+)(?::(?P<col>\d+))?\s*:?\s*(?P<message>.+)$",
            )?,
            // src/app.c:10:5: message
            Regex::new(
                r"^(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+):?\s*(?:(?P<severity>error|warning|note)[:\s]+)?(?P<message>.+)$",
            )?,
            // src/app.c:10: message
            Regex::new(
                r"^(?P<file>[^\s:]+):(?P<line>\d+):\s*(?:(?P<severity>error|warning)[:\s]+)?(?P<message>.+)$",
            )?,
        ],
        severity_tokens: vec![
            ("error", Severity::Error),
            ("warning", Severity::Warning),
            ("warn", Severity::Warning),
            ("note", Severity::Warning),
            ("info", Severity::Warning),
            ("off", Severity::Off),
        ],
        default_severity: Severity::Error,
    };

    Ok(vec![eslint, typescript, flake8, generic])
}

/// Lines that look like tool chrome rather than diagnostics. Skipping these
/// is a deliberate false-negative tradeoff: a summary count line must never
/// be parsed as a diagnostic.
pub fn build_noise_filters() -> Result<Vec<Regex>> {
    Ok(vec![
        Regex::new(r"^\s*$")?,
        Regex::new(r"^\s*[✖✗×x]?\s*\d+\s+(problems?|errors?|warnings?)\b")?,
        Regex::new(r"(?i)^(compiled successfully|build succeeded|done in|found 0 errors)")?,
        Regex::new(r"(?i)^(npm (warn|notice)|deprecationwarning|warning: deprecat)")?,
        Regex::new(r"(?i)^watching for file changes")?,
        Regex::new(r"^\s*[-=~*_]{3,}\s*$")?,
        Regex::new(r"^\s+at\s")?,
    ])
}

/// Sniffs the first few lines of output for distinguishing tokens and picks
/// a profile name. Compiled once alongside the profiles.
pub struct SourceDetector {
    ts_code: Regex,
    flake8_code: Regex,
    eslint_shape: Regex,
}

impl SourceDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ts_code: Regex::new(r"\bTS\d{4}\b")?,
            flake8_code: Regex::new(r":\s*[EWF]\d{3}\s")?,
            eslint_shape: Regex::new(r":\d+:\d+:.*\([a-z@][\w./-]*\)\s*$")?,
        })
    }

    /// Falls back to "generic" when nothing matches.
    pub fn detect(&self, lines: &[&str]) -> &'static str {
        const ESLINT_RULES: &[&str] = &[
            "no-unused-vars",
            "no-undef",
            "no-console",
            "eqeqeq",
            "no-extra-semi",
            "prefer-const",
        ];

        for line in lines.iter().take(5) {
            if self.ts_code.is_match(line) {
                return "typescript";
            }
            if self.flake8_code.is_match(line) {
                return "flake8";
            }
            if ESLINT_RULES.iter().any(|rule| line.contains(rule)) {
                return "eslint";
            }
            if self.eslint_shape.is_match(line) {
                return "eslint";
            }
        }

        "generic"
    }
}
