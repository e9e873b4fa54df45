use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mod profiles;

pub use profiles::SourceProfile;
use profiles::{build_noise_filters, build_profiles, SourceDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Off,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Off => "off",
        }
    }
}

/// One line of tool output successfully matched against a source profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedError {
    pub source: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub rule: Option<String>,
    pub code: Option<String>,
    pub severity: Severity,
    pub category: String,
    pub raw: String,
    pub timestamp: DateTime<Utc>,
}

impl PartialEq for ParsedError {
    // Timestamp is excluded: parsing the same text twice must compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.file == other.file
            && self.line == other.line
            && self.column == other.column
            && self.message == other.message
            && self.rule == other.rule
            && self.code == other.code
            && self.severity == other.severity
            && self.category == other.category
            && self.raw == other.raw
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ParseStats {
    pub total_lines: usize,
    pub matched: usize,
    pub skipped: usize,
    pub by_severity: HashMap<String, usize>,
    pub by_file: HashMap<String, usize>,
    pub by_category: HashMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct ParseResult {
    pub source: String,
    pub errors: Vec<ParsedError>,
    pub stats: ParseStats,
    pub summary: String,
}

/// Receives every parsed error as a side channel. The parser never lets a
/// sink failure affect its own return value.
pub trait ErrorSink: Send {
    fn on_parsed(&mut self, error: &ParsedError);
}

pub struct ErrorParser {
    profiles: Vec<SourceProfile>,
    noise: Vec<regex::Regex>,
    detector: SourceDetector,
    recorder: Option<Arc<Mutex<dyn ErrorSink>>>,
}

impl ErrorParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            profiles: build_profiles()?,
            noise: build_noise_filters()?,
            detector: SourceDetector::new()?,
            recorder: None,
        })
    }

    pub fn with_recorder(mut self, recorder: Arc<Mutex<dyn ErrorSink>>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Parse a raw tool output blob. `source_hint` names a profile or is
    /// `"auto"` to sniff one from the first few lines. An unknown explicit
    /// hint is a hard failure; silently guessing would misparse every field.
    pub fn parse(&self, text: &str, source_hint: &str) -> Result<ParseResult> {
        let lines: Vec<&str> = text.lines().collect();
        let non_blank: Vec<&str> = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .copied()
            .collect();

        let source_name = if source_hint == "auto" {
            self.detector.detect(&non_blank)
        } else {
            self.profiles
                .iter()
                .map(|p| p.name)
                .find(|name| *name == source_hint)
                .ok_or_else(|| anyhow!("unknown error source: '{}'", source_hint))?
        };

        let profile = self
            .profiles
            .iter()
            .find(|p| p.name == source_name)
            .ok_or_else(|| anyhow!("unknown error source: '{}'", source_name))?;

        let mut errors = Vec::new();
        let mut stats = ParseStats {
            total_lines: non_blank.len(),
            ..Default::default()
        };

        for line in &non_blank {
            if self.noise.iter().any(|re| re.is_match(line)) {
                stats.skipped += 1;
                continue;
            }

            match self.match_line(profile, line) {
                Some(error) => {
                    stats.matched += 1;
                    *stats
                        .by_severity
                        .entry(error.severity.as_str().to_string())
                        .or_insert(0) += 1;
                    *stats.by_file.entry(error.file.clone()).or_insert(0) += 1;
                    *stats.by_category.entry(error.category.clone()).or_insert(0) += 1;

                    if let Some(recorder) = &self.recorder {
                        if let Ok(mut recorder) = recorder.lock() {
                            recorder.on_parsed(&error);
                        }
                    }

                    errors.push(error);
                }
                // Tool output routinely contains non-diagnostic lines.
                None => stats.skipped += 1,
            }
        }

        let summary = render_summary(source_name, &errors, &stats);

        Ok(ParseResult {
            source: source_name.to_string(),
            errors,
            stats,
            summary,
        })
    }

    fn match_line(&self, profile: &SourceProfile, line: &str) -> Option<ParsedError> {
        for pattern in &profile.patterns {
            let caps = match pattern.captures(line) {
                Some(caps) => caps,
                None => continue,
            };

            let file = caps.name("file")?.as_str();
            let file = file.strip_prefix("./").unwrap_or(file).to_string();
            if file.is_empty() {
                continue;
            }

            let line_no: u32 = caps.name("line")?.as_str().parse().ok()?;
            let column: u32 = caps
                .name("col")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            let message = caps.name("message")?.as_str().trim().to_string();
            let rule = caps.name("rule").map(|m| m.as_str().to_string());
            let code = caps.name("code").map(|m| m.as_str().to_uppercase());
            let severity =
                profile.severity_for(caps.name("severity").map(|m| m.as_str()), code.as_deref());
            let category = coarse_category(code.as_deref(), rule.as_deref(), &message);

            return Some(ParsedError {
                source: profile.name.to_string(),
                file,
                line: line_no,
                column,
                message,
                rule,
                code,
                severity,
                category,
                raw: line.to_string(),
                timestamp: Utc::now(),
            });
        }

        None
    }
}

/// Coarse category buckets, resolved in priority order: diagnostic-code
/// prefixes first, then rule-name substrings, then message keywords.
fn coarse_category(code: Option<&str>, rule: Option<&str>, message: &str) -> String {
    const CODE_PREFIXES: &[(&str, &str)] = &[
        ("TS1", "syntax"),
        ("TS2306", "import"),
        ("TS2307", "import"),
        ("TS6", "unused"),
        ("TS2", "type"),
        ("F401", "import"),
        ("F821", "scope"),
        ("F841", "unused"),
        ("E9", "syntax"),
        ("E", "style"),
        ("W", "style"),
        ("C", "style"),
    ];
    const RULE_SUBSTRINGS: &[(&str, &str)] = &[
        ("unused", "unused"),
        ("import", "import"),
        ("no-undef", "scope"),
        ("semi", "style"),
        ("indent", "style"),
        ("quote", "style"),
        ("spacing", "style"),
        ("eqeqeq", "logic"),
        ("security", "security"),
        ("react", "framework"),
    ];
    const MESSAGE_KEYWORDS: &[(&str, &str)] = &[
        ("cannot find module", "import"),
        ("module not found", "import"),
        ("is not defined", "scope"),
        ("cannot find name", "scope"),
        ("unexpected token", "syntax"),
        ("parsing error", "syntax"),
        ("syntax error", "syntax"),
        ("is not assignable", "type"),
        ("type mismatch", "type"),
        ("never used", "unused"),
        ("declared but", "unused"),
        ("line too long", "style"),
    ];

    if let Some(code) = code {
        for (prefix, category) in CODE_PREFIXES {
            if code.starts_with(prefix) {
                return category.to_string();
            }
        }
    }
    if let Some(rule) = rule {
        let rule = rule.to_lowercase();
        for (needle, category) in RULE_SUBSTRINGS {
            if rule.contains(needle) {
                return category.to_string();
            }
        }
    }
    let message = message.to_lowercase();
    for (needle, category) in MESSAGE_KEYWORDS {
        if message.contains(needle) {
            return category.to_string();
        }
    }

    "general".to_string()
}

fn render_summary(source: &str, errors: &[ParsedError], stats: &ParseStats) -> String {
    if errors.is_empty() {
        return "No errors found".to_string();
    }

    let error_count = stats.by_severity.get("error").copied().unwrap_or(0);
    let warning_count = stats.by_severity.get("warning").copied().unwrap_or(0);

    format!(
        "Parsed {} diagnostics from {} ({} errors, {} warnings) across {} files",
        errors.len(),
        source,
        error_count,
        warning_count,
        stats.by_file.len()
    )
}
