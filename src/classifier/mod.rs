use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::parser::ParsedError;

mod taxonomy;

pub use taxonomy::ErrorType;
use taxonomy::{build_taxonomy, type_from_code, type_from_rule, TypeSpec};

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedError {
    pub error: ParsedError,
    pub error_type: ErrorType,
    pub severity_label: String,
    pub severity_score: u8,
    pub complexity_label: String,
    pub complexity_score: u8,
    pub auto_fixable: bool,
    pub category: String,
    pub description: String,
    pub fix_suggestions: Vec<String>,
    pub confidence: u8,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ClassificationStats {
    pub total_errors: usize,
    pub by_type: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    pub auto_fixable: usize,
    pub average_confidence: f64,
}

/// A cluster detected across one classification batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPattern {
    pub kind: String,
    pub severity: String,
    pub description: String,
    pub suggestion: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub priority: String,
    pub action: String,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct ClassificationResult {
    pub errors: Vec<ClassifiedError>,
    pub stats: ClassificationStats,
    pub patterns: Vec<BatchPattern>,
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Default, Serialize)]
pub struct PriorityBuckets {
    pub critical: Vec<ClassifiedError>,
    pub high: Vec<ClassifiedError>,
    pub medium: Vec<ClassifiedError>,
    pub low: Vec<ClassifiedError>,
    pub info: Vec<ClassifiedError>,
}

pub struct ErrorClassifier {
    taxonomy: Vec<TypeSpec>,
    quoted_name: Regex,
    identifier: Regex,
}

impl ErrorClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            taxonomy: build_taxonomy()?,
            quoted_name: Regex::new(r#"['"]([^'"]+)['"]"#)?,
            identifier: Regex::new(r"'([A-Za-z_$][\w$]*)'")?,
        })
    }

    pub fn classify(&self, parsed: &[ParsedError]) -> ClassificationResult {
        let errors: Vec<ClassifiedError> = parsed.iter().map(|e| self.classify_one(e)).collect();

        let stats = compute_stats(&errors);
        let patterns = identify_patterns(&errors);
        let recommendations = build_recommendations(&errors, &stats);
        let summary = render_summary(&stats);

        ClassificationResult {
            errors,
            stats,
            patterns,
            recommendations,
            summary,
        }
    }

    fn classify_one(&self, error: &ParsedError) -> ClassifiedError {
        let spec = self.resolve_type(error);

        let confidence = self.confidence_for(spec, error);
        let fix_suggestions = fix_suggestions(spec.error_type, error.rule.as_deref());
        let metadata = self.extract_metadata(spec.error_type, error);

        ClassifiedError {
            error: error.clone(),
            error_type: spec.error_type,
            severity_label: spec.severity_label.to_string(),
            severity_score: spec.severity_score,
            complexity_label: spec.complexity_label.to_string(),
            complexity_score: spec.complexity_score,
            auto_fixable: spec.auto_fixable,
            category: spec.category.to_string(),
            description: spec.description.to_string(),
            fix_suggestions,
            confidence,
            metadata,
        }
    }

    /// Code-range and rule-prefix overrides win outright; otherwise the first
    /// taxonomy entry (in declared order) with any matching pattern wins.
    fn resolve_type(&self, error: &ParsedError) -> &TypeSpec {
        let forced = error
            .code
            .as_deref()
            .and_then(type_from_code)
            .or_else(|| error.rule.as_deref().and_then(type_from_rule));

        if let Some(error_type) = forced {
            return self.spec_for(error_type);
        }

        for spec in &self.taxonomy {
            if spec.error_type == ErrorType::Generic {
                continue;
            }
            let matched = spec.patterns.iter().any(|p| {
                p.is_match(&error.message)
                    || error.rule.as_deref().is_some_and(|r| p.is_match(r))
                    || error.code.as_deref().is_some_and(|c| p.is_match(c))
            });
            if matched {
                return spec;
            }
        }

        self.spec_for(ErrorType::Generic)
    }

    fn spec_for(&self, error_type: ErrorType) -> &TypeSpec {
        self.taxonomy
            .iter()
            .find(|s| s.error_type == error_type)
            .unwrap_or_else(|| &self.taxonomy[self.taxonomy.len() - 1])
    }

    /// Confidence rewards specificity (pattern matches, code/rule presence)
    /// and penalizes uninformative messages. Clamped to [0, 100].
    fn confidence_for(&self, spec: &TypeSpec, error: &ParsedError) -> u8 {
        let mut confidence: i32 = 50;

        for pattern in &spec.patterns {
            if pattern.is_match(&error.message) {
                confidence += 20;
            }
            if error.rule.as_deref().is_some_and(|r| pattern.is_match(r)) {
                confidence += 20;
            }
        }
        if error.code.is_some() {
            confidence += 15;
        }
        if error.rule.is_some() {
            confidence += 10;
        }
        if error.message.len() < 10 {
            confidence -= 10;
        }

        confidence.clamp(0, 100) as u8
    }

    fn extract_metadata(
        &self,
        error_type: ErrorType,
        error: &ParsedError,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut metadata = serde_json::Map::new();

        let capture = |re: &Regex| {
            re.captures(&error.message)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        match error_type {
            ErrorType::Import => {
                if let Some(module) = capture(&self.quoted_name) {
                    metadata.insert("missing_module".into(), module.into());
                }
            }
            ErrorType::Unused => {
                if let Some(name) = capture(&self.identifier) {
                    metadata.insert("unused_identifier".into(), name.into());
                }
            }
            ErrorType::Scope => {
                if let Some(name) = capture(&self.quoted_name) {
                    metadata.insert("undefined_name".into(), name.into());
                }
            }
            _ => {}
        }

        metadata
    }
}

/// Partition classified errors into remediation-order buckets. Every error
/// lands in exactly one bucket.
pub fn errors_by_priority(errors: &[ClassifiedError]) -> PriorityBuckets {
    let mut buckets = PriorityBuckets::default();

    for error in errors {
        match priority_of(error) {
            Priority::Critical => buckets.critical.push(error.clone()),
            Priority::High => buckets.high.push(error.clone()),
            Priority::Medium => buckets.medium.push(error.clone()),
            Priority::Low => buckets.low.push(error.clone()),
            Priority::Info => buckets.info.push(error.clone()),
        }
    }

    buckets
}

pub fn priority_of(error: &ClassifiedError) -> Priority {
    if error.severity_score >= 5 {
        Priority::Critical
    } else if error.severity_score >= 4 || error.complexity_score >= 4 {
        Priority::High
    } else if error.severity_score >= 3 {
        Priority::Medium
    } else if error.auto_fixable {
        Priority::Low
    } else {
        Priority::Info
    }
}

fn fix_suggestions(error_type: ErrorType, rule: Option<&str>) -> Vec<String> {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    match error_type {
        ErrorType::Syntax => owned(&[
            "Check for missing brackets, parentheses, or quotes",
            "Review the line above the reported position",
            "Run a formatter to surface where the structure breaks",
        ]),
        ErrorType::Type => owned(&[
            "Check the declared type of the value being assigned",
            "Verify function argument types and order",
            "Add or correct type annotations at the failing site",
        ]),
        ErrorType::Import => owned(&[
            "Check the import path for typos",
            "Verify the package is installed and listed in the manifest",
            "Check the import syntax (default vs named import)",
        ]),
        ErrorType::Unused => owned(&[
            "Remove the unused declaration",
            "Prefix the name with an underscore if it is intentionally unused",
        ]),
        ErrorType::Scope => owned(&[
            "Declare the identifier before it is used",
            "Check for typos in the identifier name",
            "Verify the import that should provide the name",
        ]),
        ErrorType::Style => {
            // The fired rule makes the first suggestion concrete.
            let first = match rule {
                Some(r) if r.contains("semi") => "Add or remove semicolons to match the configured style",
                Some(r) if r.contains("indent") => "Re-indent the block to the configured width",
                Some(r) if r.contains("quote") => "Switch to the configured quote style",
                _ => "Apply the configured formatting style",
            };
            vec![
                first.to_string(),
                "Run the linter with --fix to apply the change automatically".to_string(),
            ]
        }
        ErrorType::Logic => owned(&[
            "Walk through the conditional branches by hand",
            "Add a unit test pinning the intended behavior",
        ]),
        ErrorType::Performance => owned(&[
            "Profile before optimizing",
            "Hoist invariant work out of loops and render paths",
        ]),
        ErrorType::Security => owned(&[
            "Never interpolate untrusted input",
            "Replace the flagged construct with a safe API",
            "Request a security review for the change",
        ]),
        ErrorType::FrameworkSpecific => owned(&[
            "Consult the framework rule documentation",
            "Check the plugin version matches the framework version",
        ]),
        ErrorType::Generic => owned(&[
            "Read the full message and the surrounding code",
            "Search the rule or code identifier in the tool documentation",
        ]),
    }
}

fn compute_stats(errors: &[ClassifiedError]) -> ClassificationStats {
    let mut stats = ClassificationStats {
        total_errors: errors.len(),
        ..Default::default()
    };

    let mut confidence_sum = 0u32;
    for error in errors {
        *stats
            .by_type
            .entry(error.error_type.as_str().to_string())
            .or_insert(0) += 1;
        *stats
            .by_severity
            .entry(error.severity_label.clone())
            .or_insert(0) += 1;
        if error.auto_fixable {
            stats.auto_fixable += 1;
        }
        confidence_sum += error.confidence as u32;
    }

    if !errors.is_empty() {
        stats.average_confidence = confidence_sum as f64 / errors.len() as f64;
    }

    stats
}

fn identify_patterns(errors: &[ClassifiedError]) -> Vec<BatchPattern> {
    let mut patterns = Vec::new();

    let mut by_file: HashMap<&str, usize> = HashMap::new();
    let mut by_type: HashMap<ErrorType, usize> = HashMap::new();
    for error in errors {
        *by_file.entry(error.error.file.as_str()).or_insert(0) += 1;
        *by_type.entry(error.error_type).or_insert(0) += 1;
    }

    for (file, count) in by_file {
        if count >= 3 {
            patterns.push(BatchPattern {
                kind: "file_cluster".to_string(),
                severity: "high".to_string(),
                description: format!("{} errors concentrated in {}", count, file),
                suggestion: format!("Review {} as a whole rather than error by error", file),
                count,
            });
        }
    }

    for (error_type, count) in &by_type {
        if *count >= 3 {
            patterns.push(BatchPattern {
                kind: "type_cluster".to_string(),
                severity: "medium".to_string(),
                description: format!("{} {} errors across the batch", count, error_type.as_str()),
                suggestion: format!(
                    "A shared root cause likely explains the {} errors",
                    error_type.as_str()
                ),
                count: *count,
            });
        }
    }

    let import_count = by_type.get(&ErrorType::Import).copied().unwrap_or(0);
    if import_count >= 2 {
        patterns.push(BatchPattern {
            kind: "import_issues".to_string(),
            severity: "high".to_string(),
            description: format!("{} import errors in one batch", import_count),
            suggestion: "Check package installation and module resolver configuration".to_string(),
            count: import_count,
        });
    }

    patterns
}

fn build_recommendations(
    errors: &[ClassifiedError],
    stats: &ClassificationStats,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let critical = errors.iter().filter(|e| e.severity_score >= 4).count();
    if critical > 0 {
        recommendations.push(Recommendation {
            priority: "high".to_string(),
            action: "Fix critical errors first".to_string(),
            details: format!("{} errors block compilation or correct behavior", critical),
        });
    }

    if stats.auto_fixable > 0 {
        recommendations.push(Recommendation {
            priority: "low".to_string(),
            action: "Batch-apply automatic fixes".to_string(),
            details: format!("{} errors can be fixed automatically", stats.auto_fixable),
        });
    }

    if stats.by_type.contains_key("import") {
        recommendations.push(Recommendation {
            priority: "medium".to_string(),
            action: "Verify dependency installation and import paths".to_string(),
            details: "Import errors usually trace back to the manifest or resolver".to_string(),
        });
    }
    if stats.by_type.contains_key("type") {
        recommendations.push(Recommendation {
            priority: "medium".to_string(),
            action: "Tighten type annotations around the failing sites".to_string(),
            details: "Type errors cluster where annotations drift from usage".to_string(),
        });
    }

    recommendations
}

fn render_summary(stats: &ClassificationStats) -> String {
    if stats.total_errors == 0 {
        return "No errors found".to_string();
    }

    let mut types: Vec<(&String, &usize)> = stats.by_type.iter().collect();
    types.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    let breakdown: Vec<String> = types
        .iter()
        .map(|(name, count)| format!("{} {}", count, name))
        .collect();

    format!(
        "Classified {} errors ({}); {} auto-fixable, average confidence {:.0}",
        stats.total_errors,
        breakdown.join(", "),
        stats.auto_fixable,
        stats.average_confidence
    )
}
