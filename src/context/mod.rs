use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::warn;

use crate::classifier::{BatchPattern, ClassifiedError, Recommendation};

mod graph;

pub use graph::{CodebaseContext, ContextBuilder};

#[derive(Debug, Clone, Serialize)]
pub struct FileImportance {
    pub dependency_count: usize,
    pub dependent_count: usize,
    pub relevance_score: f64,
    pub centrality: usize,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    DependsOnErrorFile,
    ErrorFileDependsOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyImpact {
    pub file: String,
    pub relationship: Relationship,
    pub risk: Risk,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedFile {
    pub file: String,
    pub similarity: f64,
}

/// Ordinal blast-radius estimate, low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Isolated = 1,
    Localized = 2,
    Cascading = 3,
    Systemic = 4,
    Critical = 5,
}

impl ImpactLevel {
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Isolated => "isolated",
            ImpactLevel::Localized => "localized",
            ImpactLevel::Cascading => "cascading",
            ImpactLevel::Systemic => "systemic",
            ImpactLevel::Critical => "critical",
        }
    }

    fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => ImpactLevel::Isolated,
            2 => ImpactLevel::Localized,
            3 => ImpactLevel::Cascading,
            4 => ImpactLevel::Systemic,
            _ => ImpactLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextAnalysis {
    pub file_importance: FileImportance,
    pub relevance_percentile: f64,
    pub related_files: Vec<RelatedFile>,
    pub dependency_impact: Vec<DependencyImpact>,
    pub estimated_impact: ImpactLevel,
    pub context_adjusted_complexity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedError {
    #[serde(flatten)]
    pub error: ClassifiedError,
    pub context: Option<ContextAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemImpact {
    pub affected_files: Vec<String>,
    pub affected_directories: Vec<String>,
    pub overall_risk: String,
}

#[derive(Debug, Serialize)]
pub struct ContextResult {
    pub errors: Vec<AnalyzedError>,
    pub patterns: Vec<BatchPattern>,
    pub impact: SystemImpact,
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
}

pub struct ContextAnalyzer {
    max_related_files: usize,
}

impl ContextAnalyzer {
    pub fn new(max_related_files: usize) -> Self {
        Self { max_related_files }
    }

    pub fn analyze(&self, errors: &[ClassifiedError], context: &CodebaseContext) -> ContextResult {
        let analyzed: Vec<AnalyzedError> = errors
            .iter()
            .map(|error| {
                let analysis = match self.analyze_error(error, context) {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        warn!(file = %error.error.file, "context analysis failed: {}", e);
                        None
                    }
                };
                AnalyzedError {
                    error: error.clone(),
                    context: analysis,
                }
            })
            .collect();

        let patterns = cross_batch_patterns(&analyzed);
        let impact = system_impact(&analyzed);
        let recommendations = build_recommendations(&analyzed, &patterns, &impact);
        let summary = render_summary(&analyzed, context, &impact);

        ContextResult {
            errors: analyzed,
            patterns,
            impact,
            recommendations,
            summary,
        }
    }

    fn analyze_error(
        &self,
        error: &ClassifiedError,
        context: &CodebaseContext,
    ) -> Result<ContextAnalysis> {
        let file = &error.error.file;

        let importance = file_importance(file, context);
        let relevance_percentile = relevance_percentile(file, context);
        let dependency_impact = dependency_impact(file, context);
        let related_files = self.related_files(file, context);
        let estimated_impact =
            estimate_impact(error.severity_score, &importance, &dependency_impact);
        let context_adjusted_complexity = adjusted_complexity(
            error.complexity_score,
            &importance,
            related_files.len(),
        );

        Ok(ContextAnalysis {
            file_importance: importance,
            relevance_percentile,
            related_files,
            dependency_impact,
            estimated_impact,
            context_adjusted_complexity,
        })
    }

    /// Heuristic similarity: shared directory, overlapping base filename, and
    /// comparable relevance. Only candidates scoring above 0.3 qualify.
    fn related_files(&self, file: &str, context: &CodebaseContext) -> Vec<RelatedFile> {
        let dir = parent_dir(file);
        let stem = file_stem(file);
        let own_relevance = context.relevance.get(file).copied().unwrap_or(0.0);

        let mut related: Vec<RelatedFile> = context
            .files
            .iter()
            .filter(|candidate| candidate.as_str() != file)
            .filter_map(|candidate| {
                let mut similarity = 0.0;
                if parent_dir(candidate) == dir {
                    similarity += 0.3;
                }
                let candidate_stem = file_stem(candidate);
                if !stem.is_empty()
                    && !candidate_stem.is_empty()
                    && (candidate_stem.contains(&stem) || stem.contains(&candidate_stem))
                {
                    similarity += 0.4;
                }
                let candidate_relevance = context.relevance.get(candidate).copied().unwrap_or(0.0);
                if (candidate_relevance - own_relevance).abs() <= 20.0 {
                    similarity += 0.3;
                }

                if similarity > 0.3 {
                    Some(RelatedFile {
                        file: candidate.clone(),
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        related.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file.cmp(&b.file))
        });
        related.truncate(self.max_related_files);
        related
    }
}

/// Weighted importance. Direct usage fan-in (capped) is deliberately
/// over-weighted relative to raw relevance: files many others depend on are
/// riskier to get wrong.
fn file_importance(file: &str, context: &CodebaseContext) -> FileImportance {
    let dependency_count = context.dependencies.get(file).map(|d| d.len()).unwrap_or(0);
    let dependent_count = context.dependents.get(file).map(|d| d.len()).unwrap_or(0);
    let relevance_score = context.relevance.get(file).copied().unwrap_or(0.0);
    let centrality = dependency_count + dependent_count;

    let fan_in = ((dependent_count * 5).min(30)) as f64;
    let overall = relevance_score * 0.4 + centrality as f64 * 0.3 + fan_in * 0.3;

    FileImportance {
        dependency_count,
        dependent_count,
        relevance_score,
        centrality,
        overall,
    }
}

/// Rank of the file's relevance among all known relevance scores, 0-100.
fn relevance_percentile(file: &str, context: &CodebaseContext) -> f64 {
    if context.relevance.is_empty() {
        return 0.0;
    }
    let own = context.relevance.get(file).copied().unwrap_or(0.0);
    let below = context.relevance.values().filter(|v| **v <= own).count();
    below as f64 / context.relevance.len() as f64 * 100.0
}

/// Risk propagates along the consumption edge: each dependent's risk comes
/// from that dependent's own importance, not from the error's severity.
/// Upstream edges are listed at fixed low risk as a hint to check causes.
fn dependency_impact(file: &str, context: &CodebaseContext) -> Vec<DependencyImpact> {
    let mut impacts = Vec::new();

    if let Some(dependents) = context.dependents.get(file) {
        for dependent in dependents {
            let importance = file_importance(dependent, context);
            let risk = if importance.overall > 50.0 {
                Risk::High
            } else if importance.overall > 25.0 {
                Risk::Medium
            } else {
                Risk::Low
            };
            impacts.push(DependencyImpact {
                file: dependent.clone(),
                relationship: Relationship::DependsOnErrorFile,
                risk,
            });
        }
    }

    if let Some(dependencies) = context.dependencies.get(file) {
        for dependency in dependencies {
            impacts.push(DependencyImpact {
                file: dependency.clone(),
                relationship: Relationship::ErrorFileDependsOn,
                risk: Risk::Low,
            });
        }
    }

    impacts
}

fn estimate_impact(
    severity_score: u8,
    importance: &FileImportance,
    impacts: &[DependencyImpact],
) -> ImpactLevel {
    let mut score: u8 = 1;

    if severity_score >= 4 {
        score += 1;
    }
    if severity_score >= 5 {
        score += 1;
    }
    if importance.overall > 40.0 {
        score += 1;
    }
    if importance.overall > 70.0 {
        score += 1;
    }
    if !impacts.is_empty() {
        score += 1;
    }
    if impacts.iter().any(|i| i.risk == Risk::High) {
        score += 1;
    }

    ImpactLevel::from_score(score.min(5))
}

fn adjusted_complexity(
    complexity_score: u8,
    importance: &FileImportance,
    related_count: usize,
) -> f64 {
    let mut complexity = complexity_score as f64;

    if importance.overall > 60.0 {
        complexity += 0.5;
    }
    if importance.dependency_count > 10 {
        complexity += 0.5;
    }
    // Prior art nearby reduces effective difficulty.
    if related_count >= 3 {
        complexity -= 0.3;
    }

    complexity.clamp(1.0, 5.0)
}

fn cross_batch_patterns(errors: &[AnalyzedError]) -> Vec<BatchPattern> {
    let mut patterns = Vec::new();

    let important: Vec<&AnalyzedError> = errors
        .iter()
        .filter(|e| {
            e.context
                .as_ref()
                .is_some_and(|c| c.file_importance.overall > 50.0)
        })
        .collect();
    if important.len() >= 2 {
        patterns.push(BatchPattern {
            kind: "important_file_cluster".to_string(),
            severity: "high".to_string(),
            description: format!("{} errors in highly depended-on files", important.len()),
            suggestion: "Fix errors in central files first; their breakage spreads".to_string(),
            count: important.len(),
        });
    }

    let mut by_type: HashMap<&str, usize> = HashMap::new();
    for error in errors {
        *by_type.entry(error.error.error_type.as_str()).or_insert(0) += 1;
    }
    for (error_type, count) in by_type {
        if count >= 3 {
            patterns.push(BatchPattern {
                kind: "recurring_type".to_string(),
                severity: "medium".to_string(),
                description: format!("{} {} errors across the codebase", count, error_type),
                suggestion: format!("Address the systemic cause of the {} errors", error_type),
                count,
            });
        }
    }

    let high_impact = errors
        .iter()
        .filter(|e| {
            e.context
                .as_ref()
                .is_some_and(|c| c.estimated_impact >= ImpactLevel::Systemic)
        })
        .count();
    if high_impact > 0 {
        patterns.push(BatchPattern {
            kind: "high_impact".to_string(),
            severity: "critical".to_string(),
            description: format!("{} errors with systemic or critical impact", high_impact),
            suggestion: "Treat these as release blockers".to_string(),
            count: high_impact,
        });
    }

    patterns
}

fn system_impact(errors: &[AnalyzedError]) -> SystemImpact {
    let mut files: BTreeSet<String> = BTreeSet::new();
    for error in errors {
        files.insert(error.error.error.file.clone());
        if let Some(context) = &error.context {
            for related in &context.related_files {
                files.insert(related.file.clone());
            }
            for impact in &context.dependency_impact {
                files.insert(impact.file.clone());
            }
        }
    }

    let directories: BTreeSet<String> = files.iter().map(|f| parent_dir(f)).collect();

    let total = errors.len();
    let high_severity = errors.iter().filter(|e| e.error.severity_score >= 4).count();
    let high_fraction = if total > 0 {
        high_severity as f64 / total as f64
    } else {
        0.0
    };
    let any_systemic = errors.iter().any(|e| {
        e.context
            .as_ref()
            .is_some_and(|c| c.estimated_impact >= ImpactLevel::Systemic)
    });

    let overall_risk = if any_systemic || high_fraction > 0.5 {
        "critical"
    } else if high_fraction > 0.3 {
        "high"
    } else if total > 5 {
        "medium"
    } else {
        "low"
    };

    SystemImpact {
        affected_files: files.into_iter().collect(),
        affected_directories: directories.into_iter().collect(),
        overall_risk: overall_risk.to_string(),
    }
}

fn build_recommendations(
    errors: &[AnalyzedError],
    patterns: &[BatchPattern],
    impact: &SystemImpact,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    // Impact ordinal first, file importance as the tie-break.
    let mut ordered: Vec<&AnalyzedError> = errors.iter().filter(|e| e.context.is_some()).collect();
    ordered.sort_by(|a, b| {
        let (ca, cb) = (a.context.as_ref().unwrap(), b.context.as_ref().unwrap());
        cb.estimated_impact
            .ordinal()
            .cmp(&ca.estimated_impact.ordinal())
            .then_with(|| {
                cb.file_importance
                    .overall
                    .partial_cmp(&ca.file_importance.overall)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    if !ordered.is_empty() {
        let top: Vec<String> = ordered
            .iter()
            .take(3)
            .map(|e| format!("{}:{} ({})", e.error.error.file, e.error.error.line, e.error.error.message))
            .collect();
        recommendations.push(Recommendation {
            priority: "high".to_string(),
            action: "Prioritize fixes by blast radius".to_string(),
            details: top.join("; "),
        });
    }

    for pattern in patterns {
        recommendations.push(Recommendation {
            priority: pattern.severity.clone(),
            action: pattern.suggestion.clone(),
            details: pattern.description.clone(),
        });
    }

    if impact.overall_risk == "high" {
        recommendations.push(Recommendation {
            priority: "high".to_string(),
            action: "Run comprehensive tests before deployment".to_string(),
            details: "A large share of these errors is high severity; system stability is at risk"
                .to_string(),
        });
    }

    recommendations
}

fn render_summary(
    errors: &[AnalyzedError],
    context: &CodebaseContext,
    impact: &SystemImpact,
) -> String {
    if errors.is_empty() {
        return "No errors found".to_string();
    }

    format!(
        "Analyzed {} errors against {} files; {} files affected, overall risk {}",
        errors.len(),
        context.files.len(),
        impact.affected_files.len(),
        impact.overall_risk
    )
}

fn parent_dir(file: &str) -> String {
    Path::new(file)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_stem(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorClassifier;
    use crate::parser::ErrorParser;

    fn classified(text: &str, source: &str) -> Vec<ClassifiedError> {
        let parser = ErrorParser::new().unwrap();
        let classifier = ErrorClassifier::new().unwrap();
        let parsed = parser.parse(text, source).unwrap();
        classifier.classify(&parsed.errors).errors
    }

    fn context_with_hub() -> CodebaseContext {
        // src/core.js is depended on by two heavily-used files.
        let mut context = CodebaseContext::empty();
        context.files = vec![
            "src/core.js".into(),
            "src/api.js".into(),
            "src/ui.js".into(),
            "src/util.js".into(),
        ];
        context.dependents.insert(
            "src/core.js".into(),
            vec!["src/api.js".into(), "src/ui.js".into()],
        );
        // api.js and ui.js are themselves heavily depended on, which is what
        // makes breaking core.js expensive.
        let consumers: Vec<String> = (0..7).map(|i| format!("src/page{}.js", i)).collect();
        context.dependents.insert("src/api.js".into(), consumers.clone());
        context.dependents.insert("src/ui.js".into(), consumers);
        context.relevance.insert("src/core.js".into(), 80.0);
        context.relevance.insert("src/api.js".into(), 100.0);
        context.relevance.insert("src/ui.js".into(), 100.0);
        context.relevance.insert("src/util.js".into(), 10.0);
        context
    }

    #[test]
    fn dependents_with_high_importance_are_high_risk() {
        let context = context_with_hub();
        let errors = classified("src/core.js:1:1: Unexpected token {", "generic");
        let result = ContextAnalyzer::new(5).analyze(&errors, &context);

        let analysis = result.errors[0].context.as_ref().unwrap();
        let high_risk: Vec<_> = analysis
            .dependency_impact
            .iter()
            .filter(|i| i.relationship == Relationship::DependsOnErrorFile && i.risk == Risk::High)
            .collect();
        assert_eq!(high_risk.len(), 2);
    }

    #[test]
    fn impact_never_decreases_with_severity() {
        let context = context_with_hub();
        let importance = file_importance("src/core.js", &context);
        let impacts = dependency_impact("src/core.js", &context);

        let at_three = estimate_impact(3, &importance, &impacts);
        let at_five = estimate_impact(5, &importance, &impacts);
        assert!(at_five.ordinal() >= at_three.ordinal());
    }

    #[test]
    fn missing_context_degrades_to_isolated_analysis() {
        let errors = classified("src/app.js:1:1: Missing semicolon (semi)", "eslint");
        let result = ContextAnalyzer::new(5).analyze(&errors, &CodebaseContext::empty());

        let analysis = result.errors[0].context.as_ref().unwrap();
        assert_eq!(analysis.estimated_impact, ImpactLevel::Isolated);
        assert!(analysis.dependency_impact.is_empty());
        assert_eq!(result.impact.overall_risk, "low");
    }

    #[test]
    fn related_files_are_capped_and_thresholded() {
        let mut context = CodebaseContext::empty();
        context.files = vec![
            "src/user.js".into(),
            "src/user_service.js".into(),
            "src/user_controller.js".into(),
            "src/user_model.js".into(),
            "lib/unrelated.rs".into(),
        ];
        for file in &context.files {
            context.relevance.insert(file.clone(), 50.0);
        }
        context.relevance.insert("lib/unrelated.rs".into(), 50.0);

        let analyzer = ContextAnalyzer::new(2);
        let related = analyzer.related_files("src/user.js", &context);

        assert_eq!(related.len(), 2);
        assert!(related.iter().all(|r| r.similarity > 0.3));
        assert!(related.iter().all(|r| r.file.starts_with("src/user")));
    }

    #[test]
    fn adjusted_complexity_stays_clamped() {
        let importance = FileImportance {
            dependency_count: 20,
            dependent_count: 10,
            relevance_score: 100.0,
            centrality: 30,
            overall: 90.0,
        };
        assert_eq!(adjusted_complexity(5, &importance, 0), 5.0);
        assert!((adjusted_complexity(1, &importance, 3) - 1.7).abs() < 1e-9);
    }

    #[test]
    fn severe_errors_in_a_hub_raise_system_risk() {
        let context = context_with_hub();
        let errors = classified("src/core.js:1:1: Unexpected token {", "generic");
        let result = ContextAnalyzer::new(5).analyze(&errors, &context);

        assert_eq!(result.impact.overall_risk, "critical");
        assert!(result.patterns.iter().any(|p| p.kind == "high_impact"));
        assert!(!result.recommendations.is_empty());
    }
}
