use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

use crate::classifier::{ClassifiedError, Recommendation};
use crate::config::AnalysisConfig;
use crate::parser::{ErrorSink, ParsedError};

mod storage;

pub use storage::{JsonFileStorage, MemoryStorage, PatternStorage};

const STORE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_patterns: usize,
    pub version: String,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            last_updated: now,
            total_patterns: 0,
            version: STORE_VERSION.to_string(),
        }
    }
}

/// The persisted document. Every category map defaults to empty so readers
/// stay backward compatible with stores written before a category existed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalPatternStore {
    #[serde(default)]
    pub error_frequency: HashMap<String, Vec<PatternRecord>>,
    #[serde(default)]
    pub error_locations: HashMap<String, Vec<PatternRecord>>,
    #[serde(default)]
    pub temporal_patterns: HashMap<String, Vec<PatternRecord>>,
    #[serde(default)]
    pub context_patterns: HashMap<String, Vec<PatternRecord>>,
    #[serde(default)]
    pub fix_success_rates: HashMap<String, Vec<PatternRecord>>,
    #[serde(default)]
    pub prevention_opportunities: HashMap<String, Vec<PatternRecord>>,
    #[serde(default)]
    pub metadata: StoreMetadata,
}

impl GlobalPatternStore {
    fn category_maps(&self) -> [&HashMap<String, Vec<PatternRecord>>; 6] {
        [
            &self.error_frequency,
            &self.error_locations,
            &self.temporal_patterns,
            &self.context_patterns,
            &self.fix_success_rates,
            &self.prevention_opportunities,
        ]
    }

    fn category_maps_mut(&mut self) -> [&mut HashMap<String, Vec<PatternRecord>>; 6] {
        [
            &mut self.error_frequency,
            &mut self.error_locations,
            &mut self.temporal_patterns,
            &mut self.context_patterns,
            &mut self.fix_success_rates,
            &mut self.prevention_opportunities,
        ]
    }

    fn total_records(&self) -> usize {
        self.category_maps()
            .iter()
            .map(|m| m.values().map(Vec::len).sum::<usize>())
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternRecord {
    Error(ErrorOccurrence),
    Fix(FixAttempt),
}

impl PatternRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PatternRecord::Error(e) => e.timestamp,
            PatternRecord::Fix(f) => f.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorOccurrence {
    pub error_key: String,
    pub error_type: String,
    pub rule: Option<String>,
    pub code: Option<String>,
    pub message: String,
    pub severity: String,
    pub category: String,
    pub file_path: String,
    pub line: u32,
    pub function_name: Option<String>,
    pub session_id: String,
    pub user_id: String,
    pub project_id: String,
    pub environment: Environment,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub os: String,
    pub arch: String,
}

impl Environment {
    fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    pub error_key: String,
    pub fix_key: String,
    pub fix_method: String,
    pub success: bool,
    pub confidence: f64,
    pub duration_ms: u64,
    pub session_id: String,
    pub user_id: String,
    pub project_id: String,
    pub was_auto_applied: bool,
    pub timestamp: DateTime<Utc>,
}

/// Caller-supplied context attached to every recorded pattern.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub session_id: String,
    pub user_id: String,
    pub project_id: String,
    /// Raw stack trace text, if the caller has one. Function names are
    /// extracted best-effort and may be absent.
    pub stack_trace: Option<String>,
}

impl Default for RecordContext {
    fn default() -> Self {
        Self {
            session_id: "unknown".to_string(),
            user_id: "unknown".to_string(),
            project_id: "unknown".to_string(),
            stack_trace: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub fix_method: String,
    pub success: bool,
    pub confidence: f64,
    pub duration_ms: u64,
    pub was_auto_applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrequentError {
    pub error_key: String,
    pub frequency: usize,
    pub last_seen: DateTime<Utc>,
    pub trend: Trend,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationHotspot {
    pub location: String,
    pub count: usize,
    pub error_types: Vec<String>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TemporalPatterns {
    pub hourly: Vec<usize>,
    pub weekday: Vec<usize>,
    pub monthly: Vec<usize>,
    pub hourly_peaks: Vec<usize>,
    pub weekday_peaks: Vec<usize>,
    pub monthly_peaks: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixEffectiveness {
    pub error_key: String,
    pub fix_method: String,
    pub attempts: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct PatternInsights {
    pub frequent_errors: Vec<FrequentError>,
    pub hotspots: Vec<LocationHotspot>,
    pub temporal: TemporalPatterns,
    pub fix_effectiveness: Vec<FixEffectiveness>,
    pub recommendations: Vec<Recommendation>,
    pub total_patterns: usize,
}

/// Cross-session pattern store. Process-local and in-memory; flushed to a
/// single document through the injected storage.
pub struct PatternStore {
    store: GlobalPatternStore,
    config: AnalysisConfig,
    storage: Box<dyn PatternStorage>,
    frames: StackFrameParser,
}

impl PatternStore {
    pub fn new(storage: Box<dyn PatternStorage>, config: AnalysisConfig) -> Result<Self> {
        Ok(Self {
            store: GlobalPatternStore::default(),
            config,
            storage,
            frames: StackFrameParser::new()?,
        })
    }

    pub async fn load(&mut self) -> Result<()> {
        if let Some(store) = self.storage.load().await? {
            self.store = store;
        }
        Ok(())
    }

    /// In-memory state stays authoritative when a save fails; the caller
    /// decides whether to retry.
    pub async fn save(&self) -> Result<()> {
        if let Err(e) = self.storage.save(&self.store).await {
            warn!("failed to persist pattern store: {}", e);
            return Err(e);
        }
        Ok(())
    }

    pub fn record_error(&mut self, error: &ClassifiedError, context: &RecordContext) {
        let key = error_key(
            error.error_type.as_str(),
            error.error.rule.as_deref(),
            &error.error.message,
        );

        let occurrence = ErrorOccurrence {
            error_key: key.clone(),
            error_type: error.error_type.as_str().to_string(),
            rule: error.error.rule.clone(),
            code: error.error.code.clone(),
            message: error.error.message.clone(),
            severity: error.severity_label.clone(),
            category: error.category.clone(),
            file_path: error.error.file.clone(),
            line: error.error.line,
            function_name: context
                .stack_trace
                .as_deref()
                .and_then(|stack| self.frames.function_name(stack)),
            session_id: context.session_id.clone(),
            user_id: context.user_id.clone(),
            project_id: context.project_id.clone(),
            environment: Environment::current(),
            timestamp: Utc::now(),
        };

        self.store
            .error_frequency
            .entry(key.clone())
            .or_default()
            .push(PatternRecord::Error(occurrence.clone()));
        self.store
            .error_locations
            .entry(key)
            .or_default()
            .push(PatternRecord::Error(occurrence));

        self.after_write();
    }

    pub fn record_fix_attempt(
        &mut self,
        error: &ClassifiedError,
        outcome: &FixOutcome,
        context: &RecordContext,
    ) {
        let key = error_key(
            error.error_type.as_str(),
            error.error.rule.as_deref(),
            &error.error.message,
        );

        let attempt = FixAttempt {
            error_key: key.clone(),
            fix_key: format!("{}_{}", outcome.fix_method, error.error_type.as_str()),
            fix_method: outcome.fix_method.clone(),
            success: outcome.success,
            confidence: outcome.confidence,
            duration_ms: outcome.duration_ms,
            session_id: context.session_id.clone(),
            user_id: context.user_id.clone(),
            project_id: context.project_id.clone(),
            was_auto_applied: outcome.was_auto_applied,
            timestamp: Utc::now(),
        };

        // Keyed by the error's key, not the fix's, so effectiveness queries
        // line up with frequency queries.
        self.store
            .fix_success_rates
            .entry(key)
            .or_default()
            .push(PatternRecord::Fix(attempt));

        self.after_write();
    }

    fn after_write(&mut self) {
        self.prune_old_patterns();
        self.store.metadata.last_updated = Utc::now();
        self.store.metadata.total_patterns = self.store.total_records();
    }

    /// Age-based pruning only. Never removes a record newer than the
    /// retention window, and running it twice is a no-op.
    pub fn prune_old_patterns(&mut self) {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        for map in self.store.category_maps_mut() {
            for records in map.values_mut() {
                records.retain(|r| r.timestamp() > cutoff);
            }
            map.retain(|_, records| !records.is_empty());
        }
    }

    pub fn analyze_patterns(&self) -> PatternInsights {
        let frequent_errors = self.frequent_errors();
        let hotspots = self.location_hotspots();
        let temporal = self.temporal_patterns();
        let fix_effectiveness = self.fix_effectiveness();
        let recommendations = self.build_recommendations(&fix_effectiveness);

        PatternInsights {
            frequent_errors,
            hotspots,
            temporal,
            fix_effectiveness,
            recommendations,
            total_patterns: self.store.metadata.total_patterns,
        }
    }

    pub fn frequent_errors(&self) -> Vec<FrequentError> {
        let now = Utc::now();
        let week_ago = now - Duration::days(7);
        let half_window = now - Duration::days(self.config.retention_days / 2);

        let mut frequent: Vec<FrequentError> = self
            .store
            .error_frequency
            .iter()
            .filter(|(_, records)| records.len() >= self.config.significance_threshold)
            .map(|(key, records)| {
                let frequency = records.len();
                let last_seen = records
                    .iter()
                    .map(|r| r.timestamp())
                    .max()
                    .unwrap_or(now);

                // Half-window rates share a denominator, so the trend falls
                // out of comparing raw counts.
                let older = records.iter().filter(|r| r.timestamp() <= half_window).count();
                let newer = frequency - older;
                let trend = if older == 0 {
                    if newer > 0 {
                        Trend::Increasing
                    } else {
                        Trend::Stable
                    }
                } else {
                    let ratio = newer as f64 / older as f64;
                    if ratio >= 1.5 {
                        Trend::Increasing
                    } else if ratio <= 0.7 {
                        Trend::Decreasing
                    } else {
                        Trend::Stable
                    }
                };

                let recent = records.iter().filter(|r| r.timestamp() > week_ago).count();
                let risk_score = frequency + 2 * recent;
                let risk_level = if risk_score >= 20 {
                    RiskLevel::Critical
                } else if risk_score >= 10 {
                    RiskLevel::High
                } else if risk_score >= 5 {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                };

                FrequentError {
                    error_key: key.clone(),
                    frequency,
                    last_seen,
                    trend,
                    risk_level,
                }
            })
            .collect();

        frequent.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.error_key.cmp(&b.error_key)));
        frequent.truncate(10);
        frequent
    }

    pub fn location_hotspots(&self) -> Vec<LocationHotspot> {
        let mut grouped: BTreeMap<String, (usize, HashSet<String>, DateTime<Utc>)> =
            BTreeMap::new();

        for records in self.store.error_locations.values() {
            for record in records {
                let PatternRecord::Error(occurrence) = record else {
                    continue;
                };
                let location = format!(
                    "{}:{}",
                    occurrence.file_path,
                    occurrence.function_name.as_deref().unwrap_or("unknown")
                );
                let entry = grouped
                    .entry(location)
                    .or_insert_with(|| (0, HashSet::new(), occurrence.timestamp));
                entry.0 += 1;
                entry.1.insert(occurrence.error_type.clone());
                if occurrence.timestamp > entry.2 {
                    entry.2 = occurrence.timestamp;
                }
            }
        }

        let mut hotspots: Vec<LocationHotspot> = grouped
            .into_iter()
            .map(|(location, (count, types, last_seen))| {
                let mut error_types: Vec<String> = types.into_iter().collect();
                error_types.sort();
                LocationHotspot {
                    location,
                    count,
                    error_types,
                    last_seen,
                }
            })
            .collect();

        hotspots.sort_by(|a, b| b.count.cmp(&a.count).then(a.location.cmp(&b.location)));
        hotspots.truncate(10);
        hotspots
    }

    /// Histograms across all categories' records; a peak is any bucket at or
    /// above 70% of that histogram's maximum.
    pub fn temporal_patterns(&self) -> TemporalPatterns {
        let mut hourly = vec![0usize; 24];
        let mut weekday = vec![0usize; 7];
        let mut monthly = vec![0usize; 12];

        for map in self.store.category_maps() {
            for records in map.values() {
                for record in records {
                    let ts = record.timestamp();
                    hourly[ts.hour() as usize] += 1;
                    weekday[ts.weekday().num_days_from_monday() as usize] += 1;
                    monthly[ts.month0() as usize] += 1;
                }
            }
        }

        let peaks = |histogram: &[usize]| -> Vec<usize> {
            let max = histogram.iter().copied().max().unwrap_or(0);
            if max == 0 {
                return Vec::new();
            }
            let threshold = max as f64 * 0.7;
            histogram
                .iter()
                .enumerate()
                .filter(|(_, count)| **count as f64 >= threshold)
                .map(|(bucket, _)| bucket)
                .collect()
        };

        TemporalPatterns {
            hourly_peaks: peaks(&hourly),
            weekday_peaks: peaks(&weekday),
            monthly_peaks: peaks(&monthly),
            hourly,
            weekday,
            monthly,
        }
    }

    pub fn fix_effectiveness(&self) -> Vec<FixEffectiveness> {
        let mut grouped: BTreeMap<(String, String), (usize, usize)> = BTreeMap::new();

        for (key, records) in &self.store.fix_success_rates {
            for record in records {
                let PatternRecord::Fix(attempt) = record else {
                    continue;
                };
                let entry = grouped
                    .entry((key.clone(), attempt.fix_method.clone()))
                    .or_insert((0, 0));
                entry.0 += 1;
                if attempt.success {
                    entry.1 += 1;
                }
            }
        }

        grouped
            .into_iter()
            .map(|((error_key, fix_method), (attempts, successes))| FixEffectiveness {
                error_key,
                fix_method,
                attempts,
                successes,
                success_rate: successes as f64 / attempts as f64,
                // Low-attempt methods are reported but flagged low-confidence.
                confidence: (attempts as f64 / self.config.pattern_maturity as f64).min(1.0),
            })
            .collect()
    }

    fn build_recommendations(&self, effectiveness: &[FixEffectiveness]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        // Best proven fix method per error key.
        let mut best: HashMap<&str, &FixEffectiveness> = HashMap::new();
        for stat in effectiveness {
            if stat.confidence < self.config.confidence_threshold {
                continue;
            }
            let current = best.entry(stat.error_key.as_str()).or_insert(stat);
            if (stat.confidence, stat.success_rate) > (current.confidence, current.success_rate) {
                *current = stat;
            }
        }
        let mut preferred: Vec<&FixEffectiveness> = best.into_values().collect();
        preferred.sort_by(|a, b| a.error_key.cmp(&b.error_key));
        for stat in preferred {
            recommendations.push(Recommendation {
                priority: "medium".to_string(),
                action: format!("Prefer fix method '{}' for {}", stat.fix_method, stat.error_key),
                details: format!(
                    "{:.0}% success over {} attempts",
                    stat.success_rate * 100.0,
                    stat.attempts
                ),
            });
        }

        // File-extension error density flags a risky file type.
        let mut by_extension: HashMap<String, usize> = HashMap::new();
        for records in self.store.error_locations.values() {
            for record in records {
                if let PatternRecord::Error(occurrence) = record {
                    let ext = std::path::Path::new(&occurrence.file_path)
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("none")
                        .to_string();
                    *by_extension.entry(ext).or_insert(0) += 1;
                }
            }
        }
        if let Some((ext, count)) = by_extension
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        {
            if count >= self.config.significance_threshold {
                recommendations.push(Recommendation {
                    priority: "low".to_string(),
                    action: format!("Add stricter checks for .{} files", ext),
                    details: format!("{} recorded errors concentrate in .{} files", count, ext),
                });
            }
        }

        recommendations.push(Recommendation {
            priority: "info".to_string(),
            action: "Learning progress".to_string(),
            details: format!(
                "{} patterns recorded since {}",
                self.store.metadata.total_patterns,
                self.store.metadata.created.format("%Y-%m-%d")
            ),
        });

        recommendations
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut GlobalPatternStore {
        &mut self.store
    }
}

impl ErrorSink for PatternStore {
    // Parsed-but-unclassified errors are keyed by their coarse category so
    // frequency analytics still see them.
    fn on_parsed(&mut self, error: &ParsedError) {
        let key = error_key(&error.category, error.rule.as_deref(), &error.message);
        let occurrence = ErrorOccurrence {
            error_key: key.clone(),
            error_type: error.category.clone(),
            rule: error.rule.clone(),
            code: error.code.clone(),
            message: error.message.clone(),
            severity: error.severity.as_str().to_string(),
            category: error.category.clone(),
            file_path: error.file.clone(),
            line: error.line,
            function_name: None,
            session_id: "unknown".to_string(),
            user_id: "unknown".to_string(),
            project_id: "unknown".to_string(),
            environment: Environment::current(),
            timestamp: Utc::now(),
        };
        self.store
            .error_frequency
            .entry(key)
            .or_default()
            .push(PatternRecord::Error(occurrence));
        self.after_write();
    }
}

/// Deterministic grouping key: type + rule (or "unknown") + the first 50
/// characters of the message, lowercased with non-alphanumeric runs
/// collapsed. Two errors with the same type, rule, and near-identical
/// message prefix are "the same recurring error" even across files.
pub fn error_key(error_type: &str, rule: Option<&str>, message: &str) -> String {
    let prefix: String = message.chars().take(50).collect();
    let joined = format!("{}_{}_{}", error_type, rule.unwrap_or("unknown"), prefix);

    let mut key = String::with_capacity(joined.len());
    let mut last_was_separator = false;
    for c in joined.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c);
            last_was_separator = false;
        } else if !last_was_separator {
            key.push('_');
            last_was_separator = true;
        }
    }

    key.trim_matches('_').to_string()
}

/// Pulls a function name out of a raw stack trace. Best effort only:
/// accuracy depends entirely on the caller's stack trace format, and `None`
/// is a normal outcome.
pub struct StackFrameParser {
    patterns: Vec<Regex>,
}

impl StackFrameParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: vec![
                Regex::new(r"at ([A-Za-z_$][\w$.]*) \(")?, // V8 frames
                Regex::new(r", in ([A-Za-z_]\w*)")?,       // Python tracebacks
                Regex::new(r"\d+: ([A-Za-z_][\w:]*)")?,    // Rust backtraces
            ],
        })
    }

    pub fn function_name(&self, stack: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(stack))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorClassifier;
    use crate::parser::ErrorParser;

    fn store() -> PatternStore {
        PatternStore::new(Box::new(MemoryStorage::new()), AnalysisConfig::default()).unwrap()
    }

    fn sample_error() -> ClassifiedError {
        let parser = ErrorParser::new().unwrap();
        let classifier = ErrorClassifier::new().unwrap();
        let parsed = parser
            .parse("src/app.js:10:5: Missing semicolon (semi)", "eslint")
            .unwrap();
        classifier.classify(&parsed.errors).errors.remove(0)
    }

    #[test]
    fn error_key_is_deterministic_and_collapsed() {
        let key = error_key("style", Some("semi"), "Missing semicolon.");
        assert_eq!(key, error_key("style", Some("semi"), "Missing semicolon."));
        assert_eq!(key, "style_semi_missing_semicolon");
    }

    #[test]
    fn error_key_truncates_long_messages() {
        let long = "x".repeat(200);
        let key = error_key("generic", None, &long);
        assert_eq!(key, format!("generic_unknown_{}", "x".repeat(50)));
    }

    #[test]
    fn recording_three_times_reaches_medium_risk() {
        let mut store = store();
        let error = sample_error();
        let context = RecordContext::default();

        for _ in 0..3 {
            store.record_error(&error, &context);
        }

        let frequent = store.frequent_errors();
        assert_eq!(frequent.len(), 1);
        assert_eq!(frequent[0].frequency, 3);
        // risk = 3 + 2*3 recent occurrences = 9, at least medium
        assert!(matches!(
            frequent[0].risk_level,
            RiskLevel::Medium | RiskLevel::High | RiskLevel::Critical
        ));
    }

    #[test]
    fn trend_falls_out_of_half_window_counts() {
        let mut store = store();
        let parser = ErrorParser::new().unwrap();
        let classifier = ErrorClassifier::new().unwrap();
        let parsed = parser
            .parse(
                "src/a.js:1:1: Missing semicolon (semi)\n\
                 src/a.js:2:1: 'x' is not defined (no-undef)\n\
                 src/a.js:3:1: Unexpected token {",
                "eslint",
            )
            .unwrap();
        let errors = classifier.classify(&parsed.errors).errors;

        // Records per error: before the half window, then recent.
        let seeds = [(0usize, 6usize, 2usize), (1, 2, 6), (2, 4, 4)];
        let stale = Utc::now() - Duration::days(20);
        for (idx, old, new) in seeds {
            let error = &errors[idx];
            for _ in 0..(old + new) {
                store.record_error(error, &RecordContext::default());
            }
            let key = error_key(
                error.error_type.as_str(),
                error.error.rule.as_deref(),
                &error.error.message,
            );
            let records = store.store_mut().error_frequency.get_mut(&key).unwrap();
            for record in records.iter_mut().take(old) {
                if let PatternRecord::Error(occurrence) = record {
                    occurrence.timestamp = stale;
                }
            }
        }

        let frequent = store.frequent_errors();
        let trend_of = |error: &ClassifiedError| {
            let key = error_key(
                error.error_type.as_str(),
                error.error.rule.as_deref(),
                &error.error.message,
            );
            frequent.iter().find(|f| f.error_key == key).unwrap().trend
        };

        // 2 recent over 6 old is a 0.33 ratio, 6 over 2 is 3.0, 4 over 4
        // sits inside the stable band.
        assert_eq!(trend_of(&errors[0]), Trend::Decreasing);
        assert_eq!(trend_of(&errors[1]), Trend::Increasing);
        assert_eq!(trend_of(&errors[2]), Trend::Stable);
    }

    #[test]
    fn below_significance_threshold_is_not_frequent() {
        let mut store = store();
        let error = sample_error();
        store.record_error(&error, &RecordContext::default());
        store.record_error(&error, &RecordContext::default());

        assert!(store.frequent_errors().is_empty());
    }

    #[test]
    fn pruning_is_age_based_and_idempotent() {
        let mut store = store();
        let error = sample_error();
        store.record_error(&error, &RecordContext::default());

        // Backdate one record past the retention window.
        let key = error_key("style", Some("semi"), &error.error.message);
        let stale = Utc::now() - Duration::days(45);
        {
            let records = store.store_mut().error_frequency.get_mut(&key).unwrap();
            let mut old = records[0].clone();
            if let PatternRecord::Error(occurrence) = &mut old {
                occurrence.timestamp = stale;
            }
            records.push(old);
        }

        store.prune_old_patterns();
        let cutoff = Utc::now() - Duration::days(30);
        for map in store.store_mut().category_maps() {
            for records in map.values() {
                assert!(records.iter().all(|r| r.timestamp() > cutoff));
            }
        }

        let before = store.store_mut().total_records();
        store.prune_old_patterns();
        assert_eq!(store.store_mut().total_records(), before);
    }

    #[test]
    fn fix_effectiveness_tracks_success_rate_and_maturity() {
        let mut store = store();
        let error = sample_error();
        let context = RecordContext::default();

        for i in 0..5 {
            store.record_fix_attempt(
                &error,
                &FixOutcome {
                    fix_method: "auto_fix".to_string(),
                    success: i < 4,
                    confidence: 0.9,
                    duration_ms: 120,
                    was_auto_applied: true,
                },
                &context,
            );
        }
        store.record_fix_attempt(
            &error,
            &FixOutcome {
                fix_method: "manual_edit".to_string(),
                success: true,
                confidence: 0.5,
                duration_ms: 5000,
                was_auto_applied: false,
            },
            &context,
        );

        let effectiveness = store.fix_effectiveness();
        let auto = effectiveness
            .iter()
            .find(|e| e.fix_method == "auto_fix")
            .unwrap();
        assert_eq!(auto.attempts, 5);
        assert_eq!(auto.successes, 4);
        assert!((auto.confidence - 1.0).abs() < f64::EPSILON);

        let manual = effectiveness
            .iter()
            .find(|e| e.fix_method == "manual_edit")
            .unwrap();
        assert!(manual.confidence < 0.7, "one attempt is low confidence");

        // Only the mature method should be recommended.
        let insights = store.analyze_patterns();
        assert!(insights
            .recommendations
            .iter()
            .any(|r| r.action.contains("auto_fix")));
        assert!(!insights
            .recommendations
            .iter()
            .any(|r| r.action.contains("manual_edit")));
    }

    #[test]
    fn hotspots_group_by_file_and_function() {
        let mut store = store();
        let error = sample_error();
        let context = RecordContext {
            stack_trace: Some("    at renderList (src/app.js:10:5)".to_string()),
            ..RecordContext::default()
        };

        store.record_error(&error, &context);
        store.record_error(&error, &context);

        let hotspots = store.location_hotspots();
        assert_eq!(hotspots[0].location, "src/app.js:renderList");
        // Two entries per record_error (frequency + location maps), but
        // hotspots only read the location map.
        assert_eq!(hotspots[0].count, 2);
    }

    #[test]
    fn temporal_histograms_find_peaks() {
        let mut store = store();
        let error = sample_error();
        for _ in 0..4 {
            store.record_error(&error, &RecordContext::default());
        }

        let temporal = store.temporal_patterns();
        let now = Utc::now();
        assert!(temporal.hourly_peaks.contains(&(now.hour() as usize)));
        assert_eq!(temporal.hourly.iter().sum::<usize>(), 8);
    }

    #[tokio::test]
    async fn save_and_load_round_trip_through_file_storage() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("patterns.json");
        let error = sample_error();

        let mut store = PatternStore::new(
            Box::new(JsonFileStorage::new(path.clone())),
            AnalysisConfig::default(),
        )?;
        store.record_error(&error, &RecordContext::default());
        store.save().await?;

        let mut reloaded = PatternStore::new(
            Box::new(JsonFileStorage::new(path)),
            AnalysisConfig::default(),
        )?;
        reloaded.load().await?;
        assert_eq!(reloaded.analyze_patterns().total_patterns, 2);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_store_file_degrades_to_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("patterns.json");
        tokio::fs::write(&path, "{ not json").await?;

        let mut store = PatternStore::new(
            Box::new(JsonFileStorage::new(path)),
            AnalysisConfig::default(),
        )?;
        store.load().await?;
        assert_eq!(store.analyze_patterns().total_patterns, 0);
        Ok(())
    }

    #[test]
    fn missing_category_keys_default_to_empty() {
        // A store written before some categories existed.
        let json = r#"{"error_frequency":{},"metadata":{"created":"2026-01-01T00:00:00Z","last_updated":"2026-01-01T00:00:00Z","total_patterns":0,"version":"1.0"}}"#;
        let store: GlobalPatternStore = serde_json::from_str(json).unwrap();
        assert!(store.fix_success_rates.is_empty());
        assert!(store.prevention_opportunities.is_empty());
    }

    #[test]
    fn function_name_extraction_is_best_effort() {
        let frames = StackFrameParser::new().unwrap();
        assert_eq!(
            frames.function_name("    at renderList (src/app.js:10:5)"),
            Some("renderList".to_string())
        );
        assert_eq!(
            frames.function_name("  File \"app.py\", line 3, in handle_request"),
            Some("handle_request".to_string())
        );
        assert_eq!(frames.function_name("no frames here"), None);
    }
}
