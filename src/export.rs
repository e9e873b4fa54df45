use anyhow::{bail, Result};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::classifier::{ClassificationResult, ClassifiedError};
use crate::context::ContextResult;
use crate::learning::PatternInsights;
use crate::parser::ParseResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Summary,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "summary" => Ok(OutputFormat::Summary),
            other => bail!(
                "unsupported output format: '{}' (expected json, csv, or summary)",
                other
            ),
        }
    }
}

const CSV_HEADER: &str =
    "file,line,column,severity,type,complexity,category,message,rule,code,auto_fixable,confidence";

pub fn render_parse(result: &ParseResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => {
            let mut out = String::from("file,line,column,severity,category,message,rule,code\n");
            for error in &result.errors {
                writeln!(
                    out,
                    "{},{},{},{},{},{},{},{}",
                    csv_field(&error.file),
                    error.line,
                    error.column,
                    error.severity.as_str(),
                    csv_field(&error.category),
                    csv_field(&error.message),
                    csv_field(error.rule.as_deref().unwrap_or("")),
                    csv_field(error.code.as_deref().unwrap_or("")),
                )?;
            }
            Ok(out)
        }
        OutputFormat::Summary => {
            let mut out = String::new();
            writeln!(out, "{}", result.summary)?;
            if !result.errors.is_empty() {
                writeln!(out)?;
                for error in &result.errors {
                    writeln!(
                        out,
                        "  {}:{}:{} [{}] {}",
                        error.file,
                        error.line,
                        error.column,
                        error.severity.as_str(),
                        error.message
                    )?;
                }
            }
            Ok(out)
        }
    }
}

pub fn render_classification(result: &ClassificationResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for error in &result.errors {
                out.push_str(&classified_row(error)?);
            }
            Ok(out)
        }
        OutputFormat::Summary => {
            let mut out = String::new();
            writeln!(out, "{}", result.summary)?;

            if !result.errors.is_empty() {
                writeln!(out, "\nErrors:")?;
                for error in &result.errors {
                    writeln!(
                        out,
                        "  {}:{} [{} / {}] {} (confidence {})",
                        error.error.file,
                        error.error.line,
                        error.error_type.as_str(),
                        error.severity_label,
                        error.error.message,
                        error.confidence
                    )?;
                }
            }
            if !result.patterns.is_empty() {
                writeln!(out, "\nPatterns:")?;
                for pattern in &result.patterns {
                    writeln!(out, "  [{}] {}", pattern.severity, pattern.description)?;
                }
            }
            if !result.recommendations.is_empty() {
                writeln!(out, "\nRecommendations:")?;
                for rec in &result.recommendations {
                    writeln!(out, "  [{}] {}: {}", rec.priority, rec.action, rec.details)?;
                }
            }
            Ok(out)
        }
    }
}

pub fn render_context(result: &ContextResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push_str(",impact,adjusted_complexity\n");
            for analyzed in &result.errors {
                let mut row = classified_row(&analyzed.error)?;
                row.pop(); // replace trailing newline with the extra columns
                match &analyzed.context {
                    Some(context) => writeln!(
                        row,
                        ",{},{:.1}",
                        context.estimated_impact.as_str(),
                        context.context_adjusted_complexity
                    )?,
                    None => writeln!(row, ",,")?,
                }
                out.push_str(&row);
            }
            Ok(out)
        }
        OutputFormat::Summary => {
            let mut out = String::new();
            writeln!(out, "{}", result.summary)?;

            if !result.errors.is_empty() {
                writeln!(out, "\nErrors by blast radius:")?;
                for analyzed in &result.errors {
                    let impact = analyzed
                        .context
                        .as_ref()
                        .map(|c| c.estimated_impact.as_str())
                        .unwrap_or("unanalyzed");
                    writeln!(
                        out,
                        "  {}:{} [{}] {}",
                        analyzed.error.error.file,
                        analyzed.error.error.line,
                        impact,
                        analyzed.error.error.message
                    )?;
                }
            }
            if !result.recommendations.is_empty() {
                writeln!(out, "\nRecommendations:")?;
                for rec in &result.recommendations {
                    writeln!(out, "  [{}] {}: {}", rec.priority, rec.action, rec.details)?;
                }
            }
            Ok(out)
        }
    }
}

pub fn render_insights(insights: &PatternInsights, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(insights)?),
        OutputFormat::Csv => {
            let mut out = String::from("error_key,frequency,trend,risk_level,last_seen\n");
            for frequent in &insights.frequent_errors {
                writeln!(
                    out,
                    "{},{},{},{},{}",
                    csv_field(&frequent.error_key),
                    frequent.frequency,
                    frequent.trend.as_str(),
                    frequent.risk_level.as_str(),
                    frequent.last_seen.to_rfc3339()
                )?;
            }
            Ok(out)
        }
        OutputFormat::Summary => {
            let mut out = String::new();
            if insights.frequent_errors.is_empty() && insights.hotspots.is_empty() {
                writeln!(out, "No recurring patterns recorded yet")?;
                return Ok(out);
            }

            if !insights.frequent_errors.is_empty() {
                writeln!(out, "Recurring errors:")?;
                for frequent in &insights.frequent_errors {
                    writeln!(
                        out,
                        "  {}: {} occurrences, {}, risk {}",
                        frequent.error_key,
                        frequent.frequency,
                        frequent.trend.as_str(),
                        frequent.risk_level.as_str()
                    )?;
                }
            }
            if !insights.hotspots.is_empty() {
                writeln!(out, "\nHotspots:")?;
                for hotspot in &insights.hotspots {
                    writeln!(
                        out,
                        "  {}: {} errors ({})",
                        hotspot.location,
                        hotspot.count,
                        hotspot.error_types.join(", ")
                    )?;
                }
            }
            if !insights.fix_effectiveness.is_empty() {
                writeln!(out, "\nFix effectiveness:")?;
                for stat in &insights.fix_effectiveness {
                    writeln!(
                        out,
                        "  {} via {}: {:.0}% over {} attempts (confidence {:.2})",
                        stat.error_key,
                        stat.fix_method,
                        stat.success_rate * 100.0,
                        stat.attempts,
                        stat.confidence
                    )?;
                }
            }
            if !insights.recommendations.is_empty() {
                writeln!(out, "\nRecommendations:")?;
                for rec in &insights.recommendations {
                    writeln!(out, "  [{}] {}: {}", rec.priority, rec.action, rec.details)?;
                }
            }
            Ok(out)
        }
    }
}

fn classified_row(error: &ClassifiedError) -> Result<String> {
    let mut row = String::new();
    writeln!(
        row,
        "{},{},{},{},{},{},{},{},{},{},{},{}",
        csv_field(&error.error.file),
        error.error.line,
        error.error.column,
        csv_field(&error.severity_label),
        error.error_type.as_str(),
        csv_field(&error.complexity_label),
        csv_field(&error.category),
        csv_field(&error.error.message),
        csv_field(error.error.rule.as_deref().unwrap_or("")),
        csv_field(error.error.code.as_deref().unwrap_or("")),
        error.auto_fixable,
        error.confidence,
    )?;
    Ok(row)
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorClassifier;
    use crate::parser::ErrorParser;

    #[test]
    fn unknown_format_names_the_offender() {
        let err = "yaml".parse::<OutputFormat>().unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn csv_includes_one_row_per_error() -> Result<()> {
        let parser = ErrorParser::new()?;
        let classifier = ErrorClassifier::new()?;
        let parsed = parser.parse(
            "src/a.js:1:1: Missing semicolon (semi)\nsrc/b.js:2:3: 'x' is not defined (no-undef)",
            "eslint",
        )?;
        let result = classifier.classify(&parsed.errors);

        let csv = render_classification(&result, OutputFormat::Csv)?;
        assert_eq!(csv.lines().count(), 3); // header + 2 rows
        assert!(csv.lines().nth(1).unwrap().starts_with("src/a.js,1,1"));
        Ok(())
    }

    #[test]
    fn csv_cells_use_lowercase_enum_forms() -> Result<()> {
        use crate::config::AnalysisConfig;
        use crate::context::{CodebaseContext, ContextAnalyzer};
        use crate::learning::{MemoryStorage, PatternStore, RecordContext};

        let parser = ErrorParser::new()?;
        let classifier = ErrorClassifier::new()?;
        let parsed = parser.parse("src/a.js:1:1: Missing semicolon (semi)", "eslint")?;
        let classified = classifier.classify(&parsed.errors);

        let analyzed =
            ContextAnalyzer::new(5).analyze(&classified.errors, &CodebaseContext::empty());
        let csv = render_context(&analyzed, OutputFormat::Csv)?;
        assert!(csv.contains(",isolated,"));
        assert!(!csv.contains("Isolated"));

        let mut store =
            PatternStore::new(Box::new(MemoryStorage::new()), AnalysisConfig::default())?;
        for _ in 0..3 {
            store.record_error(&classified.errors[0], &RecordContext::default());
        }
        let csv = render_insights(&store.analyze_patterns(), OutputFormat::Csv)?;
        assert!(csv.contains(",3,increasing,medium,"));
        Ok(())
    }

    #[test]
    fn csv_escapes_commas_in_messages() {
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }

    #[test]
    fn insights_summary_stays_plain_ascii() -> Result<()> {
        use crate::config::AnalysisConfig;
        use crate::learning::{MemoryStorage, PatternStore, RecordContext};

        let parser = ErrorParser::new()?;
        let classifier = ErrorClassifier::new()?;
        let parsed = parser.parse("src/a.js:1:1: Missing semicolon (semi)", "eslint")?;
        let classified = classifier.classify(&parsed.errors);

        let mut store =
            PatternStore::new(Box::new(MemoryStorage::new()), AnalysisConfig::default())?;
        for _ in 0..3 {
            store.record_error(&classified.errors[0], &RecordContext::default());
        }

        let summary = render_insights(&store.analyze_patterns(), OutputFormat::Summary)?;
        assert!(summary.contains("occurrences"));
        assert!(summary.is_ascii());
        Ok(())
    }

    #[test]
    fn empty_summary_degrades_gracefully() -> Result<()> {
        let parser = ErrorParser::new()?;
        let result = parser.parse("", "eslint")?;
        let summary = render_parse(&result, OutputFormat::Summary)?;
        assert!(summary.contains("No errors found"));
        Ok(())
    }
}
