use super::TestUtils;
use crate::classifier::{errors_by_priority, ErrorClassifier, ErrorType};
use crate::context::{CodebaseContext, ContextAnalyzer, ContextBuilder};
use crate::export::{self, OutputFormat};
use crate::parser::ErrorParser;
use anyhow::Result;
use pretty_assertions::assert_eq;

#[test]
fn full_batch_flows_from_text_to_priorities() {
    let errors = TestUtils::classify(TestUtils::mixed_eslint_batch(), "eslint");

    // The summary line was filtered as noise.
    assert_eq!(errors.len(), 5);

    let buckets = errors_by_priority(&errors);
    let total = buckets.critical.len()
        + buckets.high.len()
        + buckets.medium.len()
        + buckets.low.len()
        + buckets.info.len();
    assert_eq!(total, 5);
    // The bare "Unexpected token {" is a syntax error and lands in critical.
    assert!(!buckets.critical.is_empty());
    // Style fixes land in low via auto-fixability.
    assert!(!buckets.low.is_empty());
}

#[test]
fn classification_preserves_parser_fields() {
    let errors = TestUtils::classify("src/app.js:10:5: Unexpected token (no-extra-semi)", "eslint");

    let error = &errors[0];
    assert_eq!(error.error.file, "src/app.js");
    assert_eq!(error.error.line, 10);
    assert_eq!(error.error.column, 5);
    assert_eq!(error.error.rule.as_deref(), Some("no-extra-semi"));
    assert_eq!(error.error_type, ErrorType::Style);
}

#[test]
fn analyze_against_a_real_project_tree() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("src"))?;
    std::fs::write(
        dir.path().join("src/index.js"),
        "import { api } from './api';\nimport { render } from './render';\napi(render);\n",
    )?;
    std::fs::write(
        dir.path().join("src/api.js"),
        "import { helpers } from './helpers';\nexport function api(cb) { cb(helpers); }\n",
    )?;
    std::fs::write(dir.path().join("src/render.js"), "export function render() {}\n")?;
    std::fs::write(dir.path().join("src/helpers.js"), "export const helpers = {};\n")?;

    let context = ContextBuilder::new(dir.path())?.build()?;
    assert_eq!(context.files.len(), 4);

    let errors = TestUtils::classify("src/api.js:2:1: Unexpected token {", "generic");
    let result = ContextAnalyzer::new(5).analyze(&errors, &context);

    let analysis = result.errors[0].context.as_ref().unwrap();
    // index.js imports api.js, so the error has downstream consumers.
    assert!(analysis
        .dependency_impact
        .iter()
        .any(|i| i.file == "src/index.js"));
    assert!(analysis.file_importance.dependent_count >= 1);
    assert!(result.impact.affected_files.contains(&"src/api.js".to_string()));
    Ok(())
}

#[test]
fn unknown_source_fails_before_any_parsing() {
    let parser = ErrorParser::new().unwrap();
    let err = parser
        .parse("src/app.js:1:1: whatever", "not-a-real-tool")
        .unwrap_err();
    assert!(err.to_string().contains("not-a-real-tool"));
}

#[test]
fn every_format_renders_a_mixed_batch() -> Result<()> {
    let parser = ErrorParser::new()?;
    let classifier = ErrorClassifier::new()?;
    let parsed = parser.parse(TestUtils::mixed_eslint_batch(), "eslint")?;
    let classified = classifier.classify(&parsed.errors);
    let analyzed = ContextAnalyzer::new(5).analyze(&classified.errors, &CodebaseContext::empty());

    for format in [OutputFormat::Json, OutputFormat::Csv, OutputFormat::Summary] {
        assert!(!export::render_parse(&parsed, format)?.is_empty());
        assert!(!export::render_classification(&classified, format)?.is_empty());
        assert!(!export::render_context(&analyzed, format)?.is_empty());
    }

    let json = export::render_classification(&classified, OutputFormat::Json)?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["stats"]["total_errors"], 5);
    Ok(())
}
