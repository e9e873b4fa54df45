use super::TestUtils;
use crate::config::AnalysisConfig;
use crate::learning::{
    FixOutcome, JsonFileStorage, MemoryStorage, PatternStore, RecordContext,
};
use crate::parser::{ErrorParser, ErrorSink};
use anyhow::Result;
use std::sync::{Arc, Mutex};

#[test]
fn parser_forwards_errors_to_a_configured_recorder() -> Result<()> {
    let store = PatternStore::new(Box::new(MemoryStorage::new()), AnalysisConfig::default())?;
    let store = Arc::new(Mutex::new(store));
    let sink: Arc<Mutex<dyn ErrorSink>> = store.clone();

    let parser = ErrorParser::new()?.with_recorder(sink);
    let result = parser.parse(TestUtils::mixed_eslint_batch(), "eslint")?;

    // Forwarding is a side channel; the parse result is unaffected.
    assert_eq!(result.errors.len(), 5);
    let insights = store.lock().unwrap().analyze_patterns();
    assert_eq!(insights.total_patterns, 5);
    Ok(())
}

#[test]
fn repeated_errors_become_recurring_insights() {
    let mut store =
        PatternStore::new(Box::new(MemoryStorage::new()), AnalysisConfig::default()).unwrap();
    let errors = TestUtils::classify(
        "src/app.js:10:5: Missing semicolon (semi)\n\
         src/app.js:22:9: Missing semicolon (semi)\n\
         src/other.js:3:1: Missing semicolon (semi)",
        "eslint",
    );
    let context = RecordContext {
        session_id: "session-1".to_string(),
        project_id: "demo".to_string(),
        ..RecordContext::default()
    };

    for error in &errors {
        store.record_error(error, &context);
    }

    let insights = store.analyze_patterns();
    // Same type, rule, and message prefix: one recurring error, not three.
    assert_eq!(insights.frequent_errors.len(), 1);
    assert_eq!(insights.frequent_errors[0].frequency, 3);
}

#[tokio::test]
async fn patterns_accumulate_across_sessions() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("patterns.json");
    let errors = TestUtils::classify("src/app.js:10:5: Missing semicolon (semi)", "eslint");

    // First session records an error and a successful fix.
    {
        let mut store = PatternStore::new(
            Box::new(JsonFileStorage::new(path.clone())),
            AnalysisConfig::default(),
        )?;
        store.load().await?;
        store.record_error(&errors[0], &RecordContext::default());
        store.record_fix_attempt(
            &errors[0],
            &FixOutcome {
                fix_method: "auto_fix".to_string(),
                success: true,
                confidence: 0.8,
                duration_ms: 40,
                was_auto_applied: true,
            },
            &RecordContext::default(),
        );
        store.save().await?;
    }

    // Second session sees the first session's history.
    let mut store = PatternStore::new(
        Box::new(JsonFileStorage::new(path)),
        AnalysisConfig::default(),
    )?;
    store.load().await?;
    store.record_error(&errors[0], &RecordContext::default());

    let effectiveness = store.fix_effectiveness();
    assert_eq!(effectiveness.len(), 1);
    assert_eq!(effectiveness[0].attempts, 1);
    assert!(store.analyze_patterns().total_patterns >= 4);
    Ok(())
}

#[tokio::test]
async fn missing_store_file_is_an_empty_store() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = PatternStore::new(
        Box::new(JsonFileStorage::new(dir.path().join("never-written.json"))),
        AnalysisConfig::default(),
    )?;
    store.load().await?;
    assert_eq!(store.analyze_patterns().total_patterns, 0);
    Ok(())
}
