use crate::classifier::{ClassifiedError, ErrorClassifier};
use crate::parser::ErrorParser;

mod learning;
mod pipeline;

// Test utilities and helpers
pub(crate) struct TestUtils;

impl TestUtils {
    pub fn classify(text: &str, source: &str) -> Vec<ClassifiedError> {
        let parser = ErrorParser::new().unwrap();
        let classifier = ErrorClassifier::new().unwrap();
        let parsed = parser.parse(text, source).unwrap();
        classifier.classify(&parsed.errors).errors
    }

    pub fn mixed_eslint_batch() -> &'static str {
        "src/app.js:10:5: Unexpected token (no-extra-semi)\n\
         src/app.js:12:1: 'config' is assigned a value but never used (no-unused-vars)\n\
         src/app.js:20:3: Missing semicolon (semi)\n\
         src/api.js:4:9: 'fetchData' is not defined (no-undef)\n\
         src/api.js:8:1: Unexpected token {\n\
         ✖ 5 problems (3 errors, 2 warnings)"
    }
}
