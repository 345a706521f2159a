// Request validation performed before a job is submitted
use crate::types::{ExecutionRequest, Language};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Language is required")]
    MissingLanguage,
    #[error("Language '{0}' is not offered by the execution service")]
    UnsupportedLanguage(String),
    #[error("Code is required")]
    EmptySource,
    #[error("Duplicate test case id {0}")]
    DuplicateTestCaseId(u32),
}

/// Check that a request is well formed
///
/// `languages` is the list from GET /languages when the caller has it;
/// with `None` only the shape of the request is checked.
pub fn validate_request(
    request: &ExecutionRequest,
    languages: Option<&[Language]>,
) -> Result<(), ValidationError> {
    let language = request.language.trim();
    if language.is_empty() {
        return Err(ValidationError::MissingLanguage);
    }

    if let Some(languages) = languages {
        if !languages.iter().any(|l| l.language == language) {
            return Err(ValidationError::UnsupportedLanguage(language.to_string()));
        }
    }

    if request.source_code.trim().is_empty() {
        return Err(ValidationError::EmptySource);
    }

    let mut seen = HashSet::with_capacity(request.test_cases.len());
    for test_case in &request.test_cases {
        if !seen.insert(test_case.id) {
            return Err(ValidationError::DuplicateTestCaseId(test_case.id));
        }
    }

    Ok(())
}
