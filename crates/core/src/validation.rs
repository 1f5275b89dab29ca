//! Pre-submission checks. Pure functions; nothing here touches the network.

use crate::error::{ValidationError, ValidationResult, Violation};
use crate::params::PipelineParams;

/// Validate optional submission parameters.
///
/// Absent parameters are allowed and skip validation entirely.
pub fn validate_params(params: Option<&PipelineParams>) -> ValidationResult<()> {
    match params {
        Some(p) => p.validate(),
        None => Ok(()),
    }
}

/// Every attachment, if any are given, must carry at least one byte.
///
/// An empty blob is a failure, never silently dropped. All empty entries are
/// reported, each by its position.
pub fn validate_attachments<B: AsRef<[u8]>>(attachments: Option<&[B]>) -> ValidationResult<()> {
    let Some(attachments) = attachments else {
        return Ok(());
    };

    let violations: Vec<Violation> = attachments
        .iter()
        .enumerate()
        .filter(|(_, blob)| blob.as_ref().is_empty())
        .map(|(i, _)| {
            Violation::new(
                format!("attachments[{i}]"),
                "File content cannot be null or empty",
            )
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(violations))
    }
}
