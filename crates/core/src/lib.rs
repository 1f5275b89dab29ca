//! `fusionbrain-core`: data model and local validation for the FusionBrain
//! generation API.
//!
//! This crate holds **pure** types and checks (no I/O). Transport, polling and
//! dispatch live in `fusionbrain-client`.

pub mod error;
pub mod id;
pub mod params;
pub mod pipeline;
pub mod status;
pub mod validation;

pub use error::{IdParseError, ValidationError, ValidationResult, Violation};
pub use id::{JobId, PipelineId};
pub use params::{GenerateParams, PipelineParams, TextToImageParams};
pub use pipeline::{PipelineDescriptor, PipelineType, Tag};
pub use status::{Availability, JobStatus, PipelineStatus, StatusResult, SubmissionResult};
pub use validation::{validate_attachments, validate_params};
