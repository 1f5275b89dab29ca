//! `fusionbrain-client`: asynchronous job client for the FusionBrain generation API.
//!
//! ## Design
//!
//! - Parameters are validated locally before anything goes on the wire
//! - Submissions are never retried; disabled pipelines surface as their own error
//! - Completion is polled on a fixed interval with a bounded retry budget
//! - Waits run on a bounded pool of tokio tasks and can be awaited, blocked on or cancelled
//!
//! ## Components
//!
//! - `RemoteEndpoint`: the four API operations (`HttpEndpoint`, `InMemoryEndpoint`)
//! - `JobSubmitter`: validate, submit, classify
//! - `CompletionPoller`: poll one job until it reaches a terminal status
//! - `Dispatcher`: runs pollers off the caller's flow of control
//! - `FusionBrainClient`: facade over all of the above

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod poller;
pub mod submit;

pub use client::FusionBrainClient;
pub use config::{ClientConfig, ConfigError, PollPolicy};
pub use dispatcher::{Dispatcher, WaitHandle};
pub use endpoint::{
    EndpointError, HttpEndpoint, InMemoryEndpoint, RemoteEndpoint, ScriptedFailure, StatusStep,
};
pub use error::{BoxError, ClientError, ClientResult};
pub use poller::CompletionPoller;
pub use submit::JobSubmitter;
