//! Failure types for per-item pipeline steps.
//!
//! Whole-run failures (unreadable collection, unreachable database) travel as
//! [`anyhow::Error`] and abort the run; the types here describe failures of a
//! single candidate or page, which are tallied and reported instead.

use thiserror::Error;

/// A page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("timed out fetching {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// Connection, TLS or body decoding failure.
    #[error("network error fetching {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error text.
        message: String,
    },
}

/// A fetched page did not yield a usable record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The markup contains no element the extractor recognises.
    #[error("unrecognised markup: {0}")]
    Unparseable(String),
    /// A field the record cannot exist without is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// A candidate dropped before it reached the merge step.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// Retrieval failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Parsing failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// A single generated artifact could not be produced.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The record has nothing to embed on its page.
    #[error("game `{0}` has no playable embed URL")]
    MissingEmbed(String),
    /// Writing the rendered output failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Target file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
