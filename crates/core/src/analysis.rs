//! Applicability marker for every analysis that may not produce a result.
//!
//! Callers must be able to tell "not computed" apart from "computed as
//! empty", so an analysis slot is never an absent key. It is one of:
//!
//! - `NotApplicable`: a precondition (sample size, shape) was not met
//! - `Skipped`: the step ran out of time or was disabled
//! - `Failed`: a calculation error was caught at the step boundary
//! - `Complete`: the result

use serde::{Deserialize, Serialize};

use crate::error::TabulaError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Analysis<T> {
    NotApplicable { reason: String },
    Skipped { reason: String },
    Failed { error: String },
    Complete(T),
}

impl<T> Analysis<T> {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Analysis::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Analysis::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Analysis::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Analysis::Complete(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Analysis::Skipped { .. })
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, Analysis::NotApplicable { .. })
    }

    pub fn as_complete(&self) -> Option<&T> {
        match self {
            Analysis::Complete(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_complete(self) -> Option<T> {
        match self {
            Analysis::Complete(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Analysis<U> {
        match self {
            Analysis::Complete(v) => Analysis::Complete(f(v)),
            Analysis::NotApplicable { reason } => Analysis::NotApplicable { reason },
            Analysis::Skipped { reason } => Analysis::Skipped { reason },
            Analysis::Failed { error } => Analysis::Failed { error },
        }
    }

    /// Short status label used in logs and metrics.
    pub fn status(&self) -> &'static str {
        match self {
            Analysis::NotApplicable { .. } => "notApplicable",
            Analysis::Skipped { .. } => "skipped",
            Analysis::Failed { .. } => "failed",
            Analysis::Complete(_) => "complete",
        }
    }

    /// Reason text for non-complete outcomes.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Analysis::NotApplicable { reason } | Analysis::Skipped { reason } => Some(reason),
            Analysis::Failed { error } => Some(error),
            Analysis::Complete(_) => None,
        }
    }
}

impl<T> Analysis<Analysis<T>> {
    /// Collapse a step outcome wrapping an analysis that may itself be
    /// inapplicable.
    pub fn flatten(self) -> Analysis<T> {
        match self {
            Analysis::Complete(inner) => inner,
            Analysis::NotApplicable { reason } => Analysis::NotApplicable { reason },
            Analysis::Skipped { reason } => Analysis::Skipped { reason },
            Analysis::Failed { error } => Analysis::Failed { error },
        }
    }
}

impl<T> From<Result<T, TabulaError>> for Analysis<T> {
    fn from(result: Result<T, TabulaError>) -> Self {
        match result {
            Ok(v) => Analysis::Complete(v),
            Err(TabulaError::Cancelled) => Analysis::skipped("computation cancelled"),
            Err(e) => Analysis::failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: f64,
    }

    #[test]
    fn serializes_with_status_tag() {
        let done: Analysis<Payload> = Analysis::Complete(Payload { value: 1.5 });
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["value"], 1.5);

        let na: Analysis<Payload> = Analysis::not_applicable("need at least 20 rows");
        let json = serde_json::to_value(&na).unwrap();
        assert_eq!(json["status"], "notApplicable");
        assert_eq!(json["reason"], "need at least 20 rows");
    }

    #[test]
    fn round_trips_through_json() {
        let skipped: Analysis<Payload> = Analysis::skipped("timed out after 10ms");
        let text = serde_json::to_string(&skipped).unwrap();
        let back: Analysis<Payload> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, skipped);
    }

    #[test]
    fn from_result_maps_errors() {
        let failed: Analysis<Payload> = Err(TabulaError::SingularMatrix).into();
        assert_eq!(failed.status(), "failed");
        let cancelled: Analysis<Payload> = Err(TabulaError::Cancelled).into();
        assert!(cancelled.is_skipped());
        let ok: Analysis<Payload> = Ok(Payload { value: 2.0 }).into();
        assert_eq!(ok.map(|p| p.value).into_complete(), Some(2.0));
    }

    #[test]
    fn flatten_keeps_inner_marker() {
        let nested: Analysis<Analysis<Payload>> =
            Analysis::Complete(Analysis::not_applicable("needs 20 rows"));
        assert_eq!(nested.flatten().reason(), Some("needs 20 rows"));
        let outer: Analysis<Analysis<Payload>> = Analysis::skipped("deadline");
        assert!(outer.flatten().is_skipped());
    }
}
