//! Resolution details returned alongside every evaluated value.

use std::fmt;

/// Why an evaluation produced its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// A targeting rule matched the context.
    TargetingMatch,
    /// No rule matched (or the flag is unknown); the default was returned.
    Default,
    /// The evaluation failed; the caller-supplied default was substituted.
    Error,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::TargetingMatch => "TARGETING_MATCH",
            Reason::Default => "DEFAULT",
            Reason::Error => "ERROR",
        })
    }
}

/// Machine-readable evaluation and provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The evaluated value could not satisfy the caller's typed default.
    TypeMismatch,
    /// The provider can no longer keep its mirror fresh.
    ProviderFatal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::ProviderFatal => "PROVIDER_FATAL",
        })
    }
}

/// An evaluation-level error carried inside a [`ResolutionDetail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub code: ErrorCode,
    pub message: String,
}

/// Reason, chosen variant and optional error accompanying a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionDetail {
    pub reason: Reason,
    pub variant: Option<String>,
    pub error: Option<ResolutionError>,
}

impl ResolutionDetail {
    /// A targeting rule won arbitration.
    pub fn matched(variant: String) -> Self {
        Self {
            reason: Reason::TargetingMatch,
            variant: Some(variant),
            error: None,
        }
    }

    /// No rule matched; the definition's default applies.
    pub fn unmatched(variant: String) -> Self {
        Self {
            reason: Reason::Default,
            variant: Some(variant),
            error: None,
        }
    }

    /// The flag is not in the cache at all.
    pub fn flag_missing() -> Self {
        Self {
            reason: Reason::Default,
            variant: None,
            error: None,
        }
    }

    /// The evaluated value did not fit the requested type.
    pub fn type_mismatch(message: String) -> Self {
        Self {
            reason: Reason::Error,
            variant: None,
            error: Some(ResolutionError {
                code: ErrorCode::TypeMismatch,
                message,
            }),
        }
    }
}

/// A typed evaluation result: the value plus how it was resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub value: T,
    pub detail: ResolutionDetail,
}
