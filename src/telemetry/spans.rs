//! Reconciliation span helpers.

use tracing::Span;

/// Span wrapping one full reconciliation pass.
///
/// `reconcile.users` and `reconcile.ok` start empty and are filled in as
/// the pass progresses.
pub fn start_pass_span() -> Span {
    tracing::info_span!(
        "reconcile.pass",
        "reconcile.users" = tracing::field::Empty,
        "reconcile.ok" = tracing::field::Empty,
    )
}

/// Span for one check evaluated against one user.
pub fn start_check_span(check: &str, user: &str) -> Span {
    tracing::info_span!(
        "reconcile.check",
        "check.name" = check,
        "check.user" = user,
        "check.result" = tracing::field::Empty,
    )
}

/// Record a check result on its span.
pub fn record_check_result(span: &Span, result: &str) {
    span.record("check.result", result);
    span.in_scope(|| {
        tracing::debug!(result = result, "check_result");
    });
}
