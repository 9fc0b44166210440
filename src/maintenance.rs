use crate::auth::{codes::ExchangeCodes, session::SessionManager, tokens::TokenService};

/// Rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions: usize,
    pub codes: usize,
    pub tokens: usize,
}

/// Deletes sessions and codes older than their TTL and expired tokens.
/// Each step runs even if an earlier one fails.
pub async fn run_cleanup(sessions: &SessionManager, codes: &ExchangeCodes, tokens: &TokenService) -> CleanupReport {
    let mut report = CleanupReport::default();

    match sessions.delete_expired().await {
        Ok(n) => report.sessions = n,
        Err(e) => tracing::warn!(store = %e.store, error = ?e.source, "session sweep failed"),
    }
    match codes.delete_expired().await {
        Ok(n) => report.codes = n,
        Err(e) => tracing::warn!(store = %e.store, error = ?e.source, "code sweep failed"),
    }
    report.tokens = tokens.delete_expired().await;

    tracing::info!(
        sessions = report.sessions,
        codes = report.codes,
        tokens = report.tokens,
        "cleanup finished"
    );
    report
}
