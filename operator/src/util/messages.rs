/// §8 S2 — the historical misspelling is preserved verbatim for
/// behaviour parity with the upstream broker consumer.
pub const GIMULATOR_FAILED: &str = "Gimulaor failed";

pub fn timeout_message(threshold_seconds: u64) -> String {
    format!("Timeout limit exceeded ({} seconds).", threshold_seconds)
}

pub fn actor_failed_message(log_tail: &str) -> String {
    format!("Actor faced an exception.\n{}", log_tail)
}
