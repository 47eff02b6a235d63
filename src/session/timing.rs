use time::OffsetDateTime;

/// Remaining seconds are always derived from the wall clock and the
/// attempt's persisted start, never kept as an independent counter, so a
/// reload or reconnect lands on the same value.
pub(crate) fn remaining_seconds(
    limit_minutes: i64,
    started_at: OffsetDateTime,
    now: OffsetDateTime,
) -> i64 {
    let elapsed = (now - started_at).whole_seconds();
    (limit_minutes * 60 - elapsed).max(0)
}
