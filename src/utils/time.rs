use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the microsecond precision Postgres keeps, so values read
/// back from storage compare equal to what was written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
