use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return nanoseconds since epoch
pub(crate) fn now_nanos() -> i64 {
    let now = SystemTime::now();
    let since_epoch = now.duration_since(UNIX_EPOCH).expect("Time went backwards");
    since_epoch.as_nanos() as i64
}
