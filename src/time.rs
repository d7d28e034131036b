use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the unix epoch. Ingress expiries are expressed in
/// nanoseconds on the wire.
pub fn create_timestamp() -> u64 {
    let start = SystemTime::now();
    let since_the_epoch = start
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards");
    since_the_epoch.as_nanos() as u64
}
