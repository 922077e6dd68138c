/// Seconds since the Unix epoch, for fields that cross the wire
/// (`last_seen`, `last_modified`, `server_timestamp`).
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
