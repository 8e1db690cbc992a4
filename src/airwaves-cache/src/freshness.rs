use std::path::Path;
use std::time::{Duration, SystemTime};

/// Whether `path` exists and was modified less than `ttl` ago.
///
/// Any filesystem error, including not-found, reads as "not fresh".
pub async fn is_fresh(path: &Path, ttl: Duration) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta
            .modified()
            .is_ok_and(|modified| within_ttl(modified, SystemTime::now(), ttl)),
        _ => false,
    }
}

/// `now - modified < ttl`. A modification time in the future counts as fresh.
pub fn within_ttl(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age < ttl,
        Err(_) => true,
    }
}
