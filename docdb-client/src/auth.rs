//! Authentication digest helper.

use crate::error::ClientError;
use sha2::{Digest, Sha256};

/// Computes the hex-encoded password digest sent by the `authenticate`
/// command.
///
/// Hashing runs on the blocking pool and resolves through a single-shot
/// completion, keeping the connection task free while the digest is
/// computed.
pub async fn password_digest(username: &str, password: &str) -> Result<String, ClientError> {
    let input = format!("{username}:docdb:{password}");
    let digest = tokio::task::spawn_blocking(move || {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(digest)
}
