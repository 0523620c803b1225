//! Local save
//!
//! The non-network transfer mode: write the full artifact to disk in one
//! shot under a caller-supplied filename. No chunking.

use crate::artifact::RecordedArtifact;
use crate::transfer::TransferResult;
use std::path::Path;

/// Save the artifact bytes to `path`.
pub async fn save_artifact(
    artifact: &RecordedArtifact,
    path: impl AsRef<Path>,
) -> TransferResult<()> {
    let path = path.as_ref();
    tokio::fs::write(path, artifact.data()).await?;
    tracing::info!("Saved recording to {} ({} bytes)", path.display(), artifact.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_artifact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orev-vali-s01-2026-08-07-09-30-05.webm");
        let artifact = RecordedArtifact::new(vec![1, 2, 3, 4], "video/webm".to_string());

        save_artifact(&artifact, &path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_save_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.webm");
        let artifact = RecordedArtifact::new(vec![9], "video/webm".to_string());
        assert!(save_artifact(&artifact, &path).await.is_err());
    }
}
