use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Builder as S3ConfigBuilder, Client as S3Client};

use crate::config::BlobConfig;

/// Build the S3 client for the attachment blob store, or None when no
/// endpoint is configured.
pub async fn create_blob_client(config: &BlobConfig) -> Option<S3Client> {
    let server = config.endpoint.as_ref()?;
    let endpoint = if server.ends_with('/') {
        server.clone()
    } else {
        format!("{server}/")
    };
    let base_config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(endpoint)
        .region("auto")
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;
    let s3_config = S3ConfigBuilder::from(&base_config)
        .force_path_style(true)
        .build();
    Some(S3Client::from_conf(s3_config))
}

/// Object key for a stored attachment URL: the last two path segments
/// (folder/file), which is how upload paths are laid out in the bucket.
pub fn object_key_from_url(file_url: &str) -> String {
    let parts: Vec<&str> = file_url.split('/').collect();
    let start = parts.len().saturating_sub(2);
    parts[start..].join("/")
}

/// Best-effort removal. Attachment metadata is deleted regardless of the
/// outcome here; a stale blob is preferable to a dangling metadata row.
pub async fn remove_object(client: &S3Client, bucket: &str, key: &str) {
    if let Err(e) = client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
    {
        tracing::warn!("blob removal failed for {key}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_last_two_segments() {
        assert_eq!(
            object_key_from_url("https://files.example.com/storage/v1/tickets/abc123/report.pdf"),
            "abc123/report.pdf"
        );
        assert_eq!(object_key_from_url("folder/file.txt"), "folder/file.txt");
        assert_eq!(object_key_from_url("file.txt"), "file.txt");
    }
}
