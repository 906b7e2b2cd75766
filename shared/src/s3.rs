use crate::error::ApiError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

const SUBMISSIONS_PREFIX: &str = "submissions";

/// Durable image handle returned by the storage collaborator: a stable
/// retrieval URL plus the internal key (kept for later deletion, which is
/// outside this core).
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub url: String,
    pub key: String,
}

/// Upload a submission image to S3 and return its handle. Called only after
/// the classifier has accepted the image; rejected images never reach
/// storage.
pub async fn upload_submission_image(
    s3_client: &S3Client,
    bucket: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<StoredImage, ApiError> {
    let image_id = uuid::Uuid::new_v4().to_string();
    let extension = extension_for(content_type);
    let key = format!("{}/{}.{}", SUBMISSIONS_PREFIX, image_id, extension);

    s3_client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(bytes))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("S3 upload failed: {}", e);
            ApiError::Collaborator(format!("image storage unavailable: {e}"))
        })?;

    let url = format!("https://{}.s3.amazonaws.com/{}", bucket, key);

    Ok(StoredImage { url, key })
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        // jpeg and anything else the camera produces
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("application/octet-stream"), "jpg");
    }
}
