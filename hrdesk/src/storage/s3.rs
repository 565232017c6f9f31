//! S3 object store backed by the AWS SDK.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::Region,
    error::{DisplayErrorContext, SdkError},
    presigning::PresigningConfig,
    types::ServerSideEncryption,
};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ObjectMetadata, ObjectStore, StorageError, attachment_disposition};
use crate::config::StorageConfig;

/// Object store for AWS S3 and S3-compatible services.
///
/// Uploads are presigned with SSE-S3 (`AES256`) so objects are encrypted at rest regardless of
/// bucket defaults.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS configuration, overridden by any values in `config`
    pub async fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let (Some(access_key_id), Some(secret_access_key)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "hrdesk-config",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.as_str().trim_end_matches('/'));
        }

        debug!(bucket = %config.bucket, region = %config.region, "Created S3 object store");
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    fn presigning_config(operation: &'static str, key: &str, expires_in: Duration) -> Result<PresigningConfig, StorageError> {
        PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Presign {
            operation,
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}

fn backend_error<E: std::error::Error + 'static>(operation: &'static str, key: &str, err: E) -> StorageError {
    StorageError::Backend {
        operation,
        key: key.to_string(),
        source: anyhow::anyhow!("{}", DisplayErrorContext(err)),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), err)]
    async fn presign_upload(&self, key: &str, content_type: &str, expires_in: Duration) -> Result<String, StorageError> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .presigned(Self::presigning_config("upload", key, expires_in)?)
            .await
            .map_err(|e| backend_error("presign upload", key, e))?;

        Ok(presigned.uri().to_string())
    }

    #[instrument(skip(self), err)]
    async fn presign_download(&self, key: &str, download_name: &str, expires_in: Duration) -> Result<String, StorageError> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(attachment_disposition(download_name))
            .response_content_type("application/octet-stream")
            .presigned(Self::presigning_config("download", key, expires_in)?)
            .await
            .map_err(|e| backend_error("presign download", key, e))?;

        Ok(presigned.uri().to_string())
    }

    #[instrument(skip(self), err)]
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectMetadata {
                size: output.content_length().unwrap_or_default(),
            })),
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => Ok(None),
            Err(e) => Err(backend_error("head", key, e)),
        }
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("delete", key, e))?;
        Ok(())
    }
}
