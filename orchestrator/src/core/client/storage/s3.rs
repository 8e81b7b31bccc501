use std::sync::Arc;

use async_trait::async_trait;
use aws_config::Region;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::config::StorageSettings;
use crate::core::client::storage::{StorageClient, StorageError};

#[derive(Clone, Debug)]
pub struct AWSS3 {
    pub(crate) client: Arc<Client>,
    bucket_name: String,
    region: Option<String>,
}

impl AWSS3 {
    /// Creates a new instance of AWSS3 with the provided AWS configuration and storage settings.
    /// # Arguments
    /// * `aws_config` - The AWS configuration.
    /// * `settings` - The storage settings with bucket_identifier (name or ARN) and an optional
    ///   endpoint for S3 compatible services such as MinIO.
    ///
    /// # Returns
    /// * `Self` - The new instance of AWSS3.
    pub fn new(aws_config: &SdkConfig, settings: &StorageSettings) -> Self {
        let (bucket_name, region) = Self::parse_bucket_identifier(&settings.bucket_identifier);

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(aws_config);

        // Only override region if it was explicitly provided in the ARN
        if let Some(region) = &region {
            s3_config_builder = s3_config_builder.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        s3_config_builder = s3_config_builder.use_arn_region(true).force_path_style(true);

        let client = Client::from_conf(s3_config_builder.build());

        Self { client: Arc::new(client), bucket_name, region }
    }

    /// Parse a bucket identifier (name or ARN) into bucket name and optional region
    fn parse_bucket_identifier(identifier: &str) -> (String, Option<String>) {
        if identifier.starts_with("arn:aws:s3:") {
            let parts: Vec<&str> = identifier.split(':').collect();

            if parts.len() >= 6 {
                let region = if !parts[3].is_empty() { Some(parts[3].to_string()) } else { None };

                // Format: arn:aws:s3:region:account-id:bucket/bucket-name
                let bucket_name = match parts[5].split_once('/') {
                    Some(("bucket", name)) if !name.is_empty() => name.to_string(),
                    // Format: arn:aws:s3:::bucket-name
                    _ => parts[5].to_string(),
                };

                return (bucket_name, region);
            }
        }

        (identifier.to_string(), None)
    }

    /// Returns the region extracted from ARN, if available
    pub fn region(&self) -> Option<String> {
        self.region.clone()
    }
}

#[async_trait]
impl StorageClient for AWSS3 {
    /// Get the data from the bucket with the specified key.
    ///
    /// A missing key is reported as [StorageError::ObjectNotFound] so that callers polling for an
    /// object can tell "not yet written" apart from transport failures.
    async fn get_data(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = match self.client.get_object().bucket(&self.bucket_name).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StorageError::ObjectNotFound(key.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let data = output.body.collect().await.map_err(|e| StorageError::ObjectStreamError(e.to_string()))?;
        tracing::trace!(bucket = %self.bucket_name, key = %key, "Fetched object");

        Ok(data.into_bytes())
    }

    async fn put_data(&self, data: Bytes, key: &str) -> Result<(), StorageError> {
        self.client.put_object().bucket(&self.bucket_name).key(key).body(ByteStream::from(data)).send().await?;
        tracing::trace!(bucket = %self.bucket_name, key = %key, "Stored object");

        Ok(())
    }

    async fn delete_data(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.client.delete_object().bucket(&self.bucket_name).key(key).send().await.map(|_| ())?)
    }

    /// Lists every key under the prefix, following continuation tokens.
    async fn list_files_in_dir(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(dir_path)
                .set_continuation_token(continuation_token.take())
                .send()
                .await?;

            keys.extend(output.contents().iter().filter_map(|object| object.key().map(str::to_string)));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(keys)
    }

    fn with_bucket(&self, bucket: &str) -> Arc<dyn StorageClient> {
        Arc::new(Self { client: self.client.clone(), bucket_name: bucket.to_string(), region: self.region.clone() })
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}
