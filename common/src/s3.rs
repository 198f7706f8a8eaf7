use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::region::Region;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::args::S3Args;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store request failed: {0}")]
    Request(String),
    #[error("object is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("object could not be decoded as YAML: {0}")]
    Decode(#[from] serde_yaml::Error),
}

/// S3-compatible object storage client. Credentials (URL, access key,
/// secret) are resolved once at boot from [`S3Args`]; missing or
/// unreachable credentials are a fatal process-level failure, matched by
/// `main.rs`'s eager construction of this type.
#[derive(Clone)]
pub struct ObjectStore {
    client: aws_sdk_s3::Client,
}

impl ObjectStore {
    pub async fn connect(args: &S3Args) -> Self {
        let creds = Credentials::new(
            args.s3_access_key.clone(),
            args.s3_secret_key.clone(),
            None,
            None,
            "hub-operator",
        );
        let shared_config = aws_config::from_env()
            .region(Region::new("us-east-1"))
            .credentials_provider(SharedCredentialsProvider::new(creds))
            .load()
            .await;
        let s3_conf = aws_sdk_s3::config::Builder::from(&shared_config)
            .endpoint_url(&args.s3_url)
            .force_path_style(true)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_conf),
        }
    }

    pub async fn get_bytes(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }

    pub async fn get_string(&self, bucket: &str, key: &str) -> Result<String, ObjectStoreError> {
        let bytes = self.get_bytes(bucket, key).await?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Fetches `key` from `bucket` and decodes it as YAML into `T`.
    pub async fn get_struct<T: DeserializeOwned>(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<T, ObjectStoreError> {
        let text = self.get_string(bucket, key).await?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Streams `body` to `bucket`/`key`, overwriting any existing object.
    pub async fn put_stream(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        Ok(())
    }
}
