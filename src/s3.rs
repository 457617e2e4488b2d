use crate::backend::ObjectStorage;
use crate::config::S3Config;
use crate::error::BlogError;
use crate::upload::SelectedFile;
use rusoto_core::Region;
use rusoto_core::RusotoError;
use rusoto_s3::{
    ListObjectsV2Error, ListObjectsV2Output, ListObjectsV2Request, PutObjectError, PutObjectOutput,
    PutObjectRequest, S3Client, S3,
};
use url::Url;

/// One publicly readable bucket on S3 or an S3-compatible service.
pub struct S3Bucket {
    s3: S3Client,
    bucket_name: String,
    pub pub_url: Url,
}

impl S3Bucket {
    pub fn new(region: Region, bucket_name: String, pub_url: Url) -> S3Bucket {
        log::info!("Initializing new S3 Bucket: {}", bucket_name);

        S3Bucket {
            s3: S3Client::new(region),
            bucket_name,
            pub_url,
        }
    }

    pub fn from_config(config: &S3Config) -> Result<S3Bucket, BlogError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                name: config.region.to_owned(),
                endpoint: endpoint.to_owned(),
            },
            None => config.region.parse::<Region>().map_err(|e| {
                BlogError::remote(format!("Unknown S3 region {}: {}", config.region, e))
            })?,
        };

        Ok(Self::new(
            region,
            config.bucket.to_owned(),
            config.public_url.to_owned(),
        ))
    }

    pub async fn list_objects_v2(
        &self,
        key: &str,
    ) -> Result<ListObjectsV2Output, RusotoError<ListObjectsV2Error>> {
        log::debug!("S3Bucket: list_objects_v2: {}", key);

        // list_objects_v2 with a prefix is cheaper than head_object for an existence check.
        let list_request = ListObjectsV2Request {
            bucket: self.bucket_name.to_owned(),
            prefix: Some(key.to_owned()),
            max_keys: Some(1),
            ..Default::default()
        };

        self.s3.list_objects_v2(list_request).await
    }

    pub async fn put_object(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<PutObjectOutput, RusotoError<PutObjectError>> {
        log::info!("S3Bucket: put_object: {}", key);

        let put_request = PutObjectRequest {
            bucket: self.bucket_name.to_owned(),
            key: key.to_owned(),
            content_type: Some(content_type.to_owned()),
            content_length: Some(data.len() as i64),
            body: Some(data.into()),
            ..Default::default()
        };

        self.s3.put_object(put_request).await
    }

    async fn key_exists(&self, key: &str) -> Result<bool, BlogError> {
        let list = self.list_objects_v2(key).await.map_err(|e| {
            log::error!("S3Bucket: failed to list_objects_v2: {}", e);
            BlogError::remote(e.to_string())
        })?;

        Ok(list
            .contents
            .unwrap_or_default()
            .iter()
            .any(|object| object.key.as_deref() == Some(key)))
    }
}

#[async_trait::async_trait]
impl ObjectStorage for S3Bucket {
    async fn upload(&self, key: &str, file: &SelectedFile, upsert: bool) -> Result<(), BlogError> {
        if !upsert && self.key_exists(key).await? {
            return Err(BlogError::remote("The resource already exists"));
        }

        self.put_object(file.data.to_owned(), key, file.content_type.essence_str())
            .await
            .map_err(|e| {
                log::error!("S3Bucket: failed to put_object: {}", e);
                BlogError::remote(e.to_string())
            })?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.pub_url.as_str().trim_end_matches('/'), key)
    }
}
