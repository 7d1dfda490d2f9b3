use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::DateTime;
use futures_util::stream::{self, StreamExt};

use crate::config::{S3Settings, MAX_PAGE_SIZE};
use crate::store::{ListPage, ObjectBody, ObjectDescriptor, ObjectStore, StoreResult};

use super::s3_client::create_s3_client;

/// Object store backed by the AWS SDK
pub struct S3Store {
    client: Client,
    page_size: i32,
}

impl S3Store {
    pub fn new(client: Client, page_size: i32) -> Self {
        Self {
            client,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub async fn connect(settings: &S3Settings) -> Self {
        let client = create_s3_client(settings).await;
        Self::new(client, settings.page_size)
    }
}

/// `CopySource` is `bucket/key` with the key URL-encoded segment by segment.
pub fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", bucket, encoded.join("/"))
}

fn body_stream(body: ByteStream) -> ObjectBody {
    stream::unfold(body, |mut body| async move {
        let chunk = body.next().await?;
        let chunk =
            chunk.map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        Some((chunk, body))
    })
    .boxed()
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> StoreResult<ListPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(self.page_size);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectDescriptor {
                    key,
                    size: obj.size().and_then(|size| u64::try_from(size).ok()),
                    last_modified: obj
                        .last_modified()
                        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
                })
            })
            .collect();

        let continuation_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            continuation_token,
        })
    }

    async fn download(&self, bucket: &str, key: &str) -> StoreResult<ObjectBody> {
        let response = self.client.get_object().bucket(bucket).key(key).send().await?;
        Ok(body_stream(response.body))
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(dest_bucket)
            .copy_source(copy_source(source_bucket, source_key))
            .key(dest_key)
            .send()
            .await?;

        Ok(())
    }
}
