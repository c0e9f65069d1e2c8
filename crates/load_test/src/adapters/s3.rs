// Rust guideline compliant 2026-10-18

//! `Operation` adapter for S3-compatible object stores.
//!
//! The trace path (leading `/` removed) is the object key. Store errors other
//! than "not found" are reported as status `-2`.

use crate::credentials::S3Credentials;
use crate::payload::Payload;
use domain::{Measurement, Operation, OperationError, Operator};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Status reported when the store answered with an error.
const STORE_ERROR: i32 = -2;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "canada";

/// Where the bucket lives and how to log in.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Store endpoint, e.g. `http://minio:9000`.
    pub endpoint: String,
    /// Bucket holding the objects.
    pub bucket: String,
    /// Static key pair.
    pub credentials: S3Credentials,
    /// Signing region.
    pub region: String,
}

/// Object-store protocol.
#[derive(Debug)]
pub struct S3Operation {
    store: Arc<dyn ObjectStore>,
    payload: Option<Arc<Payload>>,
}

impl S3Operation {
    /// Connect to the bucket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Setup`] if the store client cannot be built.
    pub fn new(config: &S3Config, payload: Option<Arc<Payload>>) -> Result<Self, OperationError> {
        let store = AmazonS3Builder::new()
            .with_region(&config.region)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.credentials.access_key)
            .with_secret_access_key(&config.credentials.secret_key)
            .with_endpoint(&config.endpoint)
            .with_allow_http(true)
            .build()
            .map_err(|e| OperationError::Setup {
                reason: format!("cannot create s3 client for {}: {e}", config.endpoint),
            })?;
        tracing::info!(
            "s3.client.created: endpoint={} bucket={} region={}",
            config.endpoint,
            config.bucket,
            config.region
        );
        Ok(Self::with_store(Arc::new(store), payload))
    }

    /// Use an existing store handle.
    #[must_use]
    pub fn with_store(store: Arc<dyn ObjectStore>, payload: Option<Arc<Payload>>) -> Self {
        Self { store, payload }
    }
}

fn key(path: &str) -> ObjectPath {
    ObjectPath::from(path.trim_start_matches('/'))
}

impl Operation for S3Operation {
    fn name(&self) -> &str {
        "s3"
    }

    async fn init(&self) -> Result<(), OperationError> {
        Ok(())
    }

    async fn get(&self, path: &str, _expected: Option<i32>) -> Measurement {
        let location = key(path);
        let started = SystemTime::now();
        let initial = Instant::now();
        let mut measurement = Measurement {
            started,
            latency: Duration::ZERO,
            transfer_time: Duration::ZERO,
            bytes: 0,
            path: path.to_owned(),
            status: 200,
            operator: Operator::Get,
            failed: false,
        };
        let result = self.store.get(&location).await;
        measurement.latency = initial.elapsed();
        match result {
            Ok(object) => match object.bytes().await {
                Ok(content) => {
                    measurement.bytes = content.len() as u64;
                    measurement.transfer_time = initial.elapsed().saturating_sub(measurement.latency);
                }
                Err(e) => {
                    tracing::warn!("s3.get.failed: key={location} {e}");
                    measurement.status = STORE_ERROR;
                    measurement.failed = true;
                }
            },
            Err(ObjectStoreError::NotFound { .. }) => measurement.status = 404,
            Err(e) => {
                tracing::warn!("s3.get.failed: key={location} {e}");
                measurement.status = STORE_ERROR;
                measurement.failed = true;
            }
        }
        measurement
    }

    async fn put(&self, path: &str, size: i64, _expected: Option<i32>) -> Measurement {
        let Some(size) = u64::try_from(size).ok().filter(|&size| size > 0) else {
            let mut m = Measurement::rejected(path, Operator::Put, 411);
            m.failed = false;
            return m;
        };
        let Some(payload) = &self.payload else {
            tracing::warn!("s3.put.rejected: no write payload prepared, path={path}");
            return Measurement::rejected(path, Operator::Put, -1);
        };
        let body = payload.read(size);
        let sent = body.len() as u64;
        let location = key(path);
        let started = SystemTime::now();
        let initial = Instant::now();
        let result = self.store.put(&location, PutPayload::from(body)).await;
        let (status, failed) = match result {
            Ok(_) => (200, false),
            Err(e) => {
                tracing::warn!("s3.put.failed: key={location} {e}");
                (STORE_ERROR, true)
            }
        };
        Measurement {
            started,
            latency: initial.elapsed(),
            transfer_time: Duration::ZERO,
            bytes: sent,
            path: path.to_owned(),
            status,
            operator: Operator::Put,
            failed,
        }
    }

    async fn post(&self, path: &str, _size: i64, _expected: Option<i32>, _body: &str) -> Measurement {
        tracing::debug!("s3.post.unsupported: path={path}");
        let mut m = Measurement::rejected(path, Operator::Post, 405);
        m.failed = false;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::S3Operation;
    use crate::payload::Payload;
    use domain::Operation as _;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::ObjectStore as _;
    use std::sync::Arc;

    #[tokio::test]
    async fn put_then_get_round_trips_size() {
        let dir = tempfile::tempdir().unwrap();
        let payload = Payload::create(dir.path(), 2048).await.unwrap().map(Arc::new);
        let store = Arc::new(InMemory::new());
        let op = S3Operation::with_store(store.clone(), payload);

        let put = op.put("/bucket/dir/obj", 1500, Some(200)).await;
        assert_eq!(put.status, 200);
        assert_eq!(put.bytes, 1500);

        let stored = store.head(&ObjectPath::from("bucket/dir/obj")).await.unwrap();
        assert_eq!(stored.size, 1500);

        let get = op.get("/bucket/dir/obj", Some(200)).await;
        assert_eq!(get.status, 200);
        assert_eq!(get.bytes, 1500);
        assert!(!get.failed);
    }

    #[tokio::test]
    async fn put_larger_than_payload_stores_whole_payload() {
        let dir = tempfile::tempdir().unwrap();
        let payload = Payload::create(dir.path(), 64).await.unwrap().map(Arc::new);
        let store = Arc::new(InMemory::new());
        let op = S3Operation::with_store(store.clone(), payload);

        let put = op.put("/k", 10_000, None).await;
        assert_eq!(put.bytes, 64);
        let stored = store.head(&ObjectPath::from("k")).await.unwrap();
        assert_eq!(stored.size, 64);
    }

    #[tokio::test]
    async fn missing_object_is_404() {
        let op = S3Operation::with_store(Arc::new(InMemory::new()), None);
        let get = op.get("/absent", None).await;
        assert_eq!(get.status, 404);
        assert!(!get.failed);
    }

    #[tokio::test]
    async fn post_is_not_supported() {
        let op = S3Operation::with_store(Arc::new(InMemory::new()), None);
        let post = op.post("/form", 3, None, "a=1").await;
        assert_eq!(post.status, 405);
    }

    #[tokio::test]
    async fn put_without_payload_is_rejected() {
        let op = S3Operation::with_store(Arc::new(InMemory::new()), None);
        assert_eq!(op.put("/x", 10, None).await.status, -1);
        assert_eq!(op.put("/x", 0, None).await.status, 411);
    }
}
