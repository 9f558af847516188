//! JetStream-backed key-value store
//!
//! Wraps the async `async-nats` client behind the synchronous `KvStore` trait.
//! A current-thread tokio runtime is owned by the store and every call is a
//! single `block_on`, bounded by the configured request timeout.

use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::{self, kv};
use async_nats::{ConnectOptions, ServerAddr};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use crate::config::ConnectionSettings;
use crate::domain::{BucketConfig, BucketStatus, Entry, Operation, STREAM_PREFIX};
use crate::infrastructure::traits::{KvStore, StoreError, StoreResult};
use crate::infrastructure::{InfraError, InfraResult};

/// Store talking to a NATS server over JetStream.
pub struct NatsStore {
    runtime: Runtime,
    js: jetstream::Context,
    timeout: Duration,
}

impl NatsStore {
    /// Connect using the resolved connection settings.
    ///
    /// Fails fast: no retries on the initial connect.
    pub fn connect(settings: &ConnectionSettings) -> InfraResult<Self> {
        debug!("connect: servers={}", settings.servers);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InfraError::io("start async runtime", e))?;

        let servers = parse_servers(&settings.servers)?;
        let options = runtime.block_on(connect_options(settings))?;
        let client = runtime
            .block_on(options.connect(servers))
            .map_err(|e| InfraError::Connect {
                servers: settings.servers.clone(),
                message: e.to_string(),
            })?;

        if let Some(prefix) = &settings.js_event_prefix {
            debug!("connect: event prefix {} is not used by kv operations", prefix);
        }
        let mut js = match (&settings.js_domain, &settings.js_api_prefix) {
            (Some(domain), None) => jetstream::with_domain(client, domain),
            (None, Some(prefix)) => jetstream::with_prefix(client, prefix),
            (None, None) => jetstream::new(client),
            (Some(_), Some(_)) => {
                return Err(InfraError::Connect {
                    servers: settings.servers.clone(),
                    message: "--js-domain and --js-api-prefix cannot be combined".to_string(),
                })
            }
        };
        js.set_timeout(settings.timeout);

        Ok(Self {
            runtime,
            js,
            timeout: settings.timeout,
        })
    }

    fn block_on<T>(
        &self,
        what: &str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        trace!("nats: {}", what);
        let timeout = self.timeout;
        let result = self.runtime.block_on(async move {
            tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| StoreError::Timeout(what.to_string()))?
        });
        trace!("nats: {} -> {}", what, if result.is_ok() { "ok" } else { "err" });
        result
    }

    async fn names(&self) -> StoreResult<Vec<String>> {
        let streams: Vec<String> = self
            .js
            .stream_names()
            .try_collect()
            .await
            .map_err(|e| StoreError::backend("list streams", e))?;
        Ok(streams
            .into_iter()
            .filter_map(|s| s.strip_prefix(STREAM_PREFIX).map(str::to_string))
            .collect())
    }

    async fn exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.names().await?.iter().any(|b| b == bucket))
    }

    async fn open(&self, bucket: &str) -> StoreResult<kv::Store> {
        match self.js.get_key_value(bucket).await {
            Ok(store) => Ok(store),
            Err(e) => {
                if self.exists(bucket).await? {
                    Err(StoreError::backend(format!("open bucket {bucket}"), e))
                } else {
                    Err(StoreError::BucketNotFound(bucket.to_string()))
                }
            }
        }
    }

    async fn latest(store: &kv::Store, key: &str) -> StoreResult<Option<Entry>> {
        store
            .entry(key)
            .await
            .map(|e| e.map(to_entry))
            .map_err(|e| StoreError::backend(format!("get {key}"), e))
    }

    async fn status_of(store: &kv::Store) -> StoreResult<BucketStatus> {
        let status = store
            .status()
            .await
            .map_err(|e| StoreError::backend("bucket status", e))?;
        Ok(BucketStatus {
            bucket: status.bucket().to_string(),
            values: status.values(),
            history: status.history(),
            max_age: status.max_age(),
            max_value_size: status.info.config.max_message_size,
            bytes: status.info.state.bytes,
        })
    }
}

impl KvStore for NatsStore {
    fn create_bucket(&self, config: &BucketConfig) -> StoreResult<BucketStatus> {
        self.block_on("create bucket", async {
            debug!("create bucket: stream {}", config.stream_name());
            let kv_config = kv::Config {
                bucket: config.bucket.clone(),
                description: config.description.clone(),
                history: config.history,
                max_age: config.max_age,
                max_value_size: config.max_value_size,
                max_bytes: config.max_bytes,
                num_replicas: config.replicas,
                ..Default::default()
            };
            match self.js.create_key_value(kv_config).await {
                Ok(store) => Self::status_of(&store).await,
                Err(e) => {
                    if self.exists(&config.bucket).await? {
                        debug!("create bucket: {} rejected by server: {}", config.bucket, e);
                        Err(StoreError::BucketExists(config.bucket.clone()))
                    } else {
                        Err(StoreError::backend(
                            format!("create bucket {}", config.bucket),
                            e,
                        ))
                    }
                }
            }
        })
    }

    fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.block_on("delete bucket", async {
            if !self.exists(bucket).await? {
                return Err(StoreError::BucketNotFound(bucket.to_string()));
            }
            self.js
                .delete_key_value(bucket)
                .await
                .map(|_| ())
                .map_err(|e| StoreError::backend(format!("delete bucket {bucket}"), e))
        })
    }

    fn bucket_status(&self, bucket: &str) -> StoreResult<BucketStatus> {
        self.block_on("bucket status", async {
            let store = self.open(bucket).await?;
            Self::status_of(&store).await
        })
    }

    fn bucket_names(&self) -> StoreResult<Vec<String>> {
        self.block_on("list buckets", self.names())
    }

    fn entry(&self, bucket: &str, key: &str) -> StoreResult<Option<Entry>> {
        self.block_on("get", async {
            let store = self.open(bucket).await?;
            Self::latest(&store, key).await
        })
    }

    fn put(&self, bucket: &str, key: &str, value: &[u8]) -> StoreResult<u64> {
        self.block_on("put", async {
            let store = self.open(bucket).await?;
            store
                .put(key, value.to_vec().into())
                .await
                .map_err(|e| StoreError::backend(format!("put {key}"), e))
        })
    }

    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> StoreResult<u64> {
        self.block_on("create", async {
            let store = self.open(bucket).await?;
            match store.create(key, value.to_vec().into()).await {
                Ok(rev) => Ok(rev),
                Err(e) => {
                    let live = Self::latest(&store, key)
                        .await?
                        .is_some_and(|entry| entry.is_live());
                    if live {
                        Err(StoreError::KeyExists(key.to_string()))
                    } else {
                        Err(StoreError::backend(format!("create {key}"), e))
                    }
                }
            }
        })
    }

    fn update(&self, bucket: &str, key: &str, value: &[u8], revision: u64) -> StoreResult<u64> {
        self.block_on("update", async {
            let store = self.open(bucket).await?;
            match store.update(key, value.to_vec().into(), revision).await {
                Ok(rev) => Ok(rev),
                Err(e) => {
                    let current = Self::latest(&store, key).await?.map(|entry| entry.revision);
                    if current != Some(revision) {
                        Err(StoreError::WrongRevision {
                            key: key.to_string(),
                            expected: revision,
                            current,
                        })
                    } else {
                        Err(StoreError::backend(format!("update {key}"), e))
                    }
                }
            }
        })
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.block_on("delete", async {
            let store = self.open(bucket).await?;
            store
                .delete(key)
                .await
                .map_err(|e| StoreError::backend(format!("delete {key}"), e))
        })
    }

    fn purge(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.block_on("purge", async {
            let store = self.open(bucket).await?;
            store
                .purge(key)
                .await
                .map_err(|e| StoreError::backend(format!("purge {key}"), e))
        })
    }

    fn history(&self, bucket: &str, key: &str) -> StoreResult<Vec<Entry>> {
        self.block_on("history", async {
            let store = self.open(bucket).await?;
            let entries: Vec<kv::Entry> = store
                .history(key)
                .await
                .map_err(|e| StoreError::backend(format!("history {key}"), e))?
                .try_collect()
                .await
                .map_err(|e| StoreError::backend(format!("history {key}"), e))?;
            Ok(entries.into_iter().map(to_entry).collect())
        })
    }

    fn keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        self.block_on("keys", async {
            let store = self.open(bucket).await?;
            store
                .keys()
                .await
                .map_err(|e| StoreError::backend("list keys", e))?
                .try_collect()
                .await
                .map_err(|e| StoreError::backend("list keys", e))
        })
    }
}

/// Split a comma separated server list into addresses.
fn parse_servers(servers: &str) -> InfraResult<Vec<ServerAddr>> {
    servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ServerAddr>().map_err(|e| InfraError::Connect {
                servers: servers.to_string(),
                message: format!("invalid server url {s:?}: {e}"),
            })
        })
        .collect()
}

async fn connect_options(settings: &ConnectionSettings) -> InfraResult<ConnectOptions> {
    let mut options = ConnectOptions::new()
        .name("natskv")
        .connection_timeout(settings.timeout)
        .request_timeout(Some(settings.timeout));

    match (&settings.user, &settings.password) {
        (Some(user), Some(password)) => {
            options = options.user_and_password(user.clone(), password.clone());
        }
        // A user without a password is a token
        (Some(token), None) => options = options.token(token.clone()),
        _ => {}
    }

    if let Some(creds) = &settings.creds {
        options = options
            .credentials_file(creds)
            .await
            .map_err(|e| InfraError::io(format!("read credentials {}", creds.display()), e))?;
    }

    if let Some(nkey) = &settings.nkey {
        let seed = std::fs::read_to_string(nkey)
            .map_err(|e| InfraError::io(format!("read nkey seed {}", nkey.display()), e))?;
        options = options.nkey(seed.trim().to_string());
    }

    match (&settings.tls_cert, &settings.tls_key) {
        (Some(cert), Some(key)) => {
            options = options.add_client_certificate(cert.clone(), key.clone());
        }
        (None, None) => {}
        _ => {
            return Err(InfraError::Connect {
                servers: settings.servers.clone(),
                message: "--tlscert and --tlskey must be given together".to_string(),
            })
        }
    }
    if let Some(ca) = &settings.tls_ca {
        options = options.add_root_certificates(ca.clone());
    }
    if settings.tls_cert.is_some() || settings.tls_ca.is_some() {
        options = options.require_tls(true);
    }

    Ok(options)
}

fn to_entry(e: kv::Entry) -> Entry {
    let created = DateTime::<Utc>::from_timestamp(e.created.unix_timestamp(), e.created.nanosecond())
        .unwrap_or_default();
    let operation = match e.operation {
        kv::Operation::Put => Operation::Put,
        kv::Operation::Delete => Operation::Delete,
        kv::Operation::Purge => Operation::Purge,
    };
    Entry {
        bucket: e.bucket,
        key: e.key,
        value: e.value.to_vec(),
        revision: e.revision,
        delta: e.delta,
        created,
        operation,
    }
}
