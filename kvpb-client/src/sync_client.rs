//! # Blocking Client API
//!
//! Purpose: Offer the typed calls of [`Client`] to code that is not running
//! on an async runtime.
//!
//! `SyncClient` owns a current-thread runtime and runs it until the bound
//! operation finishes. A call blocks its own thread only; other runtimes keep
//! running. Calling it from inside an async task panics, as any nested
//! `block_on` does.

use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::{Builder, Runtime};

use kvpb_common::messages::{BucketProps, GetResp, IndexReq, PutResp, SearchQueryResp};
use kvpb_common::{KvError, KvResult};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::request::Request;
use crate::resolver::{Resolver, SystemResolver};
use crate::response::{IndexResults, MapReducePhase, Response, ServerInfo};

/// Synchronous client with connection pooling.
pub struct SyncClient {
    runtime: Runtime,
    client: Client,
}

impl SyncClient {
    /// Creates a client with default configuration for `host:port`.
    pub fn connect(host: impl Into<String>, port: u16) -> KvResult<Self> {
        Self::with_config(ClientConfig::single(host, port))
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> KvResult<Self> {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    pub fn with_resolver(config: ClientConfig, resolver: Arc<dyn Resolver>) -> KvResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| KvError::EventRegistration(format!("runtime: {}", err)))?;
        let client = runtime.block_on(Client::connect_with_resolver(config, resolver))?;
        Ok(SyncClient { runtime, client })
    }

    /// The async client this wrapper drives.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn execute(&self, request: &Request) -> KvResult<Response> {
        self.runtime.block_on(self.client.execute(request))
    }

    pub fn ping(&self) -> KvResult<()> {
        self.runtime.block_on(self.client.ping())
    }

    pub fn server_info(&self) -> KvResult<ServerInfo> {
        self.runtime.block_on(self.client.server_info())
    }

    pub fn get_client_id(&self) -> KvResult<Bytes> {
        self.runtime.block_on(self.client.get_client_id())
    }

    pub fn set_client_id(&self, client_id: &[u8]) -> KvResult<()> {
        self.runtime.block_on(self.client.set_client_id(client_id))
    }

    pub fn get(&self, bucket: &[u8], key: &[u8]) -> KvResult<GetResp> {
        self.runtime.block_on(self.client.get(bucket, key))
    }

    pub fn put(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> KvResult<PutResp> {
        self.runtime.block_on(self.client.put(bucket, key, value))
    }

    pub fn delete(&self, bucket: &[u8], key: &[u8]) -> KvResult<()> {
        self.runtime.block_on(self.client.delete(bucket, key))
    }

    pub fn list_buckets(&self) -> KvResult<Vec<Bytes>> {
        self.runtime.block_on(self.client.list_buckets())
    }

    pub fn list_keys(&self, bucket: &[u8]) -> KvResult<Vec<Bytes>> {
        self.runtime.block_on(self.client.list_keys(bucket))
    }

    pub fn index_query(&self, query: IndexReq) -> KvResult<IndexResults> {
        self.runtime.block_on(self.client.index_query(query))
    }

    pub fn map_reduce(&self, job: &[u8], content_type: &[u8]) -> KvResult<Vec<MapReducePhase>> {
        self.runtime.block_on(self.client.map_reduce(job, content_type))
    }

    pub fn search(&self, index: &[u8], query: &[u8]) -> KvResult<SearchQueryResp> {
        self.runtime.block_on(self.client.search(index, query))
    }

    pub fn get_bucket_props(&self, bucket: &[u8]) -> KvResult<BucketProps> {
        self.runtime.block_on(self.client.get_bucket_props(bucket))
    }

    pub fn set_bucket_props(&self, bucket: &[u8], props: BucketProps) -> KvResult<()> {
        self.runtime.block_on(self.client.set_bucket_props(bucket, props))
    }

    pub fn reset_bucket_props(&self, bucket: &[u8]) -> KvResult<()> {
        self.runtime.block_on(self.client.reset_bucket_props(bucket))
    }

    pub fn counter_update(&self, bucket: &[u8], key: &[u8], amount: i64) -> KvResult<Option<i64>> {
        self.runtime
            .block_on(self.client.counter_update(bucket, key, amount))
    }

    pub fn counter_get(&self, bucket: &[u8], key: &[u8]) -> KvResult<Option<i64>> {
        self.runtime.block_on(self.client.counter_get(bucket, key))
    }

    pub fn close(&self) {
        self.client.close();
    }
}
