//! # Async Client API
//!
//! Purpose: Expose typed calls for every request kind over a pooled set of
//! connections.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides pooling, framing and decoding.
//! 2. **Borrow-Friendly API**: bucket and key arguments are `&[u8]`.
//! 3. **One Operation Per Checkout**: each call checks out a connection,
//!    drives one operation to completion and returns the connection.
//! 4. **Three Ways To Listen**: awaited typed results, a caller-supplied
//!    `ResponseHandler`, or a channel of per-fragment deliveries.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use kvpb_common::messages::{BucketProps, GetResp, IndexReq, PutResp, SearchQueryResp};
use kvpb_common::{KvError, KvResult};

use crate::accumulator::Delivery;
use crate::config::ClientConfig;
use crate::operation::{Operation, OperationState, ResponseHandler};
use crate::pool::ConnectionPool;
use crate::reactor::OperationDriver;
use crate::request::Request;
use crate::resolver::{Resolver, SystemResolver};
use crate::response::{Fragment, IndexResults, MapReducePhase, Response, ServerInfo};

/// Asynchronous client with connection pooling.
#[derive(Clone)]
pub struct Client {
    pool: ConnectionPool,
    operation_timeout: Option<Duration>,
}

impl Client {
    /// Creates a client; eager pools connect before this returns.
    pub async fn connect(config: ClientConfig) -> KvResult<Self> {
        Self::connect_with_resolver(config, Arc::new(SystemResolver)).await
    }

    /// Creates a client that resolves hosts through `resolver`.
    pub async fn connect_with_resolver(
        config: ClientConfig,
        resolver: Arc<dyn Resolver>,
    ) -> KvResult<Self> {
        let pool = ConnectionPool::with_resolver(&config, resolver).await?;
        Ok(Client {
            pool,
            operation_timeout: config.operation_timeout(),
        })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: ConnectionPool, operation_timeout: Option<Duration>) -> Self {
        Client {
            pool,
            operation_timeout,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Sends `request` and returns its merged response.
    pub async fn execute(&self, request: &Request) -> KvResult<Response> {
        let (tx, rx) = oneshot::channel();
        self.execute_with(request, Delivery::Merged, OneShot(Some(tx)))
            .await?;
        rx.await.unwrap_or_else(|_| {
            Err(KvError::EventRegistration(
                "operation ended without an outcome".to_string(),
            ))
        })
    }

    /// Sends `request` and reports through `handler`.
    ///
    /// Pool and connect failures are returned directly; everything after the
    /// operation is bound goes to the handler.
    pub async fn execute_with<H: ResponseHandler>(
        &self,
        request: &Request,
        delivery: Delivery,
        handler: H,
    ) -> KvResult<OperationState> {
        let mut conn = self.pool.get().await?;
        let mut op = Operation::with_delivery(request, delivery, handler);
        OperationDriver::new(&mut *conn)
            .with_timeout(self.operation_timeout)
            .drive(&mut op)
            .await
    }

    /// Runs `request` on a spawned task; every outcome reaches `handler`.
    pub fn submit<H>(&self, request: Request, delivery: Delivery, mut handler: H) -> JoinHandle<()>
    where
        H: ResponseHandler + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            let mut conn = match client.pool.get().await {
                Ok(conn) => conn,
                Err(err) => {
                    handler.on_error(err);
                    return;
                }
            };
            let mut op = Operation::with_delivery(&request, delivery, handler);
            let driven = OperationDriver::new(&mut *conn)
                .with_timeout(client.operation_timeout)
                .drive(&mut op)
                .await;
            if let Err(err) = driven {
                debug!(error = %err, "submitted operation was not driven");
            }
        })
    }

    /// Streams the fragments of `request` as they arrive.
    ///
    /// The last item is either a fragment with `done = true` or an error.
    pub fn stream(&self, request: Request) -> mpsc::UnboundedReceiver<KvResult<Fragment>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.submit(request, Delivery::PerFragment, ChannelHandler { tx });
        rx
    }

    /// Closes idle connections and refuses new calls.
    pub fn close(&self) {
        self.pool.close();
    }

    pub async fn ping(&self) -> KvResult<()> {
        match self.execute(&Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn server_info(&self) -> KvResult<ServerInfo> {
        match self.execute(&Request::ServerInfo).await? {
            Response::ServerInfo(info) => Ok(info),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn get_client_id(&self) -> KvResult<Bytes> {
        match self.execute(&Request::GetClientId).await? {
            Response::ClientId(id) => Ok(id),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn set_client_id(&self, client_id: &[u8]) -> KvResult<()> {
        let request = Request::set_client_id(Bytes::copy_from_slice(client_id));
        expect_ack(self.execute(&request).await?)
    }

    /// Fetches an object; an empty `content` list means the key is missing.
    pub async fn get(&self, bucket: &[u8], key: &[u8]) -> KvResult<GetResp> {
        let request = Request::get(Bytes::copy_from_slice(bucket), Bytes::copy_from_slice(key));
        match self.execute(&request).await? {
            Response::Object(object) => Ok(object),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn put(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> KvResult<PutResp> {
        let request = Request::put(
            Bytes::copy_from_slice(bucket),
            Bytes::copy_from_slice(key),
            Bytes::copy_from_slice(value),
        );
        match self.execute(&request).await? {
            Response::Stored(stored) => Ok(stored),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn delete(&self, bucket: &[u8], key: &[u8]) -> KvResult<()> {
        let request =
            Request::delete(Bytes::copy_from_slice(bucket), Bytes::copy_from_slice(key));
        expect_ack(self.execute(&request).await?)
    }

    pub async fn list_buckets(&self) -> KvResult<Vec<Bytes>> {
        self.execute(&Request::list_buckets()).await?.into_buckets()
    }

    pub async fn list_keys(&self, bucket: &[u8]) -> KvResult<Vec<Bytes>> {
        self.execute(&Request::list_keys(Bytes::copy_from_slice(bucket)))
            .await?
            .into_keys()
    }

    pub async fn index_query(&self, query: IndexReq) -> KvResult<IndexResults> {
        match self.execute(&Request::IndexQuery(query)).await? {
            Response::Index(results) => Ok(results),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn map_reduce(
        &self,
        job: &[u8],
        content_type: &[u8],
    ) -> KvResult<Vec<MapReducePhase>> {
        let request = Request::map_reduce(
            Bytes::copy_from_slice(job),
            Bytes::copy_from_slice(content_type),
        );
        match self.execute(&request).await? {
            Response::MapReduce(phases) => Ok(phases),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn search(&self, index: &[u8], query: &[u8]) -> KvResult<SearchQueryResp> {
        let request = Request::search(Bytes::copy_from_slice(index), Bytes::copy_from_slice(query));
        match self.execute(&request).await? {
            Response::Search(results) => Ok(results),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn get_bucket_props(&self, bucket: &[u8]) -> KvResult<BucketProps> {
        match self
            .execute(&Request::get_bucket_props(Bytes::copy_from_slice(bucket)))
            .await?
        {
            Response::BucketProps(props) => Ok(props),
            _ => Err(KvError::UnexpectedResponse),
        }
    }

    pub async fn set_bucket_props(&self, bucket: &[u8], props: BucketProps) -> KvResult<()> {
        let request = Request::set_bucket_props(Bytes::copy_from_slice(bucket), props);
        expect_ack(self.execute(&request).await?)
    }

    pub async fn reset_bucket_props(&self, bucket: &[u8]) -> KvResult<()> {
        let request = Request::reset_bucket_props(Bytes::copy_from_slice(bucket));
        expect_ack(self.execute(&request).await?)
    }

    /// Adds `amount` to a counter and returns the new value when reported.
    pub async fn counter_update(
        &self,
        bucket: &[u8],
        key: &[u8],
        amount: i64,
    ) -> KvResult<Option<i64>> {
        let request = Request::counter_update(
            Bytes::copy_from_slice(bucket),
            Bytes::copy_from_slice(key),
            amount,
        );
        expect_counter(self.execute(&request).await?)
    }

    pub async fn counter_get(&self, bucket: &[u8], key: &[u8]) -> KvResult<Option<i64>> {
        let request =
            Request::counter_get(Bytes::copy_from_slice(bucket), Bytes::copy_from_slice(key));
        expect_counter(self.execute(&request).await?)
    }
}

fn expect_ack(response: Response) -> KvResult<()> {
    match response {
        Response::Ack => Ok(()),
        _ => Err(KvError::UnexpectedResponse),
    }
}

fn expect_counter(response: Response) -> KvResult<Option<i64>> {
    match response {
        Response::Counter(value) => Ok(value),
        _ => Err(KvError::UnexpectedResponse),
    }
}

/// Forwards the single merged outcome to an awaiting caller.
struct OneShot(Option<oneshot::Sender<KvResult<Response>>>);

impl ResponseHandler for OneShot {
    fn on_response(&mut self, response: Response, done: bool) {
        if done {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(Ok(response));
            }
        }
    }

    fn on_error(&mut self, error: KvError) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(Err(error));
        }
    }
}

/// Forwards every fragment to a channel.
struct ChannelHandler {
    tx: mpsc::UnboundedSender<KvResult<Fragment>>,
}

impl ResponseHandler for ChannelHandler {
    fn on_response(&mut self, response: Response, done: bool) {
        if self.tx.send(Ok(Fragment { response, done })).is_err() {
            debug!("stream receiver dropped; discarding fragment");
        }
    }

    fn on_error(&mut self, error: KvError) {
        if self.tx.send(Err(error)).is_err() {
            debug!("stream receiver dropped; discarding error");
        }
    }
}
