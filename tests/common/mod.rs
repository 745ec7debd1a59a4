//! Shared utilities for integration testing: a real gRPC coffeeshop backend
//! and a helper to run the gateway in front of it.

#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, StreamExt};
use prost::Message;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::body::BoxBody;
use tonic::metadata::MetadataMap;
use tonic::server::{Grpc, NamedService, ServerStreamingService, UnaryService};
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tower::Service;

use grpc_json_gateway::config::GatewayConfig;
use grpc_json_gateway::lifecycle::{Gateway, Phase, Shutdown};
use grpc_json_gateway::net;
use grpc_json_gateway::routing::{
    MethodRegistry, RegistrationError, RouteBinding, ServiceRegistration,
};
use grpc_json_gateway::rpc::RawCodec;
use grpc_json_gateway::services::counter::{
    CommandItem, GetListOrderFulfillmentResponse, LineItemDto, OrderDto, PlaceOrderRequest,
    PlaceOrderResponse,
};
use grpc_json_gateway::services::product::{
    GetItemTypesRequest, GetItemTypesResponse, GetItemsByTypeRequest, GetItemsByTypeResponse,
    ItemDto, ItemTypeDto,
};
use grpc_json_gateway::services::{counter, product};

/// Gap between streamed messages; the first one is sent immediately.
pub const STREAM_PACE: Duration = Duration::from_millis(400);

pub const PRODUCT_SERVICE: &str = "go.coffeeshop.proto.productapi.ProductService";
pub const COUNTER_SERVICE: &str = "go.coffeeshop.proto.counterapi.CounterService";

/// Test-only streaming binding over the product service.
pub fn stream_service(registry: &mut MethodRegistry) -> Result<(), RegistrationError> {
    registry.register(RouteBinding::server_streaming::<GetItemTypesRequest, ItemTypeDto>(
        http::Method::GET,
        "/v1/api/item-types/stream",
        &format!("/{}/StreamItemTypes", PRODUCT_SERVICE),
    )?)
}

pub const SERVICES: &[ServiceRegistration] =
    &[product::register, counter::register, stream_service];

// ============================================================================
// Backend
// ============================================================================

/// What the backend has seen.
#[derive(Default)]
pub struct BackendState {
    pub calls: Mutex<Vec<(String, MetadataMap)>>,
    pub orders: Mutex<Vec<PlaceOrderRequest>>,
}

impl BackendState {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_metadata(&self) -> MetadataMap {
        self.calls.lock().unwrap().last().map(|(_, m)| m.clone()).unwrap_or_default()
    }

    fn record<T>(&self, method: &str, request: &Request<T>) {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), request.metadata().clone()));
    }
}

pub fn item_types() -> Vec<ItemTypeDto> {
    vec![
        ItemTypeDto {
            name: "CAPPUCCINO".into(),
            r#type: 0,
            price: 4.5,
            image: "img/CAPPUCCINO.png".into(),
        },
        ItemTypeDto {
            name: "ESPRESSO".into(),
            r#type: 2,
            price: 3.0,
            image: "img/ESPRESSO.png".into(),
        },
        ItemTypeDto {
            name: "CROISSANT".into(),
            r#type: 7,
            price: 3.25,
            image: "img/CROISSANT.png".into(),
        },
    ]
}

struct Unary<F>(F);

impl<F, Fut> UnaryService<Bytes> for Unary<F>
where
    F: FnMut(Request<Bytes>) -> Fut,
    Fut: Future<Output = Result<Response<Bytes>, Status>>,
{
    type Response = Bytes;
    type Future = Fut;

    fn call(&mut self, request: Request<Bytes>) -> Fut {
        (self.0)(request)
    }
}

type ByteStream = BoxStream<'static, Result<Bytes, Status>>;

struct Streaming<F>(F);

impl<F, Fut> ServerStreamingService<Bytes> for Streaming<F>
where
    F: FnMut(Request<Bytes>) -> Fut,
    Fut: Future<Output = Result<Response<ByteStream>, Status>>,
{
    type Response = Bytes;
    type ResponseStream = ByteStream;
    type Future = Fut;

    fn call(&mut self, request: Request<Bytes>) -> Fut {
        (self.0)(request)
    }
}

type HttpFuture = BoxFuture<'static, Result<http::Response<BoxBody>, Infallible>>;

fn unary<F, Fut>(request: http::Request<BoxBody>, handler: F) -> HttpFuture
where
    F: FnMut(Request<Bytes>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Response<Bytes>, Status>> + Send + 'static,
{
    Box::pin(async move {
        let mut grpc = Grpc::new(RawCodec);
        Ok(grpc.unary(Unary(handler), request).await)
    })
}

fn streaming<F, Fut>(request: http::Request<BoxBody>, handler: F) -> HttpFuture
where
    F: FnMut(Request<Bytes>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Response<ByteStream>, Status>> + Send + 'static,
{
    Box::pin(async move {
        let mut grpc = Grpc::new(RawCodec);
        Ok(grpc.server_streaming(Streaming(handler), request).await)
    })
}

fn unimplemented() -> HttpFuture {
    Box::pin(async move {
        let mut response = http::Response::new(tonic::codegen::empty_body());
        response
            .headers_mut()
            .insert("grpc-status", (tonic::Code::Unimplemented as i32).into());
        response
            .headers_mut()
            .insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/grpc"));
        Ok(response)
    })
}

fn decode<M: Message + Default>(bytes: Bytes) -> Result<M, Status> {
    M::decode(bytes).map_err(|e| Status::invalid_argument(e.to_string()))
}

fn encode<M: Message>(message: &M) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

#[derive(Clone)]
struct ProductBackend(Arc<BackendState>);

impl NamedService for ProductBackend {
    const NAME: &'static str = PRODUCT_SERVICE;
}

impl Service<http::Request<BoxBody>> for ProductBackend {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = HttpFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<BoxBody>) -> Self::Future {
        let state = self.0.clone();
        let method = request.uri().path().rsplit('/').next().unwrap_or_default().to_string();

        match method.as_str() {
            "GetItemTypes" => unary(request, move |req| {
                let state = state.clone();
                async move {
                    state.record("GetItemTypes", &req);
                    let _: GetItemTypesRequest = decode(req.into_inner())?;
                    Ok(Response::new(encode(&GetItemTypesResponse {
                        item_types: item_types(),
                    })))
                }
            }),
            "GetItemsByType" => unary(request, move |req| {
                let state = state.clone();
                async move {
                    state.record("GetItemsByType", &req);
                    let request: GetItemsByTypeRequest = decode(req.into_inner())?;
                    let mut items = Vec::new();
                    for raw in request.item_types.split(',') {
                        let kind: i32 = raw
                            .trim()
                            .parse()
                            .map_err(|_| {
                                Status::invalid_argument(format!("bad item type {raw:?}"))
                            })?;
                        let dto = item_types()
                            .into_iter()
                            .find(|t| t.r#type == kind)
                            .ok_or_else(|| {
                                Status::not_found(format!("item type {kind} not found"))
                            })?;
                        items.push(ItemDto {
                            price: dto.price,
                            r#type: dto.r#type,
                        });
                    }
                    Ok(Response::new(encode(&GetItemsByTypeResponse { items })))
                }
            }),
            "StreamItemTypes" => streaming(request, move |req| {
                let state = state.clone();
                async move {
                    state.record("StreamItemTypes", &req);
                    let messages = item_types().into_iter().map(|t| Ok::<_, Status>(encode(&t)));
                    let stream = stream::iter(messages.enumerate())
                        .then(|(i, item)| async move {
                            if i > 0 {
                                tokio::time::sleep(STREAM_PACE).await;
                            }
                            item
                        })
                        .boxed();
                    Ok(Response::new(stream))
                }
            }),
            _ => unimplemented(),
        }
    }
}

#[derive(Clone)]
struct CounterBackend(Arc<BackendState>);

impl NamedService for CounterBackend {
    const NAME: &'static str = COUNTER_SERVICE;
}

impl Service<http::Request<BoxBody>> for CounterBackend {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = HttpFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<BoxBody>) -> Self::Future {
        let state = self.0.clone();
        let method = request.uri().path().rsplit('/').next().unwrap_or_default().to_string();

        match method.as_str() {
            "PlaceOrder" => unary(request, move |req| {
                let state = state.clone();
                async move {
                    state.record("PlaceOrder", &req);
                    let order: PlaceOrderRequest = decode(req.into_inner())?;
                    let id = {
                        let mut orders = state.orders.lock().unwrap();
                        orders.push(order);
                        orders.len()
                    };
                    let mut response = Response::new(encode(&PlaceOrderResponse {}));
                    response
                        .metadata_mut()
                        .insert("x-order-id", format!("order-{id}").parse().unwrap());
                    Ok(response)
                }
            }),
            "GetListOrderFulfillment" => unary(request, move |req| {
                let state = state.clone();
                async move {
                    state.record("GetListOrderFulfillment", &req);
                    let orders = state
                        .orders
                        .lock()
                        .unwrap()
                        .iter()
                        .enumerate()
                        .map(|(i, order)| OrderDto {
                            id: format!("order-{}", i + 1),
                            order_source: order.order_source,
                            loyalty_member_id: order.loyalty_member_id.clone(),
                            order_status: 1,
                            location: order.location,
                            line_items: order
                                .barista_items
                                .iter()
                                .map(|CommandItem { item_type }| LineItemDto {
                                    id: String::new(),
                                    item_type: *item_type,
                                    name: String::new(),
                                    price: 0.0,
                                    item_status: 0,
                                    is_barista_order: true,
                                })
                                .collect(),
                        })
                        .collect();
                    Ok(Response::new(encode(&GetListOrderFulfillmentResponse { orders })))
                }
            }),
            _ => unimplemented(),
        }
    }
}

/// A running backend; dropping it leaves the server task running until the
/// test runtime ends, `stop` ends it early.
pub struct TestBackend {
    pub state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl TestBackend {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

/// Start the coffeeshop backend on an ephemeral TCP port.
pub async fn start_tcp_backend() -> (SocketAddr, TestBackend) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(BackendState::default());

    let router = Server::builder()
        .add_service(ProductBackend(state.clone()))
        .add_service(CounterBackend(state.clone()));
    let handle = tokio::spawn(async move {
        let _ = router.serve_with_incoming(TcpListenerStream::new(listener)).await;
    });

    (addr, TestBackend { state, handle })
}

/// Start the coffeeshop backend on a Unix domain socket at `path`.
pub async fn start_unix_backend(path: &Path) -> TestBackend {
    let listener = UnixListener::bind(path).unwrap();
    let state = Arc::new(BackendState::default());

    let router = Server::builder()
        .add_service(ProductBackend(state.clone()))
        .add_service(CounterBackend(state.clone()));
    let handle = tokio::spawn(async move {
        let _ = router.serve_with_incoming(UnixListenerStream::new(listener)).await;
    });

    TestBackend { state, handle }
}

// ============================================================================
// Gateway
// ============================================================================

pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.backend.connect_timeout_secs = 2;
    config.timeouts.shutdown_grace_secs = 2;
    config
}

pub fn tcp_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = base_config();
    config.backend.transport = "tcp".into();
    config.backend.host = backend.ip().to_string();
    config.backend.port = backend.port();
    config
}

pub fn unix_config(socket: &Path) -> GatewayConfig {
    let mut config = base_config();
    config.backend.transport = "unix".into();
    config.backend.path = Some(socket.to_path_buf());
    config
}

pub struct RunningGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub phase: watch::Receiver<Phase>,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the gateway to finish.
    pub async fn stop(self) -> Result<(), std::io::Error> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("gateway did not stop")
            .unwrap()
    }
}

/// Connect, register and serve on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let gateway = Gateway::initialize(config, SERVICES).await.unwrap();
    let listener = net::bind(&gateway.config().listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut phase = gateway.phase();
    let shutdown = Shutdown::new();

    let handle = tokio::spawn(gateway.serve(listener, shutdown.clone()));
    phase.wait_for(|p| *p == Phase::Serving).await.unwrap();

    RunningGateway {
        addr,
        shutdown,
        phase,
        handle,
    }
}
