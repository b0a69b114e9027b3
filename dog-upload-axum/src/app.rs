use axum::handler::Handler;
use axum::http::HeaderName;
use axum::routing::get;
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::{rest, UploadState};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// An axum application serving upload endpoints
#[derive(Clone)]
pub struct UploadApp {
    pub state: UploadState,
    router: Router<()>,
}

impl UploadApp {
    pub fn new(state: UploadState) -> Self {
        Self {
            state,
            router: Router::new(),
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Mount upload routes at `path`
    pub fn use_uploads(self, path: &str) -> Self {
        let router = rest::upload_router(self.state.clone());
        self.use_router(path, router)
    }

    pub fn service<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// The finished router with tracing and request-id propagation
    pub fn into_router(self) -> Router<()> {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
        self.router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "upload server listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}
