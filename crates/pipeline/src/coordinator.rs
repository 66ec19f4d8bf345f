//! The request-handling coordinator.
//!
//! For every request the [`Coordinator`] runs, in order:
//! 1. the pre-processor chain on a fresh [`Context`],
//! 2. route resolution on the latest request,
//! 3. the post-processor chain on the writer, exactly once,
//! 4. the handler of the resolved variant, or the failure handler.
//!
//! Every path hands the post-processed writer to exactly one party that owns its terminal
//! action. For the params-with-body variant that party is the returned [`BodyAssembler`].

use crate::body::BodyAssembler;
use crate::extract::ParamSources;
use crate::handler::{FailureHandler, HandlerVariant, NotFound, ProcessingMode};
use crate::processor::{PostProcessor, PostProcessors, PreProcessor, PreProcessors};
use crate::router::RouteResolver;
use crate::writer::BoxResponseWriter;
use crate::{Context, RequestHeader};
use bytes::Bytes;
use http_body::Body;
use std::fmt::Display;
use thiserror::Error;
use tracing::{debug, warn};

/// Drives one request through hooks, routing and the resolved handler.
///
/// Built with [`Coordinator::builder`]; immutable afterwards and shared between requests.
pub struct Coordinator {
    pre_processors: PreProcessors,
    post_processors: PostProcessors,
    resolver: Box<dyn RouteResolver>,
    failure_handler: Box<dyn FailureHandler>,
    max_body_size: Option<usize>,
}

/// The outcome of [`Coordinator::dispatch`].
#[derive(Debug)]
pub enum Dispatch {
    /// A handler (or the failure handler) was invoked and declared this processing mode.
    Handled(ProcessingMode),
    /// The route needs the request body; feed its chunks into the assembler.
    AwaitBody(BodyAssembler),
}

impl Coordinator {
    /// Starts registering hooks and collaborators.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Runs the pipeline up to the point where the request body is needed.
    ///
    /// Dropping a returned [`Dispatch::AwaitBody`] before the body ended aborts the writer.
    pub async fn dispatch(&self, request: RequestHeader, writer: BoxResponseWriter) -> Dispatch {
        let (request, context) = self.pre_processors.run(request, Context::new()).await;
        let route = self.resolver.route(&request);
        let writer = self.post_processors.run(&request, &context, writer);

        let Some(route) = route else {
            debug!(method = %request.method(), path = %request.path(), "no route matched");
            return Dispatch::Handled(self.failure_handler.serve(request, context, writer).await);
        };

        let (variant, path_params, query, remainder) = route.into_parts();
        match variant {
            HandlerVariant::NoParams(handler) => Dispatch::Handled(handler.serve(request, context, writer).await),

            HandlerVariant::Params(endpoint) => {
                let sources = ParamSources::new(path_params.as_ref(), query.as_ref(), request.headers());
                let mode = match endpoint.prepare(&sources) {
                    Ok(call) => call(request, context, writer).await,
                    Err(e) => {
                        warn!(path = %request.path(), cause = %e, "failed to build handler parameters");
                        self.failure_handler.serve(request, context, writer).await
                    }
                };
                Dispatch::Handled(mode)
            }

            HandlerVariant::ParamsWithBody(endpoint) => {
                let assembler = BodyAssembler::new(request, context, endpoint, writer)
                    .with_params(path_params, query)
                    .with_limit(self.max_body_size);
                Dispatch::AwaitBody(assembler)
            }

            HandlerVariant::Files(server) => {
                let path = remainder.unwrap_or_else(|| "/".to_string());
                Dispatch::Handled(server.serve(request, context, path, writer).await)
            }
        }
    }

    /// Runs the whole pipeline, consuming `body` when the resolved handler needs it.
    ///
    /// A body that is not needed is left untouched.
    pub async fn handle<B>(&self, request: RequestHeader, body: B, writer: BoxResponseWriter) -> ProcessingMode
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        match self.dispatch(request, writer).await {
            Dispatch::Handled(mode) => mode,
            Dispatch::AwaitBody(assembler) => {
                assembler.consume(body).await;
                ProcessingMode::Completed
            }
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("pre_processors", &self.pre_processors)
            .field("post_processors", &self.post_processors)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

/// Why [`CoordinatorBuilder::build`] refused to build.
#[derive(Error, Debug)]
pub enum CoordinatorBuildError {
    #[error("a route resolver is required")]
    MissingResolver,
}

/// Registers hooks and collaborators before serving starts.
///
/// Hooks are append-only and run in registration order.
pub struct CoordinatorBuilder {
    pre_processors: PreProcessors,
    post_processors: PostProcessors,
    resolver: Option<Box<dyn RouteResolver>>,
    failure_handler: Option<Box<dyn FailureHandler>>,
    max_body_size: Option<usize>,
}

impl std::fmt::Debug for CoordinatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorBuilder")
            .field("pre_processors", &self.pre_processors)
            .field("post_processors", &self.post_processors)
            .field("resolver", &self.resolver.is_some())
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

impl CoordinatorBuilder {
    fn new() -> Self {
        Self {
            pre_processors: PreProcessors::new(),
            post_processors: PostProcessors::new(),
            resolver: None,
            failure_handler: None,
            max_body_size: None,
        }
    }

    /// Sets the route resolver, the only required collaborator.
    pub fn resolver<R: RouteResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Replaces the default [`NotFound`] failure handler.
    pub fn failure_handler<F: FailureHandler + 'static>(mut self, failure_handler: F) -> Self {
        self.failure_handler = Some(Box::new(failure_handler));
        self
    }

    /// Appends a pre-processor to the end of the chain.
    pub fn add_pre_processor<P: PreProcessor + 'static>(mut self, processor: P) -> Self {
        self.pre_processors.push(Box::new(processor));
        self
    }

    /// Appends a post-processor; the last one registered wraps the writer outermost.
    pub fn add_post_processor<P: PostProcessor + 'static>(mut self, processor: P) -> Self {
        self.post_processors.push(Box::new(processor));
        self
    }

    /// Limits the size of request bodies buffered for the params-with-body variant.
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = Some(limit);
        self
    }

    /// Fails with [`CoordinatorBuildError::MissingResolver`] when no resolver was set.
    pub fn build(self) -> Result<Coordinator, CoordinatorBuildError> {
        let resolver = self.resolver.ok_or(CoordinatorBuildError::MissingResolver)?;
        let failure_handler = self.failure_handler.unwrap_or_else(|| Box::new(NotFound));

        Ok(Coordinator {
            pre_processors: self.pre_processors,
            post_processors: self.post_processors,
            resolver,
            failure_handler,
            max_body_size: self.max_body_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{AssemblerState, BodyError, ChunkEvent, Flow};
    use crate::extract::Query;
    use crate::handler::{BodyHandler, FileServer, ParamsHandler, RequestHandler};
    use crate::processor::{PostProcessStatus, PreProcessStatus, post_fn, pre_fn};
    use crate::request::QueryParams;
    use crate::router::{MockRouteResolver, RouteMatch};
    use crate::writer::testing::{Recorder, WriterEvent};
    use crate::writer::{ResponseWriter, WriteError, respond};
    use async_trait::async_trait;
    use http::{HeaderMap, HeaderValue, Request, StatusCode, header};
    use http_body_util::Full;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Marks every header written through it, so tests can see the post-processed writer.
    struct Marked {
        inner: BoxResponseWriter,
    }

    #[async_trait]
    impl ResponseWriter for Marked {
        fn write_header(&mut self, status: StatusCode, mut headers: HeaderMap) -> Result<(), WriteError> {
            headers.insert("x-post", HeaderValue::from_static("marked"));
            self.inner.write_header(status, headers)
        }

        async fn write_body(&mut self, data: Bytes) -> Result<(), WriteError> {
            self.inner.write_body(data).await
        }

        fn done(self: Box<Self>) {
            self.inner.done()
        }

        fn abort(self: Box<Self>) {
            self.inner.abort()
        }
    }

    fn marking() -> impl PostProcessor {
        post_fn(|_, _, writer| PostProcessStatus::Replace(Box::new(Marked { inner: writer })))
    }

    #[derive(Clone, Default)]
    struct CountingFailure {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FailureHandler for CountingFailure {
        async fn serve(&self, _request: RequestHeader, _context: Context, writer: BoxResponseWriter) -> ProcessingMode {
            self.calls.fetch_add(1, Ordering::SeqCst);
            respond(writer, StatusCode::IM_A_TEAPOT, HeaderMap::new(), None).await;
            ProcessingMode::Completed
        }
    }

    struct Hello;

    #[async_trait]
    impl RequestHandler for Hello {
        async fn serve(&self, request: RequestHeader, _context: Context, writer: BoxResponseWriter) -> ProcessingMode {
            respond(writer, StatusCode::OK, HeaderMap::new(), Some(Bytes::from(format!("hello {}", request.path())))).await;
            ProcessingMode::Completed
        }
    }

    /// Keeps the writer and completes it from a spawned task.
    struct Later;

    #[async_trait]
    impl RequestHandler for Later {
        async fn serve(&self, _request: RequestHeader, _context: Context, writer: BoxResponseWriter) -> ProcessingMode {
            tokio::spawn(respond(writer, StatusCode::ACCEPTED, HeaderMap::new(), None));
            ProcessingMode::Pending
        }
    }

    #[derive(Deserialize)]
    struct Name {
        name: String,
    }

    struct Greeter;

    #[async_trait]
    impl ParamsHandler for Greeter {
        type Params = Query<Name>;

        async fn serve(
            &self,
            _request: RequestHeader,
            _context: Context,
            Query(name): Query<Name>,
            writer: BoxResponseWriter,
        ) -> ProcessingMode {
            respond(writer, StatusCode::OK, HeaderMap::new(), Some(Bytes::from(format!("hi {}", name.name)))).await;
            ProcessingMode::Completed
        }
    }

    struct Echo;

    impl BodyHandler for Echo {
        type Params = String;
        type Response = String;

        fn serve(&self, _request: &RequestHeader, _context: &Context, body: String) -> (StatusCode, HeaderMap, String) {
            (StatusCode::OK, HeaderMap::new(), body)
        }
    }

    #[derive(Deserialize)]
    struct Payload {
        #[allow(dead_code, reason = "only decoded")]
        value: u32,
    }

    struct Strict;

    impl BodyHandler for Strict {
        type Params = crate::extract::Json<Payload>;
        type Response = ();

        fn serve(&self, _request: &RequestHeader, _context: &Context, _payload: Self::Params) -> (StatusCode, HeaderMap, ()) {
            (StatusCode::OK, HeaderMap::new(), ())
        }
    }

    struct Files;

    #[async_trait]
    impl FileServer for Files {
        async fn serve(&self, _request: RequestHeader, _context: Context, path: String, writer: BoxResponseWriter) -> ProcessingMode {
            respond(writer, StatusCode::OK, HeaderMap::new(), Some(Bytes::from(path))).await;
            ProcessingMode::Completed
        }
    }

    fn resolving(route: Option<RouteMatch>) -> MockRouteResolver {
        let mut resolver = MockRouteResolver::new();
        resolver.expect_route().times(1).returning(move |_| route.clone());
        resolver
    }

    fn coordinator(resolver: MockRouteResolver, failure: &CountingFailure) -> Coordinator {
        Coordinator::builder()
            .resolver(resolver)
            .failure_handler(failure.clone())
            .add_post_processor(marking())
            .build()
            .unwrap()
    }

    fn request(uri: &str) -> RequestHeader {
        Request::builder().uri(uri).body(()).unwrap().into()
    }

    fn header_of(recorder: &Recorder) -> (StatusCode, HeaderMap) {
        match &recorder.events()[0] {
            WriterEvent::Header(status, headers) => (*status, headers.clone()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn resolver_is_required() {
        assert!(matches!(Coordinator::builder().build(), Err(CoordinatorBuildError::MissingResolver)));
    }

    #[tokio::test]
    async fn route_miss_goes_to_failure_handler_with_post_processed_writer() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(None), &failure);
        let recorder = Recorder::default();

        let dispatch = coordinator.dispatch(request("/missing"), Box::new(recorder.writer())).await;

        assert!(matches!(dispatch, Dispatch::Handled(ProcessingMode::Completed)));
        assert_eq!(failure.calls.load(Ordering::SeqCst), 1);
        let (status, headers) = header_of(&recorder);
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
        assert_eq!(headers["x-post"], "marked");
        assert_eq!(recorder.terminal_count(), 1);
    }

    #[tokio::test]
    async fn default_failure_handler_is_not_found() {
        let coordinator = Coordinator::builder().resolver(resolving(None)).build().unwrap();
        let recorder = Recorder::default();

        coordinator.dispatch(request("/missing"), Box::new(recorder.writer())).await;

        assert_eq!(header_of(&recorder).0, StatusCode::NOT_FOUND);
        assert_eq!(recorder.terminal_count(), 1);
    }

    #[tokio::test]
    async fn resolution_sees_pre_processed_request() {
        let mut resolver = MockRouteResolver::new();
        resolver
            .expect_route()
            .withf(|request| request.path() == "/rewritten")
            .times(1)
            .returning(|_| Some(RouteMatch::new(HandlerVariant::no_params(Hello))));

        let coordinator = Coordinator::builder()
            .resolver(resolver)
            .add_pre_processor(pre_fn(|_, context| PreProcessStatus::Replace(request("/rewritten"), context.clone())))
            .build()
            .unwrap();
        let recorder = Recorder::default();

        coordinator.dispatch(request("/original"), Box::new(recorder.writer())).await;

        assert_eq!(recorder.body(), b"hello /rewritten");
    }

    #[tokio::test]
    async fn no_params_handler_declares_its_mode() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(Some(RouteMatch::new(HandlerVariant::no_params(Later)))), &failure);
        let recorder = Recorder::default();

        let dispatch = coordinator.dispatch(request("/later"), Box::new(recorder.writer())).await;
        assert!(matches!(dispatch, Dispatch::Handled(ProcessingMode::Pending)));

        for _ in 0..100 {
            if recorder.terminal_count() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(recorder.terminal_count(), 1);
        assert_eq!(header_of(&recorder).1["x-post"], "marked");
    }

    #[tokio::test]
    async fn params_handler_receives_built_params() {
        let failure = CountingFailure::default();
        let route = RouteMatch::new(HandlerVariant::params(Greeter)).with_query(QueryParams::parse("name=micro"));
        let coordinator = coordinator(resolving(Some(route)), &failure);
        let recorder = Recorder::default();

        coordinator.dispatch(request("/greet?name=micro"), Box::new(recorder.writer())).await;

        assert_eq!(failure.calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.body(), b"hi micro");
        assert_eq!(header_of(&recorder).1["x-post"], "marked");
    }

    #[tokio::test]
    async fn params_failure_goes_to_failure_handler() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(Some(RouteMatch::new(HandlerVariant::params(Greeter)))), &failure);
        let recorder = Recorder::default();

        coordinator.dispatch(request("/greet"), Box::new(recorder.writer())).await;

        assert_eq!(failure.calls.load(Ordering::SeqCst), 1);
        let (status, headers) = header_of(&recorder);
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
        assert_eq!(headers["x-post"], "marked");
        assert_eq!(recorder.terminal_count(), 1);
    }

    #[tokio::test]
    async fn file_server_gets_remainder_or_root() {
        let failure = CountingFailure::default();

        let nested = RouteMatch::new(HandlerVariant::files(Files)).with_remainder("/css/site.css");
        let recorder = Recorder::default();
        coordinator(resolving(Some(nested)), &failure)
            .dispatch(request("/static/css/site.css"), Box::new(recorder.writer()))
            .await;
        assert_eq!(recorder.body(), b"/css/site.css");

        let root = RouteMatch::new(HandlerVariant::files(Files));
        let recorder = Recorder::default();
        coordinator(resolving(Some(root)), &failure).dispatch(request("/static"), Box::new(recorder.writer())).await;
        assert_eq!(recorder.body(), b"/");
    }

    #[tokio::test]
    async fn body_variant_assembles_chunks() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(Some(RouteMatch::new(HandlerVariant::params_with_body(Echo)))), &failure);
        let recorder = Recorder::default();

        let Dispatch::AwaitBody(mut assembler) = coordinator.dispatch(request("/echo"), Box::new(recorder.writer())).await
        else {
            panic!("expected the body variant to wait for the body");
        };
        assert!(recorder.events().is_empty());

        for chunk in ["He", "", "llo"] {
            assert_eq!(assembler.on_event(ChunkEvent::Data(Bytes::from_static(chunk.as_bytes()))).await, Flow::Continue);
        }
        assembler.on_event(ChunkEvent::End).await;

        assert_eq!(recorder.body(), b"Hello");
        assert_eq!(header_of(&recorder).1["x-post"], "marked");
        assert_eq!(recorder.events().iter().filter(|e| **e == WriterEvent::Done).count(), 1);
        assert_eq!(recorder.terminal_count(), 1);
    }

    #[tokio::test]
    async fn body_params_failure_bypasses_failure_handler() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(Some(RouteMatch::new(HandlerVariant::params_with_body(Strict)))), &failure);
        let recorder = Recorder::default();

        let mode = coordinator.handle(request("/strict"), Full::new(Bytes::from_static(b"oops")), Box::new(recorder.writer())).await;

        assert_eq!(mode, ProcessingMode::Completed);
        assert_eq!(failure.calls.load(Ordering::SeqCst), 0);
        let (status, headers) = header_of(&recorder);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers[header::TRANSFER_ENCODING], "chunked");
        assert_eq!(headers["x-post"], "marked");
        assert_eq!(recorder.events().last(), Some(&WriterEvent::Done));
        assert!(!recorder.events().contains(&WriterEvent::Abort));
    }

    #[tokio::test]
    async fn body_error_aborts_and_stops() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(Some(RouteMatch::new(HandlerVariant::params_with_body(Echo)))), &failure);
        let recorder = Recorder::default();

        let Dispatch::AwaitBody(mut assembler) = coordinator.dispatch(request("/echo"), Box::new(recorder.writer())).await
        else {
            panic!("expected the body variant to wait for the body");
        };

        assembler.on_event(ChunkEvent::Data(Bytes::from_static(b"He"))).await;
        assert_eq!(assembler.on_event(ChunkEvent::Error(BodyError::stream("reset"))).await, Flow::Stop);
        assert_eq!(assembler.on_event(ChunkEvent::Data(Bytes::from_static(b"llo"))).await, Flow::Stop);

        assert_eq!(assembler.state(), AssemblerState::Aborted);
        assert_eq!(recorder.events(), vec![WriterEvent::Abort]);
    }

    #[tokio::test]
    async fn dropped_body_dispatch_aborts_writer() {
        let failure = CountingFailure::default();
        let coordinator = coordinator(resolving(Some(RouteMatch::new(HandlerVariant::params_with_body(Echo)))), &failure);
        let recorder = Recorder::default();

        let dispatch = coordinator.dispatch(request("/echo"), Box::new(recorder.writer())).await;
        assert!(matches!(dispatch, Dispatch::AwaitBody(_)));
        drop(dispatch);

        assert_eq!(recorder.terminal_count(), 1);
        assert_eq!(recorder.events(), vec![WriterEvent::Abort]);
    }

    #[tokio::test]
    async fn body_limit_is_applied() {
        let coordinator = Coordinator::builder()
            .resolver(resolving(Some(RouteMatch::new(HandlerVariant::params_with_body(Echo)))))
            .max_body_size(3)
            .build()
            .unwrap();
        let recorder = Recorder::default();

        coordinator.handle(request("/echo"), Full::new(Bytes::from_static(b"Hello")), Box::new(recorder.writer())).await;

        assert_eq!(recorder.events(), vec![WriterEvent::Abort]);
    }
}
