use crate::{Context, RequestHeader};
use futures::channel::oneshot;
use std::future::Future;
use tracing::{trace, warn};

/// Outcome of a single pre-processor invocation.
#[derive(Debug)]
pub enum PreProcessStatus {
    /// The hook does not apply, the current request and context are carried forward.
    NotApplicable,
    /// The hook replaces the request and context for every later stage.
    Replace(RequestHeader, Context),
    /// The hook finishes later through the [`Completer`] paired with this deferral.
    Deferred(Deferral),
}

/// A hook that may inspect or rewrite the request before routing.
///
/// Returning [`PreProcessStatus::Deferred`] suspends the request until the paired
/// [`Completer`] is completed. The coordinator awaits the deferral on the task that runs the
/// pipeline: a completer that is only completed by work waiting on that same task never
/// fires and stalls the request. Work that needs its own execution context should go
/// through [`Deferral::spawn`].
pub trait PreProcessor: Send + Sync {
    fn process(&self, request: &RequestHeader, context: &Context) -> PreProcessStatus;
}

/// Creates a connected completer/deferral pair.
pub fn deferred() -> (Completer, Deferral) {
    let (sender, receiver) = oneshot::channel();
    (Completer { sender }, Deferral { receiver })
}

/// The completion side of a deferred pre-processor.
///
/// Completing consumes the completer, so only one completion is ever honored.
#[derive(Debug)]
pub struct Completer {
    sender: oneshot::Sender<(RequestHeader, Context)>,
}

impl Completer {
    /// Resumes the chain with `request` and `context`.
    pub fn complete(self, request: RequestHeader, context: Context) {
        if self.sender.send((request, context)).is_err() {
            trace!("deferred pre-processor completed after the request was dropped");
        }
    }
}

/// The waiting side of a deferred pre-processor.
#[derive(Debug)]
pub struct Deferral {
    receiver: oneshot::Receiver<(RequestHeader, Context)>,
}

impl Deferral {
    /// Runs `future` on a separate tokio task and completes with its output.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = (RequestHeader, Context)> + Send + 'static,
    {
        let (completer, deferral) = deferred();
        tokio::spawn(async move {
            let (request, context) = future.await;
            completer.complete(request, context);
        });
        deferral
    }

    /// Waits for the completion, `None` when the completer was dropped.
    pub async fn wait(self) -> Option<(RequestHeader, Context)> {
        self.receiver.await.ok()
    }
}

/// The ordered pre-processor chain.
#[derive(Default)]
pub struct PreProcessors {
    inner: Vec<Box<dyn PreProcessor>>,
}

impl PreProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, processor: Box<dyn PreProcessor>) {
        self.inner.push(processor);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Folds the chain over `(request, context)` in registration order.
    ///
    /// A deferred hook is awaited before the next hook runs. When its completer is dropped
    /// without completing, the chain resumes with the request and context it had before
    /// that hook.
    pub async fn run(&self, mut request: RequestHeader, mut context: Context) -> (RequestHeader, Context) {
        for (index, processor) in self.inner.iter().enumerate() {
            match processor.process(&request, &context) {
                PreProcessStatus::NotApplicable => {}
                PreProcessStatus::Replace(new_request, new_context) => {
                    request = new_request;
                    context = new_context;
                }
                PreProcessStatus::Deferred(deferral) => match deferral.wait().await {
                    Some((new_request, new_context)) => {
                        request = new_request;
                        context = new_context;
                    }
                    None => {
                        warn!(index, path = %request.path(), "deferred pre-processor dropped its completer, keep current request");
                    }
                },
            }
        }

        (request, context)
    }
}

impl std::fmt::Debug for PreProcessors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreProcessors").field("len", &self.inner.len()).finish()
    }
}

struct FnPreProcessor<F>(F);

impl<F> PreProcessor for FnPreProcessor<F>
where
    F: Fn(&RequestHeader, &Context) -> PreProcessStatus + Send + Sync,
{
    fn process(&self, request: &RequestHeader, context: &Context) -> PreProcessStatus {
        (self.0)(request, context)
    }
}

/// Adapts a closure into a [`PreProcessor`].
pub fn pre_fn<F>(f: F) -> impl PreProcessor
where
    F: Fn(&RequestHeader, &Context) -> PreProcessStatus + Send + Sync,
{
    FnPreProcessor(f)
}
