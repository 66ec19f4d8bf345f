use crate::writer::BoxResponseWriter;
use crate::{Context, RequestHeader};
use tracing::trace;

/// Outcome of a single post-processor invocation.
///
/// Both variants hand the writer back: a hook that does not apply returns the writer it was
/// given, a hook that applies returns its decorating replacement.
pub enum PostProcessStatus {
    NotApplicable(BoxResponseWriter),
    Replace(BoxResponseWriter),
}

impl std::fmt::Debug for PostProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostProcessStatus::NotApplicable(_) => f.write_str("NotApplicable"),
            PostProcessStatus::Replace(_) => f.write_str("Replace"),
        }
    }
}

/// A hook that may substitute the response writer before the handler writes to it.
///
/// The request and context are read only at this stage.
pub trait PostProcessor: Send + Sync {
    fn process(&self, request: &RequestHeader, context: &Context, writer: BoxResponseWriter) -> PostProcessStatus;
}

/// The ordered post-processor chain.
#[derive(Default)]
pub struct PostProcessors {
    inner: Vec<Box<dyn PostProcessor>>,
}

impl PostProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, processor: Box<dyn PostProcessor>) {
        self.inner.push(processor);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Threads the writer through every hook in registration order.
    pub fn run(&self, request: &RequestHeader, context: &Context, mut writer: BoxResponseWriter) -> BoxResponseWriter {
        for (index, processor) in self.inner.iter().enumerate() {
            writer = match processor.process(request, context, writer) {
                PostProcessStatus::NotApplicable(writer) => writer,
                PostProcessStatus::Replace(writer) => {
                    trace!(index, "post-processor replaced the response writer");
                    writer
                }
            };
        }
        writer
    }
}

impl std::fmt::Debug for PostProcessors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessors").field("len", &self.inner.len()).finish()
    }
}

struct FnPostProcessor<F>(F);

impl<F> PostProcessor for FnPostProcessor<F>
where
    F: Fn(&RequestHeader, &Context, BoxResponseWriter) -> PostProcessStatus + Send + Sync,
{
    fn process(&self, request: &RequestHeader, context: &Context, writer: BoxResponseWriter) -> PostProcessStatus {
        (self.0)(request, context, writer)
    }
}

/// Adapts a closure into a [`PostProcessor`].
pub fn post_fn<F>(f: F) -> impl PostProcessor
where
    F: Fn(&RequestHeader, &Context, BoxResponseWriter) -> PostProcessStatus + Send + Sync,
{
    FnPostProcessor(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::testing::{Recorder, WriterEvent};
    use http::{HeaderMap, Request, StatusCode};

    fn request() -> RequestHeader {
        Request::builder().uri("/").body(()).unwrap().into()
    }

    fn written_by(recorder: &Recorder) -> String {
        match &recorder.events()[0] {
            WriterEvent::Header(_, headers) => headers["x-writer"].to_str().unwrap().to_string(),
            other => panic!("unexpected event {other:?}"),
        }
    }

    fn replace_with(recorder: &Recorder, tag: &'static str) -> impl PostProcessor + use<> {
        let recorder = recorder.clone();
        post_fn(move |_, _, writer| {
            // the replaced writer is finished so nothing leaks
            writer.done();
            PostProcessStatus::Replace(Box::new(recorder.writer().tagged(tag)))
        })
    }

    fn passthrough() -> impl PostProcessor {
        post_fn(|_, _, writer| PostProcessStatus::NotApplicable(writer))
    }

    #[test]
    fn empty_chain_keeps_original_writer() {
        let recorder = Recorder::default();
        let mut writer = PostProcessors::new().run(&request(), &Context::new(), Box::new(recorder.writer()));
        writer.write_header(StatusCode::OK, HeaderMap::new()).unwrap();

        assert_eq!(written_by(&recorder), "origin");
    }

    #[test]
    fn not_applicable_keeps_writer() {
        let recorder = Recorder::default();
        let mut chain = PostProcessors::new();
        chain.push(Box::new(passthrough()));
        chain.push(Box::new(passthrough()));

        let mut writer = chain.run(&request(), &Context::new(), Box::new(recorder.writer()));
        writer.write_header(StatusCode::OK, HeaderMap::new()).unwrap();

        assert_eq!(written_by(&recorder), "origin");
    }

    #[test]
    fn last_replacement_wins() {
        let discarded = Recorder::default();
        let used = Recorder::default();
        let mut chain = PostProcessors::new();
        chain.push(Box::new(replace_with(&discarded, "first")));
        chain.push(Box::new(passthrough()));
        chain.push(Box::new(replace_with(&used, "last")));
        chain.push(Box::new(passthrough()));

        let mut writer = chain.run(&request(), &Context::new(), Box::new(discarded.writer()));
        writer.write_header(StatusCode::OK, HeaderMap::new()).unwrap();

        assert_eq!(written_by(&used), "last");
        assert_eq!(used.events().len(), 1);
    }
}
