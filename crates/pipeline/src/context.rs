use http::Extensions;

/// Request-scoped state threaded through every pipeline stage.
///
/// A fresh, empty `Context` is created for each request. Stages read from it or hand a
/// modified copy onward (pre-processors return it through
/// [`PreProcessStatus::Replace`](crate::processor::PreProcessStatus::Replace)); nothing in a
/// context outlives the request it was created for.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Extensions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    /// Returns a copy of this context with `value` inserted.
    #[must_use]
    pub fn with<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(value);
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.values.get_mut()
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values.remove()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.get::<T>().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
