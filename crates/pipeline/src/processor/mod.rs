//! Hook chains run around routing.
//!
//! - [`PreProcessor`]s run before route resolution and may replace the request and its
//!   context, immediately or through a [`Deferral`].
//! - [`PostProcessor`]s run once per request before any handler writes, and may replace the
//!   response writer with a decorating one.
//!
//! Both chains are assembled while the coordinator is built and never change afterward, so
//! concurrent requests read them without synchronization.

mod post;
mod pre;

pub use post::PostProcessStatus;
pub use post::PostProcessor;
pub use post::PostProcessors;
pub use post::post_fn;
pub use pre::Completer;
pub use pre::Deferral;
pub use pre::PreProcessStatus;
pub use pre::PreProcessor;
pub use pre::PreProcessors;
pub use pre::deferred;
pub use pre::pre_fn;
