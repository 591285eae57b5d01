pub mod handlers;
pub mod orchestrator;
pub mod resolver;
pub mod routes;

pub use orchestrator::{RedirectOrchestrator, RedirectTarget};
pub use resolver::resolve_slug;
pub use routes::create_redirect_router;
