//! Visit analytics
//!
//! Request context capture (client IP and device class), best-effort IP
//! geolocation, visit recording and on-demand aggregation of a QR code's
//! visit history.

pub mod aggregator;
pub mod context;
pub mod device;
pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod recorder;

pub use aggregator::{aggregate, summarize, AnalyticsSummary};
pub use context::RequestContext;
pub use device::Device;
pub use geoip::{build_geo_lookup, GeoLookup};
pub use ip_extractor::extract_client_ip;
pub use models::GeoLocation;
pub use recorder::VisitRecorder;
