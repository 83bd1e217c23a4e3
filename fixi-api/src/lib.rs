pub mod client;
pub mod endpoints;
pub mod error;
pub mod formatter;
pub mod issues;
pub mod models;
pub mod query;
pub mod rest;
pub mod uri;

pub use client::{Auth, FixiClient, FixiConfig};
pub use error::{Error, Result};
pub use models::*;

// Endpoint table re-exports
pub use endpoints::{ENDPOINTS, Endpoint, HttpVerb, Operation, Paging};

// Formatter re-exports
pub use formatter::{
    FormUrlEncodedFormatter, FormatterCollection, JsonFormatter, PlainTextFormatter,
    ResponseFormatter, XmlFormatter,
};

// Issues API re-exports
pub use issues::{ExportDestination, IssuesApi};

// REST core re-exports
pub use query::{QueryPair, Timestamp, encode_pairs, to_query_pairs};
pub use rest::{EndpointCall, ResponseBody, RestApi};
pub use uri::add_query;

pub use tokio_util::sync::CancellationToken;
