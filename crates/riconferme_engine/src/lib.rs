//! Riconferme engine: action API requests and per-wiki sessions.
mod client;
mod cookies;
mod edit;
mod error;
mod group;
mod query;
mod request;
mod transport;

pub use client::{Credentials, Wiki};
pub use cookies::{set_cookies, CookieJar, CookieStore};
pub use edit::{EditContent, EditParams};
pub use error::{ApiError, TransportError, TransportErrorKind};
pub use group::WikiGroup;
pub use query::QueryResults;
pub use request::{
    check_response, first_page, pages_of, params, Params, RequestEngine, MAXLAG_SECONDS,
};
pub use transport::{
    HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportSettings,
};
