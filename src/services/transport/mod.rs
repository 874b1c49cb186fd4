pub mod client;
pub mod reqwest_client;

pub use client::{
    HttpTransport, TransportError, TransportResponse, TransportResult, bearer_headers,
};
pub use reqwest_client::ReqwestTransport;
