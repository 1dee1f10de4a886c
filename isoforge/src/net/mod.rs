//! Host-side network services exposed to the guest.

mod http_server;

pub use http_server::{FileServer, resolve_request_path};
