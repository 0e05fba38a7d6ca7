//! External collaborators the controller drives: the network and the map.

mod fetch;
#[cfg(feature = "http-client")]
mod http;
mod presenter;

pub use self::fetch::{FetchError, FetchResponse, Fetcher};
#[cfg(feature = "http-client")]
pub use self::http::HttpFetcher;
pub use self::presenter::DatasetPresenter;
