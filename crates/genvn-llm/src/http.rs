//! Shared HTTP client construction for consistent timeout configuration.

use std::time::Duration;

/// Client for blocking calls: total request timeout applies.
#[must_use]
pub(crate) fn blocking_client(connect_timeout: Duration, request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .user_agent(concat!("genvn/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("default HTTP client construction must not fail")
}

/// Client for streaming calls: only the connect timeout applies here; reads
/// are guarded per-fragment by the stream wrapper instead, so a long
/// generation is not cut off mid-body.
#[must_use]
pub(crate) fn streaming_client(connect_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(concat!("genvn/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("default HTTP client construction must not fail")
}
