use std::time::Duration;

use reqwest::{redirect, Client, Error};

pub const APP_USER_AGENT: &str = concat!("avatar-lifecycle/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 5;

/// Client for outbound checks: crate user agent, bounded redirects, per-request `timeout`.
pub fn build_http_client(timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}
