use once_cell::sync::Lazy;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("storefront-io")
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn spawn_async<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    RUNTIME.spawn(fut)
}

/// Runs `fut` on the shared runtime and hands the result to `done` on the
/// GTK main loop.
#[cfg(feature = "gui")]
pub fn run_async_to_main<T, Fut>(fut: Fut, done: impl FnOnce(T) + 'static)
where
    T: Send + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
{
    let handle = spawn_async(fut);
    gtk4::glib::MainContext::default().spawn_local(async move {
        match handle.await {
            Ok(value) => done(value),
            Err(e) => log::error!("background task failed: {e}"),
        }
    });
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Maps the REST origin onto the socket endpoint (`ws`/`wss`, Engine.IO path).
pub fn socket_url(origin: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(&normalize_url(origin))?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    // http(s) -> ws(s) is always an allowed scheme change
    let _ = url.set_scheme(scheme);
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_default_to_https() {
        assert_eq!(normalize_url("  shop.example.com/ "), "https://shop.example.com");
        assert_eq!(normalize_url("http://localhost:3001/"), "http://localhost:3001");
    }

    #[test]
    fn socket_url_follows_the_rest_scheme() {
        assert_eq!(
            socket_url("http://localhost:3001").unwrap().as_str(),
            "ws://localhost:3001/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(socket_url("api.example.com").unwrap().scheme(), "wss");
    }
}
