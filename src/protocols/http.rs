use std::time::Duration;

use color_eyre::Result;
use eyre::eyre;
use hyper::{Request, Uri};
use log::{debug, info};
use serde::{Deserialize, Serialize};

pub type HyperHttpClient = hyper::Client<hyper::client::HttpConnector>;

pub fn mk_hyper_http_client() -> HyperHttpClient {
    let mut http = hyper::client::HttpConnector::new();
    http.set_nodelay(true);

    hyper::Client::builder().build(http)
}

async fn send_request<T: for<'a> Deserialize<'a>>(
    client: &HyperHttpClient,
    request: Request<hyper::Body>,
    timeout: Duration,
) -> Result<T> {
    let uri = request.uri().clone();

    let exchange = async {
        let result = client.request(request).await?;
        let status = result.status();
        let body_bytes = hyper::body::to_bytes(result.into_body()).await?;

        Ok::<_, hyper::Error>((status, body_bytes))
    };

    let (status, body_bytes) = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| eyre!("Request to {} timed out after {}ms", uri, timeout.as_millis()))??;

    debug!("{} responded {}: {}", uri, status, String::from_utf8_lossy(&body_bytes));

    if !status.is_success() {
        return Err(eyre!("{} responded with HTTP {}", uri, status));
    }

    let de = &mut serde_json::Deserializer::from_slice(&body_bytes);
    let response: T = serde_path_to_error::deserialize(de)?;

    Ok(response)
}

pub async fn mk_get_request<T: for<'a> Deserialize<'a>>(
    client: &HyperHttpClient,
    uri: &Uri,
    timeout: Duration,
) -> Result<T> {
    info!("GET {}", uri);

    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(hyper::Body::empty())?;

    send_request(client, request, timeout).await
}

pub async fn mk_post_request<RequestBody, ResponseBody>(
    client: &HyperHttpClient,
    uri: &Uri,
    body: &RequestBody,
    timeout: Duration,
) -> Result<ResponseBody>
where
    RequestBody: Serialize,
    ResponseBody: for<'a> Deserialize<'a>,
{
    let body = serde_json::to_string(body)?;

    // Logged before sending so that intent is visible even when the
    // controller is unreachable
    info!("POST {} {}", uri, body);

    let request = Request::builder()
        .method("POST")
        .header("content-type", "application/json")
        .uri(uri)
        .body(body.into())?;

    send_request(client, request, timeout).await
}
