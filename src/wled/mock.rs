//! In-process stand-in for a physical controller, used by tests.

use std::{
    convert::Infallible,
    net::{SocketAddr, TcpListener},
    sync::{Arc, Mutex},
    time::Duration,
};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub enum MockBehavior {
    Ok,
    Status(u16),
    Delay(Duration),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct MockController {
    addr: SocketAddr,
    requests: Recorded,
}

async fn respond(
    req: Request<Body>,
    recorded: Recorded,
    name: String,
    behavior: MockBehavior,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .unwrap_or_default();
    let body = serde_json::from_slice(&bytes).ok();

    recorded.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        body,
    });

    match behavior {
        MockBehavior::Status(status) => {
            let response = Response::builder()
                .status(status)
                .body(Body::from("controller error"))
                .unwrap();
            return Ok(response);
        }
        MockBehavior::Delay(delay) => tokio::time::sleep(delay).await,
        MockBehavior::Ok => {}
    }

    let reply = match (method, path.as_str()) {
        (Method::GET, "/json/info") => json!({ "ver": "0.14.4", "name": name, "leds": { "count": 120 } }),
        (Method::GET, "/json/state") => json!({ "on": true, "bri": 128, "seg": [] }),
        (Method::POST, "/json/state") => json!({ "success": true }),
        _ => {
            let response = Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::empty())
                .unwrap();
            return Ok(response);
        }
    };

    Ok(Response::new(Body::from(reply.to_string())))
}

impl MockController {
    pub async fn start(name: &str, behavior: MockBehavior) -> MockController {
        let requests: Recorded = Default::default();

        let recorded = requests.clone();
        let name = name.to_string();
        let make_svc = make_service_fn(move |_conn| {
            let recorded = recorded.clone();
            let name = name.clone();
            let behavior = behavior.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    respond(req, recorded.clone(), name.clone(), behavior.clone())
                }))
            }
        });

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);

        MockController { addr, requests }
    }

    /// Address in the form used by the installation document
    pub fn ip(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// A local address nothing listens on.
pub fn unreachable_ip() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    addr.to_string()
}
