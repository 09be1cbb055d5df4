use std::{convert::Infallible, future::Future, net::SocketAddr, sync::Arc, time::Duration};

use color_eyre::Result;
use hyper::{
    service::{make_service_fn, service_fn},
    Server,
};
use log::info;

use crate::{
    dispatch::Dispatcher, installation::Installation, protocols::http::mk_hyper_http_client,
};

pub mod routes;

/// Shared, read-only state behind every request
pub struct App {
    pub installation: Installation,
    pub dispatcher: Dispatcher,
}

impl App {
    pub fn new(installation: Installation, request_timeout: Duration) -> App {
        let http = mk_hyper_http_client();
        let dispatcher = Dispatcher::from_installation(&installation, &http, request_timeout);

        App {
            installation,
            dispatcher,
        }
    }
}

pub async fn serve(
    app: Arc<App>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let app = app.clone();

        async move {
            Ok::<_, Infallible>(service_fn(move |req| routes::handle_request(req, app.clone())))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!("Listening on http://{}", server.local_addr());

    server.with_graceful_shutdown(shutdown).await?;

    Ok(())
}
