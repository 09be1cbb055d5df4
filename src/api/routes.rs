use std::{convert::Infallible, sync::Arc};

use hyper::{Body, Method, Request, Response, StatusCode};
use indexmap::IndexMap;
use log::error;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use super::App;
use crate::{
    dispatch::{error::DispatchError, DispatchResult},
    feature::payload::{parse_hex_color, CommandPayload},
    installation::FeatureConfig,
};

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .unwrap_or_else(|_| Response::new(Body::empty())),
        Err(e) => {
            error!("Failed to serialize response: {:?}", e);
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response<Body> {
    json_response(status, &json!({ "success": false, "error": message.into() }))
}

fn dispatch_error_response(err: DispatchError) -> Response<Body> {
    error_response(StatusCode::NOT_FOUND, err.to_string())
}

fn dispatch_failure_response(feature: &str, result: DispatchResult) -> Response<Body> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({
            "success": false,
            "feature": feature,
            "error": result.error,
            "results": result.results,
        }),
    )
}

async fn read_body(req: Request<Body>) -> Result<hyper::body::Bytes, Response<Body>> {
    hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Failed to read body: {}", e)))
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Response<Body>> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))
}

async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T, Response<Body>> {
    let bytes = read_body(req).await?;
    parse_json(&bytes)
}

fn get_config(app: &App) -> Response<Body> {
    let installation = &app.installation;
    let registry = app.dispatcher.registry();

    // Only features the registry accepted, in file order
    let features: IndexMap<&String, &FeatureConfig> = installation
        .features
        .iter()
        .filter(|(key, _)| registry.resolve(key).is_ok())
        .collect();

    json_response(
        StatusCode::OK,
        &json!({
            "name": installation.name,
            "features": features,
            "effects": installation.effects,
            "palettes": installation.palettes,
            "controllers": installation.controllers,
        }),
    )
}

async fn set_feature(app: &App, name: &str, req: Request<Body>) -> Response<Body> {
    let feature = match app.dispatcher.registry().resolve(name) {
        Ok(feature) => feature,
        Err(e) => return dispatch_error_response(e),
    };

    let bytes = match read_body(req).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    // No body means no fields, which leaves everything unchanged
    let payload = if bytes.iter().all(u8::is_ascii_whitespace) {
        CommandPayload::default()
    } else {
        match parse_json::<CommandPayload>(&bytes) {
            Ok(payload) => payload,
            Err(response) => return response,
        }
    };

    let result = match app.dispatcher.apply(feature, &payload).await {
        Ok(result) => result,
        Err(e) => return dispatch_error_response(e),
    };

    if !result.success {
        return dispatch_failure_response(name, result);
    }

    let mut body = json!({
        "success": true,
        "feature": name,
        "applied": payload,
        "results": result.results,
    });

    let targets = feature.targets();
    if feature.is_multi_segment() {
        body["targets"] = targets
            .iter()
            .map(|target| json!({ "controller": target.controller, "segment": target.segment }))
            .collect();
    } else if let [target] = targets {
        body["controller"] = json!(target.controller);
        body["segment"] = json!(target.segment);
    }

    json_response(StatusCode::OK, &body)
}

async fn set_feature_color(app: &App, name: &str, req: Request<Body>) -> Response<Body> {
    let feature = match app.dispatcher.registry().resolve(name) {
        Ok(feature) => feature,
        Err(e) => return dispatch_error_response(e),
    };

    let body: Value = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let color = body.get("color").and_then(Value::as_str).unwrap_or_default();
    let Some(rgb) = parse_hex_color(color) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid color, expected format #RRGGBB",
        );
    };

    let payload = CommandPayload::solid_color(rgb);

    match app.dispatcher.apply(feature, &payload).await {
        Ok(result) if result.success => json_response(
            StatusCode::OK,
            &json!({ "success": true, "feature": name, "color": color, "rgb": rgb }),
        ),
        Ok(result) => dispatch_failure_response(name, result),
        Err(e) => dispatch_error_response(e),
    }
}

async fn get_state(app: &App) -> Response<Body> {
    let states = app.dispatcher.controllers().get_all_states().await;
    json_response(StatusCode::OK, &states)
}

async fn set_power(app: &App, req: Request<Body>) -> Response<Body> {
    let body: Value = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let Some(on) = body.get("on").and_then(Value::as_bool) else {
        return error_response(StatusCode::BAD_REQUEST, "'on' must be a boolean");
    };

    let results = app.dispatcher.controllers().set_all_power(on).await;
    json_response(StatusCode::OK, &json!({ "success": true, "results": results }))
}

async fn set_brightness(app: &App, req: Request<Body>) -> Response<Body> {
    let body: Value = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let brightness = body
        .get("brightness")
        .and_then(Value::as_i64)
        .filter(|brightness| (0..=255).contains(brightness));

    let Some(brightness) = brightness else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "'brightness' must be an integer between 0 and 255",
        );
    };

    let results = app
        .dispatcher
        .controllers()
        .set_all_brightness(brightness)
        .await;

    json_response(
        StatusCode::OK,
        &json!({ "success": true, "brightness": brightness, "results": results }),
    )
}

async fn load_preset(app: &App, req: Request<Body>) -> Response<Body> {
    let body: Value = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let preset = body
        .get("ps")
        .and_then(Value::as_u64)
        .and_then(|preset| u16::try_from(preset).ok());

    let Some(preset) = preset else {
        return error_response(StatusCode::BAD_REQUEST, "'ps' must be a preset id");
    };

    let results = app.dispatcher.controllers().load_preset_all(preset).await;
    json_response(
        StatusCode::OK,
        &json!({ "success": true, "preset": preset, "results": results }),
    )
}

async fn get_info(app: &App) -> Response<Body> {
    let info = app.dispatcher.controllers().get_all_info().await;
    json_response(StatusCode::OK, &info)
}

async fn ping(app: &App) -> Response<Body> {
    let report = app.dispatcher.controllers().ping_all().await;
    json_response(StatusCode::OK, &report)
}

pub async fn handle_request(
    req: Request<Body>,
    app: Arc<App>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::GET, ["api", "config"]) => get_config(&app),
        (&Method::GET, ["api", "state"]) => get_state(&app).await,
        (&Method::GET, ["api", "info"]) => get_info(&app).await,
        (&Method::GET, ["api", "ping"]) => ping(&app).await,
        (&Method::POST, ["api", "power"]) => set_power(&app, req).await,
        (&Method::POST, ["api", "brightness"]) => set_brightness(&app, req).await,
        (&Method::POST, ["api", "preset"]) => load_preset(&app, req).await,
        (&Method::POST, ["api", "feature", name]) => set_feature(&app, name, req).await,
        (&Method::POST, ["api", "feature", name, "color"]) => {
            set_feature_color(&app, name, req).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        installation::parse_installation,
        wled::mock::{unreachable_ip, MockBehavior, MockController},
    };
    use std::time::Duration;

    fn app(c1_ip: &str) -> Arc<App> {
        let installation = parse_installation(
            json!({
                "name": "Test Pumpkin",
                "controllers": { "c1": { "ip": c1_ip, "name": "Main", "segments": 8 } },
                "features": {
                    "leftEye": { "name": "Left Eye", "controller": "c1", "segment": 2 },
                    "bothEyes": {
                        "name": "Both Eyes",
                        "multiSegment": true,
                        "targets": [{ "controller": "c1", "segment": 2 }, { "controller": "c1", "segment": 3 }]
                    },
                    "ears": { "name": "Ears" }
                },
                "effects": [{ "id": 9, "name": "Rainbow" }]
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();

        Arc::new(App::new(installation, Duration::from_millis(500)))
    }

    async fn call(app: &Arc<App>, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let req = Request::builder().method(method).uri(uri).body(body).unwrap();

        let response = handle_request(req, app.clone()).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn multi_segment_feature_end_to_end() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/feature/bothEyes",
            Some(json!({ "fx": 9, "pal": 2 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["feature"], json!("bothEyes"));
        assert_eq!(body["applied"], json!({ "fx": 9, "pal": 2 }));

        let requests = c1.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].body,
            Some(json!({ "seg": [{ "id": 2, "fx": 9, "pal": 2 }, { "id": 3, "fx": 9, "pal": 2 }] }))
        );
    }

    #[tokio::test]
    async fn unreachable_controller_is_a_server_error() {
        let app = app(&unreachable_ip());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/feature/bothEyes",
            Some(json!({ "fx": 9, "pal": 2 })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().starts_with("c1: "));
        assert_eq!(body["results"]["c1"]["success"], json!(false));
    }

    #[tokio::test]
    async fn single_segment_feature_reports_address() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, body) = call(&app, Method::POST, "/api/feature/leftEye", Some(json!({ "sx": 128 }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["controller"], json!("c1"));
        assert_eq!(body["segment"], json!(2));
        assert_eq!(body["applied"], json!({ "sx": 128 }));
    }

    #[tokio::test]
    async fn unknown_feature_is_not_found() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, body) = call(&app, Method::POST, "/api/feature/nose", Some(json!({ "fx": 1 }))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "success": false, "error": "Feature 'nose' not found" }));
        assert!(c1.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_body_dispatches_empty_payload() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, body) = call(&app, Method::POST, "/api/feature/leftEye", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], json!({}));
        assert_eq!(c1.requests()[0].body, Some(json!({ "seg": { "id": 2 } })));
    }

    #[tokio::test]
    async fn unknown_feature_wins_over_malformed_body() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/feature/nose")
            .body(Body::from("{not json"))
            .unwrap();
        let response = handle_request(req, app.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/api/feature/ears/color", Some(json!({ "color": "bad" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(c1.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, _) = call(&app, Method::POST, "/api/feature/leftEye", Some(json!({ "sx": 999 }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(c1.requests().is_empty());
    }

    #[tokio::test]
    async fn color_sets_solid_effect() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/feature/leftEye/color",
            Some(json!({ "color": "#FF8000" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "feature": "leftEye", "color": "#FF8000", "rgb": [255, 128, 0] })
        );
        assert_eq!(
            c1.requests()[0].body,
            Some(json!({ "seg": { "id": 2, "fx": 0, "col": [[255, 128, 0]] } }))
        );
    }

    #[tokio::test]
    async fn color_validation_and_unknown_feature() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, _) = call(&app, Method::POST, "/api/feature/leftEye/color", Some(json!({ "color": "orange" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::POST, "/api/feature/nose/color", Some(json!({ "color": "#000000" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(c1.requests().is_empty());
    }

    #[tokio::test]
    async fn power_requires_boolean() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, _) = call(&app, Method::POST, "/api/power", Some(json!({ "on": "yes" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::POST, "/api/power", Some(json!({ "on": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"]["c1"]["success"], json!(true));
        assert_eq!(c1.requests().len(), 1);
    }

    #[tokio::test]
    async fn brightness_must_be_in_range() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        for invalid in [json!(256), json!(-1), json!("bright"), json!(12.5)] {
            let (status, _) = call(&app, Method::POST, "/api/brightness", Some(json!({ "brightness": invalid }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (status, body) = call(&app, Method::POST, "/api/brightness", Some(json!({ "brightness": 200 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["brightness"], json!(200));
        assert_eq!(c1.requests()[0].body, Some(json!({ "bri": 200 })));
    }

    #[tokio::test]
    async fn preset_loads_on_every_controller() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, _) = call(&app, Method::POST, "/api/preset", Some(json!({ "ps": -3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::POST, "/api/preset", Some(json!({ "ps": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["preset"], json!(5));
        assert_eq!(c1.requests()[0].body, Some(json!({ "ps": 5 })));
    }

    #[tokio::test]
    async fn config_state_and_ping() {
        let c1 = MockController::start("Main", MockBehavior::Ok).await;
        let app = app(&c1.ip());

        let (status, config) = call(&app, Method::GET, "/api/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["name"], json!("Test Pumpkin"));
        assert_eq!(config["features"]["bothEyes"]["multiSegment"], json!(true));
        let feature_keys: Vec<&String> = config["features"].as_object().unwrap().keys().collect();
        assert_eq!(feature_keys, vec!["leftEye", "bothEyes"]);
        assert_eq!(config["effects"], json!([{ "id": 9, "name": "Rainbow" }]));
        assert_eq!(config["palettes"], json!([]));
        assert_eq!(config["controllers"]["c1"]["segments"], json!(8));

        let (status, state) = call(&app, Method::GET, "/api/state", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state["c1"]["data"]["bri"], json!(128));

        let (status, info) = call(&app, Method::GET, "/api/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["c1"]["data"]["leds"]["count"], json!(120));

        let (status, ping) = call(&app, Method::GET, "/api/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ping["c1"]["online"], json!(true));
        assert_eq!(ping["c1"]["version"], json!("0.14.4"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = app(&unreachable_ip());

        let (status, body) = call(&app, Method::GET, "/api/nothing", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
    }
}
