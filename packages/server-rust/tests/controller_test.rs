//! End-to-end behaviour of controllers over the in-memory transport.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{stream, StreamExt, TryStreamExt};
use http::StatusCode;
use restifizer_core::{ActionConfig, DataSourceError, ParsedError, RawAction};
use restifizer_server::controller::{ControllerSettings, Handler, SentBody, TransportData};
use restifizer_server::transport::RouteRecord;
use parking_lot::Mutex;
use restifizer_server::{
    handler_fn, ConfigurationError, Controller, ControllerOptions, DataSource, ErrorLog,
    MemoryTransport, RequestError, ResData, StreamResult,
};
use serde_json::{json, Value};

struct Store;

impl DataSource for Store {}

#[derive(Default)]
struct CapturingLog(Mutex<Vec<String>>);

impl ErrorLog for CapturingLog {
    fn error(&self, message: &str) {
        self.0.lock().push(message.to_string());
    }
}

fn noop() -> Handler {
    handler_fn(|_scope| Box::pin(async { Ok(None) }))
}

fn json_handler(value: Value) -> Handler {
    handler_fn(move |_scope| {
        let value = value.clone();
        Box::pin(async move { Ok(Some(ResData::Json(value))) })
    })
}

fn failing(make: fn() -> RequestError) -> Handler {
    handler_fn(move |_scope| Box::pin(async move { Err(make()) }))
}

fn settings(value: Value) -> ControllerSettings {
    ControllerSettings::from_json(value).unwrap()
}

fn base_options(transport: &Arc<MemoryTransport>) -> ControllerOptions {
    ControllerOptions::new("/files", "file")
        .method("selectOne", json_handler(json!({ "name": "a.txt" })))
        .method("replace", noop())
        .method("delete", noop())
        .transport(transport.clone())
}

fn record(method: &str, path: &str, action: &str) -> RouteRecord {
    RouteRecord {
        method: method.into(),
        path: path.into(),
        action: action.into(),
    }
}

#[test]
fn unresolvable_builtin_handler_fails_construction() {
    let options = ControllerOptions::from_settings(settings(json!({
        "path": "/files",
        "fileField": "file",
        "actions": { "replace": { "handler": "doesNotExist" } },
    })))
    .method("selectOne", noop())
    .method("replace", noop())
    .method("delete", noop());

    let err = Controller::new(options).unwrap_err();
    assert_eq!(err.to_string(), "Wrong handler for replace");
}

#[test]
fn binds_by_priority_then_registry_order() {
    let transport = MemoryTransport::new();
    let options = ControllerOptions::from_settings(settings(json!({
        "path": "/files",
        "fileField": "file",
        "actions": {
            "upload": { "method": "post", "path": "upload", "priority": 2 },
            "preview": { "path": "preview", "priority": 0 },
            "delete": { "priority": 3 },
        },
    })))
    .method("selectOne", noop())
    .method("replace", noop())
    .method("delete", noop())
    .method("upload", noop())
    .method("preview", noop())
    .transport(transport.clone());

    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();

    // `preview` has priority 0, which normalizes to 1 and ties with the
    // built-ins; registry order breaks the tie.
    assert_eq!(
        transport.routes(),
        vec![
            record("get", "/files/preview", "preview"),
            record("get", "/files", "selectOne"),
            record("head", "/files", "selectOne"),
            record("put", "/files", "replace"),
            record("post", "/files/upload", "upload"),
            record("delete", "/files", "delete"),
        ]
    );
}

#[test]
fn disabled_actions_are_not_bound() {
    let transport = MemoryTransport::new();
    let options = ControllerOptions::from_settings(settings(json!({
        "path": "/files",
        "fileField": "file",
        "actions": { "delete": false, "default": { "enabled": true } },
    })))
    .method("selectOne", noop())
    .method("replace", noop())
    .method("delete", noop())
    .transport(transport.clone());

    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();
    assert!(transport.routes().iter().all(|route| route.action != "delete"));
    assert_eq!(transport.routes().len(), 3);
}

#[test]
fn every_base_path_and_transport_is_bound() {
    let first = MemoryTransport::new();
    let second = MemoryTransport::new();
    let options = ControllerOptions::from_settings(settings(json!({
        "path": ["/files", "/v1/files"],
        "fileField": "file",
        "supportedMethods": ["post", "put"],
        "actions": { "selectOne": false, "delete": false },
    })))
    .method("selectOne", noop())
    .method("replace", noop())
    .method("delete", noop())
    .transport(first.clone())
    .transport(second.clone());

    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();

    let expected = vec![
        record("post", "/files", "replace"),
        record("post", "/v1/files", "replace"),
        record("put", "/files", "replace"),
        record("put", "/v1/files", "replace"),
    ];
    assert_eq!(first.routes(), expected);
    assert_eq!(second.routes(), expected);
}

#[test]
fn rejected_registration_aborts_binding() {
    let transport = MemoryTransport::new();
    transport.reject_action("replace");
    let log = Arc::new(CapturingLog::default());
    let controller =
        Arc::new(Controller::new(base_options(&transport).log(log.clone())).unwrap());

    let err = controller.bind().unwrap_err();
    assert!(matches!(
        &err,
        ConfigurationError::RouteRegistration { action, path, .. }
            if action == "replace" && path == "/files/"
    ));
    // selectOne was bound before replace; delete never was.
    let actions: Vec<_> = transport.routes().into_iter().map(|r| r.action).collect();
    assert_eq!(actions, vec!["selectOne", "selectOne"]);

    assert_eq!(
        log.0.lock().clone(),
        vec![
            "Set route for action: replace and path /files/".to_string(),
            "Error route for replace rejected".to_string(),
        ]
    );
}

#[tokio::test]
async fn bound_routes_dispatch_and_send_once() {
    let transport = MemoryTransport::new();
    let controller = Arc::new(Controller::new(base_options(&transport)).unwrap());
    controller.bind().unwrap();

    let scope = transport
        .invoke("GET", "/files", TransportData::default())
        .await
        .unwrap();
    let response = scope.response().unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert!(matches!(&response.body, SentBody::Json(v) if v["name"] == "a.txt"));

    let scope = transport
        .invoke("DELETE", "/files", TransportData::default())
        .await
        .unwrap();
    assert_eq!(scope.response().unwrap().status, StatusCode::NO_CONTENT);
    assert_eq!(transport.sends(), 2);

    assert!(transport
        .invoke("PATCH", "/files", TransportData::default())
        .await
        .is_none());
}

#[tokio::test]
async fn routes_outliving_their_controller_do_nothing() {
    let transport = MemoryTransport::new();
    let controller = Arc::new(Controller::new(base_options(&transport)).unwrap());
    controller.bind().unwrap();
    drop(controller);

    assert!(transport
        .invoke("GET", "/files", TransportData::default())
        .await
        .is_none());
    assert_eq!(transport.sends(), 0);
}

#[tokio::test]
async fn data_source_errors_are_classified() {
    let transport = MemoryTransport::new();
    let options = ControllerOptions::new("/files", "file")
        .method("selectOne", noop())
        .method(
            "replace",
            failing(|| {
                DataSourceError::Backend {
                    code: 11000,
                    message: "E11000 duplicate key".into(),
                    details: json!({ "index": "name_1" }),
                }
                .into()
            }),
        )
        .method("delete", noop())
        .transport(transport.clone())
        .data_source(Arc::new(Store));
    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();

    let scope = transport
        .invoke("PUT", "/files", TransportData::default())
        .await
        .unwrap();
    let response = scope.response().unwrap();
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let SentBody::Json(body) = &response.body else {
        panic!("expected a JSON error body");
    };
    assert_eq!(body["type"], "restifizer-files");
    assert_eq!(body["status"], 400);
    assert_eq!(body["details"]["index"], "name_1");
    assert_eq!(transport.sends(), 1);
}

#[tokio::test]
async fn controller_hook_is_consulted_first() {
    let transport = MemoryTransport::new();
    let hook = |err: &RequestError| {
        err.downcast_ref::<DataSourceError>()
            .map(|_| ParsedError::with_status(StatusCode::UNPROCESSABLE_ENTITY).message("rejected"))
    };
    let options = ControllerOptions::new("/files", "file")
        .method("selectOne", noop())
        .method(
            "replace",
            failing(|| {
                DataSourceError::VersionConflict {
                    message: "stale".into(),
                }
                .into()
            }),
        )
        .method("delete", noop())
        .transport(transport.clone())
        .data_source(Arc::new(Store))
        .parse_error(Arc::new(hook));
    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();

    let scope = transport
        .invoke("PUT", "/files", TransportData::default())
        .await
        .unwrap();
    let response = scope.response().unwrap();
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(matches!(&response.body, SentBody::Json(v) if v["message"] == "rejected"));
}

#[tokio::test]
async fn streamed_results_are_sent_as_streams() {
    let transport = MemoryTransport::new();
    let download = handler_fn(|_scope| {
        Box::pin(async {
            let chunks = stream::iter(vec![
                Ok(Bytes::from_static(b"hello ")),
                Ok(Bytes::from_static(b"world")),
            ])
            .boxed();
            let mut file = StreamResult::new(chunks);
            file.content_type = Some("text/plain".into());
            Ok(Some(ResData::Stream(file)))
        })
    });
    let options = ControllerOptions::new("/files", "file")
        .method("selectOne", download)
        .method("replace", noop())
        .method("delete", noop())
        .transport(transport.clone());
    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();

    let mut scope = transport
        .invoke("GET", "/files", TransportData::default())
        .await
        .unwrap();
    assert_eq!(transport.streams(), 1);
    assert_eq!(transport.sends(), 0);

    let response = scope.transport_data.response.take().unwrap();
    assert_eq!(response.headers["content-type"], "text/plain");
    let SentBody::Stream(file) = response.body else {
        panic!("expected a stream body");
    };
    let chunks: Vec<Bytes> = file.stream.try_collect().await.unwrap();
    assert_eq!(chunks.concat(), b"hello world");
}

#[test]
fn plugins_can_add_bindable_actions() {
    let transport = MemoryTransport::new();
    let add_ping = |controller: &mut Controller, options: &Value| -> Result<(), ConfigurationError> {
        controller.register_method("ping", noop());
        let path = options["path"].as_str().unwrap_or("ping").to_string();
        let action = controller.normalize_action("ping", RawAction::Config(ActionConfig::default().path(path)))?;
        controller.insert_action(action);
        Ok(())
    };
    let options = base_options(&transport).plugin(Arc::new(add_ping), json!({ "path": "health" }));
    let controller = Arc::new(Controller::new(options).unwrap());
    controller.bind().unwrap();

    assert!(transport
        .routes()
        .contains(&record("get", "/files/health", "ping")));
}
