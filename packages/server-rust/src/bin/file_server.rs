//! In-memory file server: one controller with `selectOne`, `replace` and
//! `delete` served over HTTP.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, ValueEnum};
use futures_util::{stream, StreamExt};
use http::header::CONTENT_TYPE;
use http::StatusCode;
use parking_lot::RwLock;
use restifizer_core::DataSourceError;
use restifizer_server::controller::{BasePath, Handler};
use restifizer_server::network::{NetworkConfig, NetworkModule};
use restifizer_server::{
    handler_fn, with_timeout, Controller, ControllerOptions, ControllerSettings, DataSource,
    RequestError, ResData, RouterTransport, StreamResult,
};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "RESTIFIZER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on. 0 picks a free port.
    #[arg(short, long, env = "RESTIFIZER_PORT", default_value = "3000")]
    port: u16,

    /// Controller base path; may contain an `{id}` segment.
    #[arg(long, env = "RESTIFIZER_BASE_PATH", default_value = "/files/{id}")]
    base_path: String,

    /// JSON controller settings. `--base-path` is ignored when given.
    #[arg(long, env = "RESTIFIZER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Upper bound for a single handler call, in seconds.
    #[arg(long, default_value = "10")]
    handler_timeout: u64,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    // Ignore error if a subscriber is already set.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

struct StoredFile {
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct FileStore {
    files: RwLock<HashMap<String, StoredFile>>,
}

/// The store raises [`DataSourceError`]s; the default classification maps
/// them to client errors.
struct MemoryDataSource;

impl DataSource for MemoryDataSource {}

fn file_id(scope: &restifizer_server::RequestScope) -> Result<String, RequestError> {
    scope
        .transport_data
        .params
        .get("id")
        .cloned()
        .ok_or_else(|| RequestError::with_status(StatusCode::BAD_REQUEST).message("missing file id"))
}

fn not_found(id: &str) -> RequestError {
    RequestError::with_status(StatusCode::NOT_FOUND).message(format!("file {id} not found"))
}

fn select_one(store: &Arc<FileStore>) -> Handler {
    let store = Arc::clone(store);
    handler_fn(move |scope| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            let id = file_id(scope)?;
            let files = store.files.read();
            let file = files.get(&id).ok_or_else(|| not_found(&id))?;

            let chunks = stream::iter(vec![Ok(file.data.clone())]).boxed();
            let mut result = StreamResult::new(chunks);
            result.content_type = Some(file.content_type.clone());
            result.content_length = Some(file.data.len() as u64);
            result.file_name = Some(id);
            Ok(Some(ResData::Stream(result)))
        })
    })
}

fn replace(store: &Arc<FileStore>) -> Handler {
    let store = Arc::clone(store);
    handler_fn(move |scope| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            let id = file_id(scope)?;
            let data = scope.transport_data.body.clone();
            if data.is_empty() {
                let mut errors = serde_json::Map::new();
                errors.insert("file".into(), json!("file is empty"));
                return Err(DataSourceError::Validation {
                    message: "file is required".into(),
                    errors,
                }
                .into());
            }
            let content_type = scope
                .transport_data
                .headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();

            let size = data.len();
            let previous = store.files.write().insert(
                id.clone(),
                StoredFile {
                    content_type: content_type.clone(),
                    data,
                },
            );
            scope.new_content = previous.is_none();
            Ok(Some(ResData::Json(json!({
                "id": id,
                "size": size,
                "contentType": content_type,
            }))))
        })
    })
}

fn delete(store: &Arc<FileStore>) -> Handler {
    let store = Arc::clone(store);
    handler_fn(move |scope| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            let id = file_id(scope)?;
            match store.files.write().remove(&id) {
                Some(_) => Ok(None),
                None => Err(not_found(&id)),
            }
        })
    })
}

fn load_settings(args: &Args) -> anyhow::Result<ControllerSettings> {
    let Some(path) = &args.settings else {
        return Ok(ControllerSettings {
            path: Some(BasePath::One(args.base_path.clone())),
            file_field: Some("file".to_string()),
            ..ControllerSettings::default()
        });
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("settings in {} are not JSON", path.display()))?;
    Ok(ControllerSettings::from_json(value)?)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let store = Arc::new(FileStore::default());
    let transport = RouterTransport::new();
    let timeout = Duration::from_secs(args.handler_timeout);

    let options = ControllerOptions::from_settings(load_settings(&args)?)
        .method("selectOne", with_timeout(select_one(&store), timeout))
        .method("replace", with_timeout(replace(&store), timeout))
        .method("delete", with_timeout(delete(&store), timeout))
        .transport(transport.clone())
        .data_source(Arc::new(MemoryDataSource));
    let controller = Arc::new(Controller::new(options)?);
    controller.bind()?;

    let mut module = NetworkModule::new(NetworkConfig {
        host: args.host.clone(),
        port: args.port,
        ..NetworkConfig::default()
    });
    let port = module.start().await?;
    info!(port, path = %controller.base_path(), "file server ready");

    let router = transport.into_router(module.config());
    module.serve(router, shutdown_signal()).await
}
