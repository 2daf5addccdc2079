use std::fs;
use std::io::{self, Read};

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use sketch::authority::Actor;
use sketch::model::SketchSnapshot;
use sketch::sync::{Envelope, SyncMessage};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;


type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing user id; pass --user-id or set SKETCH_USER_ID")]
    MissingUserId,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("websocket failed: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("server returned {status}: {message}")]
    ServerError { status: String, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Input { path: String, source: io::Error },
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "sketch-cli", about = "Sketch relay API and websocket CLI")]
struct Cli {
    #[arg(long, env = "SKETCH_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "SKETCH_USER_ID")]
    user_id: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    user_id: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Api(ApiCommand),
    Ws(WsCommand),
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    Sketch(SketchCommand),
}

#[derive(Args, Debug)]
struct SketchCommand {
    #[command(subcommand)]
    command: SketchSubcommand,
}

#[derive(Subcommand, Debug)]
enum SketchSubcommand {
    List,
    Read {
        sketch_id: Uuid,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, help = "Snapshot JSON file, or - for stdin; empty sketch when absent")]
        input: Option<String>,
    },
    Update {
        sketch_id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, help = "Snapshot JSON file, or - for stdin")]
        input: Option<String>,
    },
    Delete {
        sketch_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct WsCommand {
    #[command(subcommand)]
    command: WsSubcommand,
}

#[derive(Subcommand, Debug)]
enum WsSubcommand {
    /// Print every message relayed in a room, one JSON line each.
    Watch(WatchArgs),
    /// Replace a room's sketch, connecting as master.
    Push(PushArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Master,
    Player,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(long)]
    room_id: Uuid,

    #[arg(long, env = "SKETCH_PARTICIPANT_ID", help = "Defaults to a fresh id")]
    participant_id: Option<Uuid>,

    #[arg(long, value_enum, default_value_t = RoleArg::Player)]
    role: RoleArg,

    #[arg(long, help = "Exit after this many messages")]
    count: Option<usize>,
}

#[derive(Args, Debug)]
struct PushArgs {
    #[arg(long)]
    room_id: Uuid,

    #[arg(long, env = "SKETCH_PARTICIPANT_ID", help = "Defaults to a fresh id")]
    participant_id: Option<Uuid>,

    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    sketch_id: Option<Uuid>,

    #[arg(long, help = "Snapshot JSON file, or - for stdin")]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, user_id: cli.user_id };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Api(api) => run_api(&ctx, api).await,
        Command::Ws(ws) => run_ws(&ctx, ws).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            status: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

// =============================================================================
// REST
// =============================================================================

async fn run_api(cli: &CliContext, api: ApiCommand) -> Result<(), CliError> {
    match api.command {
        ApiSubcommand::Sketch(sketch) => run_api_sketch(cli, sketch).await,
    }
}

async fn run_api_sketch(cli: &CliContext, sketch: SketchCommand) -> Result<(), CliError> {
    let json = match sketch.command {
        SketchSubcommand::List => api_request(cli, reqwest::Method::GET, "/api/sketches", None).await?,
        SketchSubcommand::Read { sketch_id } => {
            let path = format!("/api/sketches/{sketch_id}");
            api_request(cli, reqwest::Method::GET, &path, None).await?
        }
        SketchSubcommand::Create { name, input } => {
            let data = match input {
                Some(path) => read_snapshot(&path)?,
                None => SketchSnapshot::default(),
            };
            let body = serde_json::json!({ "name": name, "data": data });
            api_request(cli, reqwest::Method::POST, "/api/sketches", Some(body)).await?
        }
        SketchSubcommand::Update { sketch_id, name, input } => {
            let mut body = Map::new();
            if let Some(name) = name {
                body.insert("name".to_owned(), Value::String(name));
            }
            if let Some(path) = input {
                body.insert("data".to_owned(), serde_json::to_value(read_snapshot(&path)?)?);
            }
            let path = format!("/api/sketches/{sketch_id}");
            api_request(cli, reqwest::Method::PATCH, &path, Some(Value::Object(body))).await?
        }
        SketchSubcommand::Delete { sketch_id } => {
            let path = format!("/api/sketches/{sketch_id}");
            api_request(cli, reqwest::Method::DELETE, &path, None).await?
        }
    };
    print_json(&json)
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let user_id = cli.user_id.ok_or(CliError::MissingUserId)?;

    let mut headers = HeaderMap::new();
    headers.insert("x-user-id", HeaderValue::from_str(&user_id.to_string())?);

    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), path);

    let request = client.request(method, &url);
    let request = if let Some(json) = body { request.json(&json) } else { request };

    let response = request.send().await?;
    let status = response.status();
    // DELETE answers 204 with no body.
    let value = response.json::<Value>().await.unwrap_or(Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError { status: format!("HTTP {}", status.as_u16()), message: value.to_string() });
    }

    Ok(value)
}

// =============================================================================
// WEBSOCKET
// =============================================================================

async fn run_ws(cli: &CliContext, ws: WsCommand) -> Result<(), CliError> {
    match ws.command {
        WsSubcommand::Watch(args) => ws_watch(cli, args).await,
        WsSubcommand::Push(args) => ws_push(cli, args).await,
    }
}

async fn ws_watch(cli: &CliContext, args: WatchArgs) -> Result<(), CliError> {
    let participant_id = args.participant_id.unwrap_or_else(Uuid::new_v4);
    let actor = match args.role {
        RoleArg::Master => Actor::master(participant_id),
        RoleArg::Player => Actor::player(participant_id),
    };
    let mut stream = connect_room(&cli.base_url, args.room_id, &actor).await?;
    eprintln!("watching room {} as {participant_id}", args.room_id);

    let mut seen = 0_usize;
    while args.count.is_none_or(|limit| seen < limit) {
        let Some(text) = recv_text(&mut stream).await? else {
            break;
        };
        let envelope = Envelope::decode(&text)?;
        println!("{}", serde_json::to_string(&envelope)?);
        seen = seen.saturating_add(1);
    }
    Ok(())
}

async fn ws_push(cli: &CliContext, args: PushArgs) -> Result<(), CliError> {
    let snapshot = match (&args.sketch_id, &args.input) {
        (Some(sketch_id), _) => {
            let path = format!("/api/sketches/{sketch_id}");
            let sketch = api_request(cli, reqwest::Method::GET, &path, None).await?;
            let data = sketch.get("data").cloned().ok_or(CliError::MissingField("data"))?;
            serde_json::from_value::<SketchSnapshot>(data)?
        }
        (None, Some(path)) => read_snapshot(path)?,
        (None, None) => return Err(CliError::MissingField("sketch_id")),
    };

    let actor = Actor::master(args.participant_id.unwrap_or_else(Uuid::new_v4));
    let mut stream = connect_room(&cli.base_url, args.room_id, &actor).await?;

    let items = snapshot.paths.len() + snapshot.images.len() + snapshot.tokens.len();
    let text = Envelope::new(None, SyncMessage::SketchUpdate(snapshot)).encode()?;
    stream.send(Message::text(text)).await?;
    stream.close(None).await?;

    eprintln!("pushed sketch to room {}: items={items}", args.room_id);
    Ok(())
}

async fn connect_room(base_url: &str, room_id: Uuid, actor: &Actor) -> Result<WsStream, CliError> {
    let url = ws_url(base_url, room_id, actor)?;
    let (stream, _) = connect_async(url).await?;
    Ok(stream)
}

fn ws_url(base_url: &str, room_id: Uuid, actor: &Actor) -> Result<String, CliError> {
    let base_url = base_url.trim_end_matches('/');
    let role = if actor.is_master() { "master" } else { "player" };
    let path = format!("/api/rooms/{room_id}/ws?participant_id={}&role={role}", actor.participant_id);

    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{path}"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{path}"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

/// Next text message, or `None` once the server closes the stream.
async fn recv_text(stream: &mut WsStream) -> Result<Option<String>, CliError> {
    loop {
        let Some(message) = stream.next().await else {
            return Ok(None);
        };
        match message? {
            Message::Text(text) => return Ok(Some(text.to_string())),
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn read_snapshot(path: &str) -> Result<SketchSnapshot, CliError> {
    let raw = if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|source| CliError::Input { path: "stdin".to_owned(), source })?;
        buf
    } else {
        fs::read_to_string(path).map_err(|source| CliError::Input { path: path.to_owned(), source })?
    };
    parse_snapshot(&raw)
}

/// Accept either a bare snapshot or a saved sketch record with a `data` field.
fn parse_snapshot(raw: &str) -> Result<SketchSnapshot, CliError> {
    let mut value = serde_json::from_str::<Value>(raw)?;
    if let Some(data) = value.as_object_mut().and_then(|map| map.remove("data")) {
        value = data;
    }
    Ok(serde_json::from_value(value)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
