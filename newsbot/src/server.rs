use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use common::{Secret, ServerSettings};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};

use crate::commands::{CommandDispatcher, CommandReply, ReplyCollector};
use crate::pipeline::Outcome as RunOutcome;
use crate::report::Payload;
use crate::sink::Invoker;

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub dispatcher: Arc<CommandDispatcher>,
    /// When set, command routes require `Authorization: Bearer <token>`.
    pub command_token: Option<Secret>,
}

/// Request guard for the command routes.
pub struct CommandAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CommandAuth {
    type Error = &'static str;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(state) = req.rocket().state::<AppState>() else {
            return request::Outcome::Error((Status::InternalServerError, "missing state"));
        };
        let Some(token) = &state.command_token else {
            return request::Outcome::Success(CommandAuth);
        };

        let expected = format!("Bearer {}", token.expose());
        match req.headers().get_one("Authorization") {
            Some(value) if value == expected => request::Outcome::Success(CommandAuth),
            _ => {
                tracing::warn!("command request rejected: bad or missing token");
                request::Outcome::Error((Status::Unauthorized, "invalid command token"))
            }
        }
    }
}

/// Response for `/api/v1/commands/test`.
#[derive(Serialize)]
struct TriggerResponse {
    replies: Vec<CommandReply>,
    outcome: Option<RunOutcome>,
}

/// Response for `/api/v1/commands/status`.
#[derive(Serialize)]
struct StatusResponse {
    uptime_seconds: i64,
    status: Payload,
}

#[derive(Deserialize)]
struct StatusRequest {
    user_id: Option<String>,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Manual trigger. Runs the pipeline inline and answers once it finished.
#[post("/api/v1/commands/test", data = "<invoker>")]
async fn test_command(
    _auth: CommandAuth,
    state: &State<AppState>,
    invoker: Json<Invoker>,
) -> Json<TriggerResponse> {
    let collector = ReplyCollector::default();
    let outcome = state.dispatcher.manual_trigger(&invoker, &collector).await;

    Json(TriggerResponse {
        replies: collector.into_replies().await,
        outcome,
    })
}

#[get("/api/v1/commands/status?<user_id>")]
async fn status_command(
    _auth: CommandAuth,
    state: &State<AppState>,
    user_id: Option<String>,
) -> Json<StatusResponse> {
    status_response(state, user_id).await
}

#[post("/api/v1/commands/status", data = "<body>")]
async fn status_command_post(
    _auth: CommandAuth,
    state: &State<AppState>,
    body: Json<StatusRequest>,
) -> Json<StatusResponse> {
    status_response(state, body.into_inner().user_id).await
}

async fn status_response(state: &AppState, user_id: Option<String>) -> Json<StatusResponse> {
    let invoker = Invoker {
        user_id: user_id.unwrap_or_else(|| "anonymous".to_string()),
        permissions: 0,
    };
    let status = state.dispatcher.status(&invoker).await;

    Json(StatusResponse {
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        status,
    })
}

/// Rocket instance with managed state and routes, bound per `settings`.
///
/// The trigger route trusts the caller's permission bitfield, so it is only
/// mounted when a command token authenticates the caller.
pub fn build_rocket(state: AppState, settings: &ServerSettings) -> Rocket<Build> {
    let fig = rocket::Config::figment()
        .merge(("address", settings.bind.clone()))
        .merge(("port", settings.port));

    let mut mounted = routes![health, status_command, status_command_post];
    if state.command_token.is_some() {
        mounted.extend(routes![test_command]);
    } else {
        tracing::warn!("no command token configured; manual trigger route disabled");
    }

    rocket::custom(fig).manage(state).mount("/", mounted)
}

/// Launch the command surface; returns when Rocket shuts down (Ctrl-C or SIGTERM).
pub async fn launch_rocket(state: AppState, settings: &ServerSettings) -> Result<()> {
    tracing::info!(bind = %settings.bind, port = settings.port, "Starting Rocket HTTP server");
    build_rocket(state, settings)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
