//! `POST /linear/save`: registers a Linear team and its workflow states.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::connector::TrackerConnector;
use crate::rewrite::Rewriter;
use crate::store::MappingStore;
use crate::types::TargetTeam;

/// Request body, in the camelCase the settings page sends.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTeamRequest {
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub canceled_state_id: Option<String>,
    pub done_state_id: Option<String>,
    pub to_do_state_id: Option<String>,
    pub public_label_id: Option<String>,
}

impl SaveTeamRequest {
    fn into_team(self) -> Result<TargetTeam, &'static str> {
        let team_id = non_empty(self.team_id).ok_or("Failed to save team: missing team ID")?;
        let team_name =
            non_empty(self.team_name).ok_or("Failed to save team: missing team name")?;
        let missing_state = "Failed to save team: missing label or state";
        Ok(TargetTeam {
            team_id,
            team_name,
            public_label_id: non_empty(self.public_label_id),
            to_do_state_id: self.to_do_state_id.ok_or(missing_state)?,
            done_state_id: self.done_state_id.ok_or(missing_state)?,
            canceled_state_id: self.canceled_state_id.ok_or(missing_state)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn bad_request(message: impl Into<String>) -> Response {
    let body = json!({ "error": message.into() });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub async fn save_team_handler<S, C, R>(
    State(app_state): State<AppState<S, C, R>>,
    request: Result<Json<SaveTeamRequest>, JsonRejection>,
) -> Response
where
    S: MappingStore,
    C: TrackerConnector,
    R: Rewriter,
{
    let Ok(Json(request)) = request else {
        return bad_request("Request is missing body");
    };
    let team = match request.into_team() {
        Ok(team) => team,
        Err(message) => return bad_request(message),
    };

    match app_state.engine().store().upsert_team(team.clone()).await {
        Ok(()) => {
            info!(team_id = %team.team_id, "Saved Linear team");
            Json(team).into_response()
        }
        Err(e) => bad_request(format!("Failed to save team with error: {e}")),
    }
}
