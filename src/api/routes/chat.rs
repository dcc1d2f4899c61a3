use axum::{extract::State, Form, Json};
use serde::Deserialize;

use crate::api::{error::ApiError, state::AppState};
use crate::application::ChatAnswer;

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Form endpoint used by the HTML menu.
pub async fn chat_form(
    State(state): State<AppState>,
    Form(form): Form<ChatForm>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let answer = state.chat_service.answer(&form.query).await?;
    Ok(Json(answer))
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let answer = state.chat_service.answer(&request.message).await?;
    Ok(Json(answer))
}
