use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::json;

use atelier_core::contact::ContactForm;

use crate::{
    flash::{redirect_back, Flash},
    inertia::is_inertia_request,
    notify::notify_contact,
    state::AppState,
};

pub const SUCCESS_MESSAGE: &str = "Thank you for your message! We will get back to you soon.";
pub const FAILURE_MESSAGE: &str =
    "Sorry, there was an error sending your message. Please try again later.";

const FALLBACK_PATH: &str = "/contact";

fn header_contains(headers: &HeaderMap, name: header::HeaderName, needle: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains(needle))
}

/// API clients asking for JSON get status codes instead of redirects.
fn wants_json(headers: &HeaderMap) -> bool {
    !is_inertia_request(headers) && header_contains(headers, header::ACCEPT, "application/json")
}

/// Decode the body as JSON or as a urlencoded form, by content type. A body
/// that fails to decode is an empty submission and fails validation.
async fn read_form(request: Request) -> ContactForm {
    if header_contains(request.headers(), header::CONTENT_TYPE, "application/json") {
        Json::<ContactForm>::from_request(request, &())
            .await
            .map(|Json(form)| form)
            .unwrap_or_default()
    } else {
        Form::<ContactForm>::from_request(request, &())
            .await
            .map(|Form(form)| form)
            .unwrap_or_default()
    }
}

/// `POST /contact`: validate, store and forward a contact submission.
///
/// Browser and Inertia clients are redirected back with flash data; JSON
/// clients get `422` / `201` / `500`. Nothing is stored when validation fails.
#[tracing::instrument(skip(state, request))]
pub async fn submit_contact(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let headers = request.headers().clone();
    let json_client = wants_json(&headers);
    let form = read_form(request).await;

    let new_contact = match form.validate() {
        Ok(c) => c,
        Err(errors) => {
            tracing::info!(fields = ?errors.keys().collect::<Vec<_>>(), "Contact form rejected");
            if json_client {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "message": "The given data was invalid.",
                        "errors": errors,
                    })),
                )
                    .into_response();
            }
            let flash = Flash::invalid(errors, form.old_input());
            return redirect_back(&state, &headers, FALLBACK_PATH, flash).await;
        }
    };

    match state.db.insert_contact(&new_contact).await {
        Ok(contact) => {
            tracing::info!(contact_id = %contact.id, "Contact form accepted");
            notify_contact(&state, &contact).await;
            if json_client {
                (
                    StatusCode::CREATED,
                    Json(json!({ "success": true, "message": SUCCESS_MESSAGE })),
                )
                    .into_response()
            } else {
                redirect_back(&state, &headers, FALLBACK_PATH, Flash::success(SUCCESS_MESSAGE)).await
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to store contact submission");
            if json_client {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": FAILURE_MESSAGE })),
                )
                    .into_response()
            } else {
                redirect_back(&state, &headers, FALLBACK_PATH, Flash::error(FAILURE_MESSAGE)).await
            }
        }
    }
}
