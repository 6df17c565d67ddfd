use crate::error::{AppError, Result};
use crate::models::WhitelistForm;
use crate::services::{ConfirmationServiceError, PhotoStore};
use crate::validation::{self, FieldErrors};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

pub const MISSING_PASSPORT_MESSAGE: &str = "Add a file of your passport";
pub const INVALID_PHOTO_MESSAGE: &str = "Upload an image file (jpg, png, ...)";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token data";
pub const USED_TOKEN_MESSAGE: &str = "You can only activate your email once.";

#[derive(Template, WebTemplate)]
#[template(path = "email_confirmed.html")]
struct EmailConfirmedTemplate {
    email: String,
    support_email: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "email_confirmation_error.html")]
struct EmailConfirmationErrorTemplate {
    message: String,
    support_email: String,
}

#[derive(Deserialize)]
pub struct ConfirmEmailQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// An uploaded file field: the client-side filename and its contents.
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Everything the registration form can carry. Unknown fields are ignored.
#[derive(Default)]
struct RegistrationRequest {
    form: WhitelistForm,
    year: String,
    month: String,
    day: String,
    passport: Option<Upload>,
    selfie: Option<Upload>,
}

impl RegistrationRequest {
    async fn from_multipart(mut multipart: Multipart) -> std::result::Result<Self, MultipartError> {
        let mut request = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "passport" | "selfie" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?.to_vec();
                    // Browsers submit an empty part for an untouched file input
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    let upload = Some(Upload { filename, bytes });
                    if name == "passport" {
                        request.passport = upload;
                    } else {
                        request.selfie = upload;
                    }
                }
                "name" => request.form.name = field.text().await?,
                "email" => request.form.email = field.text().await?,
                "phone" => request.form.phone = field.text().await?,
                "country" => request.form.country = field.text().await?,
                "birthday" => request.form.birthday = field.text().await?,
                "year" => request.year = field.text().await?,
                "month" => request.month = field.text().await?,
                "day" => request.day = field.text().await?,
                _ => {
                    // Drain so the stream can advance
                    field.bytes().await?;
                }
            }
        }

        if request.form.birthday.trim().is_empty()
            && !(request.year.is_empty() && request.month.is_empty() && request.day.is_empty())
        {
            request.form.birthday = validation::combine_date(
                request.year.trim(),
                request.month.trim(),
                request.day.trim(),
            );
        }

        Ok(request)
    }
}

fn too_large_message(max_mb: u64) -> String {
    format!("Filesize is very large. Allowed up to {} Mb", max_mb)
}

fn check_upload(
    errors: &mut FieldErrors,
    field: &str,
    upload: Option<&Upload>,
    required: bool,
    max_bytes: usize,
    max_mb: u64,
) {
    match upload {
        None if required => errors.add(field, MISSING_PASSPORT_MESSAGE),
        None => {}
        Some(upload) if upload.filename.is_empty() || upload.bytes.is_empty() => {
            errors.add(field, if required { MISSING_PASSPORT_MESSAGE } else { INVALID_PHOTO_MESSAGE })
        }
        Some(upload) if upload.bytes.len() > max_bytes => errors.add(field, too_large_message(max_mb)),
        Some(upload) if PhotoStore::extension_of(&upload.filename).is_none() => {
            errors.add(field, INVALID_PHOTO_MESSAGE)
        }
        Some(_) => {}
    }
}

pub async fn register(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let max_mb = state.config.max_upload_size_mb;
    let max_bytes = state.config.max_upload_size_bytes();

    let request = match RegistrationRequest::from_multipart(multipart).await {
        Ok(request) => request,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(AppError::Validation(FieldErrors::single(
                "passport",
                too_large_message(max_mb),
            )));
        }
        Err(e) => {
            tracing::debug!("Rejected malformed registration body: {}", e);
            return Err(AppError::Validation(FieldErrors::single(
                "form",
                "Malformed form data",
            )));
        }
    };

    let form = request.form.normalized();
    let mut errors = form.validate().err().unwrap_or_default();
    check_upload(&mut errors, "passport", request.passport.as_ref(), true, max_bytes, max_mb);
    check_upload(&mut errors, "selfie", request.selfie.as_ref(), false, max_bytes, max_mb);
    errors.into_result().map_err(AppError::Validation)?;

    // Skip writing photos for an address we already know is taken
    state
        .registration_service
        .ensure_email_available(&form.email)
        .await?;

    let passport = request
        .passport
        .ok_or_else(|| AppError::Validation(FieldErrors::single("passport", MISSING_PASSPORT_MESSAGE)))?;
    let passport = state
        .photo_store
        .store(&passport.filename, &passport.bytes)
        .await?;

    let selfie_id = match request.selfie {
        Some(selfie) => Some(state.photo_store.store(&selfie.filename, &selfie.bytes).await?.id),
        None => None,
    };

    let registered = state
        .registration_service
        .register(form.into_new_whitelist(passport.id, selfie_id))
        .await?;

    // The application is committed; a delivery failure must not undo it
    if let Err(e) = state
        .email_service
        .send_confirmation_email(&registered.whitelist.email, &registered.token)
        .await
    {
        tracing::error!(
            "Failed to send confirmation email for whitelist {}: {}",
            registered.whitelist.id,
            e
        );
    }

    Ok(Json(SuccessResponse { success: true }).into_response())
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<ConfirmEmailQuery>,
) -> Response {
    let support_email = state.config.mail.support_email.clone();

    match state.confirmation_service.confirm_email(query.token.trim()).await {
        Ok(email) => {
            let template = EmailConfirmedTemplate {
                email,
                support_email,
            };
            Html(
                template
                    .render()
                    .unwrap_or_else(|_| "Template error".to_string()),
            )
            .into_response()
        }
        Err(ConfirmationServiceError::MalformedToken) => {
            error_page(StatusCode::BAD_REQUEST, INVALID_TOKEN_MESSAGE, support_email)
        }
        Err(ConfirmationServiceError::InvalidOrExpiredToken) => {
            error_page(StatusCode::NOT_FOUND, USED_TOKEN_MESSAGE, support_email)
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

fn error_page(status: StatusCode, message: &str, support_email: String) -> Response {
    let template = EmailConfirmationErrorTemplate {
        message: message.to_string(),
        support_email,
    };
    (
        status,
        Html(
            template
                .render()
                .unwrap_or_else(|_| "Template error".to_string()),
        ),
    )
        .into_response()
}
