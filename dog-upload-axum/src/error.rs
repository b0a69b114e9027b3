use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dog_upload::UploadError;
use serde_json::json;

/// Error answered by the upload routes.
///
/// Rendered as a Feathers-style body: `name`, `message`, `code`, `className`
/// and, for validation failures, `errors`.
#[derive(Debug)]
pub enum UploadHttpError {
    Upload(UploadError),
    /// The request body could not be read as multipart form data
    BadRequest(String),
}

impl From<UploadError> for UploadHttpError {
    fn from(e: UploadError) -> Self {
        Self::Upload(e)
    }
}

impl From<multer::Error> for UploadHttpError {
    fn from(e: multer::Error) -> Self {
        Self::BadRequest(format!("Failed to parse multipart data: {}", e))
    }
}

impl From<std::io::Error> for UploadHttpError {
    fn from(e: std::io::Error) -> Self {
        Self::Upload(UploadError::from(e))
    }
}

impl UploadHttpError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(e) if e.is_rejection() => match e {
                UploadError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                UploadError::AlreadyExists { .. } => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn feathers_name(status: StatusCode) -> (&'static str, &'static str) {
        match status {
            StatusCode::BAD_REQUEST => ("BadRequest", "bad-request"),
            StatusCode::UNPROCESSABLE_ENTITY => ("Unprocessable", "unprocessable"),
            StatusCode::CONFLICT => ("Conflict", "conflict"),
            _ => ("GeneralError", "general-error"),
        }
    }
}

impl std::fmt::Display for UploadHttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload(e) => write!(f, "{}", e),
            Self::BadRequest(message) => f.write_str(message),
        }
    }
}

impl IntoResponse for UploadHttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (name, class_name) = Self::feathers_name(status);

        // Server-side causes stay in the logs
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "upload failed");
            "Upload failed".to_string()
        } else if let Self::Upload(UploadError::Validation { message, .. }) = &self {
            message.clone()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "name": name,
            "message": message,
            "code": status.as_u16(),
            "className": class_name,
        });

        if let Self::Upload(UploadError::Validation { key, message }) = &self {
            body["errors"] = json!({ key.as_str(): [message] });
        }

        (status, Json(body)).into_response()
    }
}
