use objcentric_core::{ErrorBody, PredictError};
use rocket::{
    Request,
    http::Status,
    response::{self, Responder},
    serde::json::{self, Json},
};

#[derive(thiserror::Error, Debug, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unprocessable(_) => Status::UnprocessableEntity,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    /// Stable code placed in [`ErrorBody::error`].
    pub fn code(&self) -> &'static str {
        self.into()
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            detail: self.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if let ApiError::Internal(detail) = &self {
            log::error!("{} {} failed: {detail}", req.method(), req.uri());
        } else {
            log::debug!("{} {} rejected: {self}", req.method(), req.uri());
        }
        (self.status(), Json(self.body())).respond_to(req)
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<json::Error<'_>> for ApiError {
    fn from(err: json::Error<'_>) -> Self {
        match err {
            json::Error::Io(err) => {
                ApiError::BadRequest(format!("Failed to read request body: {err}"))
            }
            json::Error::Parse(_, err) => {
                ApiError::Unprocessable(format!("Invalid JSON body: {err}"))
            }
        }
    }
}
