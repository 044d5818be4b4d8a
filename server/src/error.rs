use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(anyhow::Error),
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Internal(_) => Status::InternalServerError,
        }
    }
}

impl From<shared::Error> for ApiError {
    fn from(error: shared::Error) -> Self {
        match error {
            shared::Error::InvalidArgument(message) => Self::BadRequest(message),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<shared::Error>() {
            Ok(error) => error.into(),
            Err(error) => Self::Internal(error),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let message = match self {
            Self::BadRequest(message) => message,
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized => "unauthorized".to_string(),
            Self::Internal(e) => {
                tracing::error!("{} {} failed: {:#}", req.method(), req.uri(), e);
                "internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_becomes_bad_request() {
        let error: ApiError = anyhow::Error::from(shared::Error::invalid("negative experience")).into();
        assert_eq!(error.status(), Status::BadRequest);
        assert!(matches!(error, ApiError::BadRequest(message) if message == "negative experience"));
    }

    #[test]
    fn other_errors_are_internal() {
        let error: ApiError = anyhow::anyhow!("connection reset").into();
        assert_eq!(error.status(), Status::InternalServerError);
        assert_eq!(ApiError::not_found("user").status(), Status::NotFound);
        assert_eq!(ApiError::Unauthorized.status(), Status::Unauthorized);
    }
}
