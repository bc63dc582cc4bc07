use std::{fmt::Display, sync::Arc};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{relay::TransferError, resolver::ResolveError};

pub trait IntoAppError<R> {
    fn into_app_err<'a>(
        self,
        info: impl Into<Arc<str>>,
        kind: AppErrorKind,
        extra_details: &'a [&'a str],
    ) -> R;
}

#[derive(Debug)]
pub struct AppError {
    kind: AppErrorKind,
    info: Arc<str>,
    detailed_info: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../app/src/api-types/")]
pub enum AppErrorKind {
    InvalidInput,
    Resolution,
    RateLimited,
    Timeout,
    Transfer,
    Internal,
}

/// Body of every non-2xx response sent before a transfer has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../app/src/api-types/")]
pub struct ErrorResponse {
    pub error: String,
    pub kind: AppErrorKind,
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            info: Arc::clone(&self.info),
            detailed_info: Arc::clone(&self.detailed_info),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width: usize = 80;

        let kind = self.kind.to_string();
        let header = format!(
            "\n--{kind}{sep}",
            sep = "-".repeat(width.saturating_sub(kind.len() + 2))
        );
        let body = format!(
            "\nINFO: {info}\n\n{details}",
            info = self.info,
            details = self.detailed_info
        );
        let footer = "-".repeat(width);

        write!(f, "{header}{body}\n{footer}")
    }
}

impl Display for AppErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Self::InvalidInput => "INVALID INPUT",
            Self::Resolution => "RESOLUTION ERROR",
            Self::RateLimited => "RATE LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::Transfer => "TRANSFER ERROR",
            Self::Internal => "INTERNAL ERROR",
        };

        write!(f, "{str}")
    }
}

impl AppErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput | Self::Resolution => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Transfer => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E: Display> IntoAppError<AppError> for E {
    fn into_app_err<'a>(
        self,
        info: impl Into<Arc<str>>,
        kind: AppErrorKind,
        extra_details: &'a [&'a str],
    ) -> AppError {
        let app_err = AppError {
            kind,
            info: info.into(),
            detailed_info: AppError::format_detailed_info(self, extra_details),
        };

        log::error!("{app_err}");
        app_err
    }
}

impl<T, E> IntoAppError<Result<T, AppError>> for Result<T, E>
where
    E: IntoAppError<AppError>,
{
    fn into_app_err<'a>(
        self,
        info: impl Into<Arc<str>>,
        kind: AppErrorKind,
        extra_details: &'a [&'a str],
    ) -> Result<T, AppError> {
        self.map_err(|err| err.into_app_err(info, kind, extra_details))
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.user_err().serialize(serializer)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.user_err())
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        let kind = match &err {
            ResolveError::Unavailable(_) | ResolveError::Unsupported(_) | ResolveError::Failed(_) => {
                AppErrorKind::Resolution
            }
            ResolveError::RateLimited => AppErrorKind::RateLimited,
            ResolveError::Timeout => AppErrorKind::Timeout,
            ResolveError::ToolMissing(_) | ResolveError::Parse(_) => AppErrorKind::Internal,
        };

        let info = err.to_string();
        err.into_app_err(info, kind, &[])
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        let kind = match &err {
            TransferError::ProbeTimeout | TransferError::IdleTimeout => AppErrorKind::Timeout,
            _ => AppErrorKind::Transfer,
        };

        err.into_app_err("failed to start the transfer from the media source", kind, &[])
    }
}

impl AppError {
    pub fn new(kind: AppErrorKind, info: impl Into<Arc<str>>, extra_details: &[&str]) -> Self {
        let app_err = Self {
            kind,
            info: info.into(),
            detailed_info: AppError::format_detailed_info("", extra_details),
        };

        log::error!("{app_err}");
        app_err
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    fn format_detailed_info<D: Display>(err: D, extra_details: &[&str]) -> Arc<str> {
        format!(
            "DETAILS:\n{extra}{err}",
            err = if err.to_string().is_empty() {
                "".to_owned()
            } else {
                format!("\n\nERROR: {err}")
            },
            extra = extra_details.join("\n")
        )
        .into()
    }

    fn user_err(&self) -> ErrorResponse {
        // internal failures never leak their detail to the caller
        let error = match self.kind {
            AppErrorKind::Internal => "internal server error".to_owned(),
            _ => self.info.to_string(),
        };

        ErrorResponse {
            error,
            kind: self.kind,
        }
    }
}
