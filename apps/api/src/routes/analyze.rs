use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    Json,
};
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::pipeline::{AnalysisRequest, ResumeReport};
use crate::state::AppState;

/// Form fields accepted by the analyze endpoint.
#[derive(Debug, Default)]
struct AnalyzeForm {
    file: Option<(String, Bytes)>,
    job_description: Option<String>,
    enable_ai: Option<bool>,
}

impl AnalyzeForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = AnalyzeForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    let file_name = field
                        .file_name()
                        .map(str::to_string)
                        .filter(|n| !n.trim().is_empty())
                        .ok_or_else(|| {
                            AppError::Validation("'file' field must carry a file name".into())
                        })?;
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    form.file = Some((file_name, bytes));
                }
                Some("job_description") => {
                    form.job_description = Some(field.text().await.map_err(bad_multipart)?);
                }
                Some("enable_ai") => {
                    form.enable_ai = Some(parse_flag(&field.text().await.map_err(bad_multipart)?));
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_request(self) -> Result<AnalysisRequest, AppError> {
        let (file_name, bytes) = self
            .file
            .ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
        Ok(AnalysisRequest {
            bytes,
            file_name,
            job_description: self.job_description.filter(|j| !j.trim().is_empty()),
            enable_ai: self.enable_ai.unwrap_or(true),
        })
    }
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {err}"))
}

/// Anything but "false", "0", "off" or "no" enables the flag.
fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "off" | "no"
    )
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResumeReport>, AppError> {
    let request = AnalyzeForm::read(multipart).await?.into_request()?;
    info!(
        "Analyzing '{}' ({} bytes, ai={}, job_description={})",
        request.file_name,
        request.bytes.len(),
        request.enable_ai,
        request.job_description.is_some()
    );

    let report = state.pipeline.run(request).await?;
    Ok(Json(report))
}
