use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{AppError, Result},
    files::{
        format_file_size, BlobEntry, FileCategory, FileKind, ImageCategory, LibraryStats, ListOptions,
        ListPage, UploadRequest, UploadResult,
    },
    models::ApiResponse,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct FolderQuery {
    pub folder: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    pub category: Option<ImageCategory>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LibraryQuery {
    pub search: Option<String>,
    pub category: Option<FileCategory>,
    pub prefix: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LibraryFile {
    #[serde(flatten)]
    pub entry: BlobEntry,
    pub kind: FileKind,
    pub size_label: String,
}

impl From<BlobEntry> for LibraryFile {
    fn from(entry: BlobEntry) -> Self {
        Self {
            kind: FileKind::of(entry.content_type.as_deref()),
            size_label: format_file_size(entry.size_bytes),
            entry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub files: Vec<LibraryFile>,
    pub stats: LibraryStats,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

/// Collects every file part whose field name is one of `field_names`.
async fn read_files(multipart: &mut Multipart, field_names: &[&str]) -> Result<Vec<UploadRequest>> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        if !field_names.contains(&name.as_str()) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(base_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing filename".to_string()))?
            .to_string();

        let content_type = match field.content_type() {
            Some(content_type) => content_type.to_string(),
            None => mime_guess::from_path(&file_name)
                .first_or(mime::APPLICATION_OCTET_STREAM)
                .essence_str()
                .to_string(),
        };

        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        files.push(UploadRequest::new(file_name, content_type, data.to_vec()));
    }

    Ok(files)
}

/// Drops any client-side directory, e.g. `C:\fakepath\a.png` or `photos/a.png`.
fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
        .trim()
}

async fn read_single_file(multipart: &mut Multipart) -> Result<UploadRequest> {
    read_files(multipart, &["file"])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("No file found in request".to_string()))
}

pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResult>>> {
    let mut file = read_single_file(&mut multipart).await?;
    if let Some(folder) = query.folder {
        file = file.with_folder(folder);
    }

    let (size_bytes, content_type) = (file.size_bytes, file.mime_type.clone());
    let result = state.uploader.upload_one(file).await?;
    state.library.record(&result, size_bytes, &content_type);

    Ok(Json(ApiResponse::success(result)))
}

pub async fn upload_batch(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<UploadResult>>>> {
    let mut files = read_files(&mut multipart, &["files", "file"]).await?;
    if files.is_empty() {
        return Err(AppError::BadRequest("No files found in request".to_string()));
    }

    if let Some(folder) = query.folder {
        files = files.into_iter().map(|f| f.with_folder(folder.clone())).collect();
    }

    let submitted = files.len();
    let results = state.uploader.upload_many(files).await?;

    if !results.is_empty() {
        if let Err(e) = state.library.refresh(None).await {
            warn!("Failed to refresh file library after batch upload: {}", e);
        }
    }

    let message = format!("{} of {} files uploaded", results.len(), submitted);
    Ok(Json(ApiResponse::success(results).with_message(message)))
}

pub async fn upload_image(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResult>>> {
    let file = read_single_file(&mut multipart).await?;
    let (size_bytes, content_type) = (file.size_bytes, file.mime_type.clone());

    let result = match query.category {
        Some(category) => state.uploader.upload_image_in(category, file).await?,
        None => state.uploader.upload_image(file).await?,
    };
    state.library.record(&result, size_bytes, &content_type);

    Ok(Json(ApiResponse::success(result)))
}

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResult>>> {
    let file = read_single_file(&mut multipart).await?;
    let (size_bytes, content_type) = (file.size_bytes, file.mime_type.clone());

    let result = state.uploader.upload_document(file).await?;
    state.library.record(&result, size_bytes, &content_type);

    Ok(Json(ApiResponse::success(result)))
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<ListPage>>> {
    let options = ListOptions {
        prefix: query.prefix,
        limit: query.limit,
        cursor: query.cursor,
    };

    let page = state.uploader.gateway().list(&options).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn file_info(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<ApiResponse<LibraryFile>>> {
    let entry = state
        .uploader
        .gateway()
        .head(&query.url)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    Ok(Json(ApiResponse::success(entry.into())))
}

pub async fn delete_files(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    if request.urls.is_empty() {
        return Err(AppError::BadRequest("No urls given".to_string()));
    }

    state.library.delete_selected(&request.urls).await?;
    info!("Deleted {} files", request.urls.len());

    Ok(Json(ApiResponse::success(DeleteResponse {
        deleted: request.urls.len(),
    })))
}

pub async fn library(
    State(state): State<AppState>,
    Query(query): Query<LibraryQuery>,
) -> Result<Json<ApiResponse<LibraryResponse>>> {
    if query.refresh || query.prefix.is_some() {
        state.library.refresh(query.prefix.as_deref()).await?;
    }

    let files = state
        .library
        .search(query.search.as_deref().unwrap_or(""), query.category.unwrap_or_default())
        .into_iter()
        .map(LibraryFile::from)
        .collect();

    Ok(Json(ApiResponse::success(LibraryResponse {
        files,
        stats: state.library.stats(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_strips_client_directories() {
        assert_eq!(base_name("logo.png"), "logo.png");
        assert_eq!(base_name("C:\\fakepath\\receipt.jpg"), "receipt.jpg");
        assert_eq!(base_name("photos/2024/me.png"), "me.png");
        assert_eq!(base_name("mixed\\dir/name.pdf"), "name.pdf");
        assert_eq!(base_name("folder/"), "");
    }
}
