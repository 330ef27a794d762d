use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use futures_util::StreamExt;
use log::info;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::document::Document;
use crate::utils::auth::AuthUser;
use crate::utils::s3;

pub const PROFILE_PICTURE_MAX_BYTES: usize = 100 * 1024;
pub const DOCUMENT_MAX_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    ProfilePicture,
    Resume,
    IdProof,
    AddressProof,
    OfferLetter,
    Educational,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ProfilePicture => "profile_picture",
            DocumentType::Resume => "resume",
            DocumentType::IdProof => "id_proof",
            DocumentType::AddressProof => "address_proof",
            DocumentType::OfferLetter => "offer_letter",
            DocumentType::Educational => "educational",
            DocumentType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "profile_picture" => Some(DocumentType::ProfilePicture),
            "resume" => Some(DocumentType::Resume),
            "id_proof" => Some(DocumentType::IdProof),
            "address_proof" => Some(DocumentType::AddressProof),
            "offer_letter" => Some(DocumentType::OfferLetter),
            "educational" => Some(DocumentType::Educational),
            "other" => Some(DocumentType::Other),
            _ => None,
        }
    }

    fn max_bytes(&self) -> usize {
        match self {
            DocumentType::ProfilePicture => PROFILE_PICTURE_MAX_BYTES,
            _ => DOCUMENT_MAX_BYTES,
        }
    }

    fn accepts(&self, mime_type: &str) -> bool {
        match self {
            DocumentType::ProfilePicture => matches!(mime_type, "image/jpeg" | "image/png"),
            _ => matches!(mime_type, "image/jpeg" | "image/png" | "application/pdf"),
        }
    }
}

/// Detected type of an accepted upload.
#[derive(Debug, PartialEq)]
pub struct SniffedFile {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Checks size and content of an upload. The type comes from the file's
/// magic bytes, never from the client.
pub fn check_upload(document_type: DocumentType, file: &[u8]) -> Result<SniffedFile, AppError> {
    if file.is_empty() {
        return Err(AppError::BadRequest("Empty file provided".to_string()));
    }
    if file.len() > document_type.max_bytes() {
        return Err(AppError::BadRequest(format!(
            "File exceeds the {} KiB limit for {}",
            document_type.max_bytes() / 1024,
            document_type.as_str()
        )));
    }

    let kind = infer::get(file).ok_or_else(|| AppError::BadRequest("Unrecognised file type".to_string()))?;
    if !document_type.accepts(kind.mime_type()) {
        return Err(AppError::BadRequest(format!(
            "{} is not accepted for {}",
            kind.mime_type(),
            document_type.as_str()
        )));
    }

    Ok(SniffedFile {
        mime_type: kind.mime_type(),
        extension: kind.extension(),
    })
}

#[derive(Default)]
struct UploadForm {
    employee_id: Option<String>,
    document_type: Option<String>,
    file_name: Option<String>,
    file: Option<Vec<u8>>,
}

async fn read_form(mut payload: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|err| AppError::BadRequest(format!("Invalid multipart request: {}", err)))?;
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let file_name = disposition.get_filename().map(|name| name.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|err| AppError::BadRequest(format!("Multipart error: {}", err)))?;
            if data.len() + chunk.len() > DOCUMENT_MAX_BYTES {
                return Err(AppError::BadRequest(format!(
                    "File exceeds the {} KiB limit",
                    DOCUMENT_MAX_BYTES / 1024
                )));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                form.file_name = file_name;
                form.file = Some(data);
            }
            "employee_id" | "employeeId" => form.employee_id = Some(text_field(&name, data)?),
            "document_type" | "documentType" => form.document_type = Some(text_field(&name, data)?),
            _ => {}
        }
    }

    Ok(form)
}

fn text_field(name: &str, data: Vec<u8>) -> Result<String, AppError> {
    String::from_utf8(data)
        .map(|value| value.trim().to_string())
        .map_err(|_| AppError::BadRequest(format!("{} must be UTF-8 text", name)))
}

pub async fn upload_document(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    s3_client: web::Data<S3Client>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    let form = read_form(payload).await?;

    let employee_id = match form.employee_id.as_deref() {
        Some(raw) => Uuid::parse_str(raw)
            .map_err(|_| AppError::BadRequest("employee_id must be a UUID".to_string()))?,
        None => auth.own_employee_id()?,
    };
    auth.require_access_to(employee_id)?;

    let document_type = form
        .document_type
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("document_type is required".to_string()))?;
    let document_type = DocumentType::parse(document_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown document type {}", document_type)))?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("No 'file' field found".to_string()))?;
    let sniffed = check_upload(document_type, &file)?;

    let active: bool = sqlx::query_scalar("SELECT is_active FROM employees WHERE employee_id = $1")
        .bind(employee_id)
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))?;
    if !active {
        return Err(AppError::BadRequest("Employee is deactivated".to_string()));
    }

    let document_id = Uuid::new_v4();
    let key = format!("documents/{}/{}.{}", employee_id, document_id, sniffed.extension);
    let size_bytes = file.len() as i64;
    s3::put_object(&s3_client, &config.s3_bucket, &key, sniffed.mime_type, file).await?;
    let uri = config.object_uri(&key);
    let file_name = form
        .file_name
        .unwrap_or_else(|| format!("{}.{}", document_type.as_str(), sniffed.extension));

    let mut tx = pool.begin().await?;
    sqlx::query(
        "UPDATE documents SET is_active = FALSE \
         WHERE employee_id = $1 AND document_type = $2 AND is_active",
    )
    .bind(employee_id)
    .bind(document_type.as_str())
    .execute(&mut *tx)
    .await?;

    let document = sqlx::query_as::<_, Document>(
        "INSERT INTO documents (document_id, employee_id, document_type, file_name, uri, content_type, \
         size_bytes, uploaded_by, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9) RETURNING *",
    )
    .bind(document_id)
    .bind(employee_id)
    .bind(document_type.as_str())
    .bind(&file_name)
    .bind(&uri)
    .bind(sniffed.mime_type)
    .bind(size_bytes)
    .bind(auth.user_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    if document_type == DocumentType::ProfilePicture {
        sqlx::query("UPDATE employees SET profile_image_uri = $1, updated_at = $2 WHERE employee_id = $3")
            .bind(&uri)
            .bind(Utc::now())
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(
        "Uploaded {} for {} ({} bytes)",
        document_type.as_str(),
        employee_id,
        size_bytes
    );
    Ok(HttpResponse::Created().json(document))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQueryParams {
    employee_id: Option<Uuid>,
    document_type: Option<DocumentType>,
}

pub async fn get_documents(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<DocumentQueryParams>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match auth.scope_to(query.employee_id)? {
        Some(employee_id) => employee_id,
        None => auth.own_employee_id()?,
    };

    let documents = sqlx::query_as::<_, Document>(
        "SELECT * FROM documents WHERE employee_id = $1 AND is_active \
         AND ($2::text IS NULL OR document_type = $2) ORDER BY created_at DESC",
    )
    .bind(employee_id)
    .bind(query.document_type.map(|document_type| document_type.as_str()))
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(documents))
}

/// Deactivates a document. The stored object is kept.
pub async fn delete_document(
    auth: AuthUser,
    pool: web::Data<PgPool>,
    document_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let auth = auth.verified(&pool).await?;
    let document = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE document_id = $1 AND is_active")
        .bind(document_id.into_inner())
        .fetch_optional(&**pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
    auth.require_access_to(document.employee_id)?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE documents SET is_active = FALSE WHERE document_id = $1")
        .bind(document.document_id)
        .execute(&mut *tx)
        .await?;
    if DocumentType::parse(&document.document_type) == Some(DocumentType::ProfilePicture) {
        sqlx::query(
            "UPDATE employees SET profile_image_uri = NULL, updated_at = $1 \
             WHERE employee_id = $2 AND profile_image_uri = $3",
        )
        .bind(Utc::now())
        .bind(document.employee_id)
        .bind(&document.uri)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Document removed successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const PDF: &[u8] = b"%PDF-1.7\n";

    fn padded(header: &[u8], len: usize) -> Vec<u8> {
        let mut file = header.to_vec();
        file.resize(len, 0);
        file
    }

    #[test]
    fn profile_picture_accepts_small_png() {
        let sniffed = check_upload(DocumentType::ProfilePicture, &padded(&PNG, 2048)).unwrap();
        assert_eq!(sniffed.mime_type, "image/png");
        assert_eq!(sniffed.extension, "png");
    }

    #[test]
    fn profile_picture_rejects_pdf_and_large_files() {
        assert!(check_upload(DocumentType::ProfilePicture, &padded(PDF, 2048)).is_err());
        assert!(check_upload(DocumentType::ProfilePicture, &padded(&PNG, PROFILE_PICTURE_MAX_BYTES + 1)).is_err());
    }

    #[test]
    fn documents_accept_pdf_up_to_limit() {
        let sniffed = check_upload(DocumentType::Resume, &padded(PDF, PROFILE_PICTURE_MAX_BYTES + 1)).unwrap();
        assert_eq!(sniffed.mime_type, "application/pdf");
        assert!(check_upload(DocumentType::Resume, &padded(PDF, DOCUMENT_MAX_BYTES + 1)).is_err());
    }

    #[test]
    fn unknown_content_is_rejected() {
        assert!(check_upload(DocumentType::Other, b"plain text notes").is_err());
        assert!(check_upload(DocumentType::Other, &[]).is_err());
    }

    #[test]
    fn document_type_round_trips_through_text() {
        assert_eq!(DocumentType::parse("id_proof"), Some(DocumentType::IdProof));
        assert_eq!(DocumentType::parse("passport"), None);
        assert_eq!(DocumentType::OfferLetter.as_str(), "offer_letter");
    }
}
