use crate::extract::{ExtractError, GradeExtractor, ImageUpload};
use crate::model::{ExtractedRow, StudentRecord};
use crate::status::GradeStatus;
use crate::store::{GradeStore, StoreError};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub records: Vec<StudentRecord>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Short batch id: the first 8 hex digits of a fresh v4 UUID.
pub fn new_batch_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub fn build_batch(rows: Vec<ExtractedRow>) -> Batch {
    let batch_id = new_batch_id();
    let records = rows
        .into_iter()
        .map(|row| StudentRecord {
            id: Uuid::new_v4().to_string(),
            batch_id: Some(batch_id.clone()),
            grades: row.grades(),
            name: row.name.trim().to_string(),
            status: GradeStatus::Pending,
            feedback: None,
            last_viewed: None,
        })
        .collect();
    Batch { batch_id, records }
}

pub fn image_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Extracts rows from `image` and replaces the active batch with them.
///
/// Nothing is written unless extraction fully succeeds; a failed upload
/// leaves the previous batch active.
pub fn upload<S, E>(store: &mut S, extractor: &E, image: &ImageUpload) -> Result<Batch, UploadError>
where
    S: GradeStore + ?Sized,
    E: GradeExtractor + ?Sized,
{
    let rows = extractor.extract(image)?;
    let batch = build_batch(rows);
    store.save_all(&batch.records)?;
    info!(
        batch_id = %batch.batch_id,
        students = batch.records.len(),
        "grade batch replaced"
    );
    Ok(batch)
}
