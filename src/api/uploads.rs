use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Public URL prefix the uploads directory is served under.
pub const PUBLIC_PREFIX: &str = "/storage/";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// 5 MB
const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Save a payment proof image and return its public path, e.g.
/// `/storage/3f1c....jpg`.
pub async fn save_payment_proof(uploads_dir: &str, filename: &str, data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::Validation("File too large (max 5 MB)".to_string()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .ok_or_else(|| AppError::Validation("Invalid filename".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid file type. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let dir = PathBuf::from(uploads_dir);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create uploads directory: {}", e)))?;

    let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
    let mut file = fs::File::create(dir.join(&stored_name))
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create file: {}", e)))?;
    file.write_all(data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;

    Ok(format!("{}{}", PUBLIC_PREFIX, stored_name))
}

/// Remove a previously saved proof. Paths outside the uploads prefix are
/// ignored.
pub async fn delete_payment_proof(uploads_dir: &str, public_path: &str) -> Result<()> {
    let Some(name) = public_path.strip_prefix(PUBLIC_PREFIX) else {
        return Ok(());
    };
    if name.contains('/') || name.contains("..") {
        return Ok(());
    }

    let path = PathBuf::from(uploads_dir).join(name);
    if fs::try_exists(&path).await.unwrap_or(false) {
        fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete file: {}", e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> String {
        std::env::temp_dir()
            .join(format!("lapangan-uploads-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_save_and_delete_proof() {
        let dir = temp_dir();
        let path = save_payment_proof(&dir, "transfer.PNG", b"not really a png").await.unwrap();
        assert!(path.starts_with(PUBLIC_PREFIX));
        assert!(path.ends_with(".png"));

        let on_disk = PathBuf::from(&dir).join(path.trim_start_matches(PUBLIC_PREFIX));
        assert!(on_disk.exists());

        delete_payment_proof(&dir, &path).await.unwrap();
        assert!(!on_disk.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejects_other_file_types() {
        let err = save_payment_proof(&temp_dir(), "invoice.pdf", b"%PDF").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
