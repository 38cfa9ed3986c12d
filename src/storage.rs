//! Выгрузка файлов в объектное хранилище
//!
//! S3 доступен через утилиту `aws`; учетные данные и бакет берутся из
//! переменных окружения. Повторных попыток нет.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Result, TtsPrepError};
use crate::utils::tools;

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const BUCKET_ENV: &str = "AWS_STORAGE_BUCKET_NAME";

/// Объектное хранилище
pub trait ObjectStorage {
    /// Выгрузить локальный файл по удаленному пути
    fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()>;
}

/// Учетные данные S3
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl S3Credentials {
    /// Прочитать учетные данные из переменных окружения
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Прочитать учетные данные через функцию поиска переменных
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| TtsPrepError::Credentials(format!("{} is not set", name)))
        };

        Ok(Self {
            access_key_id: get(ACCESS_KEY_ENV)?,
            secret_access_key: get(SECRET_KEY_ENV)?,
            bucket: get(BUCKET_ENV)?,
        })
    }
}

/// Хранилище S3 через утилиту `aws`
#[derive(Debug, Clone)]
pub struct S3Storage {
    credentials: S3Credentials,
    program: String,
}

impl S3Storage {
    pub fn new(credentials: S3Credentials) -> Self {
        Self {
            credentials,
            program: "aws".to_string(),
        }
    }

    /// Хранилище с учетными данными из окружения
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(S3Credentials::from_env()?))
    }

    /// Использовать другой исполняемый файл вместо `aws`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Адрес объекта в бакете
    pub fn object_url(&self, remote_path: &str) -> String {
        format!(
            "s3://{}/{}",
            self.credentials.bucket,
            remote_path.trim_start_matches('/')
        )
    }
}

impl ObjectStorage for S3Storage {
    fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        if !local_path.is_file() {
            return Err(TtsPrepError::FileNotFound(format!(
                "File to upload not found: {}",
                local_path.display()
            )));
        }

        let tool = tools::locate_tool(&self.program)
            .map_err(|e| TtsPrepError::Storage(format!("aws CLI is not available: {}", e)))?;

        let url = self.object_url(remote_path);
        log::info!("Uploading {} to {}", local_path.display(), url);

        let output = Command::new(&tool.path)
            .args(["s3", "cp"])
            .arg(local_path)
            .arg(&url)
            .arg("--only-show-errors")
            .env(ACCESS_KEY_ENV, &self.credentials.access_key_id)
            .env(SECRET_KEY_ENV, &self.credentials.secret_access_key)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| TtsPrepError::Storage(format!("Failed to run {}: {}", tool.path.display(), e)))?;

        if output.status.success() {
            log::info!("Upload successful");
            return Ok(());
        }

        let error = classify_failure(&String::from_utf8_lossy(&output.stderr));
        log::error!("{}", error);
        Err(error)
    }
}

const CREDENTIAL_MARKERS: &[&str] = &[
    "Unable to locate credentials",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "partial credentials",
];

const AUTHORIZATION_MARKERS: &[&str] = &["AccessDenied", "Forbidden", "(403)", "AllAccessDisabled"];

/// Определить вид ошибки по выводу `aws`
pub fn classify_failure(stderr: &str) -> TtsPrepError {
    let message = stderr.trim().to_string();
    if CREDENTIAL_MARKERS.iter().any(|m| message.contains(m)) {
        TtsPrepError::Credentials(message)
    } else if AUTHORIZATION_MARKERS.iter().any(|m| message.contains(m)) {
        TtsPrepError::Authorization(message)
    } else {
        TtsPrepError::Storage(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn credentials() -> S3Credentials {
        S3Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            bucket: "tts-models".to_string(),
        }
    }

    #[test]
    fn test_credentials_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ACCESS_KEY_ENV, "AKIDEXAMPLE"),
            (SECRET_KEY_ENV, "secret"),
            (BUCKET_ENV, "tts-models"),
        ]
        .into_iter()
        .collect();

        let creds = S3Credentials::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.bucket, "tts-models");
        assert!(!format!("{:?}", creds).contains("secret\""));
    }

    #[test]
    fn test_missing_variable_is_credentials_error() {
        let result = S3Credentials::from_lookup(|name| {
            (name != BUCKET_ENV).then(|| "value".to_string())
        });
        match result {
            Err(TtsPrepError::Credentials(message)) => assert!(message.contains(BUCKET_ENV)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_object_url() {
        let storage = S3Storage::new(credentials());
        assert_eq!(storage.object_url("/checkpoints/G_100.pth"), "s3://tts-models/checkpoints/G_100.pth");
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("upload failed: An error occurred (InvalidAccessKeyId) when calling PutObject"),
            TtsPrepError::Credentials(_)
        ));
        assert!(matches!(
            classify_failure("An error occurred (AccessDenied) when calling the PutObject operation"),
            TtsPrepError::Authorization(_)
        ));
        assert!(matches!(classify_failure("Connection reset by peer"), TtsPrepError::Storage(_)));
    }

    #[test]
    fn test_upload_missing_file() {
        let storage = S3Storage::new(credentials());
        let result = storage.upload(Path::new("/definitely/not/here.pth"), "x.pth");
        assert!(matches!(result, Err(TtsPrepError::FileNotFound(_))));
    }

    #[test]
    fn test_upload_without_cli_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("G_1.pth");
        std::fs::write(&file, "{}").unwrap();

        let storage = S3Storage::new(credentials()).with_program("/definitely/not/here/aws");
        assert!(matches!(storage.upload(&file, "G_1.pth"), Err(TtsPrepError::Storage(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_upload_through_cli() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("G_1.pth");
        std::fs::write(&file, "{}").unwrap();

        let write_script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        let ok = write_script("aws-ok", r#"[ "$1 $2" = "s3 cp" ] && [ -n "$AWS_ACCESS_KEY_ID" ]"#);
        let storage = S3Storage::new(credentials()).with_program(ok.to_string_lossy());
        storage.upload(&file, "G_1.pth").unwrap();

        let denied = write_script(
            "aws-denied",
            "echo 'An error occurred (AccessDenied) when calling the PutObject operation' >&2; exit 1",
        );
        let storage = S3Storage::new(credentials()).with_program(denied.to_string_lossy());
        assert!(matches!(storage.upload(&file, "G_1.pth"), Err(TtsPrepError::Authorization(_))));
    }
}
