use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_CONVERTER_PROGRAM: &str = "supernote-tool";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{program} exited with {status}: {stderr}")]
    Program {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("converter produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Produces a derived sibling of a freshly downloaded file.
#[async_trait]
pub trait Converter: Send + Sync {
    fn accepts(&self, source: &Path) -> bool;

    /// Returns the path of the derived file.
    async fn convert(&self, source: &Path) -> Result<PathBuf, ConversionError>;
}

/// Renders `.note` notebooks to PDF with an external `supernote-tool`-style
/// program: `<program> convert -t pdf -a <source> <target>`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
}

impl CommandConverter {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_CONVERTER_PROGRAM)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for CommandConverter {
    fn accepts(&self, source: &Path) -> bool {
        source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("note"))
    }

    async fn convert(&self, source: &Path) -> Result<PathBuf, ConversionError> {
        let target = pdf_path_for(source);
        let output = tokio::process::Command::new(&self.program)
            .args(["convert", "-t", "pdf", "-a"])
            .arg(source)
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ConversionError::Program {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !tokio::fs::try_exists(&target).await? {
            return Err(ConversionError::MissingOutput(target));
        }
        Ok(target)
    }
}

pub fn pdf_path_for(source: &Path) -> PathBuf {
    source.with_extension("pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn accepts_note_files_only() {
        let converter = CommandConverter::new();
        assert!(converter.accepts(Path::new("/m/Note/Journal.note")));
        assert!(converter.accepts(Path::new("/m/Note/LOUD.NOTE")));
        assert!(!converter.accepts(Path::new("/m/Document/book.pdf")));
        assert!(!converter.accepts(Path::new("/m/Note/note")));
    }

    #[test]
    fn derived_file_sits_next_to_source() {
        assert_eq!(
            pdf_path_for(Path::new("/m/Note/Journal.note")),
            PathBuf::from("/m/Note/Journal.pdf")
        );
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.note");
        std::fs::write(&source, b"note").unwrap();

        let err = CommandConverter::with_program("definitely-not-a-real-converter")
            .convert(&source)
            .await
            .expect_err("expected spawn failure");
        assert!(matches!(err, ConversionError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_reported() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.note");
        std::fs::write(&source, b"note").unwrap();

        let err = CommandConverter::with_program("false")
            .convert(&source)
            .await
            .expect_err("expected conversion failure");
        assert!(matches!(err, ConversionError::Program { .. }));
        // The downloaded source stays in place.
        assert!(source.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_program_without_output_is_reported() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.note");
        std::fs::write(&source, b"note").unwrap();

        let err = CommandConverter::with_program("true")
            .convert(&source)
            .await
            .expect_err("expected missing output");
        assert!(matches!(err, ConversionError::MissingOutput(path) if path == dir.path().join("a.pdf")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn returns_derived_path_when_output_exists() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.note");
        std::fs::write(&source, b"note").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();

        let derived = CommandConverter::with_program("true")
            .convert(&source)
            .await
            .unwrap();
        assert_eq!(derived, dir.path().join("a.pdf"));
    }
}
