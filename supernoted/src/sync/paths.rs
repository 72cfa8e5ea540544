use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("remote uri is empty")]
    Empty,
    #[error("remote uri contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("remote uri does not name a file: {0}")]
    NoFileName(String),
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a remote file lands locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub parent_dir: PathBuf,
    pub file_path: PathBuf,
}

pub fn local_path_for(output_dir: &Path, uri: &str) -> Result<PathBuf, PathError> {
    if uri.is_empty() {
        return Err(PathError::Empty);
    }

    // Remote uris are POSIX-like ("/Note/Journal.note"); map them under output_dir.
    let mut out = output_dir.to_path_buf();
    for component in Path::new(uri).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir => continue,
            Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent(uri.to_string()));
            }
        }
    }
    Ok(out)
}

/// Maps `uri` under `output_dir` and creates every missing ancestor of the
/// resulting file. Runs before each download: children can be processed
/// before anything else touched their parent directory.
pub async fn prepare_local_target(output_dir: &Path, uri: &str) -> Result<LocalTarget, PathError> {
    let file_path = local_path_for(output_dir, uri)?;
    if file_path == output_dir {
        return Err(PathError::NoFileName(uri.to_string()));
    }
    let parent_dir = file_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| PathError::NoFileName(uri.to_string()))?;
    tokio::fs::create_dir_all(&parent_dir)
        .await
        .map_err(|source| PathError::CreateDir {
            path: parent_dir.clone(),
            source,
        })?;
    Ok(LocalTarget {
        parent_dir,
        file_path,
    })
}
