use async_trait::async_trait;
use supernote_core::{ListingClient, ListingError, RemoteEntry};

/// Lists the entries of one remote directory page.
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    async fn read_directory(&self, url: &str) -> Result<Vec<RemoteEntry>, ListingError>;
}

#[async_trait]
impl DirectoryReader for ListingClient {
    async fn read_directory(&self, url: &str) -> Result<Vec<RemoteEntry>, ListingError> {
        ListingClient::read_directory(self, url).await
    }
}
