use thiserror::Error;

/// Erreurs du téléchargement et du décodage de pochettes.
///
/// Ces erreurs ne remontent jamais jusqu'à la session : le pipeline les
/// journalise et dégrade en "pas de changement de pochette".
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Cover fetch timed out for {0}")]
    Timeout(String),
    #[error("Cover fetch cancelled for {0}")]
    Cancelled(String),
    #[error("Cover fetch failed for {0}: {1}")]
    Failed(String, String),
}

impl FetchError {
    pub fn timeout(url: &str) -> Self {
        FetchError::Timeout(url.to_string())
    }

    pub fn cancelled(url: &str) -> Self {
        FetchError::Cancelled(url.to_string())
    }

    pub fn failed(url: &str, message: &str) -> Self {
        FetchError::Failed(url.to_string(), message.to_string())
    }
}
