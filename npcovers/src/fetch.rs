//! Module de récupération des pochettes distantes
//!
//! Ce module télécharge et décode une pochette depuis une URL, avec des
//! délais bornés et une annulation coopérative. Le décodage, purement CPU,
//! se fait hors de l'exécuteur async.

use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;

use crate::errors::FetchError;

/// Délai de connexion par défaut (millisecondes).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Délai de lecture par défaut (millisecondes).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

/// Paramètres du téléchargement de pochettes.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Délai maximal d'établissement de la connexion
    pub connect_timeout: Duration,
    /// Délai maximal de réception de la réponse
    pub read_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// Source d'images de pochettes.
///
/// Le pipeline ne connaît que ce trait : la production passe par
/// [`HttpArtSource`], les tests injectent une source scriptée.
#[async_trait]
pub trait ArtSource: Send + Sync {
    /// Télécharge et décode la pochette à `url`.
    ///
    /// L'annulation via `cancel` est coopérative : elle est observée avant la
    /// requête, pendant l'attente de la réponse et avant le retour. Une
    /// annulation ne produit jamais d'image partielle.
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<DynamicImage, FetchError>;
}

/// Source HTTP de production.
pub struct HttpArtSource {
    client: reqwest::Client,
}

impl HttpArtSource {
    /// Construit la source avec les délais de `config`.
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtSource for HttpArtSource {
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<DynamicImage, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::cancelled(url));
        }

        // Lancer la requête, en course avec l'annulation
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
            result = self.client.get(url).send() => {
                result.map_err(|e| classify(url, e))?
            }
        };

        // Vérifier le statut
        if !response.status().is_success() {
            return Err(FetchError::failed(
                url,
                &format!("HTTP error: {}", response.status()),
            ));
        }

        // Récupérer le corps complet, toujours en course avec l'annulation
        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
            result = response.bytes() => {
                result.map_err(|e| classify(url, e))?
            }
        };

        // Décoder hors de l'exécuteur (image::load_from_memory est bloquant)
        let decode_url = url.to_string();
        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map_err(|e| FetchError::Failed(decode_url, e.to_string()))
        })
        .await
        .map_err(|e| FetchError::failed(url, &e.to_string()))??;

        if cancel.is_cancelled() {
            return Err(FetchError::cancelled(url));
        }

        Ok(decoded)
    }
}

/// Sépare les dépassements de délai des autres échecs réseau.
fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::failed(url, &error.to_string())
    }
}
