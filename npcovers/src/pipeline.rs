//! Module d'orchestration du chargement de pochettes
//!
//! Ce module relie la source distante, le redimensionnement et le cache
//! mémoire. Il maintient deux invariants : au plus un téléchargement en vol,
//! et un résultat dépassé n'est jamais livré après une demande plus récente.

use std::sync::Arc;

use npcache::Cache;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::cover::CoverImage;
use crate::errors::FetchError;
use crate::fetch::ArtSource;
use crate::scale::{DEFAULT_MAX_EDGE, fit_within};

/// Capacité par défaut du cache de pochettes (octets).
pub const DEFAULT_CACHE_CAPACITY: u64 = 32 * 1024 * 1024;

/// Paramètres du pipeline de pochettes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Taille maximale du plus grand côté après redimensionnement
    pub max_edge: u32,
    /// Capacité du cache mémoire, en octets
    pub cache_capacity: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Issue d'une demande de résolution.
#[derive(Debug)]
pub enum Resolution {
    /// URL absente : l'association courante est effacée
    Cleared,
    /// Demande identique à celle déjà en vol : rien à relancer
    Unchanged,
    /// Image disponible immédiatement (cache)
    Ready(CoverImage),
    /// Téléchargement lancé, l'issue arrivera par le canal d'outcomes
    Fetching,
}

/// Résultat brut d'un téléchargement, renvoyé vers la tâche propriétaire.
///
/// La tâche qui possède le pipeline doit repasser chaque outcome à
/// [`ArtPipeline::complete`] : c'est là que se fait la revérification de
/// l'URL voulue.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Clé normalisée demandée au lancement du téléchargement
    pub key: String,
    /// Numéro du téléchargement, pour écarter les tickets dépassés
    pub generation: u64,
    /// Image décodée et redimensionnée, ou l'erreur rencontrée
    pub result: Result<CoverImage, FetchError>,
}

/// Un téléchargement en vol.
///
/// L'annulation est coopérative : le jeton est signalé, la tâche n'est
/// jamais jointe ni avortée.
struct FetchTicket {
    cancel: CancellationToken,
}

/// État du pipeline vis-à-vis de l'URL courante.
enum PipelineState {
    /// Aucune pochette associée
    Idle,
    /// Téléchargement en vol pour `key`
    Fetching { key: String, ticket: FetchTicket },
    /// Issue connue pour `key`, l'image correspondante est au mieux en cache
    Settled { key: String },
}

/// Orchestrateur cache / réseau pour les pochettes.
///
/// Conçu pour être possédé par une tâche unique : toutes les méthodes
/// prennent `&mut self` et aucune ne bloque.
pub struct ArtPipeline {
    config: PipelineConfig,
    source: Arc<dyn ArtSource>,
    cache: Cache<CoverImage>,
    outcomes: UnboundedSender<FetchOutcome>,
    state: PipelineState,
    generation: u64,
}

impl ArtPipeline {
    pub fn new(
        source: Arc<dyn ArtSource>,
        config: PipelineConfig,
        outcomes: UnboundedSender<FetchOutcome>,
    ) -> Self {
        let cache = Cache::new(config.cache_capacity);
        Self {
            config,
            source,
            cache,
            outcomes,
            state: PipelineState::Idle,
            generation: 0,
        }
    }

    /// Demande la pochette pour `url`.
    ///
    /// # Workflow
    ///
    /// 1. URL absente ou vide : annule le téléchargement en vol, efface
    ///    l'association et retourne [`Resolution::Cleared`] immédiatement
    /// 2. URL identique à celle déjà en vol : [`Resolution::Unchanged`],
    ///    aucun téléchargement dupliqué
    /// 3. Sinon : annule l'éventuel téléchargement en vol, sert depuis le
    ///    cache si possible ([`Resolution::Ready`]), ou lance un
    ///    téléchargement ([`Resolution::Fetching`])
    pub fn resolve(&mut self, url: Option<&str>) -> Resolution {
        let raw = url.unwrap_or("");
        if raw.is_empty() {
            self.cancel_inflight();
            self.state = PipelineState::Idle;
            debug!("Cover art association cleared");
            return Resolution::Cleared;
        }

        let key = normalize_key(raw);

        // Une demande identique à celle en vol ne relance rien
        if let PipelineState::Fetching { key: current, .. } = &self.state {
            if *current == key {
                debug!("Cover fetch already in flight for {}", key);
                return Resolution::Unchanged;
            }
        }

        self.request(raw, key)
    }

    /// Repasse le résultat d'un téléchargement au pipeline.
    ///
    /// Retourne l'image à afficher si le résultat correspond toujours à la
    /// demande courante, `None` sinon (résultat dépassé ou en échec).
    pub fn complete(&mut self, outcome: FetchOutcome) -> Option<CoverImage> {
        let wanted = match &self.state {
            PipelineState::Fetching { key, .. } => key.clone(),
            _ => {
                debug!("Dropping fetch outcome for {}: no fetch in flight", outcome.key);
                return None;
            }
        };

        // L'annulation est coopérative : un résultat dépassé peut encore
        // arriver ici, c'est cette revérification qui fait foi
        if outcome.generation != self.generation || outcome.key != wanted {
            debug!("Dropping superseded fetch outcome for {}", outcome.key);
            return None;
        }

        match outcome.result {
            Ok(cover) => {
                self.cache.put(&wanted, cover.clone());
                self.state = PipelineState::Settled { key: wanted.clone() };
                debug!("Cover art settled for {}", wanted);
                Some(cover)
            }
            Err(FetchError::Cancelled(url)) => {
                debug!("Cover fetch cancelled for {}", url);
                self.state = PipelineState::Idle;
                None
            }
            Err(error) => {
                warn!("Cover fetch failed: {}", error);
                self.state = PipelineState::Idle;
                None
            }
        }
    }

    /// Annule tout téléchargement en vol et vide le cache.
    ///
    /// Appelé à l'arrêt de la session. Sans effet si déjà vide.
    pub fn clear(&mut self) {
        self.cancel_inflight();
        self.state = PipelineState::Idle;
        self.cache.evict_all();
    }

    /// Vrai si un téléchargement est en vol.
    pub fn is_fetching(&self) -> bool {
        matches!(self.state, PipelineState::Fetching { .. })
    }

    /// Clé normalisée de la demande courante, s'il y en a une.
    pub fn current_key(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Idle => None,
            PipelineState::Fetching { key, .. } => Some(key),
            PipelineState::Settled { key } => Some(key),
        }
    }

    /// Nombre de pochettes en cache.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Poids cumulé des pochettes en cache, en octets.
    pub fn cache_weight(&self) -> u64 {
        self.cache.total_weight()
    }

    /// Sert `key` depuis le cache ou lance un téléchargement.
    fn request(&mut self, raw: &str, key: String) -> Resolution {
        self.cancel_inflight();

        if let Some(cover) = self.cache.get(&key) {
            debug!("Cover art cache hit for {}", key);
            let cover = cover.clone();
            self.state = PipelineState::Settled { key };
            return Resolution::Ready(cover);
        }

        self.spawn_fetch(raw, key)
    }

    /// Lance le téléchargement de `raw` en arrière-plan.
    ///
    /// Le redimensionnement se fait dans la tâche de téléchargement, jamais
    /// dans la tâche propriétaire du pipeline.
    fn spawn_fetch(&mut self, raw: &str, key: String) -> Resolution {
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let source = self.source.clone();
        let outcomes = self.outcomes.clone();
        let max_edge = self.config.max_edge;
        let url = raw.to_string();
        let outcome_key = key.clone();
        let token = cancel.clone();

        debug!("Fetching cover art from {}", url);
        tokio::spawn(async move {
            let result = source
                .fetch(&url, token)
                .await
                .map(|img| CoverImage::new(fit_within(img, max_edge)));
            let _ = outcomes.send(FetchOutcome {
                key: outcome_key,
                generation,
                result,
            });
        });

        self.state = PipelineState::Fetching {
            key,
            ticket: FetchTicket { cancel },
        };
        Resolution::Fetching
    }

    /// Signale l'annulation du téléchargement en vol, s'il y en a un.
    fn cancel_inflight(&mut self) {
        if let PipelineState::Fetching { key, ticket } = &self.state {
            debug!("Cancelling in-flight cover fetch for {}", key);
            ticket.cancel.cancel();
        }
    }
}

/// Normalise une URL pour servir de clé de cache.
///
/// Deux graphies équivalentes (casse du schéma et de l'hôte, port par
/// défaut) partagent ainsi la même entrée. Une chaîne qui ne se parse pas
/// sert de clé telle quelle.
fn normalize_key(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}
