//! # npcovers - Pipeline de pochettes pour la session "now playing"
//!
//! Cette crate télécharge, décode, redimensionne et met en cache les
//! pochettes d'albums référencées par URL dans les mises à jour de lecture.
//!
//! ## Fonctionnalités
//!
//! - Téléchargement HTTP avec délais de connexion et de lecture bornés
//! - Annulation coopérative des téléchargements dépassés
//! - Redimensionnement borné (aucun côté au-delà de 512 px, jamais agrandi)
//! - Cache mémoire LRU pondéré par la taille des bitmaps (via `npcache`)
//!
//! ## Architecture
//!
//! `npcovers` est organisé autour d'un invariant : au plus un téléchargement
//! en vol, et un résultat dépassé n'est jamais livré après une demande plus
//! récente.
//!
//! ```text
//! npcovers
//!     ├── fetch.rs    - Source distante (trait ArtSource + impl HTTP)
//!     ├── scale.rs    - Redimensionnement avant mise en cache
//!     ├── cover.rs    - Bitmap décodé partagé (clonage bon marché)
//!     └── pipeline.rs - Orchestration cache / réseau / annulation
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use npcovers::{ArtPipeline, FetchConfig, HttpArtSource, PipelineConfig, Resolution};
//! use tokio::sync::mpsc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
//! let source = Arc::new(HttpArtSource::new(&FetchConfig::default())?);
//! let mut pipeline = ArtPipeline::new(source, PipelineConfig::default(), outcome_tx);
//!
//! match pipeline.resolve(Some("https://example.com/cover.jpg")) {
//!     Resolution::Ready(cover) => println!("depuis le cache: {}x{}", cover.image().width(), cover.image().height()),
//!     Resolution::Fetching => println!("téléchargement lancé, issue sur outcome_rx"),
//!     _ => {}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Voir aussi
//!
//! - [`npcache`] : cache LRU générique sous-jacent
//! - [`npsession`] : session qui pilote ce pipeline

pub mod cover;
pub mod errors;
pub mod fetch;
pub mod pipeline;
pub mod scale;

pub use cover::CoverImage;
pub use errors::FetchError;
pub use fetch::{ArtSource, FetchConfig, HttpArtSource};
pub use pipeline::{ArtPipeline, FetchOutcome, PipelineConfig, Resolution};
pub use scale::{DEFAULT_MAX_EDGE, fit_within};
