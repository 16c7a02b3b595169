//! # npcache - Cache LRU en mémoire borné par le poids
//!
//! Cette crate fournit un cache en mémoire borné par le poids cumulé de ses
//! valeurs (en octets), avec éviction stricte des entrées les moins récemment
//! accédées. Elle sert de base à des caches spécialisés comme `npcovers`
//! (cache de pochettes décodées).
//!
//! ## Vue d'ensemble
//!
//! `npcache` fournit les composants de base pour :
//! - Stocker des valeurs pondérées indexées par clé
//! - Évincer automatiquement les entrées les moins récentes quand la
//!   capacité est dépassée
//! - Libérer explicitement les ressources des valeurs évincées via
//!   [`CacheValue::release`]
//! - Purger l'intégralité du cache à l'arrêt
//!
//! ## Utilisation
//!
//! ```rust
//! use npcache::{Cache, CacheValue};
//!
//! struct Blob(Vec<u8>);
//!
//! impl CacheValue for Blob {
//!     fn weight(&self) -> u64 {
//!         self.0.len() as u64
//!     }
//! }
//!
//! let mut cache = Cache::new(1024);
//! cache.put("a", Blob(vec![0; 512]));
//! assert!(cache.get("a").is_some());
//! assert!(cache.get("b").is_none()); // un miss n'est pas une erreur
//! ```
//!
//! ## Garanties
//!
//! - Après chaque opération, le poids cumulé est inférieur ou égal à la
//!   capacité configurée.
//! - L'ordre d'éviction suit la récence d'*accès* (`get` ou `put`), jamais
//!   l'ordre d'insertion.
//! - Une insertion n'évince jamais l'entrée qu'elle vient de créer.
//!
//! ## Voir aussi
//!
//! - [`npcovers`] : pipeline de pochettes construit sur ce cache

pub mod cache;

pub use cache::{Cache, CacheValue};
