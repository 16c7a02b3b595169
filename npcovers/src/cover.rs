//! Pochette décodée, partagée entre le pipeline, le cache et la session.

use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use npcache::CacheValue;

/// Bitmap de pochette décodé, prêt à afficher.
///
/// Le clonage est bon marché : les clones partagent les pixels. Le poids
/// comptabilisé par le cache est le nombre d'octets du bitmap décodé, relevé
/// une fois à la construction.
#[derive(Clone)]
pub struct CoverImage {
    image: Arc<DynamicImage>,
    weight: u64,
}

impl CoverImage {
    pub fn new(image: DynamicImage) -> Self {
        let weight = image.as_bytes().len() as u64;
        Self {
            image: Arc::new(image),
            weight,
        }
    }

    /// Accès au bitmap décodé.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Vrai si les deux poignées partagent le même bitmap.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("weight", &self.weight)
            .finish()
    }
}

impl CacheValue for CoverImage {
    fn weight(&self) -> u64 {
        self.weight
    }

    fn release(&mut self) {
        tracing::trace!("Releasing cover bitmap ({} bytes)", self.weight);
    }
}
