//! Redimensionnement des pochettes avant mise en cache.

use image::{DynamicImage, imageops::FilterType};

/// Taille maximale par défaut du plus grand côté d'une pochette (pixels).
pub const DEFAULT_MAX_EDGE: u32 = 512;

/// Réduit l'image pour qu'aucun côté ne dépasse `max_edge`.
///
/// Le rapport d'aspect est préservé. Une image déjà dans les bornes est
/// retournée telle quelle : on n'agrandit jamais.
pub fn fit_within(img: DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());

    if width <= max_edge && height <= max_edge {
        return img;
    }

    // Calculer le ratio de mise à l'échelle
    let scale = if width > height {
        max_edge as f32 / width as f32
    } else {
        max_edge as f32 / height as f32
    };

    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);

    img.resize(new_width, new_height, FilterType::Lanczos3)
}
