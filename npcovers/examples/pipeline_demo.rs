// examples/pipeline_demo.rs
//
// Demo hors-ligne du pipeline de pochettes :
//   - une source locale scriptée (aucun accès réseau)
//   - cache hit contre téléchargement
//   - annulation d'une demande dépassée par une plus récente
//   - comptabilité du cache et purge finale
//
// Build et run (depuis la racine du workspace) :
//   cargo run -p npcovers --example pipeline_demo

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use npcovers::{ArtPipeline, ArtSource, FetchError, PipelineConfig, Resolution};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Source locale : répond après un court délai, la taille de l'image dépend
/// de l'URL demandée.
struct LocalSource;

#[async_trait]
impl ArtSource for LocalSource {
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<DynamicImage, FetchError> {
        println!("[source] fetching {}", url);
        tokio::select! {
            _ = cancel.cancelled() => {
                println!("[source] cancelled {}", url);
                return Err(FetchError::cancelled(url));
            }
            _ = tokio::time::sleep(Duration::from_millis(80)) => {}
        }
        let edge = if url.ends_with("huge.png") { 1200 } else { 300 };
        Ok(DynamicImage::new_rgb8(edge, edge))
    }
}

fn describe(cover: &npcovers::CoverImage) -> String {
    format!("{}x{}", cover.image().width(), cover.image().height())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    println!("Starting cover pipeline demo...\n");

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let mut pipeline = ArtPipeline::new(
        Arc::new(LocalSource),
        PipelineConfig::default(),
        outcome_tx,
    );

    // 1. Premier passage : cache vide, le téléchargement part en arrière-plan
    match pipeline.resolve(Some("http://covers/album.png")) {
        Resolution::Fetching => println!("[pipeline] fetch started"),
        other => println!("[pipeline] unexpected resolution: {:?}", other),
    }
    let outcome = outcome_rx.recv().await.expect("outcome channel closed");
    if let Some(cover) = pipeline.complete(outcome) {
        println!("[pipeline] delivered {} ({} bytes cached)\n", describe(&cover), pipeline.cache_weight());
    }

    // 2. Même URL : servie depuis le cache, la source n'est pas touchée
    match pipeline.resolve(Some("http://covers/album.png")) {
        Resolution::Ready(cover) => println!("[pipeline] cache hit, {}\n", describe(&cover)),
        other => println!("[pipeline] unexpected resolution: {:?}", other),
    }

    // 3. Une demande chasse l'autre : la première est annulée, seule la
    //    seconde est livrée (une image au-delà de 512 px est réduite)
    pipeline.resolve(Some("http://covers/slow.png"));
    pipeline.resolve(Some("http://covers/huge.png"));
    while let Some(outcome) = outcome_rx.recv().await {
        let done = pipeline.complete(outcome);
        if let Some(cover) = done {
            println!("[pipeline] delivered {} after supersede\n", describe(&cover));
            break;
        }
        println!("[pipeline] superseded outcome dropped");
    }

    // 4. Purge : plus rien en vol, plus rien en cache
    pipeline.clear();
    println!(
        "[pipeline] cleared, {} entries / {} bytes",
        pipeline.cache_len(),
        pipeline.cache_weight()
    );

    Ok(())
}
