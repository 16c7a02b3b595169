// examples/session_demo.rs
//
// Demo hors-ligne du moteur de session "now playing" :
//   - un sink qui affiche ce que la plateforme recevrait
//   - une source de pochettes locale (dégradé généré, pas de réseau)
//   - un scénario type : piste sans pochette, piste avec pochette,
//     tick de position, toggle play/pause, seek
//
// Build et run (depuis la racine du workspace) :
//   cargo run -p npsession --example session_demo
//
// Les événements de contrôle émis vers le player sont affichés à la fin.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use npcovers::{ArtSource, FetchError, PipelineConfig};
use npsession::{
    KeyAction, MediaKey, NowPlayingSession, NowPlayingUpdate, RenderPayload, SessionSink,
    SinkError, TransportState,
};
use tokio_util::sync::CancellationToken;

/// Sink de démonstration : affiche chaque appel au lieu de piloter une
/// vraie session média.
struct PrintlnSink;

impl SessionSink for PrintlnSink {
    fn activate(&mut self) -> Result<(), SinkError> {
        println!("[sink] session activated");
        Ok(())
    }

    fn update_transport(&mut self, transport: &TransportState) -> Result<(), SinkError> {
        println!(
            "[sink] transport: {} at {} ms",
            if transport.is_playing { "playing" } else { "paused" },
            transport.position_ms
        );
        Ok(())
    }

    fn render(&mut self, payload: &RenderPayload) -> Result<(), SinkError> {
        let art = match &payload.cover {
            Some(cover) => format!("{}x{}", cover.image().width(), cover.image().height()),
            None => "none".to_string(),
        };
        println!(
            "[sink] render: '{}' by '{}' ({} ms) art={} playing={}",
            payload.title, payload.artist, payload.duration_ms, art, payload.is_playing
        );
        Ok(())
    }

    fn release(&mut self) -> Result<(), SinkError> {
        println!("[sink] session released");
        Ok(())
    }
}

/// Source locale : génère un dégradé après un court délai, pour simuler un
/// téléchargement sans toucher au réseau.
struct GradientSource;

#[async_trait]
impl ArtSource for GradientSource {
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<DynamicImage, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
            _ = tokio::time::sleep(Duration::from_millis(150)) => {}
        }
        let mut img = RgbImage::new(600, 600);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x / 3) as u8, (y / 3) as u8, 128]);
        }
        Ok(DynamicImage::ImageRgb8(img))
    }
}

fn update(title: &str, cover: Option<&str>, time: f64, playing: bool) -> NowPlayingUpdate {
    NowPlayingUpdate {
        title: Some(title.to_string()),
        artist: Some("Queen".to_string()),
        duration: Some(355.0),
        current_time: Some(time),
        is_playing: Some(playing),
        cover_url: cover.map(str::to_string),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    println!("Starting now-playing session demo...\n");

    // 1. Lance la session avec le sink d'affichage et la source locale
    let (session, handle) = NowPlayingSession::spawn(
        Box::new(PrintlnSink),
        Arc::new(GradientSource),
        PipelineConfig::default(),
    );
    let events = handle.subscribe();

    // 2. Une piste sans pochette : transport + render immédiats
    handle.update_now_playing(update("Bohemian Rhapsody", None, 0.0, true))?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 3. La même piste gagne une pochette : le render complet attend la
    //    livraison (150 ms), le transport part tout de suite
    handle.update_now_playing(update(
        "Bohemian Rhapsody",
        Some("http://covers/queen.jpg"),
        1.0,
        true,
    ))?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // 4. Tick de position : pochette en main, rien à re-rendre
    handle.update_now_playing(update(
        "Bohemian Rhapsody",
        Some("http://covers/queen.jpg"),
        2.0,
        true,
    ))?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 5. Touche play/pause puis seek : événements vers le player, écho
    //    immédiat du drapeau sur la surface rendue
    handle.media_key(MediaKey::PlayPause, KeyAction::Down)?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.seek(93_500)?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 6. Affiche ce que le player aurait reçu
    println!("\nControl events delivered to the player:");
    for event in events.try_iter() {
        let wire = event.to_wire();
        match wire.position {
            Some(position) => println!("  {} (position: {} s)", wire.action, position),
            None => println!("  {}", wire.action),
        }
    }

    // 7. Libère la session et attend l'arrêt de la tâche
    handle.release();
    session.wait().await?;

    Ok(())
}
