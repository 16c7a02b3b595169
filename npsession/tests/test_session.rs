use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use npcovers::{ArtSource, FetchError, PipelineConfig};
use tokio_util::sync::CancellationToken;
use npsession::{
    ControlEvent, KeyAction, MediaKey, NowPlayingSession, NowPlayingUpdate, RenderPayload,
    SessionError, SessionHandle, SessionSink, SinkError, TransportCommand, TransportState,
};

/// Appel journalisé par le sink d'essai.
#[derive(Clone, Debug, PartialEq)]
enum SinkCall {
    Activate,
    Transport {
        is_playing: bool,
        position_ms: u64,
    },
    Render {
        title: String,
        artist: String,
        duration_ms: u64,
        cover: Option<(u32, u32)>,
        is_playing: bool,
    },
    Release,
}

type Calls = Arc<Mutex<Vec<SinkCall>>>;

struct RecordingSink {
    calls: Calls,
    /// Nombre de renders à faire échouer avant de ré-accepter
    fail_renders: Arc<AtomicUsize>,
}

impl SessionSink for RecordingSink {
    fn activate(&mut self) -> Result<(), SinkError> {
        self.calls.lock().unwrap().push(SinkCall::Activate);
        Ok(())
    }

    fn update_transport(&mut self, transport: &TransportState) -> Result<(), SinkError> {
        self.calls.lock().unwrap().push(SinkCall::Transport {
            is_playing: transport.is_playing,
            position_ms: transport.position_ms,
        });
        Ok(())
    }

    fn render(&mut self, payload: &RenderPayload) -> Result<(), SinkError> {
        if self
            .fail_renders
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SinkError::new("scripted render failure"));
        }
        self.calls.lock().unwrap().push(SinkCall::Render {
            title: payload.title.clone(),
            artist: payload.artist.clone(),
            duration_ms: payload.duration_ms,
            cover: payload
                .cover
                .as_ref()
                .map(|c| (c.image().width(), c.image().height())),
            is_playing: payload.is_playing,
        });
        Ok(())
    }

    fn release(&mut self) -> Result<(), SinkError> {
        self.calls.lock().unwrap().push(SinkCall::Release);
        Ok(())
    }
}

/// Source scriptée : le dernier segment de l'URL pilote le scénario.
struct ScriptedSource {
    fetches: AtomicUsize,
}

#[async_trait]
impl ArtSource for ScriptedSource {
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<DynamicImage, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if url.ends_with("slow.png") {
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::cancelled(url)),
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            }
            return Ok(DynamicImage::new_rgb8(100, 100));
        }
        if url.ends_with("broken.png") {
            return Err(FetchError::failed(url, "HTTP error: 404 Not Found"));
        }
        Ok(DynamicImage::new_rgb8(64, 64))
    }
}

fn spawn_session() -> (
    NowPlayingSession,
    SessionHandle,
    Calls,
    Arc<ScriptedSource>,
) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        calls: calls.clone(),
        fail_renders: Arc::new(AtomicUsize::new(0)),
    };
    let source = Arc::new(ScriptedSource {
        fetches: AtomicUsize::new(0),
    });
    let (session, handle) = NowPlayingSession::spawn(
        Box::new(sink),
        source.clone(),
        PipelineConfig::default(),
    );
    (session, handle, calls, source)
}

/// Attend que le journal du sink satisfasse `predicate`, au plus deux
/// secondes.
async fn wait_for<F>(calls: &Calls, predicate: F) -> Vec<SinkCall>
where
    F: Fn(&[SinkCall]) -> bool,
{
    for _ in 0..400 {
        {
            let snapshot = calls.lock().unwrap();
            if predicate(&snapshot) {
                return snapshot.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("sink never reached the expected state: {:?}", calls.lock().unwrap());
}

fn renders(calls: &[SinkCall]) -> Vec<&SinkCall> {
    calls
        .iter()
        .filter(|c| matches!(c, SinkCall::Render { .. }))
        .collect()
}

fn cover_renders(calls: &[SinkCall]) -> Vec<(u32, u32)> {
    calls
        .iter()
        .filter_map(|c| match c {
            SinkCall::Render { cover: Some(d), .. } => Some(*d),
            _ => None,
        })
        .collect()
}

fn update(title: &str, cover_url: Option<&str>, time: f64, playing: bool) -> NowPlayingUpdate {
    NowPlayingUpdate {
        title: Some(title.to_string()),
        artist: Some("Artist".to_string()),
        duration: Some(300.0),
        current_time: Some(time),
        is_playing: Some(playing),
        cover_url: cover_url.map(str::to_string),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_activation_seeds_paused_transport() {
    let (_session, _handle, calls, _source) = spawn_session();

    let snapshot = wait_for(&calls, |c| c.len() >= 2).await;
    assert_eq!(snapshot[0], SinkCall::Activate);
    assert_eq!(
        snapshot[1],
        SinkCall::Transport {
            is_playing: false,
            position_ms: 0
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_pushes_transport_first_then_renders() {
    let (_session, handle, calls, _source) = spawn_session();

    let mut update = update("Aqualung", None, 30.25, true);
    update.duration = Some(180.9);
    handle.update_now_playing(update).unwrap();

    let snapshot = wait_for(&calls, |c| !renders(c).is_empty()).await;
    let transport_at = snapshot
        .iter()
        .position(|c| {
            *c == SinkCall::Transport {
                is_playing: true,
                position_ms: 30_250,
            }
        })
        .expect("transport update missing");
    let render_at = snapshot
        .iter()
        .position(|c| matches!(c, SinkCall::Render { .. }))
        .unwrap();
    assert!(transport_at < render_at, "transport must precede the render");

    match &snapshot[render_at] {
        SinkCall::Render {
            title,
            artist,
            duration_ms,
            cover,
            is_playing,
        } => {
            assert_eq!(title, "Aqualung");
            assert_eq!(artist, "Artist");
            // La durée est tronquée à la seconde, la position non
            assert_eq!(*duration_ms, 180_000);
            assert!(cover.is_none());
            assert!(is_playing);
        }
        other => panic!("expected a render, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_latest_cover_wins_under_reordering() {
    let (_session, handle, calls, _source) = spawn_session();

    handle
        .update_now_playing(update("One", Some("http://art/slow.png"), 1.0, true))
        .unwrap();
    handle
        .update_now_playing(update("Two", Some("http://art/ok.png"), 2.0, true))
        .unwrap();

    let snapshot = wait_for(&calls, |c| !cover_renders(c).is_empty()).await;
    assert_eq!(cover_renders(&snapshot), vec![(64, 64)]);

    // La réponse lente de la première pochette ne doit jamais s'afficher
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(cover_renders(&calls.lock().unwrap()), vec![(64, 64)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_position_tick_skips_redundant_render_and_refetch() {
    let (_session, handle, calls, source) = spawn_session();

    handle
        .update_now_playing(update("One", Some("http://art/ok.png"), 10.0, true))
        .unwrap();
    wait_for(&calls, |c| !cover_renders(c).is_empty()).await;

    // Même piste, seule la position avance
    handle
        .update_now_playing(update("One", Some("http://art/ok.png"), 11.0, true))
        .unwrap();
    wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: true,
            position_ms: 11_000,
        })
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = calls.lock().unwrap().clone();
    assert_eq!(renders(&snapshot).len(), 1, "tick must not re-render");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1, "tick must not refetch");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cover_cleared_renders_immediately() {
    let (_session, handle, calls, _source) = spawn_session();

    handle
        .update_now_playing(update("One", Some("http://art/slow.png"), 1.0, true))
        .unwrap();
    // L'URL vide efface sans attendre le téléchargement annulé
    handle
        .update_now_playing(update("Two", Some(""), 2.0, true))
        .unwrap();

    let snapshot = wait_for(&calls, |c| !renders(c).is_empty()).await;
    match renders(&snapshot)[0] {
        SinkCall::Render { title, cover, .. } => {
            assert_eq!(title, "Two");
            assert!(cover.is_none());
        }
        other => panic!("expected a render, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(cover_renders(&calls.lock().unwrap()).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_changed_url_defers_render_until_delivery() {
    let (_session, handle, calls, _source) = spawn_session();

    handle
        .update_now_playing(update("One", Some("http://art/ok.png"), 1.0, true))
        .unwrap();
    wait_for(&calls, |c| !cover_renders(c).is_empty()).await;

    handle
        .update_now_playing(update("Two", Some("http://art/slow.png"), 5.0, true))
        .unwrap();
    let snapshot = wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: true,
            position_ms: 5_000,
        })
    })
    .await;

    // Tant que la pochette n'est pas livrée, la piste précédente reste
    // affichée
    assert!(
        !renders(&snapshot)
            .iter()
            .any(|c| matches!(c, SinkCall::Render { title, .. } if title == "Two")),
        "render must wait for the cover delivery"
    );

    let snapshot = wait_for(&calls, |c| {
        renders(c)
            .iter()
            .any(|r| matches!(r, SinkCall::Render { title, cover, .. } if title == "Two" && cover.is_some()))
    })
    .await;
    assert_eq!(cover_renders(&snapshot).last(), Some(&(100, 100)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_fetch_keeps_previous_visuals_then_retries() {
    let (_session, handle, calls, source) = spawn_session();

    handle
        .update_now_playing(update("One", Some("http://art/ok.png"), 1.0, true))
        .unwrap();
    wait_for(&calls, |c| !cover_renders(c).is_empty()).await;

    handle
        .update_now_playing(update("Two", Some("http://art/broken.png"), 2.0, true))
        .unwrap();
    wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: true,
            position_ms: 2_000,
        })
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    {
        let snapshot = calls.lock().unwrap();
        assert!(
            !renders(&snapshot)
                .iter()
                .any(|c| matches!(c, SinkCall::Render { title, .. } if title == "Two")),
            "a failed fetch must not render the new track"
        );
    }
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

    // La mise à jour suivante retente le téléchargement manquant
    handle
        .update_now_playing(update("Two", Some("http://art/broken.png"), 3.0, true))
        .unwrap();
    wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: true,
            position_ms: 3_000,
        })
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_optimistic_play_echo_preserves_position() {
    let (_session, handle, calls, _source) = spawn_session();
    let events = handle.subscribe();

    handle
        .update_now_playing(update("One", None, 42.0, false))
        .unwrap();
    wait_for(&calls, |c| !renders(c).is_empty()).await;

    handle.transport(TransportCommand::Play).unwrap();

    let snapshot = wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: true,
            position_ms: 42_000,
        })
    })
    .await;
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ControlEvent::Play
    );

    // L'écho rafraîchit aussi la surface rendue (icône play/pause)
    assert!(
        renders(&snapshot)
            .iter()
            .any(|c| matches!(c, SinkCall::Render { is_playing: true, .. }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_toggle_media_key_follows_playing_flag() {
    let (_session, handle, calls, _source) = spawn_session();
    let events = handle.subscribe();

    handle
        .update_now_playing(update("One", None, 1.0, true))
        .unwrap();
    wait_for(&calls, |c| !renders(c).is_empty()).await;

    handle.media_key(MediaKey::PlayPause, KeyAction::Down).unwrap();
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ControlEvent::Pause
    );

    // L'écho a basculé le drapeau, la même touche envoie maintenant play
    wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: false,
            position_ms: 1_000,
        })
    })
    .await;
    handle.media_key(MediaKey::PlayPause, KeyAction::Down).unwrap();
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ControlEvent::Play
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_key_up_and_unknown_actions_are_ignored() {
    let (_session, handle, calls, _source) = spawn_session();
    let events = handle.subscribe();
    wait_for(&calls, |c| c.len() >= 2).await;

    handle.media_key(MediaKey::PlayPause, KeyAction::Up).unwrap();
    handle.notification_action("ACTION_STOP").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(events.try_recv().is_err());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_notification_actions_translate() {
    let (_session, handle, calls, _source) = spawn_session();
    let events = handle.subscribe();
    wait_for(&calls, |c| c.len() >= 2).await;

    handle.notification_action("ACTION_NEXT").unwrap();
    handle.notification_action("ACTION_PREVIOUS").unwrap();

    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ControlEvent::Next
    );
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ControlEvent::Previous
    );

    // Ni next ni previous ne touchent à l'état de transport
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_seek_broadcasts_position() {
    let (_session, handle, calls, _source) = spawn_session();
    let events = handle.subscribe();
    wait_for(&calls, |c| c.len() >= 2).await;

    handle.seek(93_500).unwrap();
    assert_eq!(
        events.recv_timeout(Duration::from_secs(1)).unwrap(),
        ControlEvent::Seek { position_ms: 93_500 }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_validation_rejects_bad_numbers() {
    let (_session, handle, calls, _source) = spawn_session();
    wait_for(&calls, |c| c.len() >= 2).await;

    let mut bad = update("One", None, 1.0, true);
    bad.duration = Some(f64::NAN);
    assert!(matches!(
        handle.update_now_playing(bad),
        Err(SessionError::Update(_))
    ));

    let mut bad = update("One", None, 1.0, true);
    bad.current_time = Some(-3.0);
    assert!(matches!(
        handle.update_now_playing(bad),
        Err(SessionError::Update(_))
    ));

    // Rien n'a atteint le sink
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_release_is_idempotent_and_tears_down() {
    let (session, handle, calls, _source) = spawn_session();

    handle
        .update_now_playing(update("One", Some("http://art/slow.png"), 1.0, true))
        .unwrap();
    handle.release();
    handle.release();

    session.wait().await.unwrap();

    let snapshot = calls.lock().unwrap().clone();
    assert_eq!(snapshot.last(), Some(&SinkCall::Release));
    // Le téléchargement annulé n'a jamais abouti à un render
    assert!(cover_renders(&snapshot).is_empty());

    assert!(matches!(
        handle.update_now_playing(update("Two", None, 1.0, true)),
        Err(SessionError::NotRunning)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_render_is_retried_on_next_change() {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        calls: calls.clone(),
        fail_renders: Arc::new(AtomicUsize::new(1)),
    };
    let source = Arc::new(ScriptedSource {
        fetches: AtomicUsize::new(0),
    });
    let (_session, handle) =
        NowPlayingSession::spawn(Box::new(sink), source, PipelineConfig::default());

    // Le premier render échoue, l'état rendu reste donc vide
    handle
        .update_now_playing(update("One", None, 1.0, false))
        .unwrap();
    wait_for(&calls, |c| {
        c.contains(&SinkCall::Transport {
            is_playing: false,
            position_ms: 1_000,
        })
    })
    .await;

    // L'écho de lecture retente un render complet, accepté cette fois
    handle.transport(TransportCommand::Play).unwrap();
    let snapshot = wait_for(&calls, |c| !renders(c).is_empty()).await;
    match renders(&snapshot)[0] {
        SinkCall::Render { title, is_playing, .. } => {
            assert_eq!(title, "One");
            assert!(is_playing);
        }
        other => panic!("expected a render, got {:?}", other),
    }
}
