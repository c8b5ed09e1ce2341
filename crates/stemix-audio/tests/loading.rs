//! Track loading: atomicity, cancellation, concurrency and timeouts.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

mod common;

use std::time::Duration;

use common::{dc_stem, engine, MockSource};
use stemix_audio::{EngineEvent, LoadOutcome};
use stemix_core::StemSet;

fn four_stems() -> StemSet {
    StemSet::new()
        .with("vocals", "/stems/vocals.wav")
        .with("drums", "/stems/drums.wav")
        .with("bass", "/stems/bass.wav")
        .with("other", "/stems/other.wav")
}

#[tokio::test]
async fn test_four_stem_song() {
    let source = MockSource::new();
    for (_name, locator) in four_stems().iter() {
        source.audio(locator, dc_stem(180.0, 1000));
    }
    let (_context, engine) = engine(source);

    assert_eq!(engine.load(four_stems()).wait().await, LoadOutcome::Loaded);
    let snapshot = engine.snapshot();
    assert!(snapshot.is_loaded);
    assert!(snapshot.load_error.is_none());
    assert!((snapshot.duration - 180.0).abs() < 1e-6);
    assert_eq!(snapshot.current_time, 0.0);
    assert!(!snapshot.is_playing);
    let names: Vec<_> = snapshot.channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["vocals", "drums", "bass", "other"]);
    assert_eq!(engine.voice_count(), 4);

    engine.set_bpm(150.0).unwrap();
    assert_eq!(engine.playback_rate(), 1.25);

    engine.toggle_solo("vocals");
    engine.toggle_solo("drums");
    let snapshot = engine.snapshot();
    assert!(snapshot.channel("vocals").unwrap().soloed);
    assert!(snapshot.channel("drums").unwrap().soloed);
    assert!(!snapshot.channel("bass").unwrap().audible(true));
    assert!(!snapshot.channel("other").unwrap().audible(true));
}

#[tokio::test]
async fn test_one_bad_stem_fails_whole_load() {
    let source = MockSource::new();
    source.audio("/stems/vocals.wav", dc_stem(2.0, 1000));
    source.audio("/stems/drums.wav", dc_stem(2.0, 1000));
    source.audio("/stems/bass.wav", dc_stem(2.0, 1000));
    source.audio("/stems/other.wav", b"this is not audio".to_vec());
    let (_context, engine) = engine(source);

    let outcome = engine.load(four_stems()).wait().await;
    assert!(matches!(outcome, LoadOutcome::Failed(ref m) if m.contains("other")));

    let snapshot = engine.snapshot();
    assert!(!snapshot.is_loaded);
    assert!(snapshot.load_error.unwrap().contains("other"));
    assert!(snapshot.channels.is_empty());
    assert_eq!(engine.voice_count(), 0);
}

#[tokio::test]
async fn test_fetch_failure_is_reported() {
    let source = MockSource::new();
    source.audio("/stems/vocals.wav", dc_stem(2.0, 1000));
    source.fail("/stems/drums.wav", "connection reset");
    let (_context, engine) = engine(source);

    let stems = StemSet::new()
        .with("vocals", "/stems/vocals.wav")
        .with("drums", "/stems/drums.wav");
    engine.load(stems).wait().await;

    let error = engine.snapshot().load_error.unwrap();
    assert_eq!(
        error,
        "Failed to load stem 'drums': Network error: connection reset"
    );

    let events: Vec<_> = std::iter::from_fn(|| engine.try_recv_event()).collect();
    assert!(events.contains(&EngineEvent::Loading));
    assert!(events.contains(&EngineEvent::LoadFailed(error)));
}

#[tokio::test]
async fn test_newer_load_wins_when_older_finishes_last() {
    let source = MockSource::new();
    source.audio_delayed("/a/slow.wav", dc_stem(3.0, 1000), Duration::from_millis(300));
    source.audio_delayed("/b/one.wav", dc_stem(2.0, 1000), Duration::from_millis(20));
    source.audio_delayed("/b/two.wav", dc_stem(2.0, 1000), Duration::from_millis(20));
    let (_context, engine) = engine(source);

    let first = engine.load(StemSet::new().with("slow", "/a/slow.wav"));
    let second = engine.load(
        StemSet::new()
            .with("one", "/b/one.wav")
            .with("two", "/b/two.wav"),
    );
    assert!(second.generation() > first.generation());

    assert_eq!(second.wait().await, LoadOutcome::Loaded);
    assert_eq!(first.wait().await, LoadOutcome::Superseded);

    // Give a stale completion every chance to land
    tokio::time::sleep(Duration::from_millis(400)).await;
    let snapshot = engine.snapshot();
    let names: Vec<_> = snapshot.channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["one", "two"]);
    assert!((snapshot.duration - 2.0).abs() < 1e-6);
    assert_eq!(engine.voice_count(), 2);
}

#[tokio::test]
async fn test_newer_load_wins_when_older_finishes_first() {
    let source = MockSource::new();
    source.audio_delayed("/a/fast.wav", dc_stem(3.0, 1000), Duration::from_millis(20));
    source.audio_delayed("/b/slow.wav", dc_stem(2.0, 1000), Duration::from_millis(200));
    let (_context, engine) = engine(source);

    let first = engine.load(StemSet::new().with("fast", "/a/fast.wav"));
    let second = engine.load(StemSet::new().with("slow", "/b/slow.wav"));

    assert_eq!(first.wait().await, LoadOutcome::Superseded);
    assert!(engine.snapshot().is_loading);
    assert!(engine.snapshot().channels.is_empty());

    assert_eq!(second.wait().await, LoadOutcome::Loaded);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.channels.len(), 1);
    assert_eq!(snapshot.channels[0].name, "slow");
}

#[tokio::test]
async fn test_stems_load_concurrently() {
    let source = MockSource::new();
    for (_name, locator) in four_stems().iter() {
        source.audio_delayed(locator, dc_stem(1.0, 1000), Duration::from_millis(200));
    }
    let (_context, engine) = engine(source.clone());

    let start = std::time::Instant::now();
    assert_eq!(engine.load(four_stems()).wait().await, LoadOutcome::Loaded);
    let elapsed = start.elapsed();

    assert_eq!(source.max_in_flight(), 4);
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_hung_fetch_times_out() {
    let source = MockSource::new();
    source.audio("/stems/vocals.wav", dc_stem(1.0, 1000));
    source.pending("/stems/drums.wav");
    let (_context, engine) = engine(source);

    let start = tokio::time::Instant::now();
    let stems = StemSet::new()
        .with("vocals", "/stems/vocals.wav")
        .with("drums", "/stems/drums.wav");
    let outcome = engine.load(stems).wait().await;
    let elapsed = start.elapsed();

    assert_eq!(
        outcome,
        LoadOutcome::Failed("Loading stems timed out after 60 seconds".to_string())
    );
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(61));
    assert!(!engine.snapshot().is_loaded);
    assert_eq!(engine.voice_count(), 0);
}

#[tokio::test]
async fn test_reload_and_tempo_persist() {
    let source = MockSource::new();
    source.audio("/stems/vocals.wav", dc_stem(2.0, 1000));
    let (_context, engine) = engine(source.clone());

    engine.set_bpm(90.0).unwrap();
    engine
        .load(StemSet::new().with("vocals", "/stems/vocals.wav"))
        .wait()
        .await;
    assert_eq!(engine.snapshot().playback_rate, 0.75);
    engine.toggle_mute("vocals");

    assert_eq!(engine.reload().unwrap().wait().await, LoadOutcome::Loaded);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.playback_rate, 0.75);
    // Channels are rebuilt from scratch
    assert!(!snapshot.channel("vocals").unwrap().muted);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_empty_set_fails() {
    let (_context, engine) = engine(MockSource::new());
    let outcome = engine.load(StemSet::new()).wait().await;
    assert!(matches!(outcome, LoadOutcome::Failed(_)));
    assert!(!engine.snapshot().is_loaded);
}

#[tokio::test]
async fn test_subscribers_see_load() {
    let source = MockSource::new();
    source.audio("/stems/vocals.wav", dc_stem(2.0, 1000));
    let (_context, engine) = engine(source);
    let mut updates = engine.subscribe();

    engine
        .load(StemSet::new().with("vocals", "/stems/vocals.wav"))
        .wait()
        .await;
    updates.changed().await.unwrap();
    let snapshot = updates.borrow_and_update().clone();
    assert!(snapshot.is_loaded);
    assert_eq!(snapshot.channels.len(), 1);
}
