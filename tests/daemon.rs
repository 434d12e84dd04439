//! Daemon integration: wiring, control surface, and emission flow

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{CountingGenerator, NoAudio, NoVisual};
use ember_cohost::attribution::MemoryProfileStore;
use ember_cohost::config::SchedulerConfig;
use ember_cohost::generation::ReactionGenerator;
use ember_cohost::{Collaborators, Config, Daemon, OperatingMode, TextEvent};

fn fast_config() -> Config {
    let scheduler = SchedulerConfig {
        tick_interval: Duration::from_millis(50),
        min_pause: Duration::from_millis(50),
        quiet_pause: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };
    Config {
        scheduler,
        ..Config::default()
    }
}

fn collaborators() -> (Collaborators, Arc<std::sync::atomic::AtomicUsize>) {
    let (generator, calls) = CountingGenerator::new();
    let (second, _) = CountingGenerator::new();
    let collaborators = Collaborators {
        visual_source: Arc::new(NoVisual),
        visual_analyzer: Arc::new(NoVisual),
        audio_source: Arc::new(NoAudio),
        generators: vec![
            Box::new(generator) as Box<dyn ReactionGenerator>,
            Box::new(second) as Box<dyn ReactionGenerator>,
        ],
        profile_store: Box::new(MemoryProfileStore),
    };
    (collaborators, calls)
}

#[tokio::test]
async fn first_tick_emits_and_stats_reflect_it() {
    let (collaborators, _) = collaborators();
    let (daemon, handle, mut channels) = Daemon::new(fast_config(), collaborators);
    let daemon_task = tokio::spawn(daemon.run());

    // startup bypasses every gate, so the first tick must emit
    let reaction = tokio::time::timeout(Duration::from_secs(5), channels.reactions.recv())
        .await
        .expect("no reaction within budget")
        .expect("reaction channel closed");
    assert!(reaction.contains("реакция"));

    let stats = handle.stats().await.expect("stats");
    assert!(stats.emission.total_emitted >= 1);
    assert!(!stats.emission.silenced);
    assert!(!stats.recognizer.tier.is_empty());

    handle.shutdown().await.expect("shutdown");
    daemon_task.await.expect("join").expect("run");
}

#[tokio::test]
async fn silence_stops_emission_until_lifted() {
    let (collaborators, calls) = collaborators();
    let (daemon, handle, mut channels) = Daemon::new(fast_config(), collaborators);
    let daemon_task = tokio::spawn(daemon.run());

    // wait out the first emission, then silence
    tokio::time::timeout(Duration::from_secs(5), channels.reactions.recv())
        .await
        .expect("no first reaction")
        .expect("channel closed");
    handle.set_silenced(true).await.expect("silence");

    let calls_at_silence = calls.load(std::sync::atomic::Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;
    // no new generation attempts while silenced (one in-flight tick tolerated)
    assert!(calls.load(std::sync::atomic::Ordering::SeqCst) <= calls_at_silence + 1);

    let stats = handle.stats().await.expect("stats");
    assert!(stats.emission.silenced);

    handle.shutdown().await.expect("shutdown");
    daemon_task.await.expect("join").expect("run");
}

#[tokio::test]
async fn observer_mode_ingests_but_never_emits() {
    let (collaborators, calls) = collaborators();
    let mut config = fast_config();
    config.scheduler.forced_override_after = Duration::from_millis(200);
    let (daemon, handle, channels) = Daemon::new(config, collaborators);
    let daemon_task = tokio::spawn(daemon.run());

    handle
        .set_mode(OperatingMode::Observer)
        .await
        .expect("set mode");

    // context keeps flowing in while observing
    channels
        .text_events
        .send(TextEvent {
            author: "viewer".to_string(),
            body: "первое сообщение".to_string(),
            created_at: chrono::Utc::now(),
        })
        .await
        .expect("send event");

    tokio::time::sleep(Duration::from_millis(400)).await;
    // the mode gate sits before generation, at most the pre-switch tick got through
    assert!(calls.load(std::sync::atomic::Ordering::SeqCst) <= 1);

    let stats = handle.stats().await.expect("stats");
    assert!(stats.emission.observer_mode);

    handle.shutdown().await.expect("shutdown");
    daemon_task.await.expect("join").expect("run");
}
