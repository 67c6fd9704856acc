use std::time::Duration;

use queuelink::{
    commands::{Command, ControlRequest},
    common::{UserId, logger},
    configs::Config,
    loopback::LoopbackRig,
    session::SessionStore,
    voice::{ConnectionState, DisconnectReason},
};
use tracing::{error, info, warn};

const LISTENER: UserId = UserId(42);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logger::init(&config);
    info!("queuelink v{} starting loopback demo", env!("CARGO_PKG_VERSION"));

    let rig = LoopbackRig::new(config);
    let step = Duration::from_millis(200);

    let tracks = vec![
        rig.track("Opening Theme", Some(95)),
        rig.track("Night Drive", Some(241)),
        rig.track("Live Session", None),
    ];
    let session = rig
        .router
        .play(rig.room_id.clone(), LISTENER, tracks, || rig.parts())
        .await?;
    rig.player.begin_playback();
    tokio::time::sleep(step).await;

    for command in [Command::ToggleLoop, Command::StepVolume(-20), Command::Shuffle] {
        let request = ControlRequest {
            room_id: rig.room_id.clone(),
            user_id: LISTENER,
            command,
        };
        match rig.router.dispatch(request).await {
            Ok(Some(notice)) => info!("{}", notice),
            Ok(None) => {}
            Err(e) => warn!("{:?} refused: {}", command, e),
        }
    }

    rig.player.finish();
    tokio::time::sleep(step).await;
    rig.player.begin_playback();
    tokio::time::sleep(step).await;
    info!(
        "Now playing {:?}, queue {:?}",
        session.now_playing().map(|t| t.title),
        session
            .queue_snapshot()
            .into_iter()
            .map(|t| t.title)
            .collect::<Vec<_>>()
    );

    info!("Simulating a dropped voice connection");
    rig.connection
        .transition(ConnectionState::Disconnected(DisconnectReason::WebSocketClose {
            code: 4006,
        }));
    let backoff = rig.config.connection.rejoin_delay(0) + step;
    tokio::time::sleep(backoff).await;
    rig.connection.transition(ConnectionState::Connecting);
    tokio::time::sleep(step).await;
    rig.connection.transition(ConnectionState::Ready);
    tokio::time::sleep(step).await;
    info!("Rejoined after {} attempt(s)", rig.connection.rejoin_times().len());

    let stop = ControlRequest {
        room_id: rig.room_id.clone(),
        user_id: LISTENER,
        command: Command::Stop,
    };
    if let Err(e) = rig.router.dispatch(stop).await {
        error!("Stop failed: {}", e);
    }

    let stay = rig.config.player.stay_time() + step;
    info!("Waiting {:?} for the idle teardown (Ctrl+C to skip)", stay);
    tokio::select! {
        _ = tokio::time::sleep(stay) => {}
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, skipping teardown wait"),
    }

    info!(
        "Torn down: {}, sessions left: {}, messages posted: {}",
        session.is_torn_down(),
        rig.registry.len(),
        rig.channel.texts().len()
    );
    Ok(())
}
