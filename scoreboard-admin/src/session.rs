use crate::{
    channel::{Channel, ChannelEvent},
    countdown::TICK,
    error::SyncError,
    message::Command,
    sync_client::SyncClient,
};
use log::*;
use tokio::{
    select,
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};

/// Drives `client` until the command sender is dropped, then hands it back.
///
/// Server events are handled before ticks, and ticks before commands. No error ends the
/// session.
pub async fn run_session<C: Channel>(
    mut client: SyncClient<C>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    mut commands: mpsc::Receiver<Command>,
) -> SyncClient<C> {
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events_open = true;

    loop {
        let result = select! {
            biased;

            event = events.recv(), if events_open => match event {
                Some(event) => client.handle_event(event).await,
                None => {
                    error!("The connection task has stopped, continuing offline");
                    events_open = false;
                    Ok(())
                }
            },
            _ = ticker.tick() => client.tick().await,
            command = commands.recv() => match command {
                Some(command) => client.execute(command).await,
                None => {
                    info!("No more commands, ending session");
                    break;
                }
            },
        };

        if let Err(e) = result {
            report(&e);
        }
    }

    client
}

fn report(e: &SyncError) {
    match e {
        SyncError::Validation(_) => warn!("{e}"),
        SyncError::Conflict => debug!("{e}"),
        e if e.is_transient() => warn!("{e}, keeping the current board"),
        e => error!("{e}"),
    }
}
