//! Демо-клиент: хост и гость в одном процессе поверх loopback-сигналинга.

use crate::config::CallConfig;
use crate::error::{CallError, ConfigError};
use crate::logger::{log, set_enabled};
use crate::media::SyntheticMedia;
use crate::peer::connection::get_user_ice_servers;
use crate::peer::{CallStatus, Collaborators};
use crate::session::CallSession;
use crate::signaling::LoopbackSignaling;
use crate::ui::{dispatch, render, Action, Outcome, Route};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "roomcall")]
#[command(about = "Two-party video room over an in-process signaling broker")]
pub struct Cli {
    #[arg(long, value_name = "ROOM_ID_OR_URL", help = "Room id or invite link (new room if omitted)")]
    pub room: Option<String>,
    #[arg(long, value_name = "PATH", help = "JSON call config")]
    pub config: Option<PathBuf>,
    #[arg(long, short, help = "Disable log output")]
    pub quiet: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("stdin: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => CallConfig::load(path)?,
        None => CallConfig::default(),
    };
    set_enabled(config.logging && !cli.quiet);

    for server in get_user_ice_servers(&config.ice_servers) {
        log(&format!("ICE server: {}", server.urls.join(", ")));
    }

    let route = match &cli.room {
        Some(input) if input.contains('#') => Route::parse(input),
        Some(id) => Route::Room(id.clone()),
        None => Route::new_room(),
    };
    let room = match route.room_id() {
        Some(id) => id.to_string(),
        None => return Err(CallError::MissingRoom.into()),
    };

    let signaling = LoopbackSignaling::new();
    let host_media = SyntheticMedia::new("host");
    let guest_media = SyntheticMedia::new("guest");

    let host = CallSession::spawn(
        Collaborators {
            signaling: Arc::new(signaling.clone()),
            media: Arc::new(host_media.clone()),
        },
        config.clone(),
    );
    let guest = CallSession::spawn(
        Collaborators {
            signaling: Arc::new(signaling.clone()),
            media: Arc::new(guest_media.clone()),
        },
        config,
    );

    host.join(&room).await?;
    host.wait_for_status(CallStatus::Waiting).await?;
    print_views(&host, &guest);

    guest.join(&room).await?;
    guest.wait_for_status(CallStatus::Connected).await?;
    host.wait_for_status(CallStatus::Connected).await?;
    print_views(&host, &guest);

    println!("commands: audio | video | screen | stop-share | invite | hangup | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let action = match line.trim() {
            "audio" => Action::ToggleAudio,
            "video" => Action::ToggleVideo,
            "screen" => Action::ToggleScreenShare,
            "invite" => Action::CopyInvite,
            "hangup" => Action::EndCall,
            "stop-share" => {
                // как кнопка "Stop sharing" браузера: источник закончился сам
                match guest_media.last_screen() {
                    Some(screen) if screen.is_live() => screen.end(),
                    _ => println!("not sharing"),
                }
                settle_and_print(&host, &guest).await;
                continue;
            }
            "quit" | "exit" => break,
            "" => continue,
            other => {
                println!("unknown command: {other}");
                continue;
            }
        };

        match dispatch(&guest, action).await {
            Ok(Outcome::Invite(link)) => println!("invite: {link}"),
            Ok(Outcome::Done) => {}
            Err(e) => println!("error: {e}"),
        }
        settle_and_print(&host, &guest).await;
        if action == Action::EndCall {
            break;
        }
    }

    guest.hang_up().await?;
    host.hang_up().await?;
    log(&format!(
        "open devices after hang-up: host={} guest={}",
        host_media.open_devices(),
        guest_media.open_devices()
    ));
    Ok(())
}

async fn settle_and_print(host: &CallSession, guest: &CallSession) {
    tokio::time::sleep(SETTLE_DELAY).await;
    print_views(host, guest);
}

fn print_views(host: &CallSession, guest: &CallSession) {
    for (name, session) in [("host", host), ("guest", guest)] {
        let snap = session.snapshot();
        let invite = session.invite_link().unwrap_or_default();
        println!("--- {name}: {:?}", snap.status);
        println!("{}", render(&snap, &invite));
    }
}
