mod feed;
mod surface;

use std::{
    env,
    io::{self, BufRead},
    path::PathBuf,
    process, thread,
    time::Instant,
};

use crossbeam_channel::Sender;
use env_logger::{Builder, Env};
use platform_dirs::AppDirs;
use plabel_core::{
    actor::Actor,
    clock::DriveMode,
    config::Config,
    error::Error,
    kiosk::{Key, Kiosk, KioskEvent},
    sync::FeedTransport,
    webapi::WebApi,
};

use crate::{feed::TcpLineFeed, surface::LogSurface};

const ENV_LOG: &str = "PLABEL_LOG";
const ENV_LOG_STYLE: &str = "PLABEL_LOG_STYLE";

const APP_NAME: &str = "plabel";
const CONFIG_FILENAME: &str = "config.json";

fn main() {
    Builder::from_env(
        Env::new()
            .filter_or(ENV_LOG, "info")
            .write_style(ENV_LOG_STYLE),
    )
    .init();

    if let Err(err) = start() {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn start() -> Result<(), Error> {
    let config = load_config()?;
    let api = WebApi::new(&config)?;
    let store = api.load_playlist()?;

    let transport: Option<Box<dyn FeedTransport>> = match config.mode {
        DriveMode::FeedDriven => Some(Box::new(TcpLineFeed::new())),
        DriveMode::LocalTick => None,
    };
    let ignore_tap_reader = config.ignore_tap_reader;

    let kiosk = Kiosk::<LogSurface>::spawn(move |sender| {
        // Kick the loop once so timers scheduled during init get a deadline.
        let _ = sender.send(KioskEvent::Wake);
        let mut kiosk = Kiosk::new(config, LogSurface::new(), sender);
        if let Some(transport) = transport {
            kiosk = kiosk.with_transport(transport);
        }
        kiosk.init(store, Instant::now());
        kiosk
    });

    if ignore_tap_reader {
        log::info!("tap reader ignored");
    } else {
        api.spawn_tap_stream(kiosk.sender());
    }

    let input = kiosk.sender();
    thread::spawn(move || read_commands(io::stdin().lock(), &input));

    kiosk.join();
    Ok(())
}

fn load_config() -> Result<Config, Error> {
    if let Some(path) = env::args_os().nth(1).map(PathBuf::from) {
        return Config::load(&path);
    }
    match config_path() {
        Some(path) if path.exists() => Config::load(&path),
        _ => {
            log::info!("no config file found, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn config_path() -> Option<PathBuf> {
    const USE_XDG_ON_MACOS: bool = false;

    AppDirs::new(Some(APP_NAME), USE_XDG_ON_MACOS)
        .map(|dirs| dirs.config_dir.join(CONFIG_FILENAME))
}

/// Forward keyboard commands to the kiosk.  The end of input only stops the
/// reader, the kiosk keeps running until told to quit.
fn read_commands(input: impl BufRead, sender: &Sender<KioskEvent>) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_command(&line) {
            Some(KioskEvent::Shutdown) => {
                let _ = sender.send(KioskEvent::Shutdown);
                return;
            }
            Some(event) => {
                if sender.send(event).is_err() {
                    return;
                }
            }
            None => log::warn!("unknown command"),
        }
    }
    log::info!("command input closed");
}

fn parse_command(line: &str) -> Option<KioskEvent> {
    let line = line.trim();
    match line {
        "q" | "quit" => Some(KioskEvent::Shutdown),
        ">" | "right" => Some(KioskEvent::Key(Key::Next)),
        "c" | "click" => Some(KioskEvent::Click),
        _ if line.starts_with('#') => line.parse().ok().map(KioskEvent::Navigate),
        _ => {
            let mut chars = line.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::from_char(c).map(KioskEvent::Key),
                _ => None,
            }
        }
    }
}
