use clap::Parser;
use crossterm::style::Color;
use dialoguer::{Password, theme::ColorfulTheme};
use parley::app::Ui;
use parley::auth::{self, AuthError};
use parley::client::{HomeserverClient, ProtocolClient};
use parley::commands::{CommandRegistry, Dispatcher, ReplyLine, Session, SlashCommand};
use parley::config::{self, Config, ConfigError};
use parley::outbox::{self, Outbox};
use parley::rooms::RoomList;
use parley::terminal::{AppControl, Renderer, TerminalUi, print_colored_message};
use reedline::{DefaultPrompt, Reedline, Signal};
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Line-mode Matrix chat client")]
struct Cli {
    /// Config file (default: ~/.config/parley/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Room id or alias to join on startup
    #[arg(long)]
    room: Option<String>,

    /// Log in with a password and store the access token
    #[arg(long, value_name = "USER")]
    login: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        print_colored_message(&format!("{}\n", e), Color::Red);
        std::process::exit(1);
    }
}

/// Diagnostics go to a log file so they never mix with the chat view.
/// Filter with `PARLEY_LOG` (default: warn).
fn init_tracing() {
    let log_path = config::log_path();
    if let Some(log_dir) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(log_dir) {
            eprintln!("Failed to create log directory: {}", e);
            return;
        }
    }

    let file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file: {}", e);
            return;
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_env("PARLEY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_path().ok_or("Cannot determine home directory")?,
    };

    let mut cfg = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(ConfigError::NotFound(path)) => {
            return Err(format!(
                "Config file not found: {}\nCreate it with: {{ \"homeserver\": \"https://matrix.example.org\" }}",
                path.display()
            )
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    let client = Arc::new(HomeserverClient::new(&cfg.homeserver)?);
    match cli.login.as_deref() {
        Some(user) => login(&client, &mut cfg, &config_path, user).await?,
        None => {
            let token = auth::resolve_token(cfg.access_token.as_deref()).ok_or(AuthError::NoToken)?;
            let user_id = cfg
                .user_id
                .clone()
                .ok_or("No user_id in config. Use --login <user> first.")?;
            client.set_session(&token, &user_id);
        }
    }

    let ui = Arc::new(TerminalUi::new());
    let app = Arc::new(AppControl::new());
    let rooms = Arc::new(RoomList::new());
    let config = Arc::new(Mutex::new(cfg));
    let (outbox, outbox_rx) = Outbox::new();
    let worker = outbox::spawn_worker(outbox_rx, client.clone(), ui.clone());
    let (replies_tx, mut replies_rx) = mpsc::unbounded_channel();

    let session = Session {
        app: app.clone(),
        ui: ui.clone(),
        rooms: rooms.clone(),
        client: client.clone(),
        config: config.clone(),
        outbox: outbox.clone(),
        replies: replies_tx,
    };
    let dispatcher = Dispatcher::new(CommandRegistry::builtin(), session);

    if let Some(room) = cli.room {
        dispatcher.dispatch("join", vec![room], None).await;
    }

    print_colored_message(&command_summary(), Color::DarkMagenta);

    let mut rl = Reedline::create();
    let prompt = DefaultPrompt::default();
    let mut renderer = Renderer::new();
    ui.refresh();

    loop {
        print_replies(&mut replies_rx);
        if ui.take_dirty() {
            render(&rooms, &config, &mut renderer);
        }
        if app.should_quit() {
            break;
        }

        let line = match rl.read_line(&prompt) {
            Ok(Signal::Success(input)) => input.trim().to_string(),
            Ok(Signal::CtrlD) | Ok(Signal::CtrlC) | Err(_) => break,
        };
        if line.is_empty() {
            continue;
        }

        let active = rooms.latest();
        if !dispatcher.dispatch_line(&line, active.clone()).await {
            match active {
                Some(room) => {
                    let sender = client.user_id().unwrap_or_default();
                    outbox.send_message(&room, "m.text", &sender, &line);
                }
                None => print_colored_message(
                    "Not in a room. Use /join <room> first.\n",
                    Color::DarkYellow,
                ),
            }
        }
        // Room list or timeline may have changed either way
        ui.refresh();
    }

    let cfg = config.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = cfg.save(&config_path) {
        print_colored_message(
            &format!("Warning: could not save config: {}\n", e),
            Color::DarkYellow,
        );
    }
    drop(cfg);

    // Let queued sends finish before exiting
    drop(dispatcher);
    drop(outbox);
    if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
        tracing::warn!("outbox did not drain before exit");
    }
    Ok(())
}

async fn login(
    client: &HomeserverClient,
    cfg: &mut Config,
    config_path: &Path,
    user: &str,
) -> Result<(), Box<dyn Error>> {
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Password for {}", user))
        .interact()?;

    let response = client.login(user, &password).await?;
    if let Err(e) = auth::store_token(&response.access_token) {
        print_colored_message(
            &format!("Could not store token in keyring ({}), keeping it in the config file.\n", e),
            Color::DarkYellow,
        );
        cfg.access_token = Some(response.access_token.clone());
    }
    cfg.set_session(&response.user_id);
    cfg.save(config_path)?;

    print_colored_message(&format!("Logged in as {}\n", response.user_id), Color::Green);
    Ok(())
}

fn command_summary() -> String {
    let usages: Vec<_> = SlashCommand::builtins()
        .iter()
        .map(|c| c.usage().trim_start_matches("Usage: "))
        .collect();
    format!("Commands: {}\n", usages.join(", "))
}

fn print_replies(replies: &mut mpsc::UnboundedReceiver<ReplyLine>) {
    while let Ok(line) = replies.try_recv() {
        print_colored_message(&format!("{}\n", line.text), Color::DarkMagenta);
    }
}

fn render(rooms: &RoomList, config: &Mutex<config::Config>, renderer: &mut Renderer) {
    let preferences = config.lock().unwrap_or_else(PoisonError::into_inner).preferences;

    let room_ids = rooms.rooms().iter().map(|r| r.id.clone()).collect();
    if let Some(line) = renderer.room_list_line(room_ids, &preferences) {
        print_colored_message(&format!("{}\n", line), Color::Cyan);
    }

    if let Some(room) = rooms.latest() {
        for line in renderer.pending_lines(&room, &preferences) {
            print_colored_message(&format!("{}\n", line), Color::Reset);
        }
    }
}
