//! `codered`: terminal client for Code Red coordination.
//!
//! # Usage
//!
//! ```
//! codered --role runner --scope R1                 # live dashboard
//! codered --config ~/.config/codered/client.toml
//! codered activate --lab main-lab --location "ED Resus 1" --mrn 12345
//! codered assign 7 runner R1
//! ```

mod app;
mod client;
mod ops;
mod poller;
mod settings;
mod ui;

use std::{fs::OpenOptions, io, path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use app::{App, Outcome};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use codered_core::{
  assignment::Slot,
  clock::{Clock, SystemClock},
  event::{EventId, LabType, NewCodeRed},
  pack::{NewPack, PackId, PackState, ProductType},
};
use crossterm::{
  event::{self, Event, KeyEventKind},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ops::Ops;
use poller::{Feed, Poller};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Serialize;
use settings::{Layer, Settings};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "codered", about = "Terminal client for Code Red coordination")]
struct Args {
  /// Path to a TOML config file (url, role, scope, poll_interval_secs, log_file).
  #[arg(short, long, value_name = "FILE", env = "CODERED_CONFIG", global = true)]
  config: Option<std::path::PathBuf>,

  #[command(flatten)]
  layer: Layer,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Live dashboard for the configured role (the default).
  Watch,
  /// Print the event this role should be looking at, or null.
  Active,
  /// List events, most recent first.
  List {
    #[arg(long)]
    include_resolved: bool,
  },
  /// Show one event, resolved or not.
  Show { id: i64 },
  /// Activate a new Code Red.
  Activate {
    #[arg(long, value_parser = parse_lab)]
    lab:      LabType,
    #[arg(long)]
    location: String,
    #[arg(long)]
    mrn:      String,
  },
  /// Claim the runner or clinician slot.
  Assign {
    id:       i64,
    slot:     Slot,
    staff_id: String,
  },
  /// Hand a slot over to someone else.
  Reassign {
    id:       i64,
    slot:     Slot,
    staff_id: String,
    #[arg(long)]
    reason:   Option<String>,
  },
  /// Show who held which slot and when.
  History { id: i64 },
  /// Dispatch a pack.
  AddPack {
    id:      i64,
    #[arg(value_parser = parse_product)]
    product: ProductType,
    #[arg(long)]
    unit:    Option<String>,
  },
  /// Move a pack to delivered, consumed or returned.
  UpdatePack {
    id:    i64,
    pack:  Uuid,
    state: PackState,
  },
  /// Close an event.
  Resolve {
    id: i64,
    #[arg(long)]
    by: Option<String>,
  },
}

/// Accept `main-lab` as well as `main_lab` on the command line.
fn parse_lab(s: &str) -> Result<LabType, String> {
  s.replace('-', "_")
    .parse()
    .map_err(|_| format!("unknown lab {s:?} (main_lab, satellite_lab)"))
}

fn parse_product(s: &str) -> Result<ProductType, String> {
  s.replace('-', "_").parse().map_err(|_| {
    format!("unknown product {s:?} (red_cells, plasma, platelets, cryoprecipitate)")
  })
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let file_layer = match &args.config {
    Some(path) => Layer::from_file(path)?,
    None => Layer::default(),
  };
  let settings = Settings::resolve(args.layer, file_layer);

  if let Some(path) = &settings.log_file {
    init_logging(path)?;
  }

  let client = ApiClient::new(ApiConfig {
    base_url: settings.url.clone(),
    timeout:  settings.poll_interval.max(Duration::from_secs(10)),
  })?;

  match args.command.unwrap_or(Command::Watch) {
    Command::Watch => watch(client, &settings).await,
    Command::Active => {
      print_json(&client.active(Some(settings.role), settings.scope.as_deref()).await?)
    }
    Command::List { include_resolved } => print_json(&client.list(include_resolved).await?),
    Command::Show { id } => print_json(&client.get(EventId(id)).await?),
    Command::Activate { lab, location, mrn } => {
      print_json(&client.activate(&NewCodeRed::new(lab, location, mrn)).await?)
    }
    Command::Assign { id, slot, staff_id } => {
      print_json(&client.assign(EventId(id), slot, &staff_id).await?)
    }
    Command::Reassign { id, slot, staff_id, reason } => print_json(
      &client
        .reassign(EventId(id), slot, &staff_id, reason.as_deref())
        .await?,
    ),
    Command::History { id } => print_json(&client.history(EventId(id)).await?),
    Command::AddPack { id, product, unit } => {
      let input = NewPack { product, unit_number: unit };
      print_json(&client.add_pack(EventId(id), &input).await?)
    }
    Command::UpdatePack { id, pack, state } => {
      print_json(&client.update_pack(EventId(id), PackId(pack), state).await?)
    }
    Command::Resolve { id, by } => {
      print_json(&client.resolve(EventId(id), by.as_deref()).await?)
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Send diagnostics to `path`; the terminal belongs to the dashboard.
fn init_logging(path: &Path) -> Result<()> {
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("opening log file {}", path.display()))?;
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_ansi(false)
    .with_writer(std::sync::Mutex::new(file))
    .init();
  Ok(())
}

// ─── Dashboard ────────────────────────────────────────────────────────────────

async fn watch(client: ApiClient, settings: &Settings) -> Result<()> {
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let feed = Feed {
    client: client.clone(),
    role:   Some(settings.role),
    scope:  settings.scope.clone(),
  };
  let poller = Poller::spawn(feed, settings.poll_interval, Arc::clone(&clock));
  let mut app = App::new(settings.role, settings.scope.clone(), clock.now());
  tracing::info!(role = %settings.role, url = %settings.url, "dashboard started");

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  // Run the event loop; restore terminal even on error.
  let run_result = run_event_loop(&mut terminal, &mut app, &poller, &client, &clock).await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  poller.stop().await;
  run_result
}

/// Forward terminal input from a blocking reader into the async loop.
fn spawn_input() -> mpsc::Receiver<io::Result<Event>> {
  let (tx, rx) = mpsc::channel(32);
  tokio::task::spawn_blocking(move || {
    while !tx.is_closed() {
      match event::poll(Duration::from_millis(100)) {
        Ok(true) => {
          if tx.blocking_send(event::read()).is_err() {
            break;
          }
        }
        Ok(false) => {}
        Err(e) => {
          let _ = tx.blocking_send(Err(e));
          break;
        }
      }
    }
  });
  rx
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
  poller: &Poller,
  client: &ApiClient,
  clock: &Arc<dyn Clock>,
) -> Result<()> {
  let mut snapshots = poller.subscribe();
  let mut input = spawn_input();
  let mut ops = Ops::new();

  // Display time only; data freshness is the poller's business.
  let mut clock_tick = tokio::time::interval(Duration::from_secs(1));
  clock_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    tokio::select! {
      _ = clock_tick.tick() => app.tick(clock.now()),

      changed = snapshots.changed() => {
        if changed.is_err() {
          break;
        }
        let snapshot = snapshots.borrow_and_update().clone();
        app.apply_snapshot(snapshot);
      }

      evt = input.recv() => match evt {
        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
          match app.handle_key(key) {
            Outcome::Quit => break,
            Outcome::Run(op) => {
              app.status_msg = "Sending…".into();
              ops.submit(client, op);
            }
            Outcome::Continue => {}
          }
        }
        // Resizes redraw on the next iteration.
        Some(Ok(_)) => {}
        Some(Err(e)) => return Err(e).context("reading terminal input"),
        None => break,
      },

      message = ops.finished() => {
        app.status_msg = message;
        poller.refresh();
      }
    }
  }

  Ok(())
}
