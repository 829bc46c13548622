//! `clinic`: command-line client for the clinic appointment server.
//!
//! # Usage
//!
//! ```text
//! clinic --url http://localhost:8080 --actor-id <uuid> --actor-role client list
//! clinic --config ~/.config/clinic/config.toml accept <appointment-id>
//! clinic watch --audience admin
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clinic_cli::{
  ApiClient, ApiConfig, ClientError, PollingSession, Transitioned,
  poller::DEFAULT_INTERVAL,
};
use clinic_core::{
  actor::{Actor, Role},
  appointment::{Appointment, AppointmentStatus, BookAppointment},
  feed::FeedSnapshot,
  notification::Audience,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "clinic", about = "Command-line client for clinic appointments")]
struct Args {
  /// Path to a TOML config file (url, actor_id, actor_role, poll_interval_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the clinic server (default: http://localhost:8080).
  #[arg(long, env = "CLINIC_URL")]
  url: Option<String>,

  /// Id of the acting user.
  #[arg(long, env = "CLINIC_ACTOR_ID")]
  actor_id: Option<Uuid>,

  /// Role of the acting user: client, veterinarian or admin.
  #[arg(long, env = "CLINIC_ACTOR_ROLE")]
  actor_role: Option<Role>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List appointments visible to you.
  List {
    #[arg(long)]
    status: Option<AppointmentStatus>,
  },
  /// Show one appointment.
  Show { id: Uuid },
  /// Statuses you may move an appointment to.
  Actions { id: Uuid },
  /// Transition audit log of an appointment.
  History { id: Uuid },
  /// Book a new appointment for yourself.
  Book {
    #[arg(long)]
    pet: Uuid,
    #[arg(long)]
    service: Uuid,
    #[arg(long)]
    vet: Option<Uuid>,
    /// RFC 3339 timestamp, e.g. 2030-05-01T09:30:00Z.
    #[arg(long)]
    at: DateTime<Utc>,
    #[arg(long, default_value = "")]
    notes: String,
  },
  Accept { id: Uuid },
  Reject { id: Uuid },
  Complete { id: Uuid },
  Cancel { id: Uuid },
  /// Move an accepted appointment back to pending at a new time.
  Reschedule {
    id: Uuid,
    #[arg(long)]
    at: DateTime<Utc>,
  },
  /// List durable notifications.
  Inbox {
    /// `user:<uuid>` or `admin`; defaults to your own inbox.
    #[arg(long)]
    audience: Option<Audience>,
  },
  /// Mark a notification read.
  Read { id: Uuid },
  /// Delete a notification.
  Delete { id: Uuid },
  /// Poll notifications and print the feed whenever it changes.
  Watch {
    #[arg(long)]
    audience: Option<Audience>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  url:                Option<String>,
  actor_id:           Option<Uuid>,
  actor_role:         Option<Role>,
  poll_interval_secs: Option<u64>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override the config file, which overrides defaults.
  let actor = Actor::new(
    args
      .actor_id
      .or(file_cfg.actor_id)
      .context("no actor id: pass --actor-id or set CLINIC_ACTOR_ID")?,
    args
      .actor_role
      .or(file_cfg.actor_role)
      .context("no actor role: pass --actor-role or set CLINIC_ACTOR_ROLE")?,
  );
  let poll_interval = file_cfg
    .poll_interval_secs
    .map(Duration::from_secs)
    .unwrap_or(DEFAULT_INTERVAL);

  let client = ApiClient::new(ApiConfig {
    base_url: args
      .url
      .or(file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    actor,
    timeout: Duration::from_secs(30),
  })?;

  run(&client, args.command, poll_interval).await
}

async fn run(client: &ApiClient, command: Command, poll: Duration) -> Result<()> {
  let me = Audience::User(client.actor().id);
  match command {
    Command::List { status } => {
      for appt in client.list_appointments(status).await? {
        print_appointment(&appt);
      }
    }
    Command::Show { id } => print_appointment(&client.get_appointment(id).await?),
    Command::Actions { id } => {
      let actions = client.actions(id).await?;
      if actions.is_empty() {
        println!("no actions available");
      }
      for status in actions {
        println!("{status}");
      }
    }
    Command::History { id } => {
      for record in client.history(id).await? {
        let from = record.from.map_or("-", AppointmentStatus::as_str);
        println!(
          "{}  {from} -> {}  by {} ({})",
          record.recorded_at, record.to, record.actor_id, record.actor_role
        );
      }
    }
    Command::Book { pet, service, vet, at, notes } => {
      let resp = client
        .book(&BookAppointment {
          pet_id: pet,
          service_id: service,
          vet_id: vet,
          scheduled_at: at,
          notes,
        })
        .await?;
      print_appointment(&resp.appointment);
      for w in &resp.warnings {
        eprintln!("warning: could not notify {}: {}", w.audience, w.reason);
      }
    }
    Command::Accept { id } => {
      transition(client, id, AppointmentStatus::Accepted, None).await?
    }
    Command::Reject { id } => {
      transition(client, id, AppointmentStatus::Rejected, None).await?
    }
    Command::Complete { id } => {
      transition(client, id, AppointmentStatus::Completed, None).await?
    }
    Command::Cancel { id } => {
      transition(client, id, AppointmentStatus::Cancelled, None).await?
    }
    Command::Reschedule { id, at } => {
      transition(client, id, AppointmentStatus::Pending, Some(at)).await?
    }
    Command::Inbox { audience } => {
      for n in client.notifications(audience.unwrap_or(me)).await? {
        let marker = if n.read { ' ' } else { '*' };
        println!("{marker} {}  {}  {}", n.notification_id, n.created_at, n.message);
      }
    }
    Command::Read { id } => client.mark_read(id).await?,
    Command::Delete { id } => client.delete_notification(id).await?,
    Command::Watch { audience } => {
      watch(client, audience.unwrap_or(me), poll).await?
    }
  }
  Ok(())
}

/// Re-read the appointment, then request the transition against the status
/// just observed.
async fn transition(
  client: &ApiClient,
  id: Uuid,
  target: AppointmentStatus,
  scheduled_at: Option<DateTime<Utc>>,
) -> Result<()> {
  let current = client.get_appointment(id).await?;
  match client.transition(id, current.status, target, scheduled_at).await {
    Ok(Transitioned::Committed(resp)) => {
      print_appointment(&resp.appointment);
      for w in &resp.warnings {
        eprintln!("warning: could not notify {}: {}", w.audience, w.reason);
      }
    }
    Ok(Transitioned::Applied(appt)) => {
      eprintln!("the server was slow to answer, but the change was saved");
      print_appointment(&appt);
    }
    Ok(Transitioned::NotApplied(appt)) => {
      print_appointment(&appt);
      bail!("the change was not saved; it is safe to try again");
    }
    Err(ClientError::Conflict { latest: Some(latest), .. }) => {
      print_appointment(&latest);
      bail!("someone else changed this appointment first; review it and retry");
    }
    Err(e) => return Err(e.into()),
  }
  Ok(())
}

async fn watch(client: &ApiClient, audience: Audience, poll: Duration) -> Result<()> {
  let mut session = PollingSession::new(Arc::new(client.clone()), poll);
  let mut rx = session.subscribe();
  session.start(audience);
  session.notify_local(format!("Watching notifications for {audience}"));

  loop {
    tokio::select! {
      changed = rx.changed() => {
        if changed.is_err() {
          break;
        }
        let snapshot = rx.borrow_and_update().clone();
        print_feed(&snapshot);
      }
      _ = tokio::signal::ctrl_c() => break,
    }
  }
  session.stop();
  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_appointment(a: &Appointment) {
  let vet = a.vet_id.map_or_else(|| "unassigned".to_string(), |v| v.to_string());
  println!(
    "{}  {:<9}  {}  vet: {vet}",
    a.appointment_id, a.status, a.scheduled_at
  );
}

fn print_feed(snapshot: &FeedSnapshot) {
  println!("── {} unread ──", snapshot.unread);
  for entry in &snapshot.entries {
    let marker = match (entry.is_ephemeral(), entry.is_unread()) {
      (true, _) => '~',
      (false, true) => '*',
      (false, false) => ' ',
    };
    println!("{marker} {}  {}", entry.created_at(), entry.message());
  }
}
