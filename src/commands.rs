//! Command-line subcommands and their output formatting.

use chrono::Local;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::trainer::api_types::{NewClient, OcrSaveRequest};
use crate::trainer::types::{Client, OcrExtraction, RateLimitStatus, Workout};
use crate::trainer::TrainerClient;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage client records
  #[command(subcommand, alias = "c")]
  Clients(ClientsCommand),
  /// Browse workout logs
  #[command(subcommand, alias = "w")]
  Workouts(WorkoutsCommand),
  /// Scan workout logs from photos
  #[command(subcommand)]
  Ocr(OcrCommand),
  /// AI analysis service
  #[command(subcommand)]
  Ai(AiCommand),
}

#[derive(Subcommand, Debug)]
pub enum ClientsCommand {
  #[command(alias = "ls")]
  List,
  Show {
    id: String,
  },
  Add {
    name: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },
  #[command(alias = "delete")]
  Rm {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum WorkoutsCommand {
  #[command(alias = "ls")]
  List {
    /// Only workouts for this client
    #[arg(long)]
    client: Option<String>,
  },
  Show {
    id: String,
  },
  #[command(alias = "delete")]
  Rm {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum OcrCommand {
  /// Extract a workout from an image
  Scan {
    image: PathBuf,
    /// Save the extracted workout
    #[arg(long)]
    save: bool,
    /// Client to save the workout for, overriding the scanned one
    #[arg(long)]
    client: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum AiCommand {
  /// Show the remaining analysis quota
  Status,
  /// Drop the server-side analysis cache
  ClearCache,
}

/// Execute `command`, writing results to `out`.
pub async fn run<W: Write>(
  command: Command,
  client: &TrainerClient,
  json: bool,
  out: &mut W,
) -> Result<()> {
  match command {
    Command::Clients(cmd) => run_clients(cmd, client, json, out).await,
    Command::Workouts(cmd) => run_workouts(cmd, client, json, out).await,
    Command::Ocr(cmd) => run_ocr(cmd, client, json, out).await,
    Command::Ai(cmd) => run_ai(cmd, client, json, out).await,
  }
}

async fn run_clients<W: Write>(
  cmd: ClientsCommand,
  client: &TrainerClient,
  json: bool,
  out: &mut W,
) -> Result<()> {
  match cmd {
    ClientsCommand::List => {
      let clients = client.list_clients().await?;
      if json {
        return print_json(out, &clients);
      }
      if clients.is_empty() {
        writeln!(out, "No clients")?;
      }
      for c in &clients {
        writeln!(out, "{}", client_row(c))?;
      }
    }
    ClientsCommand::Show { id } => {
      let c = client.get_client(&id).await?;
      if json {
        return print_json(out, &c);
      }
      write!(out, "{}", client_details(&c))?;
    }
    ClientsCommand::Add {
      name,
      email,
      phone,
      notes,
    } => {
      let created = client
        .create_client(&NewClient {
          name,
          email,
          phone,
          notes,
        })
        .await?;
      if json {
        return print_json(out, &created);
      }
      writeln!(out, "Created client {}", created.id)?;
    }
    ClientsCommand::Rm { id } => {
      client.delete_client(&id).await?;
      if !json {
        writeln!(out, "Deleted client {}", id)?;
      }
    }
  }
  Ok(())
}

async fn run_workouts<W: Write>(
  cmd: WorkoutsCommand,
  client: &TrainerClient,
  json: bool,
  out: &mut W,
) -> Result<()> {
  match cmd {
    WorkoutsCommand::List { client: client_id } => {
      let workouts = client.list_workouts(client_id.as_deref()).await?;
      if json {
        return print_json(out, &workouts);
      }
      if workouts.is_empty() {
        writeln!(out, "No workouts")?;
      }
      for w in &workouts {
        writeln!(out, "{}", workout_row(w))?;
      }
    }
    WorkoutsCommand::Show { id } => {
      let w = client.get_workout(&id).await?;
      if json {
        return print_json(out, &w);
      }
      write!(out, "{}", workout_details(&w))?;
    }
    WorkoutsCommand::Rm { id } => {
      client.delete_workout(&id).await?;
      if !json {
        writeln!(out, "Deleted workout {}", id)?;
      }
    }
  }
  Ok(())
}

async fn run_ocr<W: Write>(
  cmd: OcrCommand,
  client: &TrainerClient,
  json: bool,
  out: &mut W,
) -> Result<()> {
  let OcrCommand::Scan {
    image,
    save,
    client: client_id,
  } = cmd;

  let data = tokio::fs::read(&image)
    .await
    .map_err(|e| eyre!("Failed to read image {}: {}", image.display(), e))?;
  let file_name = image
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or("upload");
  let mime = mime_for_path(&image)
    .ok_or_else(|| eyre!("Unsupported image type: {}", image.display()))?;

  let extraction = client.process_workout_image(data, file_name, mime).await?;

  if !save {
    if json {
      return print_json(out, &extraction);
    }
    write!(out, "{}", extraction_details(&extraction))?;
    return Ok(());
  }

  let request = OcrSaveRequest::from_extraction(
    &extraction,
    client_id.as_deref(),
    Local::now().date_naive(),
  )
  .ok_or_else(|| eyre!("No client found in the scan; pass --client to save it"))?;
  let workout = client.save_ocr_workout(&request).await?;

  if json {
    return print_json(out, &workout);
  }
  writeln!(
    out,
    "Saved workout {} with {} exercises",
    workout.id,
    workout.exercises.len()
  )?;
  Ok(())
}

async fn run_ai<W: Write>(
  cmd: AiCommand,
  client: &TrainerClient,
  json: bool,
  out: &mut W,
) -> Result<()> {
  match cmd {
    AiCommand::Status => {
      let status = client.ai_rate_limit().await?;
      if json {
        return print_json(out, &status);
      }
      writeln!(out, "{}", rate_limit_line(&status))?;
    }
    AiCommand::ClearCache => {
      client.clear_ai_cache().await?;
      if !json {
        writeln!(out, "AI cache cleared")?;
      }
    }
  }
  Ok(())
}

// ============================================================================
// Formatting
// ============================================================================

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
  serde_json::to_writer_pretty(&mut *out, value)?;
  writeln!(out)?;
  Ok(())
}

pub fn client_row(client: &Client) -> String {
  format!(
    "{:<12} {:<24} {}",
    client.id,
    client.name,
    client.email.as_deref().unwrap_or("-")
  )
}

fn client_details(client: &Client) -> String {
  let mut s = format!("{} ({})\n", client.name, client.id);
  if let Some(email) = &client.email {
    s.push_str(&format!("  email: {}\n", email));
  }
  if let Some(phone) = &client.phone {
    s.push_str(&format!("  phone: {}\n", phone));
  }
  if let Some(notes) = &client.notes {
    s.push_str(&format!("  notes: {}\n", notes));
  }
  s.push_str(&format!("  since: {}\n", client.created_at.format("%Y-%m-%d")));
  s
}

pub fn workout_row(workout: &Workout) -> String {
  format!(
    "{:<12} {} {:<16} {:<10} {} exercises",
    workout.id,
    workout.date,
    workout.client_name.as_deref().unwrap_or(&workout.client_id),
    workout.workout_type.as_deref().unwrap_or("-"),
    workout.exercises.len()
  )
}

fn workout_details(workout: &Workout) -> String {
  let mut s = format!("{}\n", workout_row(workout));
  if let Some(duration) = workout.duration {
    s.push_str(&format!("  duration: {} min\n", duration));
  }
  if let Some(notes) = &workout.notes {
    s.push_str(&format!("  notes: {}\n", notes));
  }
  for e in &workout.exercises {
    s.push_str(&format!("  - {} {}x{}", e.name, e.sets, e.reps));
    if e.weight > 0.0 {
      s.push_str(&format!(" @ {}", e.weight));
    }
    s.push('\n');
  }
  s
}

fn extraction_details(extraction: &OcrExtraction) -> String {
  let mut s = String::new();
  if let Some(confidence) = extraction.confidence {
    s.push_str(&format!("confidence: {:.0}%\n", confidence * 100.0));
  }
  if let Some(date) = extraction.date {
    s.push_str(&format!("date: {}\n", date));
  }
  for e in &extraction.exercises {
    let count = |n: Option<u32>| n.map_or_else(|| "?".to_string(), |n| n.to_string());
    s.push_str(&format!("  - {} {}x{}\n", e.name, count(e.sets), count(e.reps)));
  }
  s
}

pub fn rate_limit_line(status: &RateLimitStatus) -> String {
  match status.reset_at {
    Some(reset) => format!(
      "{}/{} requests remaining, resets {}",
      status.remaining,
      status.limit,
      reset.format("%Y-%m-%d %H:%M UTC")
    ),
    None => format!("{}/{} requests remaining", status.remaining, status.limit),
  }
}

/// MIME type for an image upload, by file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
  let ext = path.extension()?.to_str()?.to_ascii_lowercase();
  match ext.as_str() {
    "jpg" | "jpeg" => Some("image/jpeg"),
    "png" => Some("image/png"),
    "webp" => Some("image/webp"),
    "heic" => Some("image/heic"),
    "gif" => Some("image/gif"),
    _ => None,
  }
}
