use sd_backup_proto::{FrameReader, FrameSource};
use sd_message_backup::{
	attachment::NoThumbnailTranscoder, store::MemoryDatabase, Aci, LocalIdentifiers,
	MessageBackupConfig, MessageBackupManager, PassReport, SystemDateProvider, E164,
};

use std::{
	fs::File,
	io::BufReader,
	path::{Path, PathBuf},
	process::ExitCode,
	sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const PLACEHOLDER_PHONE_NUMBER: &str = "+15555550100";

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
	Human,
	Json,
}

#[derive(Parser, Debug)]
#[command(name = "sd-backup", about = "Inspect and dry-run restore plaintext message backups")]
struct Cli {
	/// Output format
	#[arg(long, value_enum, default_value = "human")]
	format: OutputFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Restore a backup into a throwaway in-memory store and print the pass report
	Validate {
		file: PathBuf,
		/// Directory holding `message_backup.json`, created with defaults if missing
		#[arg(long)]
		config: Option<PathBuf>,
		/// Account id of the account the backup belongs to
		#[arg(long)]
		aci: Option<Uuid>,
		/// Phone number of the account the backup belongs to
		#[arg(long)]
		phone_number: Option<String>,
	},
	/// Print the header and every frame of a backup, one JSON document per line
	Dump { file: PathBuf },
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	match run(Cli::parse()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!(?e, "Command failed;");
			eprintln!("Error: {e:#}");
			ExitCode::FAILURE
		}
	}
}

fn run(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Validate {
			file,
			config,
			aci,
			phone_number,
		} => {
			let config = match config {
				Some(dir) => MessageBackupConfig::load_from(dir)?,
				None => MessageBackupConfig::default(),
			};
			let local_identifiers = local_identifiers(aci, phone_number.as_deref())?;

			let report = validate(&file, config, &local_identifiers)?;
			print_report(&report, &cli.format)?;
		}
		Commands::Dump { file } => dump(&file)?,
	}

	Ok(())
}

fn local_identifiers(aci: Option<Uuid>, phone_number: Option<&str>) -> Result<LocalIdentifiers> {
	let phone_number = phone_number.unwrap_or(PLACEHOLDER_PHONE_NUMBER);
	let phone_number =
		E164::parse(phone_number).ok_or_else(|| anyhow!("invalid phone number: {phone_number}"))?;

	Ok(LocalIdentifiers::new(
		Aci::from_uuid(aci.unwrap_or_else(Uuid::new_v4)),
		None,
		phone_number,
	))
}

fn open(path: &Path) -> Result<FrameReader<BufReader<File>>> {
	let file =
		File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;

	Ok(FrameReader::new(BufReader::new(file)))
}

fn validate(
	path: &Path,
	config: MessageBackupConfig,
	local_identifiers: &LocalIdentifiers,
) -> Result<PassReport> {
	let manager = MessageBackupManager::new(
		Arc::new(MemoryDatabase::new()),
		config,
		Arc::new(SystemDateProvider),
		Arc::new(NoThumbnailTranscoder),
	);

	let report = manager.import_backup(&mut open(path)?, local_identifiers)?;
	info!(
		frames = report.frames_processed,
		failures = report.failure_count(),
		"Backup validated;"
	);

	Ok(report)
}

fn print_report(report: &PassReport, format: &OutputFormat) -> Result<()> {
	match format {
		OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
		OutputFormat::Human => {
			println!(
				"{} frames: {} restored, {} partially restored, {} failed",
				report.frames_processed,
				report.successes,
				report.partial_successes,
				report.failure_count()
			);
			for (reason, count) in &report.skipped {
				println!("  skipped {count}x {reason}");
			}
			for error in &report.errors {
				println!(
					"  {} {}: {} ({})",
					error.id_type, error.id, error.kind, error.message
				);
			}
		}
	}

	Ok(())
}

fn dump(path: &Path) -> Result<()> {
	let mut reader = open(path)?;

	println!("{}", serde_json::to_string(&reader.read_header()?)?);
	while let Some(frame) = reader.read_frame()? {
		println!("{}", serde_json::to_string(&frame)?);
	}

	Ok(())
}
