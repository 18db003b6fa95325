//! Vigil CLI - Command-line interface for Vigil Core
//!
//! Commands:
//! - analyze: Process capture records into evaluations (batch or stdin)
//! - validate: Validate capture record schema
//! - doctor: Diagnose configuration and session snapshots
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vigil_core::encoder::ReportEncoder;
use vigil_core::schema::{CaptureAdapter, CaptureFrame, CaptureRecord, SCHEMA_VERSION};
use vigil_core::session::CombinedSession;
use vigil_core::types::{FaceEvaluation, VoiceEvaluation};
use vigil_core::{PRODUCER_NAME, VIGIL_VERSION};

/// Vigil - On-device scoring engine for behavioral disease-risk signals
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author = "Vigil Labs")]
#[command(version = VIGIL_VERSION)]
#[command(about = "Score behavioral capture streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process capture records into evaluations
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Device ID for provenance tracking
        #[arg(long, default_value = "unknown")]
        device_id: String,

        /// Session ID (generated when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Load session snapshot before processing
        #[arg(long)]
        load_snapshot: Option<PathBuf>,

        /// Save session snapshot after processing
        #[arg(long)]
        save_snapshot: Option<PathBuf>,

        /// Write the final session report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate capture record schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and session snapshots
    Doctor {
        /// Check a session snapshot file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one evaluation per line)
    Ndjson,
    /// JSON array of evaluations
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (vigil.capture.v1)
    Input,
    /// Output schema (vigil.report.v1)
    Output,
}

/// One evaluation on the output stream, tagged by modality
#[derive(serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EvaluationRecord {
    Face(FaceEvaluation),
    Voice(VoiceEvaluation),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), VigilCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            input_format,
            output_format,
            device_id,
            session_id,
            load_snapshot,
            save_snapshot,
            report,
        } => cmd_analyze(
            &input,
            &output,
            input_format,
            output_format,
            &device_id,
            session_id.as_deref(),
            load_snapshot.as_deref(),
            save_snapshot.as_deref(),
            report.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { snapshot, json } => cmd_doctor(snapshot.as_deref(), json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: &PathBuf,
    output: &PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    device_id: &str,
    session_id: Option<&str>,
    load_snapshot: Option<&Path>,
    save_snapshot: Option<&Path>,
    report: Option<&Path>,
) -> Result<(), VigilCliError> {
    let mut session = if let Some(snapshot_path) = load_snapshot {
        let snapshot_json = fs::read_to_string(snapshot_path)?;
        CombinedSession::from_snapshot(&snapshot_json)?
    } else {
        let started_at = chrono::Utc::now();
        match session_id {
            Some(id) => CombinedSession::with_id(id, device_id, started_at),
            None => CombinedSession::new(device_id, started_at),
        }
    };

    let records = read_records(input, &input_format)?;
    if records.is_empty() {
        return Err(VigilCliError::NoRecords);
    }

    let mut evaluations: Vec<EvaluationRecord> = Vec::new();
    for record in &records {
        record.validate()?;
        match CaptureAdapter::to_frame(record)? {
            CaptureFrame::Face(frame) => {
                let evaluation = session.process_face_frame(&frame)?;
                evaluations.push(EvaluationRecord::Face(evaluation));
            }
            CaptureFrame::Audio(frame) => {
                let evaluation = session.process_audio_frame(&frame)?;
                evaluations.push(EvaluationRecord::Voice(evaluation));
            }
        }
    }

    if let Some(snapshot_path) = save_snapshot {
        fs::write(snapshot_path, session.snapshot()?)?;
    }

    if let Some(report_path) = report {
        let encoder = ReportEncoder::new();
        fs::write(report_path, encoder.encode_to_json(&session)?)?;
    }

    let output_data = format_output(&evaluations, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
        io::stdout().flush()?;
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(
    input: &PathBuf,
    input_format: InputFormat,
    json: bool,
) -> Result<(), VigilCliError> {
    let records = read_records(input, &input_format)?;
    let failures = CaptureAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - failures.len(),
        invalid_records: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                record_id: f.record_id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.record_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(VigilCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(snapshot: Option<&Path>, json: bool) -> Result<(), VigilCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "vigil_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Vigil version {}", VIGIL_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    if let Some(snapshot_path) = snapshot {
        if snapshot_path.exists() {
            match fs::read_to_string(snapshot_path) {
                Ok(content) => match CombinedSession::from_snapshot(&content) {
                    Ok(session) => {
                        checks.push(DoctorCheck {
                            name: "snapshot".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Snapshot valid (session {}, {} evaluations)",
                                session.session_id(),
                                session.summary().evaluations
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "snapshot".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid snapshot: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "snapshot".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read snapshot file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "snapshot".to_string(),
                status: CheckStatus::Warning,
                message: "Snapshot file does not exist".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VIGIL_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Vigil Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(VigilCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), VigilCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input Schema: {}", SCHEMA_VERSION);
            println!();
            println!("The vigil.capture.v1 schema supports three record types:");
            println!();
            println!("1. face - One video frame's face-mesh landmarks");
            println!("   - landmarks: array of {{x, y[, z]}} in normalized [0,1] space");
            println!("   - an empty array means the detector found no face");
            println!();
            println!("2. audio - One audio analyser tick");
            println!("   - spectrum: frequency-domain magnitudes (u8 per bin)");
            println!("   - waveform: time-domain samples centered on 128 (u8)");
            println!("   - sample_rate: capture rate in Hz");
            println!();
            println!("3. device_error - Capture device became unavailable");
            println!("   - device: \"camera\" or \"microphone\"");
            println!("   - message: failure description");
        }
        SchemaType::Output => {
            println!("Output Schema: vigil.report.v1");
            println!();
            println!("A report payload contains:");
            println!();
            println!("- report_version: Schema version");
            println!("- producer: {{ name, version, instance_id }}");
            println!("- provenance: {{ session_id, source_device_id, timestamps }}");
            println!("- quality: {{ coverage, confidence, flags }}");
            println!("- face: latest face evaluation {{ metrics, risk, blinks, flags }}");
            println!("- voice: latest voice evaluation {{ metrics, risk, pitch_hz, flags }}");
            println!("- assessment: {{ face, voice, overall, projections, blended_indicators }}");
            println!("- summary: {{ evaluations, mean_risk, peak_risk, current_level }}");
        }
    }

    Ok(())
}

// Helper functions

fn read_records(
    input: &PathBuf,
    input_format: &InputFormat,
) -> Result<Vec<CaptureRecord>, VigilCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match input_format {
        InputFormat::Ndjson => CaptureAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => CaptureAdapter::parse_array(&input_data)?,
    };
    Ok(records)
}

fn format_output(
    evaluations: &[EvaluationRecord],
    format: &OutputFormat,
) -> Result<String, VigilCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for evaluation in evaluations {
                lines.push(serde_json::to_string(evaluation)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(evaluations)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(evaluations)?),
    }
}

// Error types

#[derive(Debug)]
enum VigilCliError {
    Io(io::Error),
    Signal(vigil_core::SignalError),
    Json(serde_json::Error),
    Validation(vigil_core::schema::ValidationError),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for VigilCliError {
    fn from(e: io::Error) -> Self {
        VigilCliError::Io(e)
    }
}

impl From<vigil_core::SignalError> for VigilCliError {
    fn from(e: vigil_core::SignalError) -> Self {
        VigilCliError::Signal(e)
    }
}

impl From<serde_json::Error> for VigilCliError {
    fn from(e: serde_json::Error) -> Self {
        VigilCliError::Json(e)
    }
}

impl From<vigil_core::schema::ValidationError> for VigilCliError {
    fn from(e: vigil_core::schema::ValidationError) -> Self {
        VigilCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<VigilCliError> for CliError {
    fn from(e: VigilCliError) -> Self {
        match e {
            VigilCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            VigilCliError::Signal(vigil_core::SignalError::DeviceUnavailable(msg)) => CliError {
                code: "DEVICE_UNAVAILABLE".to_string(),
                message: msg,
                hint: Some("Restore capture device access and start a new session".to_string()),
            },
            VigilCliError::Signal(e) => CliError {
                code: "SIGNAL_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches the vigil.capture.v1 schema".to_string()),
            },
            VigilCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            VigilCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'vigil validate' for details".to_string()),
            },
            VigilCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No capture records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            VigilCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            VigilCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    record_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
