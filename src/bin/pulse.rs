//! Pulse CLI - Command-line interface for Synheart Pulse
//!
//! Commands:
//! - analyze: Replay recorded samples and print the heart-rate estimate
//! - simulate: Generate a synthetic fingertip recording
//! - validate: Validate recorded samples
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_pulse::report::{ReportEncoder, REPORT_VERSION};
use synheart_pulse::synthetic::SyntheticPulse;
use synheart_pulse::{PulseConfig, PulseError, PulseMonitor, Sample, PRODUCER_NAME, PULSE_VERSION};

/// Pulse - On-device heart rate estimation from fingertip camera video
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSE_VERSION)]
#[command(about = "Estimate heart rate from camera PPG samples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded samples and print the estimate
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Pipeline configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wrap the estimate in a measurement report
        #[arg(long)]
        report: bool,
    },

    /// Generate a synthetic recording as NDJSON samples
    Simulate {
        /// Heart rate of the synthetic pulse
        #[arg(long)]
        bpm: f64,

        /// Recording length in seconds
        #[arg(long, default_value = "5")]
        duration: f64,

        /// Capture rate in Hz
        #[arg(long, default_value = "30")]
        sample_rate: f64,

        /// Green-channel pulse amplitude
        #[arg(long, default_value = "20")]
        amplitude: f64,

        /// Amplitude of the high-frequency disturbance
        #[arg(long, default_value = "0")]
        jitter: f64,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Validate recorded samples
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

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
    /// JSON array of samples
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (recorded samples)
    Input,
    /// Output schema (heart-rate estimate)
    Output,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

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

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            input_format,
            output_format,
            config,
            report,
        } => cmd_analyze(
            &input,
            input_format,
            output_format,
            config.as_deref(),
            report,
        ),

        Commands::Simulate {
            bpm,
            duration,
            sample_rate,
            amplitude,
            jitter,
            output,
        } => {
            let pulse = SyntheticPulse {
                bpm,
                duration_sec: duration,
                sample_rate_hz: sample_rate,
                amplitude,
                jitter,
                ..SyntheticPulse::default()
            };
            cmd_simulate(&pulse, &output)
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    report: bool,
) -> Result<(), PulseCliError> {
    let samples = parse_samples(&read_input(input)?, &input_format)?;
    if samples.is_empty() {
        return Err(PulseCliError::NoSamples);
    }

    let config = load_config(config)?;
    let mut monitor = PulseMonitor::with_config(config)?;

    // Rejected samples are logged by the monitor and skipped, as a capture loop would
    let dropped = samples
        .into_iter()
        .filter(|sample| monitor.add_sample(*sample).is_err())
        .count();
    if dropped > 0 {
        log::warn!("{dropped} samples rejected during replay");
    }

    let output = if report {
        let report = ReportEncoder::new().encode_monitor(&monitor);
        format_output(&report, &output_format)?
    } else {
        format_output(&monitor.estimate(), &output_format)?
    };
    println!("{output}");

    Ok(())
}

fn cmd_simulate(pulse: &SyntheticPulse, output: &Path) -> Result<(), PulseCliError> {
    if !(pulse.bpm > 0.0 && pulse.duration_sec > 0.0 && pulse.sample_rate_hz > 0.0) {
        return Err(PulseCliError::InvalidArgument(
            "bpm, duration and sample rate must be positive".to_string(),
        ));
    }

    let mut lines: Vec<String> = Vec::new();
    for sample in pulse.samples() {
        lines.push(serde_json::to_string(&sample)?);
    }
    let data = lines.join("\n") + "\n";

    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        stdout.write_all(data.as_bytes())?;
        stdout.flush()?;
    } else {
        fs::write(output, data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PulseCliError> {
    let samples = parse_samples(&read_input(input)?, &input_format)?;

    let mut errors: Vec<ValidationErrorDetail> = Vec::new();
    let mut previous: Option<f64> = None;
    for (index, sample) in samples.iter().enumerate() {
        let result = sample.validate().and_then(|()| match previous {
            Some(prev) if sample.timestamp < prev => Err(PulseError::NonMonotonicTimestamp {
                previous: prev,
                current: sample.timestamp,
            }),
            _ => Ok(()),
        });
        match result {
            Ok(()) => previous = Some(sample.timestamp),
            Err(e) => errors.push(ValidationErrorDetail {
                index,
                timestamp: sample.timestamp,
                error: e.to_string(),
            }),
        }
    }

    let report = ValidationReport {
        total_samples: samples.len(),
        valid_samples: samples.len() - errors.len(),
        invalid_samples: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total samples:   {}", report.total_samples);
        println!("Valid samples:   {}", report.valid_samples);
        println!("Invalid samples: {}", report.invalid_samples);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Sample {} (t = {} ms): {}",
                    err.index, err.timestamp, err.error
                );
            }
        }
    }

    if report.invalid_samples > 0 {
        Err(PulseCliError::ValidationFailed(report.invalid_samples))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "report_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Report format: {}", REPORT_VERSION),
    });

    if let Some(config_path) = config {
        let check = if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match PulseConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid ({} ms window, estimates after {} samples)",
                            config.window_duration_ms, config.min_samples
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            }
        };
        checks.push(check);
    } else {
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        });
    }

    // Check stdin is available (for piping samples into analyze)
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
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
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
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), PulseCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input: recorded samples");
                println!();
                println!("One sample per line (ndjson) or a JSON array (json):");
                println!();
                println!("- timestamp: Monotonic time in milliseconds, non-decreasing");
                println!("- red, green, blue: Mean channel intensity over the region of interest (0-255)");
                println!();
                println!("Generate an example with: pulse simulate --bpm 72");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output: heart-rate estimate");
                println!();
                println!("- heart_rate: Beats per minute (50-180), or null");
                println!("- confidence: 0-1, zero when heart_rate is null");
                println!("- quality: poor | fair | good | excellent");
                println!("- signal_strength: Pulsatile amplitude (0-1)");
                println!("- noise_level: Share of the signal removed by filtering (0-1)");
                println!("- recommendations: Short actionable hints");
                println!();
                println!("With --report the estimate is wrapped in {{ report_version, producer,");
                println!("computed_at_utc, session, estimate, disclaimer }}.");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_samples(data: &str, format: &InputFormat) -> Result<Vec<Sample>, PulseCliError> {
    match format {
        InputFormat::Ndjson => data
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<Sample>(line.trim()).map_err(|e| {
                    PulseCliError::ParseError(format!("line {}: {}", i + 1, e))
                })
            })
            .collect(),
        InputFormat::Json => Ok(serde_json::from_str(data)?),
    }
}

fn load_config(path: Option<&Path>) -> Result<PulseConfig, PulseCliError> {
    match path {
        Some(path) => Ok(PulseConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(PulseConfig::default()),
    }
}

fn format_output<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<String, PulseCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/pulse.sample.v1.json",
        "title": "pulse.sample.v1",
        "description": "Mean RGB intensity of the region of interest in one camera frame",
        "type": "object",
        "required": ["timestamp", "red", "green", "blue"],
        "properties": {
            "timestamp": { "type": "number", "description": "Monotonic time (ms)" },
            "red": { "type": "number", "minimum": 0, "maximum": 255 },
            "green": { "type": "number", "minimum": 0, "maximum": 255 },
            "blue": { "type": "number", "minimum": 0, "maximum": 255 }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/pulse.estimate.v1.json",
        "title": "pulse.estimate.v1",
        "description": "Synheart Pulse heart-rate estimate",
        "type": "object",
        "required": [
            "heart_rate", "confidence", "quality",
            "signal_strength", "noise_level", "recommendations"
        ],
        "properties": {
            "heart_rate": { "type": ["integer", "null"], "minimum": 50, "maximum": 180 },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "quality": {
                "type": "string",
                "enum": ["poor", "fair", "good", "excellent"]
            },
            "signal_strength": { "type": "number", "minimum": 0, "maximum": 1 },
            "noise_level": { "type": "number", "minimum": 0, "maximum": 1 },
            "recommendations": { "type": "array", "items": { "type": "string" } }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Pulse(PulseError),
    Json(serde_json::Error),
    NoSamples,
    ValidationFailed(usize),
    DoctorFailed,
    InvalidArgument(String),
    ParseError(String),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<PulseError> for PulseCliError {
    fn from(e: PulseError) -> Self {
        PulseCliError::Pulse(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Pulse(PulseError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'pulse doctor --config <file>' for details".to_string()),
            },
            PulseCliError::Pulse(e) => CliError {
                code: "PULSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pulse validate' on the input".to_string()),
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} samples failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: Some("See 'pulse simulate --help'".to_string()),
            },
            PulseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Ensure each line is a sample object; see 'pulse schema input'".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_samples: usize,
    valid_samples: usize,
    invalid_samples: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: f64,
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
