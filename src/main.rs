use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use wiresink_rs::collaborators::{
    ChannelReporter, ChannelTransport, MemoryValueStore, StaticIdentityRegistry,
};
use wiresink_rs::control::ControlRequest;
use wiresink_rs::payload::{lookup, lookup_by_name, ParamInfo, ParamKey, ParameterEntry};
use wiresink_rs::util::{decode_hex, format_hex_compact, parse_hex_lenient};
use wiresink_rs::{
    checksum, decode_frame, decode_parameters, init_logger, init_logger_with_level,
    Collaborators, Gateway, GatewayConfig, SensorId,
};

#[derive(Parser)]
#[command(name = "wiresink-cli")]
#[command(about = "CLI tool for the wired sensor gateway protocol")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CRC-16/MODBUS checksum of hex input
    Checksum { hex: String },
    /// Decode a frame and its parameters as JSON
    Decode { hex: String },
    /// Look up a parameter by type code (decimal or 0x-prefixed) or name
    Lookup { key: String },
    /// Encode a control request
    Encode {
        /// Target sensor identity, 12 hex characters
        #[arg(short, long)]
        sensor: String,
        #[command(subcommand)]
        request: EncodeRequest,
    },
    /// Run the gateway over hex frames read line by line from stdin
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum EncodeRequest {
    Reset,
    Time {
        /// Set the clock instead of querying it
        #[arg(long)]
        set: bool,
        /// Epoch seconds to set; defaults to now
        #[arg(long)]
        epoch: Option<u32>,
    },
    SensorId {
        /// New identity to assign; omit to query
        #[arg(long)]
        new_id: Option<String>,
    },
    GeneralParams {
        #[arg(long)]
        set: bool,
        /// NAME=HEX value, repeatable; omit to query every parameter
        #[arg(long = "param")]
        params: Vec<String>,
    },
    MonitoringQuery,
    AlarmQuery,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        init_logger_with_level(LevelFilter::Debug);
    } else {
        init_logger();
    }

    match cli.command {
        Commands::Checksum { hex } => {
            let data = parse_hex_lenient(&hex).context("invalid hex input")?;
            println!("{:04X}", checksum(&data));
        }
        Commands::Decode { hex } => decode(&hex)?,
        Commands::Lookup { key } => {
            let (type_code, info) = resolve(&key)?;
            print_param(type_code, info);
        }
        Commands::Encode { sensor, request } => {
            let target: SensorId = sensor.parse().context("invalid sensor identity")?;
            let bytes = build_request(request)?.encode(target)?;
            println!("{}", format_hex_compact(&bytes));
        }
        Commands::Run { config } => run(config).await?,
    }

    Ok(())
}

fn decode(hex: &str) -> anyhow::Result<()> {
    let raw = parse_hex_lenient(hex).context("invalid hex input")?;
    let frame = decode_frame(&raw)?;
    let list = decode_parameters(&frame.payload, usize::from(frame.param_count));
    let report = serde_json::json!({
        "identity": frame.identity.to_hex(),
        "param_count": frame.param_count,
        "fragmented": frame.fragmented,
        "packet_type": format!("{:?}", frame.packet_type),
        "checksum": format!("{:04X}", frame.checksum),
        "parameters": list.values,
        "errors": list.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn resolve(key: &str) -> anyhow::Result<(u16, &'static ParamInfo)> {
    let code = match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => key.parse::<u16>().ok(),
    };
    match code {
        Some(code) => lookup(code)
            .map(|info| (code, info))
            .ok_or_else(|| anyhow!("no parameter with type code 0x{code:04X}")),
        None => lookup_by_name(key).ok_or_else(|| anyhow!("no parameter named {key:?}")),
    }
}

fn print_param(type_code: u16, info: &ParamInfo) {
    let key = ParamKey::from_type_code(type_code);
    println!(
        "0x{:04X} (feature {}, code {}): {} [{}] {}",
        type_code,
        key.feature,
        key.code,
        info.name,
        info.unit,
        info.kind.type_name()
    );
}

fn build_request(request: EncodeRequest) -> anyhow::Result<ControlRequest> {
    let request = match request {
        EncodeRequest::Reset => ControlRequest::Reset,
        EncodeRequest::Time { set, epoch } => {
            let now = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
            ControlRequest::Time {
                flag: u8::from(set),
                epoch_secs: epoch.unwrap_or(now),
            }
        }
        EncodeRequest::SensorId { new_id } => {
            let new_id = new_id
                .map(|id| id.parse::<SensorId>())
                .transpose()
                .context("invalid new identity")?;
            ControlRequest::SensorIdentity {
                flag: u8::from(new_id.is_some()),
                new_id,
            }
        }
        EncodeRequest::GeneralParams { set, params } => {
            let entries = params
                .iter()
                .map(|param| -> anyhow::Result<ParameterEntry> {
                    let (name, hex) = param
                        .split_once('=')
                        .ok_or_else(|| anyhow!("expected NAME=HEX, got {param:?}"))?;
                    let data = decode_hex(hex).with_context(|| format!("value of {name}"))?;
                    Ok(ParameterEntry::named(name, data)?)
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            ControlRequest::GeneralParameters {
                flag: u8::from(set),
                entries,
            }
        }
        EncodeRequest::MonitoringQuery => ControlRequest::MonitoringDataQuery,
        EncodeRequest::AlarmQuery => ControlRequest::AlarmParametersQuery,
    };
    Ok(request)
}

async fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => GatewayConfig::from_json_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    let registry = StaticIdentityRegistry::from_mappings(&config.devices)?;
    let (transport, mut outbound) = ChannelTransport::new();
    let (reporter, mut reports) = ChannelReporter::new();
    let collaborators = Collaborators {
        identities: Arc::new(registry),
        store: Arc::new(MemoryValueStore::new()),
        transport: Arc::new(transport),
        reporter: Arc::new(reporter),
    };
    let handle = Gateway::spawn(&config, collaborators)?;

    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(frame) = outbound.recv() => {
                    println!("TX {} {}", frame.target, format_hex_compact(&frame.bytes));
                }
                Some(report) = reports.recv() => {
                    match serde_json::to_string(&report.values) {
                        Ok(json) => println!("REPORT {} {} {}", report.device, report.source_tag, json),
                        Err(e) => eprintln!("REPORT {}: {}", report.device, e),
                    }
                }
                else => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_hex_lenient(line) {
            Ok(raw) => handle.submit(raw).await?,
            Err(e) => eprintln!("skipping line: {e}"),
        }
    }

    handle.shutdown().await;
    printer.await?;
    Ok(())
}
