use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, Timelike};
use clap::{Parser, Subcommand};
use krishi_contracts::artifacts::ArtifactOrigin;
use krishi_contracts::dashboard::{DiseaseCatalog, ScanRecord, StatsResponse};
use krishi_contracts::diagnosis::DisplayModel;
use krishi_contracts::events::EventWriter;
use krishi_contracts::weather::{
    hour_labels, summarize_forecast, weather_info, TemperatureChart, WeatherSummary,
};
use krishi_engine::{
    spawn_accept_file, CameraSession, CameraStatus, ClientConfig, Clock, DashboardClient,
    DiagnosisPipeline, DiagnosisState, DiagnosisTransport, FileHandle, HttpDiagnosisTransport,
    ScanFlow, StillFrameDevice,
};
use serde_json::json;

const DEFAULT_LATITUDE: f64 = 26.91;
const DEFAULT_LONGITUDE: f64 = 75.79;

#[derive(Debug, Parser)]
#[command(name = "krishi", version, about = "KrishiVision crop disease scanner")]
struct Cli {
    /// Backend base URL; overrides KRISHI_API_URL.
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Bearer token; overrides KRISHI_API_TOKEN.
    #[arg(long, global = true)]
    token: Option<String>,
    /// Append session events to this JSONL file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Diagnose a leaf photo from disk.
    Diagnose(DiagnoseArgs),
    /// Capture from a camera feed and diagnose the frame.
    Scan(ScanArgs),
    History,
    Stats,
    Diseases,
    Health,
    Login(LoginArgs),
    Register(RegisterArgs),
    Weather(WeatherArgs),
}

#[derive(Debug, Parser)]
struct DiagnoseArgs {
    #[arg(long)]
    image: PathBuf,
    /// Declared content type; guessed from the extension when omitted.
    #[arg(long)]
    content_type: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct ScanArgs {
    /// Image served as the live feed.
    #[arg(long)]
    frame: PathBuf,
    #[arg(long)]
    torch: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Parser)]
struct RegisterArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Parser)]
struct WeatherArgs {
    #[arg(long, default_value_t = DEFAULT_LATITUDE, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, default_value_t = DEFAULT_LONGITUDE, allow_negative_numbers = true)]
    lon: f64,
    /// Write today's temperature chart as SVG.
    #[arg(long)]
    chart: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("krishi error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = ClientConfig::from_env()?
        .with_api_base(cli.api_base.as_deref())
        .with_bearer_token(cli.token.as_deref());
    let events = cli
        .events
        .as_ref()
        .map(|path| EventWriter::new(path, uuid::Uuid::new_v4().to_string()));

    match cli.command {
        Command::Diagnose(args) => run_diagnose(&config, events, args),
        Command::Scan(args) => run_scan(&config, events, args),
        Command::History => {
            let scans = DashboardClient::new(config)?.history()?;
            print!("{}", render_history(&scans));
            Ok(0)
        }
        Command::Stats => {
            let stats = DashboardClient::new(config)?.stats()?;
            print!("{}", render_stats(&stats));
            Ok(0)
        }
        Command::Diseases => {
            let catalog = DashboardClient::new(config)?.diseases()?;
            print!("{}", render_catalog(&catalog));
            Ok(0)
        }
        Command::Health => {
            let health = DashboardClient::new(config)?.health()?;
            println!(
                "{} {} ({})",
                health.service.as_deref().unwrap_or("backend"),
                health.version.as_deref().unwrap_or("?"),
                health.status
            );
            Ok(0)
        }
        Command::Login(args) => {
            let token = DashboardClient::new(config)?.login(&args.email, &args.password)?;
            println!("{}", token.as_str());
            Ok(0)
        }
        Command::Register(args) => {
            let token = DashboardClient::new(config)?.register(
                &args.full_name,
                &args.email,
                &args.password,
            )?;
            println!("{}", token.as_str());
            Ok(0)
        }
        Command::Weather(args) => run_weather(config, args),
    }
}

fn scan_flow(
    config: &ClientConfig,
    events: Option<EventWriter>,
) -> Result<ScanFlow<HttpDiagnosisTransport>> {
    let transport = HttpDiagnosisTransport::new(config)?;
    let pipeline = DiagnosisPipeline::new(transport)
        .with_pacing_floor(config.pacing_floor)
        .with_events(events);
    Ok(ScanFlow::new(pipeline))
}

fn run_diagnose(
    config: &ClientConfig,
    events: Option<EventWriter>,
    args: DiagnoseArgs,
) -> Result<i32> {
    let mut handle = FileHandle::from_path(&args.image);
    if let Some(content_type) = args.content_type {
        handle = handle.with_declared_type(content_type);
    }
    if !args.json {
        eprintln!("Analyzing {} ...", handle.file_name());
    }
    // Read and validate while the HTTP client is being built.
    let accepted = spawn_accept_file(handle, ArtifactOrigin::FilePicker);
    let mut flow = scan_flow(config, events)?;
    let selection = accepted.recv().context("file reader exited without a result")?;
    flow.submit_selection(selection);
    report_outcome(&flow, args.json)
}

fn run_scan(
    config: &ClientConfig,
    events: Option<EventWriter>,
    args: ScanArgs,
) -> Result<i32> {
    let device = StillFrameDevice::new(&args.frame).with_torch(args.torch);
    let mut session = CameraSession::open(&device, events.clone());
    if session.status() == CameraStatus::Denied {
        if let Some(err) = session.denial() {
            eprintln!("{err}");
        }
        eprintln!("Use `krishi diagnose --image <path>` to pick a photo instead.");
        return Ok(2);
    }
    if args.torch {
        if let Err(err) = session.toggle_torch() {
            eprintln!("warning: {err}");
        }
    }
    let mut flow = scan_flow(config, events)?;
    flow.capture(session);
    report_outcome(&flow, args.json)
}

fn report_outcome<T: DiagnosisTransport, C: Clock>(
    flow: &ScanFlow<T, C>,
    as_json: bool,
) -> Result<i32> {
    if let Some(err) = flow.input_error() {
        if as_json {
            let payload = json!({
                "status": "invalid_input",
                "error_kind": err.kind(),
                "error": err.message(),
            });
            println!("{payload}");
        } else {
            eprintln!("{err}");
        }
        return Ok(2);
    }
    match flow.state() {
        DiagnosisState::Succeeded(_) => {
            let Some(display) = flow.display() else {
                bail!("diagnosis succeeded without a result");
            };
            if as_json {
                let payload = json!({ "status": "succeeded", "result": display });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!("{}", render_display(&display));
            }
            Ok(0)
        }
        DiagnosisState::Failed(err) => {
            if as_json {
                let payload = json!({
                    "status": "failed",
                    "error_kind": err.kind(),
                    "error": err.message(),
                });
                println!("{payload}");
            } else {
                eprintln!("Diagnosis failed: {err}");
            }
            Ok(2)
        }
        other => bail!("diagnosis stopped in state {}", other.as_str()),
    }
}

fn run_weather(config: ClientConfig, args: WeatherArgs) -> Result<i32> {
    let forecast = DashboardClient::new(config)?.forecast(args.lat, args.lon)?;
    let Some(summary) = summarize_forecast(&forecast, Local::now().naive_local()) else {
        bail!("forecast has no readings for today");
    };
    print!("{}", render_weather(&summary));
    if let Some(path) = args.chart {
        let hours: Vec<String> = hour_labels()
            .into_iter()
            .take(summary.hourly.len())
            .collect();
        let Some(chart) = TemperatureChart::layout(&hours, &summary.hourly) else {
            bail!("not enough hourly readings for a chart");
        };
        let svg = render_chart_svg(&chart, &hours, Some(Local::now().hour()));
        fs::write(&path, svg)
            .with_context(|| format!("failed to write chart {}", path.display()))?;
        eprintln!("Chart written to {}", path.display());
    }
    Ok(0)
}

fn render_display(display: &DisplayModel) -> String {
    let mut out = String::new();
    let status = if display.is_healthy {
        "Healthy"
    } else {
        "Disease detected"
    };
    out.push_str(&format!("{} ({})\n", display.disease, display.crop));
    out.push_str(&format!("Status: {status}\n"));
    out.push_str(&format!(
        "Confidence: {:.1}% [{}]\n",
        display.confidence_percent,
        display.tier.as_str()
    ));
    if !display.description.is_empty() {
        out.push_str(&format!("\n{}\n", display.description));
    }
    if !display.treatments.is_empty() {
        out.push_str("\nTreatment:\n");
        for (idx, line) in display.treatments.iter().enumerate() {
            match line.badge {
                Some(badge) => {
                    out.push_str(&format!("  {}. {}  {badge}\n", idx + 1, line.text))
                }
                None => out.push_str(&format!("  {}. {}\n", idx + 1, line.text)),
            }
        }
    }
    if !display.prevention.is_empty() {
        out.push_str("\nPrevention:\n");
        for tip in &display.prevention {
            out.push_str(&format!("  - {tip}\n"));
        }
    }
    out
}

fn render_history(scans: &[ScanRecord]) -> String {
    if scans.is_empty() {
        return "No scans yet.\n".to_string();
    }
    scans
        .iter()
        .map(|scan| {
            format!(
                "{}  {} ({})  {:.1}%\n",
                scan.scanned_at,
                scan.disease,
                scan.crop,
                scan.confidence * 100.0
            )
        })
        .collect()
}

fn render_stats(stats: &StatsResponse) -> String {
    let mut out = format!("Total scans: {}\n", stats.total_scans);
    for entry in &stats.by_disease {
        out.push_str(&format!(
            "  {:>4}x  {} ({}), last {}\n",
            entry.total_scans, entry.disease, entry.crop, entry.last_scanned
        ));
    }
    out
}

fn render_catalog(catalog: &DiseaseCatalog) -> String {
    let mut out = format!("{} detectable conditions\n", catalog.total);
    for entry in &catalog.diseases {
        out.push_str(&format!("  {:<32} {}\n", entry.disease, entry.crop));
    }
    out
}

fn render_weather(summary: &WeatherSummary) -> String {
    let now = weather_info(summary.current_code);
    let mut out = match summary.current_temp {
        Some(temp) => format!("Now: {temp:.1}°C {} {}\n", now.icon, now.label),
        None => format!("Now: {} {}\n", now.icon, now.label),
    };
    for day in &summary.forecast {
        let info = weather_info(day.code);
        let high = degrees_or_dash(day.high);
        let low = degrees_or_dash(day.low);
        out.push_str(&format!(
            "  {}  {} {:<14} {high}/{low}  rain {:.1} mm\n",
            day.date, info.icon, info.label, day.rain_mm
        ));
    }
    let rainy: Vec<&str> = summary
        .rainy_days()
        .iter()
        .map(|day| day.date.as_str())
        .collect();
    if !rainy.is_empty() {
        out.push_str(&format!("Rain expected: {}\n", rainy.join(", ")));
    }
    out
}

fn degrees_or_dash(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.0}°"))
        .unwrap_or_else(|| "-".to_string())
}

/// Renders the chart, with a dot on every labelled hour and a larger
/// marker on `current_hour` when it has a reading.
fn render_chart_svg(
    chart: &TemperatureChart,
    hours: &[String],
    current_hour: Option<u32>,
) -> String {
    use krishi_contracts::weather::{CHART_HEIGHT, CHART_WIDTH};

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {CHART_WIDTH} {CHART_HEIGHT}\">\n"
    );
    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"rgba(74,222,128,0.15)\" stroke=\"none\"/>\n",
        chart.area_path
    ));
    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"#4ade80\" stroke-width=\"2.5\"/>\n",
        chart.line_path
    ));
    for label in &chart.y_labels {
        svg.push_str(&format!(
            "  <text x=\"32\" y=\"{}\" text-anchor=\"end\" font-size=\"10\">{}°</text>\n",
            label.y + 3.0,
            label.value
        ));
    }
    for label in &chart.x_labels {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\">{}</text>\n",
            label.x,
            CHART_HEIGHT - 4.0,
            label.label
        ));
    }
    for point in chart.marker_points() {
        svg.push_str(&format!(
            "  <circle cx=\"{}\" cy=\"{}\" r=\"3\" fill=\"white\" stroke=\"#22c55e\" \
             stroke-width=\"2\"/>\n",
            point.x, point.y
        ));
    }
    if let Some(now) = current_hour.and_then(|hour| chart.point_for_hour(hours, hour)) {
        svg.push_str(&format!(
            "  <circle cx=\"{}\" cy=\"{}\" r=\"5\" fill=\"#16a34a\" stroke=\"white\" \
             stroke-width=\"2\"/>\n",
            now.x, now.y
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"11\">{:.0}°C</text>\n",
            now.x,
            now.y - 12.0,
            now.temp
        ));
    }
    svg.push_str("</svg>\n");
    svg
}
