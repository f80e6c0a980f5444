use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use infobar::{
    BarPlacement, ChannelEvent, InfobarError, InfobarHook, InfobarNotifier, InfobarPainter,
    NowPlaying, OverlayConfig, RenderedImage, ScreenSize, SurfacePainter,
};

const ENV_LOG: &str = "INFOBAR_LOG";

#[derive(Parser, Debug)]
#[command(name = "infobar", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the overlay window until it is closed.
    Overlay(OverlayArgs),
    /// Send a test event to a running overlay.
    Send(SendArgs),
    /// Paint one infobar image as a PNG.
    Frame(FrameArgs),
    /// Read host status JSON lines and forward them as infobar events.
    Relay(RelayArgs),
}

#[derive(Parser, Debug)]
struct TransportArgs {
    /// Overlay config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Event file shared with the overlay.
    #[arg(long)]
    event_file: Option<PathBuf>,

    /// UDP address the overlay listens on.
    #[arg(long)]
    udp_addr: Option<String>,
}

impl TransportArgs {
    fn load(&self) -> anyhow::Result<OverlayConfig> {
        let mut cfg = OverlayConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.event_file {
            cfg.event_file = path.clone();
        }
        if let Some(addr) = &self.udp_addr {
            cfg.udp_addr = infobar::config::parse_socket_addr(addr)?;
        }
        Ok(cfg)
    }
}

#[derive(Parser, Debug)]
struct OverlayArgs {
    #[command(flatten)]
    transport: TransportArgs,

    /// Frame rate of the presentation loop.
    #[arg(long)]
    fps: Option<u32>,
}

#[derive(Parser, Debug)]
struct SendArgs {
    /// Channel number.
    #[arg(long)]
    num: i64,

    /// Channel name.
    #[arg(long)]
    name: String,

    /// Programme title.
    #[arg(long)]
    title: String,

    /// Minutes remaining.
    #[arg(long, default_value_t = 60)]
    mins: i64,

    /// Title of the following programme.
    #[arg(long)]
    next_title: Option<String>,

    /// Minutes until the following programme starts (defaults to `--mins`).
    #[arg(long)]
    next_in_mins: Option<i64>,

    #[command(flatten)]
    transport: TransportArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Event JSON (same shape as the wire payload).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Screen width the bar is laid out for.
    #[arg(long, default_value_t = 720)]
    width: u32,

    /// Screen height the bar is laid out for.
    #[arg(long, default_value_t = 576)]
    height: u32,

    /// Wall-clock time for the remaining-time text (ISO-8601, default now).
    #[arg(long)]
    at: Option<String>,

    /// Write a full screen-sized image with the bar placed in the safe area.
    #[arg(long)]
    screen: bool,

    /// Overlay config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RelayArgs {
    /// Newline-delimited status JSON; stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    #[command(flatten)]
    transport: TransportArgs,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_error(e),
    };
    let result = match cli.cmd {
        Command::Overlay(args) => cmd_overlay(args),
        Command::Send(args) => cmd_send(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Relay(args) => cmd_relay(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn init_tracing() {
    let level = std::env::var(ENV_LOG)
        .ok()
        .and_then(|v| v.trim().parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

/// Help and version print and exit normally; any other parse failure is an
/// ordinary fatal error (status 1), keeping 2 for display failures.
fn usage_error(e: clap::Error) -> ExitCode {
    match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => e.exit(),
        _ => {
            let _ = e.print();
            ExitCode::from(1)
        }
    }
}

/// 2 for display/window/GPU setup failures, 1 for everything else.
fn exit_status(err: &anyhow::Error) -> u8 {
    let display = err
        .chain()
        .filter_map(|e| e.downcast_ref::<InfobarError>())
        .any(InfobarError::is_display);
    if display { 2 } else { 1 }
}

#[cfg(feature = "gpu")]
fn cmd_overlay(args: OverlayArgs) -> anyhow::Result<()> {
    let mut cfg = args.transport.load()?;
    if let Some(fps) = args.fps {
        cfg.frame_rate = fps;
    }
    cfg.validate()?;
    tracing::info!(udp = %cfg.udp_addr, event_file = %cfg.event_file.display(), "starting overlay");
    infobar::run_overlay(cfg)?;
    Ok(())
}

#[cfg(not(feature = "gpu"))]
fn cmd_overlay(_args: OverlayArgs) -> anyhow::Result<()> {
    Err(InfobarError::display("this build has no display support (enable the `gpu` feature)").into())
}

fn cmd_send(args: SendArgs) -> anyhow::Result<()> {
    let cfg = args.transport.load()?;
    let now = Utc::now();
    let end = minutes_from(now, args.mins, "--mins")?;
    let next_start = match &args.next_title {
        Some(_) => Some(match args.next_in_mins {
            Some(mins) => minutes_from(now, mins, "--next-in-mins")?,
            None => end,
        }),
        None => None,
    };

    let now_playing = NowPlaying {
        channel_number: args.num,
        channel_name: args.name,
        title: args.title,
        start: Some(now),
        end: Some(end),
        next_title: args.next_title,
        next_start,
    };
    let notifier = InfobarNotifier::from_config(&cfg);
    notifier
        .notify_at(&now_playing, now)
        .with_context(|| format!("notify via '{}'", notifier.event_file().display()))?;

    eprintln!(
        "sent channel {} to {} and udp {}",
        now_playing.channel_number,
        notifier.event_file().display(),
        cfg.udp_addr
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = OverlayConfig::load(args.config.as_deref())?;
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read event '{}'", args.in_path.display()))?;
    let event = ChannelEvent::from_slice(&bytes).with_context(|| "parse event JSON")?;
    let now = match &args.at {
        Some(raw) => parse_at(raw)?,
        None => Utc::now(),
    };

    let placement = BarPlacement::compute(ScreenSize::new(args.width, args.height), &cfg.layout);
    let mut painter = InfobarPainter::from_config(&cfg)?;
    let bar = painter.paint(&event, &placement.metrics, now)?;
    let image = if args.screen {
        place_on_screen(&bar, &placement)
    } else {
        bar
    };

    write_png(&args.out, &image)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_relay(args: RelayArgs) -> anyhow::Result<()> {
    let cfg = args.transport.load()?;
    let hook = InfobarHook::new(InfobarNotifier::from_config(&cfg));
    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("open '{}'", path.display()))?,
        )),
        None => Box::new(std::io::stdin().lock()),
    };
    let sent = hook.relay_lines(reader).with_context(|| "read status lines")?;
    tracing::info!(sent, "relay finished");
    Ok(())
}

fn minutes_from(now: DateTime<Utc>, mins: i64, flag: &str) -> anyhow::Result<DateTime<Utc>> {
    TimeDelta::try_minutes(mins)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| anyhow::anyhow!("{flag} out of range: {mins}"))
}

fn parse_at(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    infobar::event::parse_timestamp(raw)
        .ok_or_else(|| anyhow::anyhow!("invalid --at timestamp '{raw}'"))
}

/// Copy the bar into a transparent screen-sized image at its quad rectangle.
fn place_on_screen(bar: &RenderedImage, placement: &BarPlacement) -> RenderedImage {
    let sw = placement.screen.width as usize;
    let sh = placement.screen.height as usize;
    let mut rgba8 = vec![0u8; sw * sh * 4];
    let x0 = placement.rect.x as usize;
    let y0 = placement.rect.y as usize;
    let row_bytes = (bar.width as usize).min(sw.saturating_sub(x0)) * 4;
    for row in 0..bar.height as usize {
        let y = y0 + row;
        if y >= sh || row_bytes == 0 {
            break;
        }
        let src = row * bar.width as usize * 4;
        let dst = (y * sw + x0) * 4;
        rgba8[dst..dst + row_bytes].copy_from_slice(&bar.rgba8[src..src + row_bytes]);
    }
    RenderedImage {
        width: placement.screen.width,
        height: placement.screen.height,
        rgba8,
    }
}

fn write_png(path: &Path, image: &RenderedImage) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &image.rgba8,
        image.width,
        image.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}
