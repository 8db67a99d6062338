mod commands;
mod machine;

use std::time::Instant;

use clap::Parser;
use hostloop_core::{
    HostConfig, HostLoop, PacingConfig, RewindConfig, RewindMode, SkipPolicy, StepOutcome,
    VideoMode,
    config::parse_binding,
    input::{Command, CommandChain, InputAddress, InputCodec, PortCommand},
};
use hostloop_rewind::DeltaHistory;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::{commands::JoypadCommands, machine::DemoCore};

/// Headless host loop driving a stand-in emulation core.
#[derive(Parser, Debug)]
#[command(name = "hostloop")]
#[command(about = "Frame pacing, rewind and input binding harness", long_about = None)]
struct Args {
    /// Rewind history size in MiB (0 disables rewind)
    #[arg(long, default_value_t = 0)]
    rewind_buffer_size: u32,

    /// Capture a rewind entry every N frames
    #[arg(long, default_value_t = 1)]
    rewind_granularity: u32,

    /// Frame skip policy: `auto` or a fixed render interval
    #[arg(long, default_value = "auto")]
    frame_skip: SkipPolicy,

    /// Under turbo, render one frame in this many
    #[arg(long, default_value_t = hostloop_core::pacing::DEFAULT_TURBO_SKIP_FRAMES)]
    turbo_skip: u32,

    /// Pace at 50 Hz instead of 60 Hz
    #[arg(long)]
    pal: bool,

    /// Run without waiting, rendering one frame in `--turbo-skip`
    #[arg(long)]
    turbo: bool,

    /// Let the audio device pace frames
    #[arg(long)]
    sound_sync: bool,

    /// Run unthrottled, as when dumping audio/video streams
    #[arg(long)]
    dump_streams: bool,

    /// Stop after this many frames while dumping streams
    #[arg(long)]
    dump_max_frames: Option<u64>,

    /// Extra binding, `DESCRIPTOR=COMMAND` (repeatable)
    #[arg(long = "bind", value_name = "DESCRIPTOR=COMMAND", value_parser = parse_binding)]
    bindings: Vec<(String, String)>,

    /// Drop the default keymap before applying `--bind`
    #[arg(long)]
    clear_all_controls: bool,

    /// Number of loop iterations to run
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Hold the input bound to `Rewind` from this frame on
    #[arg(long)]
    rewind_at: Option<u64>,

    /// How many frames to hold the rewind input
    #[arg(long, default_value_t = 60)]
    rewind_for: u64,

    /// Print the active bindings and exit
    #[arg(long)]
    list_bindings: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

impl Args {
    fn host_config(&self) -> HostConfig {
        HostConfig {
            pacing: PacingConfig {
                skip_policy: self.frame_skip,
                turbo_skip_frames: self.turbo_skip,
                ..PacingConfig::default()
            },
            rewind: RewindConfig {
                buffer_mib: self.rewind_buffer_size,
                granularity: self.rewind_granularity,
            },
            clear_all_controls: self.clear_all_controls,
            bindings: self.bindings.clone(),
            max_frames: self.dump_max_frames.filter(|_| self.dump_streams),
        }
    }
}

#[derive(Debug, Default)]
struct RunStats {
    steps: u64,
    captured: u64,
    replayed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.host_config();
    config.validate()?;

    let history = config
        .rewind
        .enabled()
        .then(|| DeltaHistory::new(config.rewind.capacity_bytes()));
    let mut host = HostLoop::new(&config, history);

    let codec = InputCodec::new();
    let commands = CommandChain::new().with_resolver(JoypadCommands);
    let report = host.rebuild_keymap(&config, &codec, &commands);
    if !report.skipped.is_empty() {
        warn!(skipped = report.skipped.len(), "some bindings were not installed");
    }
    info!(bound = report.bound, active = host.keymap().len(), "keymap ready");

    if args.list_bindings {
        for (address, command) in host.keymap().iter() {
            println!("{:<24} {command}", codec.decode(address));
        }
        return Ok(());
    }

    host.set_turbo(args.turbo);
    host.set_sound_sync(args.sound_sync);
    host.set_unthrottled(args.dump_streams);

    let rewind_input = host
        .keymap()
        .iter()
        .find_map(|(address, command)| {
            matches!(command, Command::Port(PortCommand::Rewind)).then_some(address)
        });
    if args.rewind_at.is_some() {
        if !host.rewind().is_enabled() {
            warn!("--rewind-at given but rewind is disabled (--rewind-buffer-size 0)");
        } else if rewind_input.is_none() {
            warn!("--rewind-at given but nothing is bound to Rewind");
        }
    }

    let video_mode = if args.pal {
        VideoMode::Pal
    } else {
        VideoMode::Ntsc
    };
    let mut core = DemoCore::new(video_mode);
    let mut stats = RunStats::default();
    let started = Instant::now();

    for step in 0..args.frames {
        if let (Some(at), Some(address)) = (args.rewind_at, rewind_input) {
            if step == at {
                press(&mut host, &mut core, address, true);
            } else if step == at + args.rewind_for {
                press(&mut host, &mut core, address, false);
            }
        }

        match host.step(&mut core) {
            StepOutcome::Finished => break,
            StepOutcome::Paused => {}
            StepOutcome::Ran { rewind, .. } => {
                stats.steps += 1;
                match rewind {
                    RewindMode::Capturing => stats.captured += 1,
                    RewindMode::Replaying => stats.replayed += 1,
                    RewindMode::Idle => {}
                }
            }
        }
    }

    let elapsed = started.elapsed();
    info!(
        steps = stats.steps,
        rendered = core.rendered(),
        captured = stats.captured,
        replayed = stats.replayed,
        machine_frame = core.machine_frame(),
        elapsed_ms = elapsed.as_millis() as u64,
        "run finished"
    );
    if let Some(history) = host.rewind().history() {
        info!(
            entries = history.len(),
            stored_bytes = history.stored_bytes(),
            capacity_bytes = history.capacity_bytes(),
            "rewind history"
        );
    }

    Ok(())
}

/// Feeds a press or release of whatever `address` names into the loop.
fn press(
    host: &mut HostLoop<DeltaHistory>,
    core: &mut DemoCore,
    address: InputAddress,
    pressed: bool,
) {
    match address {
        InputAddress::Button(input) => host.button(core, input.device(), input.index(), pressed),
        InputAddress::PseudoButton(n) => host.pseudo_button(core, n, pressed),
        other => warn!(address = %other, "cannot synthesize a button press here"),
    }
}
