use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lumen_core::{
    Chaser, ChaserStep, Collection, ConfigManager, ConsoleCommand, ConsoleEvent, Direction, Efx,
    EfxFixture, FixtureOrder, Function, FunctionId, LightingConsole, NetworkConfig, Pattern,
    PatternKind, RunOrder, Scene, Settings, Speed,
};
use lumen_fixtures::AxisRange;
use tokio::sync::mpsc;

const WARM_PARS: FunctionId = 1;
const COOL_PARS: FunctionId = 2;
const PAR_CHASE: FunctionId = 3;
const SPOTS_OPEN: FunctionId = 4;
const SPOTS_HOME: FunctionId = 5;
const SPOT_CIRCLE: FunctionId = 6;
const SHOW: FunctionId = 10;

/// DMX function engine for live shows.
#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Lumen DMX function engine")]
struct Args {
    /// Path to the settings file (default: lumen.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Art-Net Source IP address
    #[arg(long, value_parser = parse_ip)]
    source_ip: Option<IpAddr>,

    /// Art-Net Destination IP address (optional - if not provided, broadcast mode will be used)
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port
    #[arg(long)]
    artnet_port: Option<u16>,

    /// Force broadcast mode even if destination IP is provided
    #[arg(long, default_value = "false")]
    broadcast: bool,

    /// Engine tick rate in Hz
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Run the engine without sending any DMX
    #[arg(long, default_value = "false")]
    no_output: bool,

    /// Function to start once the console is up
    #[arg(long, default_value_t = SHOW)]
    start: FunctionId,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

fn apply_args(settings: &mut Settings, args: &Args) {
    if let Some(source_ip) = args.source_ip {
        settings.dmx_source_ip = source_ip.to_string();
    }
    match args.dest_ip {
        Some(dest_ip) => settings.dmx_dest_ip = dest_ip.to_string(),
        None if args.source_ip.is_some() => settings.dmx_broadcast = true,
        None => {}
    }
    if args.broadcast {
        settings.dmx_broadcast = true;
    }
    if let Some(port) = args.artnet_port {
        settings.dmx_port = port;
    }
    if let Some(tick_rate) = args.tick_rate {
        settings.tick_rate_hz = tick_rate;
    }
    if args.no_output {
        settings.dmx_enabled = false;
    }
}

fn patch_rig(console: &mut LightingConsole) -> Result<(), anyhow::Error> {
    let rig = [
        (1, "Left PAR", "shehds-rgbw-par", 1),
        (2, "Right PAR", "shehds-rgbw-par", 9),
        (3, "Left Spot", "shehds-led-spot-60w", 18),
        (4, "Right Spot", "shehds-led-spot-60w", 28),
        (5, "Left Wash", "shehds-led-wash-7x18w-rgbwa-uv", 38),
        (6, "Right Wash", "shehds-led-wash-7x18w-rgbwa-uv", 48),
        (
            7,
            "Smoke #1",
            "dl-geyser-1000-led-smoke-machine-1000w-3x9w-rgb",
            69,
        ),
        (8, "Pinspot", "shehds-mini-led-pinspot-10w", 80),
    ];

    for (id, name, profile, address) in rig {
        if let Err(e) = console.patch_fixture(id, name, profile, 1, address) {
            log::warn!("Skipping {}: {}", name, e);
        }
    }

    // Keep the spots off the ceiling.
    for spot in [3, 4] {
        let Some(mut fixture) = console.engine().patch().get(spot).cloned() else {
            continue;
        };
        fixture.set_pan_tilt_limits(AxisRange::new(10.0, 90.0), AxisRange::new(20.0, 70.0));
        console.engine_mut().update_fixture(fixture)?;
    }
    Ok(())
}

fn par_scene(red: u8, green: u8, blue: u8) -> Scene {
    let mut scene = Scene::new();
    for par in [1, 2] {
        scene.set_value(par, 0, 255);
        scene.set_value(par, 1, red);
        scene.set_value(par, 2, green);
        scene.set_value(par, 3, blue);
    }
    scene
}

fn demo_functions() -> Vec<Function> {
    let spots_open = Scene::new().with_value(3, 5, 255).with_value(4, 5, 255);
    let spots_home = Scene::new()
        .with_value(3, 0, 128)
        .with_value(3, 1, 128)
        .with_value(4, 0, 128)
        .with_value(4, 1, 128);

    let mut circle = Efx::new(Pattern::new(PatternKind::Circle))
        .with_fixtures(vec![EfxFixture::new(3), EfxFixture::reversed(4)])
        .with_fixture_order(FixtureOrder::Parallel)
        .with_speed(Speed::Fixed(Duration::from_secs(6)))
        .with_run_order(RunOrder::Loop, Direction::Forward);
    circle.start_scene = Some(SPOTS_OPEN);
    circle.stop_scene = Some(SPOTS_HOME);

    let chase = Chaser::new(vec![
        ChaserStep::new(WARM_PARS),
        ChaserStep::with_hold(COOL_PARS, Duration::from_millis(500)),
    ])
    .with_run_order(RunOrder::PingPong, Direction::Forward);

    vec![
        Function::scene(WARM_PARS, "Warm PARs", par_scene(255, 120, 0)),
        Function::scene(COOL_PARS, "Cool PARs", par_scene(0, 80, 255)),
        Function::chaser(PAR_CHASE, "PAR Chase", chase),
        Function::scene(SPOTS_OPEN, "Spots Open", spots_open),
        Function::scene(SPOTS_HOME, "Spots Home", spots_home),
        Function::efx(SPOT_CIRCLE, "Spot Circle", circle),
        Function::collection(
            SHOW,
            "Show",
            Collection::new(vec![PAR_CHASE, SPOT_CIRCLE]),
        ),
    ]
}

fn log_event(event: &ConsoleEvent) {
    match event {
        ConsoleEvent::Error { message } => log::error!("{}", message),
        ConsoleEvent::FunctionStartFailed {
            function_id,
            reason,
        } => log::warn!("Function {} failed to start: {}", function_id, reason),
        ConsoleEvent::FunctionStarted { function_id } => {
            log::info!("Function {} started", function_id)
        }
        ConsoleEvent::FunctionStopped { function_id } => {
            log::info!("Function {} stopped", function_id)
        }
        ConsoleEvent::Frame { .. } => {}
        other => log::debug!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load()?;
    apply_args(&mut settings, &args);
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow::anyhow!("Invalid settings: {}", errors.join(", ")))?;

    let network_config = NetworkConfig::from_settings(&settings)?;
    log::info!("Art-Net output: {}", network_config.describe());
    log::info!("Port: {}", network_config.port);

    let mut console = LightingConsole::new(settings, network_config)?;
    patch_rig(&mut console)?;
    for function in demo_functions() {
        console.engine_mut().add_function(function);
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let events = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            log_event(&event);
            if matches!(event, ConsoleEvent::ShutdownComplete) {
                break;
            }
        }
    });

    let _ = command_tx.send(ConsoleCommand::StartFunction {
        function_id: args.start,
    });

    let console_task = tokio::spawn(console.run_with_channels(command_rx, event_tx));

    tokio::signal::ctrl_c().await?;
    log::info!("Interrupted, shutting down");
    let _ = command_tx.send(ConsoleCommand::Shutdown);

    console_task.await??;
    let _ = events.await;
    Ok(())
}
