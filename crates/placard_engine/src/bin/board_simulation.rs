//! # Board Simulation
//!
//! Runs the engine against a simulated host full of wandering bots and checks
//! that no client ever ends up with a board it should not have.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=placard_engine=debug board_simulation --bots 200 --boards 40 --duration 10
//! board_simulation --config engine.toml
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use placard_engine::board::Board;
use placard_engine::host::Host;
use placard_engine::{Engine, EngineConfig, RecordingSink, SimulatedHost};
use placard_shared::{
    BlockFace, ClientId, InteractAction, InteractPacket, Vec3, WorldId, WorldLocation,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WORLDS: [WorldId; 2] = [WorldId(0), WorldId(1)];
const ARENA: f32 = 300.0;
const STEP: Duration = Duration::from_millis(50);

struct Options {
    bots: u64,
    boards: u32,
    duration_secs: u64,
    seed: u64,
    config: Option<String>,
}

fn parse_args() -> Option<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        bots: 100,
        boards: 20,
        duration_secs: 10,
        seed: 7,
        config: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--bots" | "-b" => {
                options.bots = value.and_then(|v| v.parse().ok()).unwrap_or(options.bots);
                i += 1;
            }
            "--boards" | "-n" => {
                options.boards = value.and_then(|v| v.parse().ok()).unwrap_or(options.boards);
                i += 1;
            }
            "--duration" | "-d" => {
                options.duration_secs = value
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(options.duration_secs);
                i += 1;
            }
            "--seed" | "-s" => {
                options.seed = value.and_then(|v| v.parse().ok()).unwrap_or(options.seed);
                i += 1;
            }
            "--config" | "-c" => {
                options.config = value.cloned();
                i += 1;
            }
            "--help" | "-h" => {
                println!("Usage: board_simulation [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --bots <NUM>        Simulated clients (default: 100)");
                println!("  -n, --boards <NUM>      Public boards; every 5th bot also gets a private one (default: 20)");
                println!("  -d, --duration <SECS>   Run time (default: 10)");
                println!("  -s, --seed <SEED>       RNG seed (default: 7)");
                println!("  -c, --config <PATH>     Engine configuration TOML");
                println!("  -h, --help              Show this help");
                return None;
            }
            other => eprintln!("ignoring unknown argument {other}"),
        }
        i += 1;
    }
    Some(options)
}

fn random_position(rng: &mut StdRng) -> Vec3 {
    Vec3::new(
        rng.gen_range(-ARENA..ARENA),
        64.0,
        rng.gen_range(-ARENA..ARENA),
    )
}

fn random_world(rng: &mut StdRng) -> WorldId {
    WORLDS[rng.gen_range(0..WORLDS.len())]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Some(options) = parse_args() else {
        return;
    };

    let config = match &options.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load {path}: {err}");
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         PLACARD - BOARD VISIBILITY SIMULATION                    ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Bots:               {}", options.bots);
    println!("│ Public Boards:      {}", options.boards);
    println!("│ Duration:           {} s", options.duration_secs);
    println!("│ Radius:             {}", config.visibility_radius);
    println!("│ Period:             {} ms", config.scheduler_period_ms);
    println!("│ Protocol:           {}", config.protocol_version);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut rng = StdRng::seed_from_u64(options.seed);
    let sink = Arc::new(RecordingSink::counting());
    let host = SimulatedHost::with_sink(Arc::clone(&sink));
    let protocol = config.protocol_version();

    let engine = match Engine::start(host.clone(), config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("engine failed to start: {err}");
            std::process::exit(1);
        }
    };

    let clicks = Arc::new(AtomicU64::new(0));
    let mut fragments = Vec::new();
    for _ in 0..options.boards {
        let location = WorldLocation::new(random_world(&mut rng), random_position(&mut rng));
        let (columns, rows) = (rng.gen_range(1..=5), rng.gen_range(1..=4));
        match engine.create_board(location, BlockFace::North, columns, rows) {
            Ok(board) => {
                let counter = Arc::clone(&clicks);
                board.set_interact_handler(Some(Arc::new(move |_: InteractAction, _: ClientId| {
                    counter.fetch_add(1, Ordering::Relaxed);
                })));
                fragments.extend_from_slice(board.fragment_ids());
            }
            Err(err) => eprintln!("board creation failed: {err}"),
        }
    }

    for id in 0..options.bots {
        let client = ClientId(id);
        host.connect(client, random_world(&mut rng), random_position(&mut rng));
        if id % 5 == 0 {
            let session = host.session(client).map(|s| s.location());
            if let Some(location) = session {
                if let Err(err) =
                    engine.create_private_board(location, BlockFace::Up, 2, 2, client)
                {
                    eprintln!("private board creation failed: {err}");
                }
            }
        }
    }

    println!("Running...");
    let start = Instant::now();
    let deadline = start + Duration::from_secs(options.duration_secs);
    let mut next_client = options.bots;
    let mut frames = 0u64;

    while Instant::now() < deadline {
        for session in host.online_clients() {
            let client = session.id;
            let roll: f32 = rng.gen();
            if roll < 0.002 {
                host.teleport(client, random_world(&mut rng), random_position(&mut rng));
            } else if roll < 0.003 {
                host.respawn(client, random_world(&mut rng), random_position(&mut rng));
            } else if roll < 0.004 {
                host.disconnect(client);
                host.connect(ClientId(next_client), random_world(&mut rng), random_position(&mut rng));
                next_client += 1;
            } else if roll < 0.02 && !fragments.is_empty() {
                let target = fragments[rng.gen_range(0..fragments.len())];
                if let Ok(frame) = InteractPacket::attack(target).encode(protocol) {
                    host.send_frame(client, &frame);
                    frames += 1;
                }
            } else {
                let drift = Vec3::new(rng.gen_range(-1.5..1.5), 0.0, rng.gen_range(-1.5..1.5));
                host.move_to(client, session.position + drift);
            }
        }
        std::thread::sleep(STEP);
    }

    let scheduler = engine.scheduler_stats().unwrap_or_default();
    let boards = engine.registry().len();
    if let Err(err) = engine.stop() {
        eprintln!("stop failed: {err}");
    }

    let leaked: usize = host
        .online_clients()
        .iter()
        .map(|session| sink.visible_boards(session.id).len())
        .sum();

    println!();
    println!("┌─ RESULTS ───────────────────────────────────────────────────────┐");
    println!("│ Elapsed:            {:.1} s", start.elapsed().as_secs_f32());
    println!("│ Boards:             {boards}");
    println!("│ Scheduler passes:   {}", scheduler.passes);
    println!("│ Last pass:          {} µs", scheduler.last_pass.as_micros());
    println!("│ Max pass:           {} µs", scheduler.max_pass.as_micros());
    println!("│ Spawns:             {}", sink.spawn_count());
    println!("│ Updates:            {}", sink.update_count());
    println!("│ Destroys:           {}", sink.destroy_count());
    println!("│ Interact frames:    {frames}");
    println!("│ Clicks routed:      {}", clicks.load(Ordering::Relaxed));
    println!("│ Violations:         {}", sink.violations());
    println!("│ Leaked after stop:  {leaked}");
    println!("└──────────────────────────────────────────────────────────────────┘");

    if sink.violations() > 0 || leaked > 0 {
        std::process::exit(1);
    }
}
