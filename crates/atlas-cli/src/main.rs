//! `atlas` – world model demo console.
//!
//! This binary wires the full stack together:
//!
//! 1. Loads (or creates) `~/.atlas/config.toml`.
//! 2. Builds a small robot world – base, lidar, a map with a shared
//!    obstacle – and attaches the async update relay plus a DOT change
//!    tracker.
//! 3. Streams every mutation as a JSON envelope while a scripted mission
//!    moves the robot through a few stamped poses.
//! 4. Answers a lidar-in-world pose query and writes a Graphviz snapshot.
//! 5. Intercepts **Ctrl-C** for a clean early exit.

mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use colored::Colorize;
use tracing::{info, warn};

use atlas_export::{DotObserver, UpdateRelay, render_dot};
use atlas_graph::{GraphUpdate, NodeTally, UpdateObserver, WorldGraph};
use atlas_types::geometry::{Pose, Shape, Vec3};
use atlas_types::{Attribute, TimeStamp};

/// Adapter that lets the change tracker live on both sides of the graph:
/// the boxed observer inside it and the render loop outside.
struct SharedDot(Arc<Mutex<DotObserver>>);

impl UpdateObserver for SharedDot {
    fn receive_update(&mut self, update: &GraphUpdate) {
        if let Ok(mut tracker) = self.0.lock() {
            tracker.receive_update(update);
        }
    }
}

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set ATLAS_LOG_FORMAT=json for newline-delimited JSON logs.
    // The user-facing demo output still uses println! for UX consistency.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("ATLAS_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the mission …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; early exit on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  Default config written to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Config error".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── World construction ────────────────────────────────────────────────
    let mut world = WorldGraph::new();
    let root = world.root_id();

    let relay = UpdateRelay::with_capacity(&cfg.world_name, cfg.relay_capacity);
    let handle = relay.handle();
    world.attach_observer(Box::new(relay));

    let tracker = Arc::new(Mutex::new(DotObserver::new()));
    world.attach_observer(Box::new(SharedDot(tracker.clone())));

    // Stream every envelope as a JSON line while the mission runs.
    let mut rx = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            match serde_json::to_string(&envelope) {
                Ok(line) => println!("  {} {}", "◦".cyan(), line.dimmed()),
                Err(e) => warn!(error = %e, "envelope serialization failed"),
            }
        }
    });

    println!();
    println!("  {}", "Building the world …".bold());

    let base = world
        .add_transform(
            root,
            vec![Attribute::new("name", "robot_base")],
            Pose::from_translation(Vec3::new(0.0, 0.0, 0.0)),
            TimeStamp::from_secs(0.0),
            None,
        )
        .unwrap_or_else(|e| fatal(&format!("cannot add robot base: {e}")));
    let lidar = world
        .add_transform(
            base,
            vec![
                Attribute::new("name", "lidar"),
                Attribute::new("sensor", "rplidar-a3"),
            ],
            Pose::from_translation(Vec3::new(0.2, 0.0, 0.3)),
            TimeStamp::from_secs(0.0),
            None,
        )
        .unwrap_or_else(|e| fatal(&format!("cannot add lidar: {e}")));
    let map = world
        .add_group(root, vec![Attribute::new("name", "map")], None)
        .unwrap_or_else(|e| fatal(&format!("cannot add map: {e}")));
    let obstacle = world
        .add_geometry(
            map,
            vec![Attribute::new("name", "crate")],
            Shape::Cuboid {
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
            TimeStamp::from_secs(0.0),
            None,
        )
        .unwrap_or_else(|e| fatal(&format!("cannot add obstacle: {e}")));

    // The obstacle is also part of the robot's local plan, so it lives in
    // two places at once.
    if let Err(e) = world.add_parent(obstacle, base) {
        warn!(error = %e, "could not share the obstacle with the robot frame");
    }

    // ── Scripted mission ──────────────────────────────────────────────────
    println!("  {}", "Driving the robot …".bold());
    for step in 1..=5u32 {
        if shutdown.load(Ordering::SeqCst) {
            println!("  {}", "Mission aborted by operator.".yellow());
            break;
        }
        let stamp = TimeStamp::from_secs(f64::from(step));
        let pose = Pose::from_translation(Vec3::new(0.5 * step as f32, 0.0, 0.0));
        if let Err(e) = world.set_transform(base, pose, stamp) {
            warn!(error = %e, step, "pose update rejected");
        }
        info!(step, x = 0.5 * step as f32, "pose recorded");
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    // ── Queries ───────────────────────────────────────────────────────────
    let at = TimeStamp::from_secs(3.0);
    match world.transform_between(lidar, root, at) {
        Ok(pose) => println!(
            "\n  Lidar in world at t=3s: {}",
            format!(
                "({:.2}, {:.2}, {:.2})",
                pose.translation.x, pose.translation.y, pose.translation.z
            )
            .green()
            .bold()
        ),
        Err(e) => println!("{}: {}", "Pose query failed".red(), e),
    }

    let mut tally = NodeTally::default();
    if world.execute_traversal(&mut tally, root).is_ok() {
        let t = tally.tally();
        println!(
            "  World census: {} nodes ({} groups, {} transforms, {} geometries), {} edges",
            t.nodes().to_string().bold(),
            t.groups,
            t.transforms,
            t.geometries,
            t.edges
        );
    }

    // ── DOT snapshot ──────────────────────────────────────────────────────
    let dirty = tracker.lock().map(|t| t.needs_render()).unwrap_or(false);
    if dirty {
        match render_dot(&world, root) {
            Ok(dot) => match std::fs::write(&cfg.dot_path, &dot) {
                Ok(()) => {
                    if let Ok(mut t) = tracker.lock() {
                        t.mark_rendered();
                    }
                    println!(
                        "  Graphviz snapshot written to {}",
                        cfg.dot_path.bold()
                    );
                }
                Err(e) => println!("{}: {}", "Snapshot write failed".red(), e),
            },
            Err(e) => println!("{}: {}", "Snapshot render failed".red(), e),
        }
    }

    // Let the printer drain the remaining envelopes, then tear down.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    printer.abort();

    println!();
    println!("  {}", "✓ Mission complete.".green().bold());
}

fn fatal(message: &str) -> ! {
    eprintln!("{}: {}", "Fatal".red().bold(), message);
    std::process::exit(1);
}

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Atlas World Model CLI         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
}
