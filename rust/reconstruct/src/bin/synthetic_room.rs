// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: scan a synthetic box room and write the reconstruction as JSON
//!
//! Usage:
//!   synthetic-room [options]
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use roomscan_reconstruct::synthetic::SyntheticRoom;
use roomscan_reconstruct::{ScanConfig, ScanSession};
use std::env;
use std::fs;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut width: f64 = 4.0;
    let mut depth: f64 = 4.0;
    let mut height: f64 = 2.5;
    let mut door = false;
    let mut double_sided = false;
    let mut config_path: Option<String> = None;
    let mut output_path = String::from("room.json");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => width = parse_value(&args, &mut i, "width"),
            "--depth" => depth = parse_value(&args, &mut i, "depth"),
            "--height" => height = parse_value(&args, &mut i, "height"),
            "--door" => door = true,
            "--double-sided" => double_sided = true,
            "--config" => config_path = Some(next_arg(&args, &mut i, "config").to_string()),
            "--output" => output_path = next_arg(&args, &mut i, "output").to_string(),
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => ScanConfig::from_path(path).unwrap_or_else(|e| {
            eprintln!("Error: cannot load config '{}': {}", path, e);
            process::exit(1);
        }),
        None => ScanConfig::default(),
    };
    if double_sided {
        config.reconstruction.double_sided = true;
    }

    let mut room = SyntheticRoom::new(width, depth, height);
    if door {
        room = room.with_door(0.55, 1.45, 2.1_f64.min(height - 0.2));
    }
    tracing::info!(width, depth, height, door, double_sided, "scanning synthetic room");

    let mut session = ScanSession::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    for fragment in room.fragments() {
        let report = session.on_fragment_added(&fragment);
        tracing::debug!(
            fragment = %fragment.id,
            surface = %report.surface.surface_type,
            wall = ?report.wall,
            "fragment delivered"
        );
    }

    let summary = session.summary();
    tracing::info!("{}", summary);

    let mesh = session.reconstruct();
    let simplified = session.simplified_room();
    tracing::info!(
        triangles = mesh.mesh.triangle_count(),
        vertices = mesh.mesh.vertex_count(),
        outline = simplified.outline.len(),
        "reconstruction finished"
    );

    let output = serde_json::json!({
        "summary": summary,
        "mesh": mesh,
        "simplified": simplified,
    });
    let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
        eprintln!("Error: cannot serialize output: {}", e);
        process::exit(1);
    });
    if let Err(e) = fs::write(&output_path, json) {
        eprintln!("Error: cannot write '{}': {}", output_path, e);
        process::exit(1);
    }
    tracing::info!(path = %output_path, "output written");
}

fn next_arg<'a>(args: &'a [String], i: &mut usize, name: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(value) => value,
        None => {
            eprintln!("Missing value for --{}", name);
            process::exit(1);
        }
    }
}

fn parse_value(args: &[String], i: &mut usize, name: &str) -> f64 {
    let raw = next_arg(args, i, name);
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => {
            eprintln!("Invalid {} value: {}", name, raw);
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Usage: synthetic-room [options]");
    println!();
    println!("Options:");
    println!("  --width <m>        Room extent along X (default: 4.0)");
    println!("  --depth <m>        Room extent along Z (default: 4.0)");
    println!("  --height <m>       Room height (default: 2.5)");
    println!("  --door             Cut a 0.9 m door into the first wall");
    println!("  --double-sided     Emit back faces for every surface");
    println!("  --config <path>    JSON configuration file");
    println!("  --output <path>    Output JSON path (default: room.json)");
}
