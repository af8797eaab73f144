// Copyright 2024-2026 Station Gateway Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client-side subcommands: discover and status.

use std::sync::Arc;

use serde_json::Value;

use crate::client::HttpTransport;
use crate::config::Config;
use crate::station::{FileStationStore, StationRecord};
use crate::Gateway;

use super::{EXIT_CONNECTION, EXIT_FAILURE, EXIT_SUCCESS};

fn build_gateway(config: &Config) -> Result<Gateway, i32> {
    let transport = HttpTransport::new().map_err(|e| {
        eprintln!("ERROR: {e}");
        EXIT_FAILURE
    })?;
    let store = Arc::new(FileStationStore::new(config.station_file()));
    Ok(Gateway::new(config, Arc::new(transport), store))
}

/// Probe candidates and persist the first station that answers.
pub async fn run_discover(config: &Config) -> i32 {
    let gateway = match build_gateway(config) {
        Ok(g) => g,
        Err(code) => return code,
    };
    match gateway.resolver.discover().await {
        Ok(record) => {
            print_record(&record);
            println!("Saved to {}", config.station_file().display());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Discovery failed: {e}");
            EXIT_CONNECTION
        }
    }
}

/// Show the station's status document.
pub async fn run_status(config: &Config, json_output: bool) -> i32 {
    let gateway = match build_gateway(config) {
        Ok(g) => g,
        Err(code) => return code,
    };
    match gateway.resolver.fetch_status().await {
        Ok((record, body)) => {
            if json_output {
                match serde_json::to_string_pretty(&body) {
                    Ok(s) => println!("{s}"),
                    Err(e) => {
                        eprintln!("ERROR: {e}");
                        return EXIT_FAILURE;
                    }
                }
            } else {
                print_record(&record);
                print_queue(&body);
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Status check failed: {e}");
            EXIT_CONNECTION
        }
    }
}

fn print_record(record: &StationRecord) {
    let caps = &record.capabilities;
    println!("Station:     {}", record.address);
    println!("Mode:        {}", caps.mode);
    if let Some(model) = &caps.model_type {
        println!("Model:       {model}");
    }
    println!("Multimodal:  {}", caps.multimodal);
    println!("Vision:      {}", caps.vision_processing);
    println!("Validated:   {}", record.last_validated_at.to_rfc3339());
}

fn print_queue(body: &Value) {
    let num = |ptr: &str| body.pointer(ptr).and_then(Value::as_u64).unwrap_or(0);
    if let Some(uptime) = body.get("uptime_seconds").and_then(Value::as_u64) {
        println!("Uptime:      {}h {}m", uptime / 3600, (uptime % 3600) / 60);
    }
    if body.get("queue").is_none() {
        return;
    }
    println!(
        "Executing:   {}/{}",
        num("/queue/processing"),
        num("/queue/max_concurrent")
    );
    println!("Queued:      {}/{}", num("/queue/queue_size"), num("/queue/max_size"));
    println!(
        "Totals:      {} submitted, {} completed, {} rejected, {} dropped",
        num("/queue/stats/total_submitted"),
        num("/queue/stats/total_completed"),
        num("/queue/stats/total_rejected"),
        num("/queue/stats/total_dropped")
    );
}
