//! # Scheduler Simulation Runner
//!
//! Main entry point for `schedsimd`.

use schedsimd::{RunReport, RuntimeConfig, SimRuntime};
use services_logger::LogLevel;
use sim_scheduler::DrainReason;
use std::env;
use std::path::PathBuf;
use std::process;

/// Exit code when the run ended without completing every process
const EXIT_INCOMPLETE: i32 = 2;

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("schedsimd");

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(program);
        process::exit(1);
    });

    let runtime = SimRuntime::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        process::exit(1);
    });

    let monitor = runtime.config().monitor;
    let report = runtime
        .run(|snapshot| {
            if monitor {
                println!("{}", snapshot);
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Runtime error: {}", e);
            process::exit(1);
        });

    print_report(&report);
    if !report.completed() {
        process::exit(EXIT_INCOMPLETE);
    }
}

fn parse_args(args: &[String]) -> Result<RuntimeConfig, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut log_dir: Option<PathBuf> = None;
    let mut name: Option<String> = None;
    let mut log_level = None;
    let mut monitor = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            "--log-dir" | "-d" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --log-dir".to_string());
                }
                log_dir = Some(PathBuf::from(&args[i]));
            }
            "--name" | "-n" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --name".to_string());
                }
                name = Some(args[i].clone());
            }
            "--log-level" | "-l" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --log-level".to_string());
                }
                log_level = Some(
                    args[i]
                        .parse::<LogLevel>()
                        .map_err(|e| e.to_string())?,
                );
            }
            "--monitor" | "-m" => {
                monitor = true;
            }
            "--help" | "-h" => {
                print_usage(args.first().map(String::as_str).unwrap_or("schedsimd"));
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    let config_path = config_path.ok_or_else(|| "Missing required --config".to_string())?;
    let mut config = RuntimeConfig::new(config_path);
    if let Some(dir) = log_dir {
        config.log_dir = dir;
    }
    if let Some(name) = name {
        config.name = name;
    }
    if let Some(level) = log_level {
        config.log_level = level;
    }
    config.monitor = monitor;
    Ok(config)
}

fn print_report(report: &RunReport) {
    println!("{}", report.run_id);
    match &report.reason {
        DrainReason::Completed => println!("Completed at clock {}", report.clock),
        DrainReason::StepLimitReached { limit } => {
            println!("Stopped after {} steps at clock {}", limit, report.clock)
        }
        DrainReason::Stalled(diagnostic) => {
            let pids: Vec<String> = diagnostic.unfinished.iter().map(|p| p.to_string()).collect();
            println!(
                "Stalled at clock {} with unfinished: {}",
                diagnostic.clock,
                pids.join(", ")
            );
        }
    }
    println!(
        "Dispatches: {}  Context switches: {}",
        report.dispatches, report.context_switches
    );
    println!("Event log: {}", report.events_path.display());

    if let (Some(metrics), Some(path)) = (&report.metrics, &report.metrics_path) {
        println!("Average turnaround time: {:.2}", metrics.avg_turnaround_time);
        println!("Average waiting time:    {:.2}", metrics.avg_waiting_time);
        println!("Average response time:   {:.2}", metrics.avg_response_time);
        println!("CPU utilization:         {:.2}%", metrics.cpu_utilization);
        println!("Throughput:              {:.4}", metrics.throughput);
        println!("Metrics: {}", path.display());
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} --config <FILE> [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>       Simulation configuration (JSON)");
    eprintln!("  -d, --log-dir <DIR>       Output directory (default: logs)");
    eprintln!("  -n, --name <NAME>         Output base name (default: schedule)");
    eprintln!("  -l, --log-level <LEVEL>   debug, info, warn (default) or error");
    eprintln!("  -m, --monitor             Print a snapshot after every dispatch step");
    eprintln!("  -h, --help                Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --config scenarios/mixed.json", program);
    eprintln!(
        "  {} --config scenarios/mixed.json --log-dir out --name mixed --monitor",
        program
    );
}
