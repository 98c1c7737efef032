use crate::cli::ConfigArgs;
use crate::exit_codes;
use crate::output;
use sift_queue::config::{NOTIFY_CAPACITY_ENV, WORKERS_ENV};
use sift_queue::QueueConfig;

pub fn execute(args: ConfigArgs) -> i32 {
    let config = match QueueConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    if args.json {
        let written = output::to_json(&config, false).and_then(|json| output::write_line(&json));
        if let Err(e) = written {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("Workers: {} (${})", config.worker_count, WORKERS_ENV);
        println!(
            "  interactive workers: {}, background worker: #{}",
            config.interactive_slots(),
            config.background_index()
        );
        println!(
            "Notification capacity: {} (${})",
            config.notification_capacity, NOTIFY_CAPACITY_ENV
        );
    }

    exit_codes::SUCCESS
}
