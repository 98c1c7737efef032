use crate::cli::DemoArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use sift_queue::{
    AddOptions, BackgroundTask, ProgressRecord, QueueConfig, QueueProgress, QueueStats,
    TaskError, TaskQueue,
};
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DemoLine<'a> {
    Progress(&'a QueueProgress),
    Stats(&'a QueueStats),
}

pub fn execute(args: DemoArgs) -> i32 {
    let mut config = match QueueConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }

    let queue = match TaskQueue::new(config) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };
    let mut progress = queue.subscribe();

    for i in 0..args.interactive {
        let task = demo_task(format!("interactive-{}", i), args.steps, args.step_ms, None);
        queue.add(task, AddOptions::interactive());
    }
    for i in 0..args.background {
        let task = demo_task(format!("background-{}", i), args.steps, args.step_ms, None);
        queue.add(task, AddOptions::background());
    }
    if let Some(fail_at) = args.fail_at {
        let task = demo_task("failing".to_string(), args.steps, args.step_ms, Some(fail_at));
        queue.add(task, AddOptions::interactive());
    }
    log::info!("Enqueued {} task(s)", queue.depth());

    // An idle event can also mean "one worker drained before another started";
    // depth only reaches 0 once every worker has drained.
    while queue.depth() > 0 {
        match progress.blocking_recv() {
            Ok(event) => {
                if let Err(e) = print_line(&DemoLine::Progress(&event), args.json) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Progress display fell behind, skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    if !queue.wait_idle(Duration::from_secs(args.timeout)) {
        eprintln!("Error: queue did not drain within {}s", args.timeout);
        return exit_codes::EXECUTION_ERROR;
    }

    // depth hits 0 just before the final drain notification is published
    while let Ok(event) = progress.try_recv() {
        if let Err(e) = print_line(&DemoLine::Progress(&event), args.json) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    let stats = queue.stats();
    if let Err(e) = print_line(&DemoLine::Stats(&stats), args.json) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    exit_codes::SUCCESS
}

/// Steps 0.0 -> 1.0, sleeping between records. With `fail_at`, the task errors
/// after that many steps instead of finishing.
fn demo_task(key: String, steps: u32, step_ms: u64, fail_at: Option<u32>) -> BackgroundTask {
    let label = key.clone();
    let description = match fail_at {
        Some(n) => format!("demo task failing after {} step(s)", n),
        None => "demo task".to_string(),
    };
    BackgroundTask::from_steps(
        key,
        description,
        (0..=steps).map(move |i| {
            if i > 0 {
                thread::sleep(Duration::from_millis(step_ms));
            }
            match fail_at {
                Some(n) if i >= n => Err(TaskError::failed(format!(
                    "{} gave up at step {}",
                    label, i
                ))),
                _ => Ok(ProgressRecord::new(label.clone(), i as f64 / steps as f64)),
            }
        }),
    )
}

fn print_line(line: &DemoLine<'_>, json: bool) -> Result<(), String> {
    if json {
        return output::to_json(line, true).and_then(|s| output::write_line(&s));
    }

    let text = match line {
        DemoLine::Progress(event) => match event.worker {
            Some(worker) => format!(
                "[worker {}] {} {} (queue {})",
                worker,
                event.record.activity,
                output::percent(event.record.progress),
                output::percent(event.ratio)
            ),
            None => "[idle]".to_string(),
        },
        DemoLine::Stats(stats) => {
            let mut text = format!(
                "depth={} remaining={} running={}",
                stats.depth, stats.remaining, stats.running
            );
            for w in &stats.workers {
                text.push_str(&format!(
                    "\n  worker {} ({}): depth={} pending={} running={}",
                    w.index, w.slot, w.depth, w.pending, w.running
                ));
            }
            text
        }
    };
    output::write_line(&text)
}
