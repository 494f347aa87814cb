//! A simple paradigm organized by trials.
//!
//! Two states cycle on their timers until the second one's expiry ends
//! the trial; each trial boundary prints the last few events and
//! immediately acknowledges so the next trial starts.
//!
//! Run with: cargo run --example simple_paradigm

use std::time::Duration;

use operant::config::{RigConfig, ServerType};
use operant::dispatch::{Dispatcher, Notification};
use operant::matrix::{StateMatrix, StateSpec};

const TRIALS: usize = 3;

fn build_matrix() -> Result<StateMatrix, Box<dyn std::error::Error>> {
    let mut sm = StateMatrix::new(
        ["Cin", "Cout", "Lin", "Lout"],
        ["CenterWater", "LeftWater"],
        "ready_next_trial",
    )?;
    sm.add_state(
        StateSpec::new("first_state")
            .timer(0.9)
            .on("Cin", "second_state")
            .on("Tup", "second_state")
            .output_on("CenterWater"),
    )?;
    sm.add_state(
        StateSpec::new("second_state")
            .timer(2.1)
            .on("Lin", "first_state")
            .on("Tup", "ready_next_trial")
            .output_off("CenterWater"),
    )?;
    Ok(sm)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let config = RigConfig {
        inputs: vec!["Cin".into(), "Cout".into(), "Lin".into(), "Lout".into()],
        outputs: vec!["CenterWater".into(), "LeftWater".into()],
        server_type: ServerType::Simulator,
        poll_interval: Duration::from_millis(300),
    };
    let (dispatcher, mut notifications) = Dispatcher::new(config)?;

    let sm = build_matrix()?;
    println!("{}", sm.compile()?);

    dispatcher.set_state_matrix(sm).await?;
    dispatcher.ready_to_start_trial().await?;

    while let Some(notification) = notifications.recv().await {
        match notification {
            Notification::PrepareNextTrial {
                next_trial,
                trial_events,
            } => {
                println!("\nPrepare trial {next_trial}");
                println!("Last {} events:", trial_events.len().min(10));
                for event in trial_events.iter().rev().take(10).rev() {
                    println!("{event}");
                }
                if next_trial >= TRIALS {
                    break;
                }
                dispatcher.ready_to_start_trial().await?;
            }
            Notification::TimerTic { .. } => {
                print!(".");
                use std::io::Write;
                std::io::stdout().flush()?;
            }
        }
    }

    let final_log = dispatcher.die().await;
    let logged = final_log.map_or(0, |log| log.len());
    println!("\nDone: {TRIALS} trials, {logged} events logged.");
    Ok(())
}
