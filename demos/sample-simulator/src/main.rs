//! cosim sample simulator
//!
//! Runs a short federated simulation against an in-process federate:
//! - a plain event at 10s that starts a model, which fires again 10s later
//! - an event at a random time between 10s and 20s
//! - an event at 30s that is cancelled before the run
//! - a `volt=120.5` packet bridged from node A to node B, with 10ns to 100ns
//!   of jitter on top of the link delay
//! - a stop at 100s
//!
//! Usage: `sample-simulator [config.json]`, where the optional file holds a
//! simulation configuration. `RUST_LOG` controls log output.

use std::error::Error;

use rand::Rng;

use cosim_app::{BridgeNetwork, NetworkConfig};
use cosim_core::{CosimResult, TimeUnit};
use cosim_federate::{InboundMessage, LocalFederate};
use cosim_runtime::{init_tracing, SimulationConfig, SyncScheduler};

type Sched = SyncScheduler<BridgeNetwork, LocalFederate>;

/// A model that, once started, reports back ten seconds later
struct Model;

impl Model {
    fn start(sched: &mut Sched) -> CosimResult<()> {
        let started_at = sched.clock().seconds(sched.now());
        let delay = sched.clock().from_integer(10, TimeUnit::Second);
        sched.schedule(delay, move |_: &mut BridgeNetwork, sched: &mut Sched| {
            Model::handle_event(sched, started_at);
            Ok(())
        })?;
        Ok(())
    }

    fn handle_event(sched: &Sched, started_at: f64) {
        println!(
            "Member method received event at {}s started at {}s",
            sched.clock().seconds(sched.now()),
            started_at
        );
    }
}

fn load_config() -> Result<SimulationConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            Ok(SimulationConfig::from_json(&text)?)
        }
        None => Ok(SimulationConfig {
            federate_end_time: Some("100s".into()),
            ..SimulationConfig::bounded("100s")
        }),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    init_tracing(config.json_logs)?;

    let mut federate = LocalFederate::new(TimeUnit::Second).with_step(5);
    if let Some(end) = config.federate_end(&Default::default(), TimeUnit::Second)? {
        federate = federate.with_end_time(end);
    }
    federate.push_message(InboundMessage::new(42, "breaker", "open"));

    let mut sched: Sched = SyncScheduler::new(federate);
    // jitter stands in for the lack of perfect synchronicity between nodes
    let network_config = NetworkConfig::pair("A", "B", 9000).with_jitter("10ns", "100ns");
    let mut network = BridgeNetwork::from_config(&network_config, sched.clock_mut())?;
    config.apply(&mut sched)?;
    network.start_all()?;

    let ten = sched.clock().from_integer(10, TimeUnit::Second);
    sched.schedule_at(ten, |_: &mut BridgeNetwork, sched: &mut Sched| {
        println!(
            "ExampleFunction received event at {}s",
            sched.clock().seconds(sched.now())
        );
        Model::start(sched)
    })?;

    let random_secs = rand::thread_rng().gen_range(10.0..20.0);
    let random_at = sched.clock().from_f64(random_secs, TimeUnit::Second);
    sched.schedule_at(random_at, |_: &mut BridgeNetwork, sched: &mut Sched| {
        println!(
            "RandomFunction received event at {}s",
            sched.clock().seconds(sched.now())
        );
        Ok(())
    })?;

    let thirty = sched.clock().from_integer(30, TimeUnit::Second);
    let cancelled = sched.schedule_at(thirty, |_: &mut BridgeNetwork, _: &mut Sched| {
        println!("I should never be called... ");
        Ok(())
    })?;
    sched.cancel(cancelled);

    let a = network.lookup("A").ok_or("node A missing")?;
    let b = network.lookup("B").ok_or("node B missing")?;
    let five = sched.clock().from_integer(5, TimeUnit::Second);
    sched.schedule_at(five, move |net: &mut BridgeNetwork, sched: &mut Sched| {
        net.send(sched, a, b, "volt", "120.5")
    })?;

    let summary = sched.run(&mut network)?;

    for delivery in network.take_deliveries() {
        println!(
            "Federate delivered {} at {}s",
            delivery.message,
            sched.clock().seconds(delivery.timestamp)
        );
    }
    println!(
        "Published to federate: {:?}",
        sched.bridge().federate().published()
    );
    println!(
        "Finished at {}s: {} events fired, {} grant requests",
        sched.clock().seconds(summary.end_time),
        summary.stats.events_fired,
        summary.stats.grant_requests
    );
    tracing::info!(stats = ?summary.stats, "Sample run complete");

    Ok(())
}
