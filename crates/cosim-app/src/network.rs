//! Bridge network
//!
//! The simulated world: every bridge application, the medium they share,
//! and the registry of their names. Packets cross the medium after the link
//! delay plus a jitter drawn uniformly from `[jitter_min, jitter_max]`,
//! scheduled on the receiving node's context. Arrivals on one link never
//! overtake each other. Every delay is a tracked clock value so it follows
//! a resolution change.

use std::collections::HashMap;
use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cosim_core::{AppId, CosimError, CosimResult, SimTime};
use cosim_federate::{Delivery, Federate};
use cosim_runtime::{SimWorld, SyncScheduler};
use cosim_time::{LiveSlot, VirtualClock};
use cosim_transport::{SimMedium, SimSocket, Transmission};

use crate::{NameRegistry, NetworkConfig, PacketBridgeApplication};

pub type BridgeApp = PacketBridgeApplication<SimSocket>;

#[derive(Debug)]
pub struct BridgeNetwork {
    medium: SimMedium,
    apps: Vec<BridgeApp>,
    names: NameRegistry<AppId>,
    bindings: HashMap<SocketAddr, AppId>,
    link_delay: LiveSlot,
    jitter_min: LiveSlot,
    jitter_max: LiveSlot,
    rng: StdRng,
    /// Latest arrival scheduled per (from, to) link
    last_arrival: HashMap<(AppId, AppId), LiveSlot>,
    inbox: Vec<Delivery>,
}

impl BridgeNetwork {
    /// Empty network without jitter; `link_delay` is tracked on `clock`
    pub fn new(clock: &mut VirtualClock, link_delay: SimTime) -> Self {
        BridgeNetwork {
            medium: SimMedium::new(),
            apps: Vec::new(),
            names: NameRegistry::new(),
            bindings: HashMap::new(),
            link_delay: clock.track(link_delay),
            jitter_min: clock.track(SimTime::ZERO),
            jitter_max: clock.track(SimTime::ZERO),
            rng: StdRng::seed_from_u64(0),
            last_arrival: HashMap::new(),
            inbox: Vec::new(),
        }
    }

    /// Add a random extra delay in `[min, max]` to every packet
    pub fn set_jitter(
        &mut self,
        clock: &mut VirtualClock,
        min: SimTime,
        max: SimTime,
        seed: u64,
    ) -> CosimResult<()> {
        if min.is_strictly_negative() || min > max {
            return Err(CosimError::InvalidConfig(format!(
                "jitter range [{min}, {max}] is invalid"
            )));
        }
        clock.set_live(self.jitter_min, min)?;
        clock.set_live(self.jitter_max, max)?;
        self.rng = StdRng::seed_from_u64(seed);
        Ok(())
    }

    /// Build the network described by `config`, without starting it
    pub fn from_config(config: &NetworkConfig, clock: &mut VirtualClock) -> CosimResult<Self> {
        config.validate()?;
        let delay = clock.parse(&config.link_delay)?;
        let mut network = BridgeNetwork::new(clock, delay);
        let min = clock.parse(&config.jitter_min)?;
        let max = clock.parse(&config.jitter_max)?;
        network.set_jitter(clock, min, max, config.jitter_seed)?;
        for node in &config.nodes {
            network.add_app(&node.name, node.local())?;
        }
        Ok(network)
    }

    /// Add a named application
    pub fn add_app(&mut self, name: &str, local: Option<SocketAddr>) -> CosimResult<AppId> {
        let index = u32::try_from(self.apps.len())
            .map_err(|_| CosimError::InvalidConfig("too many applications".into()))?;
        let id = AppId::new(index);

        let mut app = BridgeApp::new(id);
        app.set_name(name, &mut self.names)?;
        if let Some(addr) = local {
            app.set_local(addr.ip(), addr.port());
        }
        self.apps.push(app);
        Ok(id)
    }

    pub fn app(&self, id: AppId) -> CosimResult<&BridgeApp> {
        self.apps
            .get(id.index())
            .ok_or_else(|| CosimError::InvalidConfig(format!("no application {id}")))
    }

    pub fn app_mut(&mut self, id: AppId) -> CosimResult<&mut BridgeApp> {
        self.apps
            .get_mut(id.index())
            .ok_or_else(|| CosimError::InvalidConfig(format!("no application {id}")))
    }

    pub fn lookup(&self, name: &str) -> Option<AppId> {
        self.names.get(name)
    }

    pub fn apps(&self) -> impl Iterator<Item = &BridgeApp> {
        self.apps.iter()
    }

    pub fn medium(&self) -> &SimMedium {
        &self.medium
    }

    pub fn link_delay(&self, clock: &VirtualClock) -> CosimResult<SimTime> {
        clock.live(self.link_delay)
    }

    /// Current jitter range
    pub fn jitter(&self, clock: &VirtualClock) -> CosimResult<(SimTime, SimTime)> {
        Ok((clock.live(self.jitter_min)?, clock.live(self.jitter_max)?))
    }

    /// Arrival time of a packet sent now on `from -> to`
    fn arrival<F: Federate>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        from: AppId,
        to: AppId,
    ) -> CosimResult<SimTime> {
        let clock = scheduler.clock();
        let delay = self.link_delay(clock)?;
        let (min, max) = self.jitter(clock)?;
        let jitter = SimTime(self.rng.gen_range(min.ticks()..=max.ticks()));

        let arrival = scheduler
            .now()
            .checked_add(delay)
            .and_then(|t| t.checked_add(jitter))
            .ok_or_else(|| CosimError::InvalidConfig("packet arrival overflows".into()))?;

        let clock = scheduler.clock_mut();
        let arrival = match self.last_arrival.get(&(from, to)).copied() {
            Some(slot) => {
                let arrival = arrival.max(clock.live(slot)?);
                clock.set_live(slot, arrival)?;
                arrival
            }
            None => {
                self.last_arrival.insert((from, to), clock.track(arrival));
                arrival
            }
        };
        Ok(arrival)
    }

    pub fn start_app(&mut self, id: AppId) -> CosimResult<()> {
        let medium = self.medium.clone();
        let app = self.app_mut(id)?;
        app.start(&medium)?;
        if let Some(bound) = app.bound_addr() {
            self.bindings.insert(bound, id);
        }
        Ok(())
    }

    pub fn stop_app(&mut self, id: AppId) -> CosimResult<()> {
        let app = self.app_mut(id)?;
        let bound = app.bound_addr();
        app.stop();
        if let Some(bound) = bound {
            self.bindings.remove(&bound);
        }
        Ok(())
    }

    pub fn start_all(&mut self) -> CosimResult<()> {
        for i in 0..self.apps.len() {
            let id = self.apps[i].id();
            self.start_app(id)?;
        }
        Ok(())
    }

    pub fn stop_all(&mut self) -> CosimResult<()> {
        for i in 0..self.apps.len() {
            let id = self.apps[i].id();
            self.stop_app(id)?;
        }
        Ok(())
    }

    /// Send `topic=value` from one application to another
    ///
    /// The packet arrives at the receiver one link delay plus jitter later.
    pub fn send<F: Federate + 'static>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        from: AppId,
        to: AppId,
        topic: &str,
        value: &str,
    ) -> CosimResult<()> {
        let destination = self.app(to)?.endpoint().clone();
        let now_secs = scheduler.clock().seconds(scheduler.now());
        self.app_mut(from)?.send(&destination, topic, value, now_secs)?;

        for transmission in self.medium.take_transmissions() {
            let delay = self.arrival(scheduler, from, to)? - scheduler.now();
            scheduler.schedule_with_context(
                delay,
                to.context(),
                move |network: &mut Self, scheduler: &mut SyncScheduler<Self, F>| {
                    network.deliver(scheduler, transmission)
                },
            )?;
        }
        Ok(())
    }

    /// Send by application name
    pub fn send_by_name<F: Federate + 'static>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        from: &str,
        to: &str,
        topic: &str,
        value: &str,
    ) -> CosimResult<()> {
        let resolve = |name: &str| {
            self.lookup(name)
                .ok_or_else(|| CosimError::InvalidConfig(format!("no application named {name:?}")))
        };
        let (from, to) = (resolve(from)?, resolve(to)?);
        self.send(scheduler, from, to, topic, value)
    }

    fn deliver<F: Federate>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        transmission: Transmission,
    ) -> CosimResult<()> {
        let Some(bound) = self.medium.deliver(transmission) else {
            return Ok(());
        };
        let Some(id) = self.bindings.get(&bound).copied() else {
            return Ok(());
        };

        let now_secs = scheduler.clock().seconds(scheduler.now());
        self.app_mut(id)?.handle_read(scheduler.bridge_mut(), now_secs)?;
        Ok(())
    }

    /// Federate messages delivered so far, oldest first
    pub fn take_deliveries(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.inbox)
    }
}

impl SimWorld for BridgeNetwork {
    fn on_delivery<F: Federate>(
        &mut self,
        scheduler: &mut SyncScheduler<Self, F>,
        delivery: Delivery,
    ) -> CosimResult<()> {
        tracing::info!(
            "At time {}s federate delivered {}",
            scheduler.clock().seconds(scheduler.now()),
            delivery.message
        );
        self.inbox.push(delivery);
        Ok(())
    }

    /// Close every socket once the simulation stops
    fn on_stop(&mut self) -> CosimResult<()> {
        self.stop_all()
    }
}
