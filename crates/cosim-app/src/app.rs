//! Packet bridge application
//!
//! One application per simulated node. It sends `topic=value` packets to
//! its peers and forwards every packet it receives to the federate as a
//! publication.

use std::fmt;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6};

use cosim_core::{AppId, CosimError, CosimResult};
use cosim_federate::{Federate, FederateBridge};
use cosim_transport::{Socket, SocketFactory};
use cosim_wire::{Packet, TopicMessage};

use crate::NameRegistry;

/// Observer called with every packet before it is sent
pub type TxTrace = Box<dyn FnMut(&Packet)>;

/// Where an application can be reached
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub name: Option<String>,
    pub local: Option<SocketAddr>,
}

impl Endpoint {
    /// IPv4 address and port; fails for IPv6 or unset addresses
    pub fn local_inet(&self) -> CosimResult<SocketAddrV4> {
        match self.local {
            Some(SocketAddr::V4(addr)) => Ok(addr),
            _ => Err(self.family_mismatch("IPv4")),
        }
    }

    /// IPv6 address and port; fails for IPv4 or unset addresses
    pub fn local_inet6(&self) -> CosimResult<SocketAddrV6> {
        match self.local {
            Some(SocketAddr::V6(addr)) => Ok(addr),
            _ => Err(self.family_mismatch("IPv6")),
        }
    }

    fn family_mismatch(&self, wanted: &str) -> CosimError {
        CosimError::AddressFamilyMismatch {
            local: wanted.to_string(),
            remote: self.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("<unnamed>");
        match self.local {
            Some(addr) => write!(f, "'{name}' at {addr}"),
            None => write!(f, "'{name}' at any address"),
        }
    }
}

pub struct PacketBridgeApplication<S> {
    id: AppId,
    endpoint: Endpoint,
    sent: u32,
    received: u32,
    tx_trace: Vec<TxTrace>,
    socket: Option<S>,
}

impl<S: Socket> PacketBridgeApplication<S> {
    pub fn new(id: AppId) -> Self {
        PacketBridgeApplication {
            id,
            endpoint: Endpoint::default(),
            sent: 0,
            received: 0,
            tx_trace: Vec::new(),
            socket: None,
        }
    }

    pub fn id(&self) -> AppId {
        self.id
    }

    /// Set the name and register it, releasing any previous name
    pub fn set_name(&mut self, name: &str, registry: &mut NameRegistry<AppId>) -> CosimResult<()> {
        if self.name() == Some(name) && registry.get(name) == Some(self.id) {
            return Ok(());
        }
        registry.add(name, self.id)?;
        if let Some(old) = self.endpoint.name.replace(name.to_string()) {
            registry.remove(&old);
        }
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.endpoint.name.as_deref()
    }

    /// Address and port to bind on start
    pub fn set_local(&mut self, ip: IpAddr, port: u16) {
        self.endpoint.local = Some(SocketAddr::new(ip, port));
    }

    pub fn local_inet(&self) -> CosimResult<SocketAddrV4> {
        self.endpoint.local_inet()
    }

    pub fn local_inet6(&self) -> CosimResult<SocketAddrV6> {
        self.endpoint.local_inet6()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Address the socket actually bound to
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(Socket::local_addr)
    }

    pub fn connect_tx_trace<T>(&mut self, sink: T)
    where
        T: FnMut(&Packet) + 'static,
    {
        self.tx_trace.push(Box::new(sink));
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    /// Create and bind the socket
    ///
    /// Binds IPv4 or IPv6 following the configured address, or the
    /// any-address when none is set. Starting twice keeps the first socket.
    pub fn start<Fa>(&mut self, factory: &Fa) -> CosimResult<()>
    where
        Fa: SocketFactory<Socket = S>,
    {
        if self.endpoint.name.is_none() {
            return Err(CosimError::MissingName);
        }
        if self.socket.is_some() {
            return Ok(());
        }

        let mut socket = factory.create_socket()?;
        let bound = match self.endpoint.local {
            Some(addr) => socket.bind(addr)?,
            None => socket.bind_any()?,
        };
        self.socket = Some(socket);

        tracing::debug!(app = %self.endpoint, %bound, "Bridge application started");
        Ok(())
    }

    /// Close and release the socket
    pub fn stop(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            socket.close();
            tracing::debug!(app = %self.endpoint, "Bridge application stopped");
        }
    }

    /// Send `topic=value` to `to`
    ///
    /// Trace sinks see the packet before anything can fail. The destination
    /// is read from `to` in this application's own address family.
    pub fn send(
        &mut self,
        to: &Endpoint,
        topic: &str,
        value: &str,
        now_secs: f64,
    ) -> CosimResult<()> {
        let packet = Packet::from_message(&TopicMessage::new(topic, value));
        for sink in &mut self.tx_trace {
            sink(&packet);
        }

        let name = self.endpoint.name.clone().unwrap_or_default();
        let socket = self.socket.as_mut().ok_or(CosimError::NotStarted(name))?;

        let dest = match self.endpoint.local {
            Some(SocketAddr::V4(_)) => SocketAddr::V4(to.local_inet()?),
            Some(SocketAddr::V6(_)) => SocketAddr::V6(to.local_inet6()?),
            None => {
                return Err(CosimError::AddressFamilyMismatch {
                    local: self.endpoint.to_string(),
                    remote: to.to_string(),
                })
            }
        };

        tracing::info!(
            "At time {now_secs}s '{}' sent {} bytes to '{}' at address {} port {}",
            self.endpoint.name.as_deref().unwrap_or_default(),
            packet.size(),
            to.name.as_deref().unwrap_or_default(),
            dest.ip(),
            dest.port()
        );
        socket.send_to(packet, dest)?;
        self.sent += 1;
        Ok(())
    }

    /// Forward every waiting packet to the federate
    ///
    /// Returns how many packets were read.
    pub fn handle_read<F: Federate>(
        &mut self,
        bridge: &mut FederateBridge<F>,
        now_secs: f64,
    ) -> CosimResult<usize> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(0);
        };

        let mut count = 0;
        while let Some((packet, from)) = socket.recv_from() {
            tracing::info!(
                "At time {now_secs}s received {} bytes from {} port {}",
                packet.size(),
                from.ip(),
                from.port()
            );

            let message = TopicMessage::decode(packet.payload())?;
            tracing::debug!(
                topic = %message.topic,
                value = %message.value,
                "Forwarding to federate"
            );
            bridge.publish_message(message)?;

            self.received += 1;
            count += 1;
        }
        Ok(count)
    }
}

impl<S> fmt::Debug for PacketBridgeApplication<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBridgeApplication")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("sent", &self.sent)
            .field("received", &self.received)
            .field("started", &self.socket.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_core::TimeUnit;
    use cosim_federate::LocalFederate;
    use cosim_transport::{SimMedium, SimSocket};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type App = PacketBridgeApplication<SimSocket>;

    fn app(id: u32, name: &str, addr: &str, names: &mut NameRegistry<AppId>) -> App {
        let mut app = App::new(AppId::new(id));
        app.set_name(name, names).unwrap();
        let addr: SocketAddr = addr.parse().unwrap();
        app.set_local(addr.ip(), addr.port());
        app
    }

    #[test]
    fn test_start_requires_name() {
        let medium = SimMedium::new();
        let mut app = App::new(AppId::new(0));
        assert_eq!(app.start(&medium), Err(CosimError::MissingName));
        assert!(!app.is_started());
    }

    #[test]
    fn test_start_binds_configured_family() {
        let medium = SimMedium::new();
        let mut names = NameRegistry::new();
        let mut v4 = app(0, "A", "10.0.0.1:9000", &mut names);
        let mut v6 = app(1, "B", "[2001:db8::2]:9000", &mut names);
        let mut any = App::new(AppId::new(2));
        any.set_name("C", &mut names).unwrap();

        v4.start(&medium).unwrap();
        v6.start(&medium).unwrap();
        any.start(&medium).unwrap();

        assert_eq!(v4.bound_addr(), Some("10.0.0.1:9000".parse().unwrap()));
        assert!(v6.bound_addr().unwrap().is_ipv6());
        assert!(any.bound_addr().unwrap().ip().is_unspecified());

        v4.stop();
        assert!(!v4.is_started());
        assert!(!medium.is_bound("10.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut names = NameRegistry::new();
        let _a = app(0, "A", "10.0.0.1:9000", &mut names);
        let mut b = App::new(AppId::new(1));
        assert_eq!(
            b.set_name("A", &mut names),
            Err(CosimError::DuplicateName("A".into()))
        );
        assert_eq!(b.name(), None);
    }

    #[test]
    fn test_same_name_twice_is_accepted() {
        let mut names = NameRegistry::new();
        let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
        a.set_name("A", &mut names).unwrap();
        assert_eq!(a.name(), Some("A"));
        assert_eq!(names.get("A"), Some(AppId::new(0)));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_rename_releases_old_name() {
        let mut names = NameRegistry::new();
        let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
        a.set_name("A2", &mut names).unwrap();
        assert_eq!(names.get("A"), None);
        assert_eq!(names.get("A2"), Some(AppId::new(0)));
    }

    #[test]
    fn test_send_fires_trace_then_transmits() {
        let medium = SimMedium::new();
        let mut names = NameRegistry::new();
        let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
        let b = app(1, "B", "10.0.0.2:9000", &mut names);
        a.start(&medium).unwrap();

        let sizes = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&sizes);
        a.connect_tx_trace(move |p| seen.borrow_mut().push(p.size()));

        a.send(b.endpoint(), "volt", "120.5", 5.0).unwrap();

        assert_eq!(a.sent(), 1);
        assert_eq!(*sizes.borrow(), vec![10]);
        let sent = medium.take_transmissions();
        assert_eq!(sent[0].to, "10.0.0.2:9000".parse().unwrap());
    }

    #[test]
    fn test_send_before_start_still_traces() {
        let mut names = NameRegistry::new();
        let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
        let b = app(1, "B", "10.0.0.2:9000", &mut names);

        let count = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&count);
        a.connect_tx_trace(move |_| *seen.borrow_mut() += 1);

        assert_eq!(
            a.send(b.endpoint(), "t", "v", 0.0),
            Err(CosimError::NotStarted("A".into()))
        );
        assert_eq!(*count.borrow(), 1);
        assert_eq!(a.sent(), 0);
    }

    #[test]
    fn test_family_mismatch_is_fatal() {
        let medium = SimMedium::new();
        let mut names = NameRegistry::new();
        let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
        let b = app(1, "B", "[2001:db8::2]:9000", &mut names);
        let mut any = App::new(AppId::new(2));
        any.set_name("C", &mut names).unwrap();
        a.start(&medium).unwrap();
        any.start(&medium).unwrap();

        let err = a.send(b.endpoint(), "t", "v", 0.0).unwrap_err();
        assert!(matches!(err, CosimError::AddressFamilyMismatch { .. }));

        let err = any.send(a.endpoint(), "t", "v", 0.0).unwrap_err();
        assert!(matches!(err, CosimError::AddressFamilyMismatch { .. }));

        assert_eq!(a.sent() + any.sent(), 0);
        assert!(medium.take_transmissions().is_empty());
    }

    #[test]
    fn test_handle_read_forwards_every_packet() {
        let medium = SimMedium::new();
        let mut names = NameRegistry::new();
        let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
        let mut b = app(1, "B", "10.0.0.2:9000", &mut names);
        a.start(&medium).unwrap();
        b.start(&medium).unwrap();
        let mut bridge = FederateBridge::new(LocalFederate::new(TimeUnit::Second));

        assert_eq!(b.handle_read(&mut bridge, 0.0).unwrap(), 0);

        a.send(b.endpoint(), "volt", "120.5", 1.0).unwrap();
        a.send(b.endpoint(), "amp", "3", 1.0).unwrap();
        for t in medium.take_transmissions() {
            medium.deliver(t);
        }

        assert_eq!(b.handle_read(&mut bridge, 1.0).unwrap(), 2);
        assert_eq!(
            bridge.federate().published(),
            &[TopicMessage::new("volt", "120.5"), TopicMessage::new("amp", "3")]
        );
        assert_eq!(b.received(), 2);
    }

    #[test]
    fn test_malformed_packet_is_fatal() {
        use cosim_transport::Transmission;

        let medium = SimMedium::new();
        let mut names = NameRegistry::new();
        let mut b = app(1, "B", "10.0.0.2:9000", &mut names);
        b.start(&medium).unwrap();
        medium.deliver(Transmission {
            from: "10.0.0.1:9000".parse().unwrap(),
            to: "10.0.0.2:9000".parse().unwrap(),
            packet: Packet::from(&b"no delimiter"[..]),
        });

        let mut bridge = FederateBridge::new(LocalFederate::new(TimeUnit::Second));
        let err = b.handle_read(&mut bridge, 0.0).unwrap_err();
        assert!(matches!(err, CosimError::MalformedMessage(_)));
        assert!(bridge.federate().published().is_empty());
    }

    proptest! {
        #[test]
        fn bridged_messages_reach_federate_verbatim(
            topic in "[^=]{1,16}",
            value in ".{0,32}",
        ) {
            let medium = SimMedium::new();
            let mut names = NameRegistry::new();
            let mut a = app(0, "A", "10.0.0.1:9000", &mut names);
            let mut b = app(1, "B", "10.0.0.2:9000", &mut names);
            a.start(&medium).unwrap();
            b.start(&medium).unwrap();
            let mut bridge = FederateBridge::new(LocalFederate::new(TimeUnit::Second));

            a.send(b.endpoint(), &topic, &value, 0.0).unwrap();
            for t in medium.take_transmissions() {
                medium.deliver(t);
            }
            b.handle_read(&mut bridge, 0.0).unwrap();

            prop_assert_eq!(
                bridge.federate().published(),
                &[TopicMessage::new(topic.as_str(), value.as_str())]
            );
        }
    }
}
