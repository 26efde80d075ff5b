//! Live NMEA-over-UDP capture
//!
//! Receivers on shipboard networks broadcast their sentence bursts over UDP.
//! The sender's IP is the device id; arrival time is the local clock.

use std::io::ErrorKind;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use eyre::WrapErr;

use crate::detect::Handler;

pub struct UdpSource {
    socket: UdpSocket,
    running: Arc<AtomicBool>,
}

impl UdpSource {
    pub fn bind<A: ToSocketAddrs>(address: A) -> eyre::Result<Self> {
        let socket = UdpSocket::bind(address).wrap_err("Failed to bind UDP source")?;
        // Short receive timeout so a cleared running flag is noticed promptly
        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .wrap_err("Failed to configure UDP source")?;
        Ok(Self {
            socket,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Clearing the returned flag makes [UdpSource::run] return
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn local_addr(&self) -> eyre::Result<std::net::SocketAddr> {
        self.socket.local_addr().wrap_err("UDP source has no local address")
    }

    pub fn run<H: Handler>(&self, handler: &mut H) -> eyre::Result<()> {
        let mut buffer = [0u8; 2048];
        while self.running.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buffer) {
                Ok((received, peer)) => {
                    let time = Utc::now();
                    let device_id = peer.ip().to_string();
                    let payload = String::from_utf8_lossy(&buffer[..received]);
                    for sentence in payload.split("\r\n") {
                        if sentence.is_empty() {
                            continue;
                        }
                        handler.handle(&device_id, time, sentence);
                    }
                }
                Err(error)
                    if matches!(
                        error.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(error) => return Err(error).wrap_err("UDP receive failed"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::detect::Handler;

    /// Collects events and clears the running flag after the first datagram
    struct StopAfterFirst {
        events: Vec<(String, String)>,
        running: Arc<AtomicBool>,
    }

    impl Handler for StopAfterFirst {
        fn handle(&mut self, device_id: &str, _time: DateTime<Utc>, sentence: &str) {
            self.events.push((device_id.to_string(), sentence.to_string()));
            self.running.store(false, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_delivers_datagram_sentences() {
        let source = UdpSource::bind("127.0.0.1:0").unwrap();
        let address = source.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(b"$GPVTG,1*XX\r\n$GPVTG,2*XX\r\n", address)
            .unwrap();

        let mut handler = StopAfterFirst {
            events: Vec::new(),
            running: source.stop_flag(),
        };
        source.run(&mut handler).unwrap();

        assert_eq!(handler.events.len(), 2);
        assert_eq!(handler.events[0].0, "127.0.0.1");
        assert_eq!(handler.events[0].1, "$GPVTG,1*XX");
        assert_eq!(handler.events[1].1, "$GPVTG,2*XX");
    }

    #[test]
    fn test_cleared_flag_stops_immediately() {
        let source = UdpSource::bind("127.0.0.1:0").unwrap();
        source.stop_flag().store(false, Ordering::Relaxed);
        let mut handler = StopAfterFirst {
            events: Vec::new(),
            running: source.stop_flag(),
        };
        source.run(&mut handler).unwrap();
        assert!(handler.events.is_empty());
    }
}
