//! Sources feeding `(device_id, time, sentence)` triples into a [Handler]
//!
//! Each source owns its transport and releases it on every exit path;
//! stopping the sources is the only way processing terminates.
//!
//! [Handler]: crate::detect::Handler

mod log;
mod net;
mod pcap;
mod serial;

pub use log::LogSource;
pub use net::UdpSource;
pub use pcap::PcapSource;
pub use serial::{DEFAULT_BAUD_RATE, SerialSource};

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, Utc};

    use crate::detect::Handler;

    /// Records every delivered triple for assertions
    #[derive(Default)]
    pub(crate) struct Collector {
        pub(crate) events: Vec<(String, DateTime<Utc>, String)>,
    }

    impl Handler for Collector {
        fn handle(&mut self, device_id: &str, time: DateTime<Utc>, sentence: &str) {
            self.events
                .push((device_id.to_string(), time, sentence.to_string()));
        }
    }
}
