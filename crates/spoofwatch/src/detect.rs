//! The per-device detection engine
//!
//! Sources push `(device_id, time, sentence)` triples at a [Handler]; the
//! [Detector] folds each sentence onto the device's latest state, appends the
//! result to the device's history, and runs every configured method that
//! passes its gating predicates. Indicators above the detection threshold
//! invoke the alert callback.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use eyre::WrapErr;

use crate::method::{Method, MethodContext};
use crate::nmea;
use crate::state::{NavState, StateHistory};

/// Sink contract every source drives
pub trait Handler {
    fn handle(&mut self, device_id: &str, time: DateTime<Utc>, sentence: &str);
}

/// Multi-threaded sources serialize through one exclusive lock; the
/// per-sentence work is short enough that finer locking buys nothing.
impl<H: Handler> Handler for Arc<Mutex<H>> {
    fn handle(&mut self, device_id: &str, time: DateTime<Utc>, sentence: &str) {
        self.lock()
            .expect("handler mutex poisoned")
            .handle(device_id, time, sentence);
    }
}

/// One monitored receiver and everything reconstructed about it
pub struct Device {
    pub device_id: String,
    pub state_history: StateHistory,
}

/// The device list, exposed to methods as a lookup capability only
pub struct DeviceIndex {
    devices: Vec<Device>,
}

impl DeviceIndex {
    pub fn new<I, S>(device_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let devices = device_ids
            .into_iter()
            .map(|device_id| Device {
                device_id: device_id.into(),
                state_history: StateHistory::new(),
            })
            .collect();
        Self { devices }
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    pub fn device_mut(&mut self, device_id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.device_id == device_id)
    }
}

/// Everything the alert callback learns about one threshold crossing
pub struct Alert<'a> {
    pub device_id: &'a str,
    pub spoofing_indicator: f64,
    /// Name of the method that crossed the threshold
    pub method: &'static str,
    pub state: &'a NavState,
}

pub type AlertCallback = Box<dyn for<'a> FnMut(Alert<'a>) + Send>;

/// The spoofing-detection engine
pub struct Detector {
    devices: DeviceIndex,
    methods: Vec<Box<dyn Method + Send>>,
    /// Last state each `(device, method)` pair was evaluated against
    previous_states: HashMap<(String, usize), NavState>,
    detection_threshold: f64,
    on_alert: AlertCallback,
}

impl Detector {
    pub fn new<I, S>(
        device_ids: I,
        methods: Vec<Box<dyn Method + Send>>,
        detection_threshold: f64,
        on_alert: AlertCallback,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: DeviceIndex::new(device_ids),
            methods,
            previous_states: HashMap::new(),
            detection_threshold,
            on_alert,
        }
    }

    pub fn devices(&self) -> &DeviceIndex {
        &self.devices
    }

    /// Calibration output of every method that produces one, keyed by method
    /// name; layouts mirror the methods' configuration fields.
    pub fn calibration_parameters(&self) -> serde_json::Value {
        let mut parameters = serde_json::Map::new();
        for method in &self.methods {
            if let Some(value) = method.calculate_parameters() {
                parameters.insert(method.name().to_string(), value);
            }
        }
        serde_json::Value::Object(parameters)
    }

    fn evaluate(&mut self, device_id: &str, latest: &NavState) {
        for index in 0..self.methods.len() {
            {
                let gating = self.methods[index].gating();
                if !latest.is_sufficiently_defined(&gating.required_state_fields) {
                    continue;
                }
                if let Some(previous) = self.previous_states.get(&(device_id.to_string(), index))
                    && !latest.differs_from(previous, &gating.variable_state_fields)
                {
                    continue;
                }
                let sufficient_satellites = latest
                    .satellites
                    .iter()
                    .filter(|s| s.is_sufficiently_defined(&gating.required_satellite_state_fields))
                    .count();
                if sufficient_satellites < gating.min_sufficient_satellite_state_count {
                    continue;
                }
            }

            let previous = self
                .previous_states
                .insert((device_id.to_string(), index), latest.clone());
            let Some(previous) = previous else {
                // First qualifying evaluation only establishes the baseline
                continue;
            };

            let history = &self
                .devices
                .device(device_id)
                .expect("caller resolved the device")
                .state_history;
            let ctx = MethodContext {
                devices: &self.devices,
            };
            let indicator =
                self.methods[index].spoofing_indicator(&ctx, device_id, latest, &previous, history);
            let method = self.methods[index].name();
            tracing::trace!("{method} on {device_id:?} returned {indicator}");
            if indicator > self.detection_threshold {
                (self.on_alert)(Alert {
                    device_id,
                    spoofing_indicator: indicator,
                    method,
                    state: latest,
                });
            }
        }
    }
}

impl Handler for Detector {
    fn handle(&mut self, device_id: &str, time: DateTime<Utc>, sentence: &str) {
        let Some(device) = self.devices.device_mut(device_id) else {
            tracing::trace!("Dropping sentence from unknown device {device_id:?}");
            return;
        };
        let seed = device.state_history.state(0).cloned().unwrap_or_default();
        let latest = match nmea::fold(seed, time, sentence) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::trace!("Dropping inactive-fix sentence from {device_id:?}");
                return;
            }
            Err(error) => {
                tracing::debug!("Dropping sentence from {device_id:?}: {error}");
                return;
            }
        };
        device.state_history.add_state(latest.clone());
        self.evaluate(device_id, &latest);
    }
}

/// A [Handler] that appends every sentence to a replayable log file
///
/// The line format is the one [crate::source::LogSource] reads back.
pub struct Recorder {
    file: BufWriter<File>,
}

impl Recorder {
    pub fn create<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create sentence log {path:?}"))?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }
}

impl Handler for Recorder {
    fn handle(&mut self, device_id: &str, time: DateTime<Utc>, sentence: &str) {
        let entry = format!(
            "{} {} {}\r\n",
            time.format("%Y-%m-%d %H:%M:%S%.6f"),
            device_id,
            sentence
        );
        // Flushed per entry so a crash loses at most the in-flight sentence
        let result = self
            .file
            .write_all(entry.as_bytes())
            .and_then(|()| self.file.flush());
        if let Err(error) = result {
            tracing::error!("Failed to record sentence from {device_id:?}: {error}");
        }
    }
}
