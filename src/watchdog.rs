//! One watchdog run: classify a poll, publish the power value, update the
//! persisted state and raise an alert when the compressor switched.
//!
//! Metrics are fire-and-forget: failures are logged and never change the
//! outcome of a run. Alert failures are logged and reported but do not fail
//! the run either, since the record has already been updated.

use std::{
    path::PathBuf,
    process::{Command, ExitStatus},
    time::Duration,
};

use thiserror::Error;

use crate::{
    config::MetricsConfig,
    error::Error,
    status::DeviceStatus,
    tracker::{PowerState, StateStore, StateTracker, StoreError, Transition},
};

/// What a single status poll produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Status(DeviceStatus),
    /// Nothing came back within the read timeout.
    Silent,
    /// A reply arrived but could not be used. Holds whatever fields were split.
    Malformed(Vec<String>),
}

impl Poll {
    /// Sort a status query result into a poll outcome. Serial I/O failures are
    /// passed through for the caller to abort on.
    pub fn from_result<I: embedded_io::Error>(
        result: Result<DeviceStatus, Error<I>>,
    ) -> Result<Self, Error<I>> {
        match result {
            Ok(status) => Ok(Poll::Status(status)),
            Err(Error::DeviceUnreachable) => Ok(Poll::Silent),
            Err(Error::MalformedResponse { fields }) => Ok(Poll::Malformed(fields)),
            Err(Error::InvalidResponse(_) | Error::BufferError) => Ok(Poll::Malformed(Vec::new())),
            Err(err) => Err(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to start alert command {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Alert command {} exited with {status}", .program.display())]
    Failed { program: PathBuf, status: ExitStatus },
}

/// Delivers state change notifications.
pub trait AlertSink {
    fn alert(&mut self, device: &str, state: PowerState) -> Result<(), AlertError>;
}

/// Runs an external program as `<program> <device> <ON|OFF>`.
#[derive(Debug, Clone)]
pub struct CommandAlert {
    program: PathBuf,
}

impl CommandAlert {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl AlertSink for CommandAlert {
    fn alert(&mut self, device: &str, state: PowerState) -> Result<(), AlertError> {
        let status = Command::new(&self.program)
            .arg(device)
            .arg(state.to_string())
            .status()
            .map_err(|source| AlertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(AlertError::Failed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metrics push failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Receives the numeric power value of each poll.
pub trait MetricsSink {
    fn record(&mut self, state: PowerState) -> Result<(), MetricsError>;
}

/// Pushes `<measurement>,device=<tag> value=<0|1>` to an InfluxDB `/write` endpoint.
pub struct InfluxMetrics {
    client: reqwest::blocking::Client,
    write_url: String,
    database: String,
    measurement: String,
    device_tag: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxMetrics {
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            write_url: format!("{}/write", config.url.trim_end_matches('/')),
            database: config.database.clone(),
            measurement: config.measurement.clone(),
            device_tag: config.device_tag.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

impl MetricsSink for InfluxMetrics {
    fn record(&mut self, state: PowerState) -> Result<(), MetricsError> {
        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[("db", self.database.as_str())])
            .body(line_protocol(&self.measurement, &self.device_tag, state));
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        request.send()?.error_for_status()?;
        Ok(())
    }
}

/// InfluxDB line protocol record for one power sample.
pub fn line_protocol(measurement: &str, device_tag: &str, state: PowerState) -> String {
    format!("{},device={} value={}", measurement, device_tag, state.value())
}

/// Result of one watchdog run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub transition: Transition,
    pub metrics_recorded: bool,
    pub alert_sent: bool,
}

/// Turns polls into persisted state, metrics and alerts.
pub struct Watchdog<S: StateStore> {
    device_name: String,
    tracker: StateTracker<S>,
    silent_device_is_off: bool,
    alert: Option<Box<dyn AlertSink>>,
    metrics: Option<Box<dyn MetricsSink>>,
}

impl<S: StateStore> Watchdog<S> {
    pub fn new(device_name: impl Into<String>, store: S) -> Self {
        Self {
            device_name: device_name.into(),
            tracker: StateTracker::new(store),
            silent_device_is_off: true,
            alert: None,
            metrics: None,
        }
    }

    /// Whether a silent or garbled device counts as switched off.
    pub fn silent_device_is_off(mut self, off: bool) -> Self {
        self.silent_device_is_off = off;
        self
    }

    pub fn with_alert(mut self, sink: impl AlertSink + 'static) -> Self {
        self.alert = Some(Box::new(sink));
        self
    }

    pub fn with_metrics(mut self, sink: impl MetricsSink + 'static) -> Self {
        self.metrics = Some(Box::new(sink));
        self
    }

    pub fn store(&self) -> &S {
        self.tracker.store()
    }

    /// Process one poll. Only a failure to read or write the state record is an error.
    ///
    /// The record is written before the alert goes out. A failed write is
    /// returned only after the alert has been dispatched.
    pub fn run(&mut self, poll: &Poll) -> Result<RunReport, StoreError> {
        let observed = self.observation(poll);

        let metrics_recorded = match (poll, observed) {
            (Poll::Malformed(_), _) | (_, None) => false,
            (_, Some(state)) => self.record_metrics(state),
        };

        let transition = self.tracker.compare(observed)?;
        let persisted = self.tracker.commit(&transition);

        let alert_sent = match transition.alert {
            Some(state) => self.send_alert(state),
            None => false,
        };
        persisted?;

        Ok(RunReport {
            transition,
            metrics_recorded,
            alert_sent,
        })
    }

    fn observation(&self, poll: &Poll) -> Option<PowerState> {
        match poll {
            Poll::Status(status) => {
                let state = PowerState::from_actual(status.actual_power);
                if state.is_none() {
                    log::warn!(
                        "Unrecognised actual power token {:?}",
                        status.actual_power_token()
                    );
                }
                state
            }
            Poll::Silent => {
                log::warn!("No response received from {}", self.device_name);
                self.silent_device_is_off.then_some(PowerState::Off)
            }
            Poll::Malformed(fields) => {
                log::warn!(
                    "Unexpected response from {} ({} fields)",
                    self.device_name,
                    fields.len()
                );
                self.silent_device_is_off.then_some(PowerState::Off)
            }
        }
    }

    fn record_metrics(&mut self, state: PowerState) -> bool {
        let Some(metrics) = self.metrics.as_mut() else {
            return false;
        };
        match metrics.record(state) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }

    fn send_alert(&mut self, state: PowerState) -> bool {
        let Some(alert) = self.alert.as_mut() else {
            log::warn!("{} is now {}, no alert command configured", self.device_name, state);
            return false;
        };
        match alert.alert(&self.device_name, state) {
            Ok(()) => true,
            Err(err) => {
                log::error!("{}", err);
                false
            }
        }
    }
}
