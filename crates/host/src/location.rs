//! Host location providers
//!
//! `gpsd` speaks the daemon's JSON protocol over TCP and reconnects with a
//! backoff when the daemon goes away; `fixed` replays configured
//! coordinates. Both post [`LocationEvent`]s onto the screen channel and stop
//! on `remove_updates`.

use crate::error::HostError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sos_beacon::{
    EventSender, LocationEvent, LocationProvider, LocationRequest, ProviderStatus, ScreenEvent,
};
use sos_core::config::{LocationConfig, LocationSource};
use sos_geo::{Coordinate, LocationFix};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Enables JSON reports on a gpsd connection
const WATCH: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Provider for the configured `[location]` source
#[must_use]
pub fn provider_from_config(config: &LocationConfig) -> Box<dyn LocationProvider> {
    match (config.source, config.latitude, config.longitude) {
        (LocationSource::Fixed, Some(lat), Some(lng)) => {
            Box::new(FixedProvider::new(Coordinate::new(lat, lng)))
        }
        (LocationSource::Fixed, ..) => {
            warn!("Fixed location source without coordinates, falling back to gpsd");
            Box::new(gpsd_from_config(config))
        }
        (LocationSource::Gpsd, ..) => Box::new(gpsd_from_config(config)),
    }
}

fn gpsd_from_config(config: &LocationConfig) -> GpsdProvider {
    GpsdProvider::new(&config.gpsd_host, config.gpsd_port)
        .with_reconnect_limit(config.gpsd_reconnect_limit)
}

/// One decoded gpsd report, as far as the beacon cares
#[derive(Debug, Clone, PartialEq)]
pub enum GpsdReport {
    /// A 2D or 3D fix
    Fix(LocationFix),
    /// A TPV without a usable fix
    NoFix,
    /// The device list; zero means no receiver is attached
    Devices(usize),
    /// Anything else (VERSION, WATCH, SKY, ...)
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum Message {
    #[serde(rename = "TPV")]
    Tpv(Tpv),
    #[serde(rename = "DEVICES")]
    Devices(Devices),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Tpv {
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Devices {
    #[serde(default)]
    devices: Vec<serde_json::Value>,
}

/// Decode one line of gpsd output
pub fn parse_report(line: &str) -> Result<GpsdReport, HostError> {
    let report = match serde_json::from_str::<Message>(line)? {
        Message::Tpv(Tpv {
            mode,
            lat: Some(lat),
            lon: Some(lon),
            time,
        }) if mode >= 2 => {
            let captured_at = time.unwrap_or_else(Utc::now);
            match LocationFix::new(Coordinate::new(lat, lon), captured_at) {
                Ok(fix) => GpsdReport::Fix(fix),
                Err(e) => {
                    warn!(error = %e, "gpsd reported coordinates out of range");
                    GpsdReport::NoFix
                }
            }
        }
        Message::Tpv(_) => GpsdReport::NoFix,
        Message::Devices(d) => GpsdReport::Devices(d.devices.len()),
        Message::Other => GpsdReport::Other,
    };
    Ok(report)
}

/// Delay between reconnect attempts, doubling up to a ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// First delay after a connection ends
    pub initial: Duration,
    /// Longest delay
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: INITIAL_BACKOFF,
            max: MAX_BACKOFF,
        }
    }
}

/// Reads fixes from a gpsd daemon.
///
/// A registration outlives the daemon: when the connection fails or drops
/// the provider posts `ProviderDisabled` once and keeps reconnecting. With a
/// reconnect limit it gives up after that many consecutive failures and
/// posts `RegistrationEnded`.
#[derive(Debug)]
pub struct GpsdProvider {
    addr: String,
    backoff: Backoff,
    reconnect_limit: Option<u32>,
    task: Option<JoinHandle<()>>,
}

impl GpsdProvider {
    /// Provider for the daemon at `host:port`, retrying forever
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            backoff: Backoff::default(),
            reconnect_limit: None,
            task: None,
        }
    }

    /// Reconnect delays
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Consecutive failed connects tolerated before the registration ends
    #[must_use]
    pub fn with_reconnect_limit(mut self, limit: Option<u32>) -> Self {
        self.reconnect_limit = limit;
        self
    }

    /// `host:port` of the daemon
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl LocationProvider for GpsdProvider {
    fn request_updates(
        &mut self,
        request: &LocationRequest,
        events: EventSender,
    ) -> sos_beacon::Result<()> {
        let runtime = Handle::try_current().map_err(|_| HostError::NoRuntime)?;
        self.remove_updates();

        info!(addr = %self.addr, provider = %request.provider, "Watching gpsd");
        let session = Session {
            addr: self.addr.clone(),
            provider: request.provider.clone(),
            backoff: self.backoff,
            reconnect_limit: self.reconnect_limit,
            events,
            announced: None,
        };
        self.task = Some(runtime.spawn(session.run()));
        Ok(())
    }

    fn remove_updates(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(addr = %self.addr, "Stopping gpsd watch");
            task.abort();
        }
    }
}

impl Drop for GpsdProvider {
    fn drop(&mut self) {
        self.remove_updates();
    }
}

/// How one connection ended
enum Ended {
    /// The daemon closed the stream
    Eof,
    /// The screen stopped listening
    ListenerGone,
}

/// One registration's connect, stream, reconnect loop
struct Session {
    addr: String,
    provider: String,
    backoff: Backoff,
    reconnect_limit: Option<u32>,
    events: EventSender,
    /// Availability last posted, so repeats are not re-posted
    announced: Option<bool>,
}

impl Session {
    async fn run(mut self) {
        let mut delay = self.backoff.initial;
        let mut failures = 0u32;

        loop {
            match self.connect().await {
                Ok(lines) => {
                    delay = self.backoff.initial;
                    failures = 0;
                    match self.stream(lines).await {
                        Ok(Ended::ListenerGone) => return,
                        Ok(Ended::Eof) => info!(addr = %self.addr, "gpsd closed the connection"),
                        Err(e) => warn!(error = %e, "gpsd connection dropped"),
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "Cannot reach gpsd");
                }
            }

            if !self.announce(false) {
                return;
            }
            if self.reconnect_limit.is_some_and(|limit| failures > limit) {
                warn!(addr = %self.addr, failures, "Giving up on gpsd");
                self.post(LocationEvent::RegistrationEnded(self.provider.clone()));
                return;
            }

            debug!(delay_ms = delay.as_millis(), "Reconnecting to gpsd");
            sleep(delay).await;
            delay = (delay * 2).min(self.backoff.max);
        }
    }

    fn io_err(&self, source: io::Error) -> HostError {
        HostError::Gpsd {
            addr: self.addr.clone(),
            source,
        }
    }

    async fn connect(&self) -> Result<Lines<BufReader<TcpStream>>, HostError> {
        let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| self.io_err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")))?
            .map_err(|e| self.io_err(e))?;
        stream.write_all(WATCH).await.map_err(|e| self.io_err(e))?;

        Ok(BufReader::new(stream).lines())
    }

    /// Forward reports until the connection ends
    async fn stream(&mut self, mut lines: Lines<BufReader<TcpStream>>) -> Result<Ended, HostError> {
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(Ended::Eof),
                Err(e) => return Err(self.io_err(e)),
            };

            let report = match parse_report(&line) {
                Ok(report) => report,
                Err(e) => {
                    debug!(error = %e, "Skipping gpsd line");
                    continue;
                }
            };

            let delivered = match report {
                GpsdReport::Fix(fix) => self.post(LocationEvent::Fix(fix)),
                GpsdReport::Devices(n) => self.announce(n > 0),
                GpsdReport::NoFix => self.post(LocationEvent::StatusChanged {
                    provider: self.provider.clone(),
                    status: ProviderStatus::TemporarilyUnavailable,
                }),
                GpsdReport::Other => true,
            };
            if !delivered {
                return Ok(Ended::ListenerGone);
            }
        }
    }

    /// Post an availability change; repeats are dropped. Returns `false`
    /// once the screen is gone.
    fn announce(&mut self, available: bool) -> bool {
        if self.announced == Some(available) {
            return true;
        }
        self.announced = Some(available);
        let provider = self.provider.clone();
        self.post(if available {
            LocationEvent::ProviderEnabled(provider)
        } else {
            LocationEvent::ProviderDisabled(provider)
        })
    }

    fn post(&self, event: LocationEvent) -> bool {
        self.events.post(ScreenEvent::Location(event))
    }
}

/// Delivers the configured coordinates as the next fix
#[derive(Debug, Clone)]
pub struct FixedProvider {
    coordinate: Coordinate,
    registered: bool,
}

impl FixedProvider {
    /// Provider that always reports `coordinate`
    #[must_use]
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            registered: false,
        }
    }
}

impl LocationProvider for FixedProvider {
    fn request_updates(
        &mut self,
        request: &LocationRequest,
        events: EventSender,
    ) -> sos_beacon::Result<()> {
        let fix = LocationFix::new(self.coordinate, Utc::now())?;
        self.registered = true;
        debug!(provider = %request.provider, coordinate = %self.coordinate, "Fixed fix queued");
        events.post(ScreenEvent::Location(LocationEvent::Fix(fix)));
        Ok(())
    }

    fn remove_updates(&mut self) {
        self.registered = false;
    }
}
