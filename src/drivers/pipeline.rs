use std::collections::HashMap;
use std::time::Instant;
use chrono::Local;
use crate::config::SessionConfig;
use crate::drivers::{
    AcquisitionError, CalibrationCurve, CalibrationEngine, CalibrationPoint, CalibrationState,
    ChannelSource, DisplayFrame, LineParser, PortOpener, RecordingRow, RowAssembler, SeriesSet,
    SyntheticGenerator,
};
use crate::types::{RecordingState, SensorId};
/// Receives the windowed series on every display refresh.
pub trait DisplaySink {
    fn refresh(&mut self, frame: DisplayFrame);
}
impl DisplaySink for Vec<DisplayFrame> {
    fn refresh(&mut self, frame: DisplayFrame) {
        self.push(frame);
    }
}
/// What happened during one tick, for the host to report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Slots whose source failed and was closed this tick.
    pub closed: Vec<usize>,
}
struct PortSlot {
    port: Option<String>,
    source: Option<ChannelSource>,
    enabled: Vec<bool>,
}
impl PortSlot {
    fn empty(channels: usize) -> Self {
        Self {
            port: None,
            source: None,
            enabled: vec![false; channels],
        }
    }
}
/// Session context: every per-sensor map lives here, keyed by [`SensorId`].
///
/// All mutation goes through `&mut self`, so ticks and user commands are
/// serialized by whoever owns the session.
pub struct AcquisitionSession {
    config: SessionConfig,
    opener: Box<dyn PortOpener>,
    parser: LineParser,
    slots: Vec<PortSlot>,
    series: SeriesSet,
    calibration: CalibrationEngine,
    synth: SyntheticGenerator,
    assembler: RowAssembler,
    recorded: Vec<RecordingRow>,
    recording: RecordingState,
    display_start: Option<Instant>,
    recording_start: Option<Instant>,
    // raw reading of the current tick; absent once a sensor stops delivering
    last_raw: HashMap<SensorId, f64>,
    refresh_counter: usize,
    test_mode: bool,
}
impl AcquisitionSession {
    pub fn new(config: SessionConfig, opener: Box<dyn PortOpener>) -> Result<Self, AcquisitionError> {
        config.validate()?;
        let channels = config.channel_count_per_port;
        Ok(Self {
            parser: LineParser::new(channels),
            slots: (0..config.port_count).map(|_| PortSlot::empty(channels)).collect(),
            series: SeriesSet::new(config.ring_capacity),
            calibration: CalibrationEngine::new(config.zero_mode),
            synth: SyntheticGenerator::new(config.port_count, channels, config.test_seed),
            assembler: RowAssembler::new(config.port_count, channels, config.value_decimals),
            recorded: Vec::new(),
            recording: RecordingState::Idle,
            display_start: None,
            recording_start: None,
            last_raw: HashMap::new(),
            refresh_counter: 0,
            test_mode: config.test_mode,
            opener,
            config,
        })
    }
    pub fn available_ports(&self) -> Vec<String> {
        self.opener.available_ports()
    }
    pub fn set_test_mode(&mut self, on: bool) {
        self.test_mode = on;
    }
    pub fn recording_state(&self) -> RecordingState {
        self.recording
    }
    pub fn columns(&self) -> Vec<String> {
        self.config.csv_columns()
    }
    pub fn rows(&self) -> &[RecordingRow] {
        &self.recorded
    }
    #[cfg(test)]
    pub fn series(&self) -> &SeriesSet {
        &self.series
    }
    #[cfg(test)]
    pub fn slot_port(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.port.as_deref())
    }
    pub fn is_source_open(&self, slot: usize) -> bool {
        self.slots.get(slot).map(|s| s.source.is_some()).unwrap_or(false)
    }
    pub fn sensor_id(&self, slot: usize, channel: usize) -> Result<SensorId, AcquisitionError> {
        let s = self.slots.get(slot).ok_or(AcquisitionError::UnknownSlot {
            slot,
            count: self.slots.len(),
        })?;
        if channel >= self.config.channel_count_per_port {
            return Err(AcquisitionError::ChannelOutOfRange {
                channel,
                count: self.config.channel_count_per_port,
            });
        }
        let port = s.port.as_ref().ok_or(AcquisitionError::SlotInactive(slot))?;
        Ok(SensorId::new(port.clone(), channel))
    }
    fn slot_mut(&mut self, slot: usize) -> Result<&mut PortSlot, AcquisitionError> {
        let count = self.slots.len();
        self.slots
            .get_mut(slot)
            .ok_or(AcquisitionError::UnknownSlot { slot, count })
    }
    fn open_source(&mut self, port: &str) -> Result<ChannelSource, AcquisitionError> {
        let transport = self.opener.open(port, self.config.baud_rate)?;
        Ok(ChannelSource::open(
            port,
            transport,
            self.config.channel_count_per_port,
            self.config.readiness_message.as_bytes(),
            self.config.read_chunk_bytes,
            self.config.max_lines_per_tick,
        ))
    }
    /// Opens `port` on `slot`. In test mode a port that fails to open is still
    /// activated so its channels can run on synthetic data.
    pub fn activate_port(&mut self, slot: usize, port: &str) -> Result<(), AcquisitionError> {
        self.slot_mut(slot)?;
        if port.is_empty() {
            return Err(AcquisitionError::PortOpen {
                port: port.to_string(),
                reason: "no port selected".into(),
            });
        }
        if let Some(other) = self
            .slots
            .iter()
            .position(|s| s.port.as_deref() == Some(port))
        {
            if other == slot {
                return Ok(());
            }
            return Err(AcquisitionError::PortOpen {
                port: port.to_string(),
                reason: format!("already active in slot {}", other + 1),
            });
        }
        // the previous port stays untouched until the new one is open
        let source = match self.open_source(port) {
            Ok(source) => Some(source),
            Err(e) if self.test_mode => {
                log::warn!("{e}; running slot {} on synthetic data", slot + 1);
                None
            }
            Err(e) => return Err(e),
        };
        if self.slots[slot].port.is_some() {
            self.deactivate_port(slot)?;
        }
        let s = self.slot_mut(slot)?;
        s.port = Some(port.to_string());
        s.source = source;
        log::info!("slot {} activated on {port}", slot + 1);
        Ok(())
    }
    /// Closes the slot's source and drops everything keyed by its sensors.
    pub fn deactivate_port(&mut self, slot: usize) -> Result<(), AcquisitionError> {
        let channels = self.config.channel_count_per_port;
        let s = self.slot_mut(slot)?;
        let Some(port) = s.port.take() else {
            return Ok(());
        };
        if let Some(source) = s.source.take() {
            source.close();
        }
        s.enabled = vec![false; channels];
        for channel in 0..channels {
            let id = SensorId::new(port.clone(), channel);
            self.series.remove(&id);
            self.last_raw.remove(&id);
        }
        self.calibration.forget_port(&port);
        log::info!("slot {} ({port}) deactivated", slot + 1);
        Ok(())
    }
    /// Reopens a slot whose source was closed by a transport failure.
    pub fn reopen_port(&mut self, slot: usize) -> Result<(), AcquisitionError> {
        let s = self.slot_mut(slot)?;
        if s.source.is_some() {
            return Ok(());
        }
        let port = s.port.clone().ok_or(AcquisitionError::SlotInactive(slot))?;
        let source = self.open_source(&port)?;
        self.slot_mut(slot)?.source = Some(source);
        log::info!("slot {} reopened on {port}", slot + 1);
        Ok(())
    }
    /// Enables or disables one channel. Returns the sensor it refers to.
    pub fn set_channel(
        &mut self,
        slot: usize,
        channel: usize,
        enabled: bool,
    ) -> Result<SensorId, AcquisitionError> {
        let id = self.sensor_id(slot, channel)?;
        self.slots[slot].enabled[channel] = enabled;
        if enabled {
            self.series.ensure(&id);
        } else {
            self.series.remove(&id);
            self.last_raw.remove(&id);
        }
        Ok(id)
    }
    #[cfg(test)]
    pub fn is_enabled(&self, slot: usize, channel: usize) -> bool {
        self.slots
            .get(slot)
            .and_then(|s| s.enabled.get(channel))
            .copied()
            .unwrap_or(false)
    }
    pub fn calibration_state(&self, id: &SensorId) -> CalibrationState {
        self.calibration.state(id)
    }
    pub fn calibration_curve(&self, id: &SensorId) -> Option<CalibrationCurve> {
        self.calibration.curve(id)
    }
    /// Pairs `reference` with the sensor's current raw reading.
    pub fn capture_point(
        &mut self,
        slot: usize,
        channel: usize,
        point: usize,
        reference: &str,
    ) -> Result<CalibrationPoint, AcquisitionError> {
        let id = self.sensor_id(slot, channel)?;
        let measured = self.last_raw.get(&id).copied();
        let captured = self.calibration.capture_point(&id, point, reference, measured)?;
        log::info!(
            "{id}: point {point} = (ref {}, measured {})",
            captured.reference,
            captured.measured
        );
        Ok(captured)
    }
    pub fn confirm_calibration(
        &mut self,
        slot: usize,
        channel: usize,
    ) -> Result<CalibrationCurve, AcquisitionError> {
        let id = self.sensor_id(slot, channel)?;
        let curve = self.calibration.confirm(&id)?;
        log::info!("{id}: calibrated, slope {} intercept {}", curve.slope, curve.intercept);
        Ok(curve)
    }
    /// Captures the sensor's current reading, under the current curve, as its zero offset.
    pub fn zero_sensor(&mut self, slot: usize, channel: usize) -> Result<f64, AcquisitionError> {
        let id = self.sensor_id(slot, channel)?;
        let reading = self
            .last_raw
            .get(&id)
            .map(|raw| self.calibration.calibrate(&id, *raw));
        let offset = self.calibration.capture_zero(&id, reading)?;
        log::info!("{id}: zero offset now {offset}");
        Ok(offset)
    }
    /// Starts a fresh take; rows of the previous take are discarded.
    pub fn start_recording(&mut self, now: Instant) {
        if !self.recorded.is_empty() {
            log::warn!("discarding {} rows of the previous recording", self.recorded.len());
        }
        self.recorded.clear();
        self.display_start.get_or_insert(now);
        self.recording_start = Some(now);
        self.recording = RecordingState::Recording;
        log::info!("recording started");
    }
    pub fn toggle_pause(&mut self) -> RecordingState {
        self.recording = match self.recording {
            RecordingState::Recording => RecordingState::Paused,
            RecordingState::Paused => RecordingState::Recording,
            RecordingState::Idle => RecordingState::Idle,
        };
        self.recording
    }
    pub fn stop_recording(&mut self) {
        if self.recording != RecordingState::Idle {
            log::info!("recording stopped, {} rows", self.recorded.len());
        }
        self.recording = RecordingState::Idle;
        self.recording_start = None;
    }
    /// Empties the display rings; series of disabled sensors are removed entirely.
    pub fn clear_display(&mut self) {
        let enabled: Vec<SensorId> = self
            .slots
            .iter()
            .filter_map(|s| s.port.as_ref().map(|p| (p, &s.enabled)))
            .flat_map(|(port, enabled)| {
                enabled
                    .iter()
                    .enumerate()
                    .filter(|(_, on)| **on)
                    .map(move |(ch, _)| SensorId::new(port.clone(), ch))
            })
            .collect();
        self.series.clear(|id| enabled.contains(id));
        self.last_raw.clear();
    }
    /// One acquisition step. Never fails: broken sources are closed and reported.
    pub fn on_tick(&mut self, now: Instant, display: &mut dyn DisplaySink) -> TickReport {
        let mut report = TickReport::default();
        // 1. shared time axis
        let start = *self.display_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        self.series.push_time(elapsed);
        // 2. bounded drains
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let Some(source) = slot.source.as_mut() else {
                continue;
            };
            match source.drain(&self.parser) {
                Ok(stats) if stats.lines > 0 => {
                    log::trace!("slot {}: {} lines, updated {}", idx + 1, stats.lines, stats.updated)
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("{e}; closing slot {}", idx + 1);
                    if let Some(source) = slot.source.take() {
                        source.close();
                    }
                    report.closed.push(idx);
                }
            }
        }
        // 3. per-sensor values
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(port) = slot.port.as_ref() else {
                continue;
            };
            for (channel, _) in slot.enabled.iter().enumerate().filter(|(_, on)| **on) {
                let id = SensorId::new(port.clone(), channel);
                let live = slot.source.as_ref().and_then(|s| s.latest_value(channel));
                let raw = match live {
                    Some(v) => Some(v),
                    None if self.test_mode => Some(self.synth.sample(idx, channel, elapsed)),
                    None => None,
                };
                match raw {
                    Some(raw) => {
                        self.last_raw.insert(id.clone(), raw);
                    }
                    None => {
                        self.last_raw.remove(&id);
                    }
                }
                let value = raw.map(|raw| self.calibration.apply(&id, raw));
                self.series.append(&id, value);
            }
        }
        // 4. recording row
        if self.recording == RecordingState::Recording {
            let rec_start = *self.recording_start.get_or_insert(now);
            let rec_elapsed = now.saturating_duration_since(rec_start).as_secs_f64();
            let slots = &self.slots;
            let series = &self.series;
            let row = self.assembler.assemble(rec_elapsed, Local::now(), |slot, channel| {
                let s = slots.get(slot)?;
                if !s.enabled.get(channel).copied().unwrap_or(false) {
                    return None;
                }
                let port = s.port.as_ref()?;
                series.get(&SensorId::new(port.clone(), channel))?.latest()
            });
            self.recorded.push(row);
        }
        // 5. decimated display refresh
        self.refresh_counter += 1;
        if self.refresh_counter >= self.config.display_decimation {
            self.refresh_counter = 0;
            display.refresh(self.series.frame());
        }
        report
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::transport::ManualTransport;
    use crate::drivers::{ManualOpener, ZeroMode};
    use std::time::Duration;
    fn config(ring: usize) -> SessionConfig {
        SessionConfig {
            channel_count_per_port: 3,
            port_count: 2,
            ring_capacity: ring,
            display_decimation: 1000,
            ..SessionConfig::default()
        }
    }
    fn session_with_ports(
        config: SessionConfig,
        ports: &[&str],
    ) -> (AcquisitionSession, Vec<ManualTransport>) {
        let mut opener = ManualOpener::new();
        let handles = ports.iter().map(|p| opener.add_port(p)).collect();
        let session = AcquisitionSession::new(config, Box::new(opener)).unwrap();
        (session, handles)
    }
    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }
    #[test]
    fn activation_sends_readiness_once() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.activate_port(0, "COM1").unwrap();
        assert_eq!(handles[0].written(), b"ready\n".to_vec());
        assert!(session.is_source_open(0));
        assert!(matches!(
            session.activate_port(1, "COM1"),
            Err(AcquisitionError::PortOpen { .. })
        ));
    }
    #[test]
    fn unknown_port_fails_unless_test_mode() {
        let (mut session, _) = session_with_ports(config(10), &[]);
        assert!(session.activate_port(0, "COM9").is_err());
        assert_eq!(session.slot_port(0), None);
        session.set_test_mode(true);
        session.activate_port(0, "COM9").unwrap();
        assert_eq!(session.slot_port(0), Some("COM9"));
        assert!(!session.is_source_open(0));
        assert!(matches!(
            session.activate_port(5, "COM3"),
            Err(AcquisitionError::UnknownSlot { slot: 5, count: 2 })
        ));
    }
    #[test]
    fn channels_need_an_active_slot() {
        let (mut session, _) = session_with_ports(config(10), &["COM1"]);
        assert!(matches!(
            session.set_channel(0, 0, true),
            Err(AcquisitionError::SlotInactive(0))
        ));
        session.activate_port(0, "COM1").unwrap();
        assert!(matches!(
            session.set_channel(0, 3, true),
            Err(AcquisitionError::ChannelOutOfRange { channel: 3, count: 3 })
        ));
        let id = session.set_channel(0, 2, true).unwrap();
        assert_eq!(id.to_string(), "COM1_ch3");
        assert!(session.series().contains(&id));
    }
    #[test]
    fn absent_value_appends_gap_and_empty_cell() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        session.set_channel(0, 1, true).unwrap();
        let base = Instant::now();
        session.start_recording(base);
        let mut frames = Vec::new();
        handles[0].push(b"garbage\n4.5\n");
        session.on_tick(at(base, 10), &mut frames);
        assert_eq!(session.rows().len(), 1);
        let ch0 = SensorId::new("COM1", 0);
        let ch1 = SensorId::new("COM1", 1);
        assert_eq!(session.series().get(&ch0).unwrap().latest(), Some(4.5));
        assert_eq!(session.series().get(&ch1).unwrap().len(), 1);
        assert_eq!(session.series().get(&ch1).unwrap().latest(), None);
        let row = &session.rows()[0];
        assert_eq!(row.values.len(), 6);
        assert_eq!(row.values[0], Some(4.5));
        assert_eq!(row.values[1], None);
        assert_eq!(row.to_fields()[3], "");
    }
    #[test]
    fn synthetic_run_evicts_oldest_samples() {
        let capacity = 20;
        let (mut session, _) = session_with_ports(config(capacity), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        session.set_channel(0, 1, true).unwrap();
        session.set_test_mode(true);
        let base = Instant::now();
        let mut frames = Vec::new();
        for i in 0..(capacity + 50) as u64 {
            session.on_tick(at(base, i * 10), &mut frames);
        }
        // same seed and call order as the session's own generator
        let cfg = config(capacity);
        let mut synth =
            SyntheticGenerator::new(cfg.port_count, cfg.channel_count_per_port, cfg.test_seed);
        let mut expected = vec![Vec::new(), Vec::new()];
        for i in 0..(capacity + 50) as u64 {
            let t = Duration::from_millis(i * 10).as_secs_f64();
            for (channel, samples) in expected.iter_mut().enumerate() {
                samples.push(Some(synth.sample(0, channel, t)));
            }
        }
        for channel in 0..2 {
            let id = SensorId::new("COM1", channel);
            let ring = session.series().get(&id).unwrap();
            assert_eq!(ring.len(), capacity);
            let kept: Vec<Option<f64>> = ring.iter().copied().collect();
            assert_eq!(kept, expected[channel][50..]);
            let window = session.series().window(&id).unwrap();
            assert!((window.times[0] - 0.5).abs() < 1e-9);
            assert!((window.times[capacity - 1] - 0.69).abs() < 1e-9);
        }
    }
    #[test]
    fn failed_switch_keeps_the_previous_port() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1", "COM2"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let id = SensorId::new("COM1", 0);
        let base = Instant::now();
        let mut frames = Vec::new();
        handles[0].push(b"4\n");
        session.on_tick(at(base, 0), &mut frames);
        session.capture_point(0, 0, 1, "1").unwrap();
        assert!(matches!(
            session.activate_port(0, "COM9"),
            Err(AcquisitionError::PortOpen { .. })
        ));
        assert_eq!(session.slot_port(0), Some("COM1"));
        assert!(session.is_source_open(0));
        assert!(!handles[0].is_closed());
        assert!(session.is_enabled(0, 0));
        assert_eq!(session.calibration_state(&id), CalibrationState::PointsPartial);
        session.activate_port(0, "COM2").unwrap();
        assert!(handles[0].is_closed());
        assert_eq!(session.slot_port(0), Some("COM2"));
        assert!(!session.is_enabled(0, 0));
        assert_eq!(session.calibration_state(&id), CalibrationState::Uncalibrated);
    }
    #[test]
    fn captures_need_a_current_reading() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let id = SensorId::new("COM1", 0);
        let base = Instant::now();
        let mut frames = Vec::new();
        handles[0].push(b"7\n");
        session.on_tick(at(base, 0), &mut frames);
        session.clear_display();
        assert!(matches!(
            session.capture_point(0, 0, 1, "0"),
            Err(AcquisitionError::NoLiveValue(_))
        ));
        assert!(matches!(session.zero_sensor(0, 0), Err(AcquisitionError::NoLiveValue(_))));
        // the board's last line is still its current value on the next tick
        session.on_tick(at(base, 10), &mut frames);
        assert_eq!(session.capture_point(0, 0, 1, "0").unwrap().measured, 7.0);
        handles[0].fail_reads(true);
        session.on_tick(at(base, 20), &mut frames);
        session.on_tick(at(base, 30), &mut frames);
        assert_eq!(session.series().get(&id).unwrap().latest(), None);
        assert!(matches!(
            session.capture_point(0, 0, 2, "5"),
            Err(AcquisitionError::NoLiveValue(_))
        ));
        assert!(matches!(session.zero_sensor(0, 0), Err(AcquisitionError::NoLiveValue(_))));
        assert_eq!(session.calibration.zero_offset(&id), 0.0);
    }
    #[test]
    fn zero_right_after_confirm_uses_the_new_curve() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let id = SensorId::new("COM1", 0);
        let base = Instant::now();
        let mut frames = Vec::new();
        handles[0].push(b"1\n");
        session.on_tick(at(base, 0), &mut frames);
        session.capture_point(0, 0, 1, "0").unwrap();
        handles[0].push(b"21\n");
        session.on_tick(at(base, 10), &mut frames);
        session.capture_point(0, 0, 2, "10").unwrap();
        session.confirm_calibration(0, 0).unwrap();
        assert_eq!(session.zero_sensor(0, 0).unwrap(), 10.0);
        session.on_tick(at(base, 20), &mut frames);
        assert_eq!(session.series().get(&id).unwrap().latest(), Some(0.0));
    }
    #[test]
    fn failing_source_does_not_stall_the_others() {
        let (mut session, handles) = session_with_ports(config(50), &["COM1", "COM2"]);
        session.activate_port(0, "COM1").unwrap();
        session.activate_port(1, "COM2").unwrap();
        session.set_channel(0, 0, true).unwrap();
        session.set_channel(1, 0, true).unwrap();
        let base = Instant::now();
        let mut frames = Vec::new();
        handles[0].push(b"1\n");
        handles[1].push(b"2\n");
        session.on_tick(at(base, 0), &mut frames);
        handles[0].fail_reads(true);
        handles[1].push(b"3\n");
        let report = session.on_tick(at(base, 10), &mut frames);
        assert_eq!(report.closed, vec![0]);
        assert!(!session.is_source_open(0));
        assert!(handles[0].is_closed());
        handles[1].push(b"4\n");
        session.on_tick(at(base, 20), &mut frames);
        let bad = session.series().get(&SensorId::new("COM1", 0)).unwrap();
        let good = session.series().get(&SensorId::new("COM2", 0)).unwrap();
        assert_eq!(good.len(), 3);
        assert_eq!(good.latest(), Some(4.0));
        assert_eq!(bad.len(), 3);
        assert_eq!(bad.latest(), None);
        handles[0].fail_reads(false);
        session.reopen_port(0).unwrap();
        assert!(session.is_source_open(0));
    }
    #[test]
    fn calibration_and_zero_apply_to_live_values() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let id = SensorId::new("COM1", 0);
        let base = Instant::now();
        let mut frames = Vec::new();
        assert!(matches!(
            session.capture_point(0, 0, 1, "0"),
            Err(AcquisitionError::NoLiveValue(_))
        ));
        handles[0].push(b"1\n");
        session.on_tick(at(base, 0), &mut frames);
        session.capture_point(0, 0, 1, "0").unwrap();
        assert!(session.confirm_calibration(0, 0).is_err());
        assert_eq!(session.calibration_state(&id), CalibrationState::PointsPartial);
        handles[0].push(b"21\n");
        session.on_tick(at(base, 10), &mut frames);
        session.capture_point(0, 0, 2, "10").unwrap();
        session.confirm_calibration(0, 0).unwrap();
        assert_eq!(session.calibration_state(&id), CalibrationState::Calibrated);
        handles[0].push(b"11\n");
        session.on_tick(at(base, 20), &mut frames);
        assert_eq!(session.series().get(&id).unwrap().latest(), Some(5.0));
        assert_eq!(session.zero_sensor(0, 0).unwrap(), 5.0);
        session.on_tick(at(base, 30), &mut frames);
        assert_eq!(session.series().get(&id).unwrap().latest(), Some(0.0));
    }
    #[test]
    fn compose_mode_zero_drifts_with_repeated_captures() {
        let cfg = SessionConfig {
            zero_mode: ZeroMode::Compose,
            ..config(10)
        };
        let (mut session, handles) = session_with_ports(cfg, &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let mut frames = Vec::new();
        let base = Instant::now();
        handles[0].push(b"2\n");
        session.on_tick(at(base, 0), &mut frames);
        session.zero_sensor(0, 0).unwrap();
        handles[0].push(b"3\n");
        session.on_tick(at(base, 10), &mut frames);
        assert_eq!(session.zero_sensor(0, 0).unwrap(), 5.0);
    }
    #[test]
    fn curve_survives_toggle_but_not_deactivation() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let id = SensorId::new("COM1", 0);
        let mut frames = Vec::new();
        let base = Instant::now();
        handles[0].push(b"1\n");
        session.on_tick(at(base, 0), &mut frames);
        session.capture_point(0, 0, 1, "1").unwrap();
        session.capture_point(0, 0, 2, "3").unwrap();
        session.confirm_calibration(0, 0).unwrap();
        session.set_channel(0, 0, false).unwrap();
        assert!(!session.series().contains(&id));
        session.set_channel(0, 0, true).unwrap();
        assert_eq!(session.calibration_state(&id), CalibrationState::Calibrated);
        session.deactivate_port(0).unwrap();
        assert!(handles[0].is_closed());
        assert!(!session.series().contains(&id));
        assert_eq!(session.calibration_state(&id), CalibrationState::Uncalibrated);
        assert!(!session.is_enabled(0, 0));
    }
    #[test]
    fn recording_clock_is_separate_from_display_clock() {
        let (mut session, handles) = session_with_ports(config(10), &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let base = Instant::now();
        let mut frames = Vec::new();
        session.on_tick(at(base, 0), &mut frames);
        session.start_recording(at(base, 1000));
        handles[0].push(b"7\n");
        session.on_tick(at(base, 1500), &mut frames);
        assert_eq!(session.rows()[0].elapsed, 0.5);
        assert_eq!(session.series().latest_time(), Some(1.5));
        assert_eq!(session.toggle_pause(), RecordingState::Paused);
        session.on_tick(at(base, 1600), &mut frames);
        assert_eq!(session.rows().len(), 1);
        assert_eq!(session.toggle_pause(), RecordingState::Recording);
        session.on_tick(at(base, 2000), &mut frames);
        assert_eq!(session.rows().len(), 2);
        assert_eq!(session.rows()[1].elapsed, 1.0);
        session.stop_recording();
        session.on_tick(at(base, 2100), &mut frames);
        assert_eq!(session.rows().len(), 2);
        assert_eq!(session.series().time_len(), 5);
        assert_eq!(session.toggle_pause(), RecordingState::Idle);
    }
    #[test]
    fn display_refresh_is_decimated() {
        let cfg = SessionConfig {
            display_decimation: 3,
            ..config(10)
        };
        let (mut session, handles) = session_with_ports(cfg, &["COM1"]);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 1, true).unwrap();
        let base = Instant::now();
        let mut frames = Vec::new();
        for i in 0..7 {
            handles[0].push(format!("0,{i}\n").as_bytes());
            session.on_tick(at(base, i * 10), &mut frames);
        }
        assert_eq!(frames.len(), 2);
        let last = &frames[1];
        assert_eq!(last.labels, vec!["COM1_ch2".to_string()]);
        let window = &last.series[&SensorId::new("COM1", 1)];
        assert_eq!(window.times.len(), 6);
        assert_eq!(window.values.last(), Some(&Some(5.0)));
    }
    #[test]
    fn clear_empties_enabled_series_only() {
        let (mut session, _) = session_with_ports(config(10), &["COM1"]);
        session.set_test_mode(true);
        session.activate_port(0, "COM1").unwrap();
        session.set_channel(0, 0, true).unwrap();
        let base = Instant::now();
        let mut frames = Vec::new();
        session.on_tick(at(base, 0), &mut frames);
        session.clear_display();
        let id = SensorId::new("COM1", 0);
        assert!(session.series().get(&id).unwrap().is_empty());
        assert_eq!(session.series().time_len(), 0);
        session.on_tick(at(base, 10), &mut frames);
        assert_eq!(session.series().get(&id).unwrap().len(), 1);
    }
}
