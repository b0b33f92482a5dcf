use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use crate::drivers::AcquisitionError;
/// Byte pipe to one sensor board.
pub trait Transport: Send {
    /// Copies whatever is already buffered into `buf`. Never blocks; `Ok(0)` means nothing pending.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn close(&mut self);
}
/// Opens transports by port identifier and lists the ones present.
pub trait PortOpener: Send {
    fn open(&mut self, port: &str, baud: u32) -> Result<Box<dyn Transport>, AcquisitionError>;
    fn available_ports(&self) -> Vec<String>;
}
/// `serialport`-backed transport.
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}
impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(port) = self.port.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        };
        let pending = port.bytes_to_read().map_err(io::Error::from)? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let want = pending.min(buf.len());
        port.read(&mut buf[..want])
    }
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.port.as_mut() {
            Some(port) => port.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "port closed")),
        }
    }
    fn close(&mut self) {
        // dropping the handle releases the OS port
        self.port = None;
    }
}
#[derive(Default)]
pub struct SerialOpener;
impl PortOpener for SerialOpener {
    fn open(&mut self, port: &str, baud: u32) -> Result<Box<dyn Transport>, AcquisitionError> {
        let handle = serialport::new(port, baud)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| AcquisitionError::PortOpen {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SerialTransport { port: Some(handle) }))
    }
    fn available_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                log::warn!("port enumeration failed: {e}");
                Vec::new()
            }
        }
    }
}
#[derive(Default)]
struct ManualState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    fail_reads: bool,
    fail_writes: bool,
    closed: bool,
    line_limit: Option<usize>,
}
/// In-memory transport for tests and playback. Clones share the same pipe.
#[derive(Clone, Default)]
pub struct ManualTransport {
    state: Arc<Mutex<ManualState>>,
}
impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&self, bytes: &[u8]) {
        if let Ok(mut s) = self.state.lock() {
            s.incoming.extend(bytes.iter().copied());
        }
    }
    /// Hands out at most `lines` complete lines per read, like a board printing in real time.
    pub fn pace_lines(&self, lines: usize) {
        if let Ok(mut s) = self.state.lock() {
            s.line_limit = Some(lines.max(1));
        }
    }
    #[cfg(test)]
    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_reads = fail;
        }
    }
    #[cfg(test)]
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_writes = fail;
        }
    }
    #[cfg(test)]
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().map(|s| s.written.clone()).unwrap_or_default()
    }
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.state.lock().map(|s| s.incoming.len()).unwrap_or(0)
    }
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}
impl Transport for ManualTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?;
        if s.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        if s.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut n = buf.len().min(s.incoming.len());
        if let Some(limit) = s.line_limit {
            let end = s
                .incoming
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .nth(limit - 1)
                .map(|(idx, _)| idx + 1);
            if let Some(end) = end {
                n = n.min(end);
            }
        }
        for (dst, src) in buf.iter_mut().zip(s.incoming.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?;
        if s.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write refused"));
        }
        s.written.extend_from_slice(bytes);
        Ok(())
    }
    fn close(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.closed = true;
        }
    }
}
/// Hands out pre-registered [`ManualTransport`]s by port name.
#[derive(Clone, Default)]
pub struct ManualOpener {
    ports: HashMap<String, ManualTransport>,
}
impl ManualOpener {
    pub fn new() -> Self {
        Self::default()
    }
    /// Registers `port` and returns the test-side handle to its pipe.
    pub fn add_port(&mut self, port: &str) -> ManualTransport {
        let transport = ManualTransport::new();
        self.ports.insert(port.to_string(), transport.clone());
        transport
    }
}
impl PortOpener for ManualOpener {
    fn open(&mut self, port: &str, _baud: u32) -> Result<Box<dyn Transport>, AcquisitionError> {
        let transport = self.ports.get(port).ok_or_else(|| AcquisitionError::PortOpen {
            port: port.to_string(),
            reason: "no such port".into(),
        })?;
        // reopening hands out a fresh pipe view of the same device
        if let Ok(mut s) = transport.state.lock() {
            s.closed = false;
        }
        Ok(Box::new(transport.clone()))
    }
    fn available_ports(&self) -> Vec<String> {
        let mut ports: Vec<String> = self.ports.keys().cloned().collect();
        ports.sort();
        ports
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn manual_transport_reads_only_what_is_pending() {
        let mut opener = ManualOpener::new();
        let handle = opener.add_port("COM7");
        let mut t = opener.open("COM7", 9600).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(t.read_available(&mut buf).unwrap(), 0);
        handle.push(b"1.5,2\n");
        assert_eq!(t.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"1.5,");
        assert_eq!(handle.pending(), 2);
    }
    #[test]
    fn paced_transport_hands_out_whole_lines() {
        let mut opener = ManualOpener::new();
        let handle = opener.add_port("REPLAY");
        handle.pace_lines(2);
        handle.push(b"1\n2\n3\n4");
        let mut t = opener.open("REPLAY", 9600).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(t.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"1\n2\n");
        assert_eq!(t.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"3\n4");
    }
    #[test]
    fn closed_or_failing_transport_reports_errors() {
        let mut opener = ManualOpener::new();
        let handle = opener.add_port("COM1");
        let mut t = opener.open("COM1", 9600).unwrap();
        handle.fail_reads(true);
        assert!(t.read_available(&mut [0u8; 8]).is_err());
        handle.fail_reads(false);
        t.close();
        assert!(handle.is_closed());
        assert!(t.read_available(&mut [0u8; 8]).is_err());
    }
    #[test]
    fn unknown_port_fails_to_open() {
        let mut opener = ManualOpener::new();
        opener.add_port("COM2");
        assert!(matches!(
            opener.open("COM9", 9600),
            Err(AcquisitionError::PortOpen { .. })
        ));
        assert_eq!(opener.available_ports(), vec!["COM2".to_string()]);
    }
}
