use crate::drivers::{AcquisitionError, LineParser, Transport};
/// Upper bound on buffered bytes without a newline before the tail is parsed anyway.
const MAX_PARTIAL_LINE: usize = 4096;
/// Result of one bounded drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub lines: usize,
    pub updated: bool,
}
/// One open board connection: transport, read buffer and latest parsed vector.
pub struct ChannelSource {
    port: String,
    transport: Box<dyn Transport>,
    pending: Vec<u8>,
    latest: Vec<Option<f64>>,
    read_chunk: usize,
    max_lines: usize,
}
impl ChannelSource {
    /// Takes ownership of an opened transport and sends the readiness notification.
    pub fn open(
        port: &str,
        mut transport: Box<dyn Transport>,
        channel_count: usize,
        readiness: &[u8],
        read_chunk: usize,
        max_lines: usize,
    ) -> Self {
        if !readiness.is_empty() {
            if let Err(e) = transport.write(readiness) {
                log::debug!("{port}: readiness write ignored: {e}");
            }
        }
        Self {
            port: port.to_string(),
            transport,
            pending: Vec::with_capacity(read_chunk),
            latest: vec![None; channel_count],
            read_chunk: read_chunk.max(1),
            max_lines: max_lines.max(1),
        }
    }
    #[cfg(test)]
    pub fn latest(&self) -> &[Option<f64>] {
        &self.latest
    }
    pub fn latest_value(&self, channel: usize) -> Option<f64> {
        self.latest.get(channel).copied().flatten()
    }
    /// Non-blocking: reads at most one chunk and parses at most `max_lines` lines.
    ///
    /// Complete lines left over stay queued for the next tick. On a read error the
    /// caller must drop this source through [`ChannelSource::close`].
    pub fn drain(&mut self, parser: &LineParser) -> Result<DrainStats, AcquisitionError> {
        let mut chunk = vec![0u8; self.read_chunk];
        let n = self
            .transport
            .read_available(&mut chunk)
            .map_err(|source| AcquisitionError::Transport {
                port: self.port.clone(),
                source,
            })?;
        self.pending.extend_from_slice(&chunk[..n]);
        let mut stats = DrainStats::default();
        while stats.lines < self.max_lines {
            let Some(end) = self.pending.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            stats.lines += 1;
            stats.updated |= parser.apply_line(&line, &mut self.latest);
        }
        if stats.lines < self.max_lines && self.pending.len() > MAX_PARTIAL_LINE {
            // runaway line without terminator
            let line = std::mem::take(&mut self.pending);
            stats.lines += 1;
            stats.updated |= parser.apply_line(&line, &mut self.latest);
        }
        let backlog = self.pending.iter().filter(|&&b| b == b'\n').count();
        if backlog > self.max_lines * 4 {
            // flooding source: keep only the newest lines
            let keep_from = nth_newline_from_end(&self.pending, self.max_lines);
            log::debug!("{}: dropping {} backlog bytes", self.port, keep_from);
            self.pending.drain(..keep_from);
        }
        Ok(stats)
    }
    /// Closes the transport. The source is unusable afterwards.
    pub fn close(mut self) {
        self.transport.close();
        log::info!("{} closed", self.port);
    }
}
/// Offset just past the newline that precedes the last `keep` complete lines.
fn nth_newline_from_end(bytes: &[u8], keep: usize) -> usize {
    let mut seen = 0;
    for (idx, &b) in bytes.iter().enumerate().rev() {
        if b == b'\n' {
            seen += 1;
            if seen == keep + 1 {
                return idx + 1;
            }
        }
    }
    0
}
