use chrono::{DateTime, Local};
/// One recorded tick, aligned to the fixed column schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingRow {
    pub elapsed: f64,
    pub wall_clock: String,
    /// One cell per possible slot x channel; `None` is written as an empty cell.
    pub values: Vec<Option<f64>>,
}
impl RecordingRow {
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.values.len() + 2);
        fields.push(format_number(self.elapsed));
        fields.push(self.wall_clock.clone());
        fields.extend(
            self.values
                .iter()
                .map(|v| v.map(format_number).unwrap_or_default()),
        );
        fields
    }
}
fn format_number(v: f64) -> String {
    // rounded values print without float noise this way
    format!("{v}")
}
/// Builds sparse rows over the full slot x channel cross product.
#[derive(Clone, Debug)]
pub struct RowAssembler {
    port_count: usize,
    channel_count: usize,
    decimals: u32,
}
impl RowAssembler {
    pub fn new(port_count: usize, channel_count: usize, decimals: u32) -> Self {
        Self {
            port_count,
            channel_count,
            decimals,
        }
    }
    pub fn width(&self) -> usize {
        self.port_count * self.channel_count
    }
    /// `latest(slot, channel)` yields the value for enabled sensors and `None`
    /// for disabled or empty ones. Non-finite values become empty cells.
    pub fn assemble(
        &self,
        elapsed: f64,
        wall_clock: DateTime<Local>,
        mut latest: impl FnMut(usize, usize) -> Option<f64>,
    ) -> RecordingRow {
        let mut values = Vec::with_capacity(self.width());
        for slot in 0..self.port_count {
            for channel in 0..self.channel_count {
                let cell = latest(slot, channel)
                    .filter(|v| v.is_finite())
                    .map(|v| round_to(v, self.decimals));
                values.push(cell);
            }
        }
        RecordingRow {
            elapsed: round_to(elapsed, self.decimals),
            wall_clock: wall_clock.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            values,
        }
    }
}
pub fn round_to(v: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    // + 0.0 folds -0.0 into 0.0
    (v * scale).round() / scale + 0.0
}
