use std::collections::{BTreeMap, VecDeque};
use crate::types::SensorId;
/// Aligned (time, value) window of one sensor, ready to plot.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesWindow {
    pub times: Vec<f64>,
    pub values: Vec<Option<f64>>,
}
/// What the display collaborator receives on each refresh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayFrame {
    pub series: BTreeMap<SensorId, SeriesWindow>,
    pub labels: Vec<String>,
}
impl DisplayFrame {
    pub fn is_empty(&self) -> bool {
        self.series.values().all(|w| w.times.is_empty())
    }
}
/// Fixed-capacity FIFO of one sensor's values. `None` marks a tick without data.
#[derive(Clone, Debug)]
pub struct RingSeries {
    values: VecDeque<Option<f64>>,
    capacity: usize,
}
impl RingSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    pub fn append(&mut self, value: Option<f64>) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }
    /// Most recent entry still held, `None` if empty or the last tick had no data.
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied().flatten()
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Option<f64>> {
        self.values.iter()
    }
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
/// Shared time ring plus one [`RingSeries`] per enabled sensor.
pub struct SeriesSet {
    time: RingSeries,
    series: BTreeMap<SensorId, RingSeries>,
    capacity: usize,
}
impl SeriesSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            time: RingSeries::new(capacity),
            series: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }
    pub fn push_time(&mut self, elapsed: f64) {
        self.time.append(Some(elapsed));
    }
    #[cfg(test)]
    pub fn latest_time(&self) -> Option<f64> {
        self.time.latest()
    }
    #[cfg(test)]
    pub fn time_len(&self) -> usize {
        self.time.len()
    }
    /// Creates the series if missing. Returns true when it was created.
    pub fn ensure(&mut self, id: &SensorId) -> bool {
        if self.series.contains_key(id) {
            return false;
        }
        self.series.insert(id.clone(), RingSeries::new(self.capacity));
        true
    }
    pub fn remove(&mut self, id: &SensorId) -> Option<RingSeries> {
        self.series.remove(id)
    }
    pub fn get(&self, id: &SensorId) -> Option<&RingSeries> {
        self.series.get(id)
    }
    pub fn append(&mut self, id: &SensorId, value: Option<f64>) {
        if let Some(series) = self.series.get_mut(id) {
            series.append(value);
        }
    }
    #[cfg(test)]
    pub fn contains(&self, id: &SensorId) -> bool {
        self.series.contains_key(id)
    }
    /// Empties the time ring and every kept series; drops series `keep` rejects.
    pub fn clear(&mut self, keep: impl Fn(&SensorId) -> bool) {
        self.time.clear();
        self.series.retain(|id, _| keep(id));
        for series in self.series.values_mut() {
            series.clear();
        }
    }
    /// Newest entries of `id` paired with the newest times, trimmed to the shorter ring.
    pub fn window(&self, id: &SensorId) -> Option<SeriesWindow> {
        let series = self.series.get(id)?;
        let len = series.len().min(self.time.len());
        let times = self
            .time
            .iter()
            .skip(self.time.len() - len)
            .map(|t| t.unwrap_or_default())
            .collect();
        let values = series.iter().skip(series.len() - len).copied().collect();
        Some(SeriesWindow { times, values })
    }
    pub fn frame(&self) -> DisplayFrame {
        let series: BTreeMap<SensorId, SeriesWindow> = self
            .series
            .keys()
            .filter_map(|id| self.window(id).map(|w| (id.clone(), w)))
            .collect();
        let labels = series.keys().map(|id| id.to_string()).collect();
        DisplayFrame { series, labels }
    }
}
