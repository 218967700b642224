use crate::types::{Metric, MetricKind};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use switchyard_core::{labels_match, Labels};

/// Filters for [`MetricStore::query`]. Empty collections and `None` mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct MetricQuery {
    pub names: Vec<String>,
    pub kinds: Vec<MetricKind>,
    pub labels: Labels,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Maximum samples returned per metric name.
    pub limit: Option<usize>,
}

impl MetricQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn of_kind(mut self, kind: MetricKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, metric: &Metric) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&metric.kind))
            && labels_match(&metric.labels, &self.labels)
            && self.start_time.map_or(true, |start| metric.timestamp >= start)
            && self.end_time.map_or(true, |end| metric.timestamp <= end)
    }
}

/// Per-name bounded metric history.
///
/// Every metric name owns an independent ring buffer of `capacity_per_name`
/// samples. A single coarse lock allows the aggregation loop to read while
/// request handlers append.
pub struct MetricStore {
    capacity_per_name: usize,
    series: RwLock<HashMap<String, VecDeque<Metric>>>,
}

impl MetricStore {
    pub fn new(capacity_per_name: usize) -> Self {
        Self {
            capacity_per_name,
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity_per_name(&self) -> usize {
        self.capacity_per_name
    }

    pub fn record(&self, metric: Metric) -> Metric {
        if self.capacity_per_name == 0 {
            return metric;
        }
        let mut series = self.series.write();
        let buffer = series.entry(metric.name.clone()).or_default();
        while buffer.len() >= self.capacity_per_name {
            buffer.pop_front();
        }
        buffer.push_back(metric.clone());
        metric
    }

    /// Filtered read grouped by metric name, newest first within each name.
    ///
    /// Names with no matching samples are omitted.
    pub fn query(&self, query: &MetricQuery) -> HashMap<String, Vec<Metric>> {
        let series = self.series.read();
        let names: Vec<&String> = if query.names.is_empty() {
            series.keys().collect()
        } else {
            query.names.iter().collect()
        };

        let mut result = HashMap::new();
        for name in names {
            let Some(buffer) = series.get(name) else {
                continue;
            };
            let mut samples: Vec<Metric> =
                buffer.iter().rev().filter(|m| query.matches(m)).cloned().collect();
            samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            if let Some(limit) = query.limit {
                samples.truncate(limit);
            }
            if !samples.is_empty() {
                result.insert(name.clone(), samples);
            }
        }
        result
    }

    /// Values of `name` with `timestamp` in `[start, end]` whose labels match `filter`.
    pub fn values_between(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: &Labels,
    ) -> Vec<f64> {
        let series = self.series.read();
        series
            .get(name)
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|m| m.timestamp >= start && m.timestamp <= end)
                    .filter(|m| labels_match(&m.labels, filter))
                    .map(|m| m.value)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.series.read().keys().cloned().collect()
    }

    /// Total number of samples across all names.
    pub fn total_samples(&self) -> usize {
        self.series.read().values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_per_name() {
        let store = MetricStore::new(2);
        for v in [1.0, 2.0, 3.0] {
            store.record(Metric::new("latency", MetricKind::Gauge, v));
        }
        store.record(Metric::new("errors", MetricKind::Counter, 1.0));

        let result = store.query(&MetricQuery::new());
        let latency: Vec<f64> = result["latency"].iter().map(|m| m.value).collect();
        assert_eq!(latency, vec![3.0, 2.0]);
        assert_eq!(result["errors"].len(), 1);
        assert_eq!(store.total_samples(), 3);
    }

    #[test]
    fn test_query_by_label_and_kind() {
        let store = MetricStore::new(10);
        store.record(Metric::new("response_time", MetricKind::Histogram, 0.5).with_label("agent_id", "a"));
        store.record(Metric::new("response_time", MetricKind::Histogram, 0.7).with_label("agent_id", "b"));
        store.record(Metric::new("response_time", MetricKind::Gauge, 0.9).with_label("agent_id", "a"));

        let only_a = store.query(&MetricQuery::new().with_label("agent_id", "a"));
        assert_eq!(only_a["response_time"].len(), 2);

        let histograms = store.query(
            &MetricQuery::new()
                .named("response_time")
                .of_kind(MetricKind::Histogram)
                .limit(1),
        );
        assert_eq!(histograms["response_time"].len(), 1);
        assert_eq!(histograms["response_time"][0].value, 0.7);
    }

    #[test]
    fn test_backfilled_sample_sorts_by_timestamp() {
        let store = MetricStore::new(10);
        let now = Utc::now();
        store.record(Metric::new("load", MetricKind::Gauge, 1.0).at(now));
        store.record(Metric::new("load", MetricKind::Gauge, 2.0).at(now - chrono::Duration::seconds(90)));

        let latest = store.query(&MetricQuery::new().named("load").limit(1));
        assert_eq!(latest["load"][0].value, 1.0);
        let all: Vec<f64> = store.query(&MetricQuery::new())["load"].iter().map(|m| m.value).collect();
        assert_eq!(all, vec![1.0, 2.0]);
    }

    #[test]
    fn test_unknown_names_are_omitted() {
        let store = MetricStore::new(10);
        store.record(Metric::new("known", MetricKind::Gauge, 1.0));
        let result = store.query(&MetricQuery::new().named("missing"));
        assert!(result.is_empty());
    }

    #[test]
    fn test_values_between_respects_window() {
        let store = MetricStore::new(10);
        let now = Utc::now();
        store.record(Metric::new("load", MetricKind::Gauge, 1.0).at(now - chrono::Duration::seconds(120)));
        store.record(Metric::new("load", MetricKind::Gauge, 2.0).at(now - chrono::Duration::seconds(30)));
        store.record(Metric::new("load", MetricKind::Gauge, 3.0).at(now));

        let values = store.values_between("load", now - chrono::Duration::seconds(60), now, &Labels::new());
        assert_eq!(values, vec![2.0, 3.0]);
        assert!(store
            .values_between("other", now - chrono::Duration::seconds(60), now, &Labels::new())
            .is_empty());
    }
}
