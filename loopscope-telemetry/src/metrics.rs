//! ## loopscope-telemetry::metrics
//! **Prometheus counters for dispatched commands**

use prometheus::{Counter, Histogram, HistogramOpts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: prometheus::Registry,
    pub steps_applied: prometheus::Counter,
    pub steps_undone: prometheus::Counter,
    pub seeks: prometheus::Counter,
    pub adhoc_tasks: prometheus::Counter,
    pub replay_duration: prometheus::Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let steps_applied = Counter::new(
            "loopscope_steps_applied_total",
            "Scripted steps applied by the dispatcher",
        )?;
        let steps_undone =
            Counter::new("loopscope_steps_undone_total", "Steps rolled back by undo")?;
        let seeks = Counter::new("loopscope_seeks_total", "Seek commands executed")?;
        let adhoc_tasks = Counter::new(
            "loopscope_adhoc_tasks_total",
            "Tasks enqueued outside the scripted trace",
        )?;
        let replay_duration = Histogram::with_opts(
            HistogramOpts::new(
                "loopscope_replay_duration_us",
                "Wall time of a headless scenario replay",
            )
            .buckets(vec![10.0, 100.0, 1_000.0, 10_000.0, 100_000.0]),
        )?;

        registry.register(Box::new(steps_applied.clone()))?;
        registry.register(Box::new(steps_undone.clone()))?;
        registry.register(Box::new(seeks.clone()))?;
        registry.register(Box::new(adhoc_tasks.clone()))?;
        registry.register(Box::new(replay_duration.clone()))?;

        Ok(Self {
            registry,
            steps_applied,
            steps_undone,
            seeks,
            adhoc_tasks,
            replay_duration,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }

    pub fn inc_steps_applied(&self) {
        self.steps_applied.inc();
    }

    pub fn inc_steps_undone(&self) {
        self.steps_undone.inc();
    }

    pub fn inc_seeks(&self) {
        self.seeks.inc();
    }

    pub fn inc_adhoc_tasks(&self) {
        self.adhoc_tasks.inc();
    }

    pub fn observe_replay_micros(&self, micros: f64) {
        self.replay_duration.observe(micros);
    }
}
