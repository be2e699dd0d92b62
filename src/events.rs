//! Solar operating-condition events consumed by a DER instance.
//!
//! An event pins insolation and cell temperature from its timestamp onward;
//! the schedule answers "what are the conditions at time t".

/// One insolation/temperature change at a point in simulation time.
#[derive(Debug, Clone, Copy)]
pub struct SolarEvent {
    /// Event time in seconds.
    pub time_s: f64,
    /// Solar insolation in percent of the reference level.
    pub sinsol: f64,
    /// Cell temperature in kelvin.
    pub tactual: f64,
}

/// Time-ordered collection of solar events for one DER instance.
#[derive(Debug, Clone, Default)]
pub struct EventSchedule {
    events: Vec<SolarEvent>,
}

impl EventSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a solar event, keeping the schedule ordered by time.
    pub fn add_solar_event(&mut self, time_s: f64, sinsol: f64, tactual: f64) {
        let event = SolarEvent {
            time_s,
            sinsol,
            tactual,
        };
        let index = self
            .events
            .partition_point(|existing| existing.time_s <= time_s);
        self.events.insert(index, event);
    }

    /// Insolation and temperature in force at time `t`, from the most recent
    /// event at or before `t`. `None` before the first event.
    pub fn state_at(&self, t: f64) -> Option<(f64, f64)> {
        self.events
            .iter()
            .take_while(|event| event.time_s <= t)
            .last()
            .map(|event| (event.sinsol, event.tactual))
    }

    /// Events with `start <= time < end`, in time order.
    pub fn events_between(&self, start: f64, end: f64) -> impl Iterator<Item = &SolarEvent> {
        self.events
            .iter()
            .filter(move |event| event.time_s >= start && event.time_s < end)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
