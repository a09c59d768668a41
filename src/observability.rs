use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatrelay.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatrelay.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatrelay.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("chatrelay.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatrelay.stream.errors");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("chatrelay.stream.malformed");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatrelay.stream.bytes");

pub(crate) static TURNS: Counter = Counter::new("chatrelay.turn.count");
pub(crate) static TURN_FALLBACKS: Counter = Counter::new("chatrelay.turn.stream_fallbacks");
pub(crate) static TURN_ERRORS: Counter = Counter::new("chatrelay.turn.errors");
pub(crate) static TURN_DURATION: Moments = Moments::new("chatrelay.turn.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&TURNS);
    collector.register_counter(&TURN_FALLBACKS);
    collector.register_counter(&TURN_ERRORS);
    collector.register_moments(&TURN_DURATION);
}
