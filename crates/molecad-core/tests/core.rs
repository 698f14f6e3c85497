#[path = "core/event_flow.rs"]
mod event_flow;
