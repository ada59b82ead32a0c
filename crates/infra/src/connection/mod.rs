//! Storage connection switches.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgPoolRegistry;

use std::sync::Mutex;

use tenantry_tenancy::{ConnectionError, ConnectionSwitch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    Tenant(String),
    Landlord,
}

/// Switch for in-memory deployments: there is no per-tenant storage to swap,
/// so it only traces the switch.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConnectionSwitch;

impl ConnectionSwitch for TracingConnectionSwitch {
    fn use_connection(&self, database_ref: &str) -> Result<(), ConnectionError> {
        tracing::debug!(database_ref, "switched to tenant storage");
        Ok(())
    }

    fn use_landlord_connection(&self) {
        tracing::debug!("switched to landlord storage");
    }
}

/// Test switch: records every switch so callers can check that each tenant
/// activation was paired with a return to landlord. The log grows with every
/// request; use [`TracingConnectionSwitch`] in long-running processes.
#[derive(Debug, Default)]
pub struct RecordingConnectionSwitch {
    events: Mutex<Vec<SwitchEvent>>,
}

impl RecordingConnectionSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SwitchEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Tenant activations not yet followed by a landlord revert.
    pub fn open_activations(&self) -> usize {
        let events = self.events();
        let opened = events.iter().filter(|e| matches!(e, SwitchEvent::Tenant(_))).count();
        let closed = events.iter().filter(|e| **e == SwitchEvent::Landlord).count();
        opened.saturating_sub(closed)
    }

    fn record(&self, event: SwitchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ConnectionSwitch for RecordingConnectionSwitch {
    fn use_connection(&self, database_ref: &str) -> Result<(), ConnectionError> {
        self.record(SwitchEvent::Tenant(database_ref.to_string()));
        Ok(())
    }

    fn use_landlord_connection(&self) {
        self.record(SwitchEvent::Landlord);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_switch_keeps_no_state() {
        assert_eq!(std::mem::size_of::<TracingConnectionSwitch>(), 0);
        let switch = TracingConnectionSwitch;
        for _ in 0..1_000 {
            switch.use_connection("tenant_acme").unwrap();
            switch.use_landlord_connection();
        }
    }

    #[test]
    fn recording_switch_pairs_activations() {
        let switch = RecordingConnectionSwitch::new();
        switch.use_connection("tenant_acme").unwrap();
        assert_eq!(switch.open_activations(), 1);
        switch.use_landlord_connection();
        assert_eq!(switch.open_activations(), 0);
        assert_eq!(
            switch.events(),
            vec![SwitchEvent::Tenant("tenant_acme".into()), SwitchEvent::Landlord]
        );
    }
}
