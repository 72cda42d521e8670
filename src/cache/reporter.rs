use std::sync::Arc;

use crate::events::{Bus, Event};

/// Stamps events with the resource name and publishes them, if a bus is attached.
#[derive(Clone)]
pub(crate) struct Reporter {
    resource: Arc<str>,
    bus: Option<Bus>,
}

impl Reporter {
    pub(crate) fn new(resource: Arc<str>, bus: Option<Bus>) -> Self {
        Self { resource, bus }
    }

    pub(crate) fn resource(&self) -> &Arc<str> {
        &self.resource
    }

    pub(crate) fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_resource(Arc::clone(&self.resource)));
        }
    }
}
