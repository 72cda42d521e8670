use std::fmt;

/// Identity of a cached resource, used only in events and error messages.
///
/// # Example
/// ```
/// use amqp_recovery::ResourceContext;
///
/// let ctx = ResourceContext::new("session", "ns.example.net")
///     .with_entity_path("queue")
///     .with_name("cbs");
/// assert_eq!(ctx.to_string(), "session 'cbs' (ns.example.net/queue)");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceContext {
    /// Resource family: `connection`, `session`, `channel`.
    pub kind: &'static str,
    /// Host name of the messaging namespace.
    pub fully_qualified_namespace: String,
    /// Entity (queue, topic) the resource is scoped to.
    pub entity_path: Option<String>,
    /// Session or link name.
    pub name: Option<String>,
}

impl ResourceContext {
    /// Context for a resource of `kind` in `fully_qualified_namespace`.
    pub fn new(kind: &'static str, fully_qualified_namespace: impl Into<String>) -> Self {
        Self {
            kind,
            fully_qualified_namespace: fully_qualified_namespace.into(),
            entity_path: None,
            name: None,
        }
    }

    /// Sets the entity path.
    pub fn with_entity_path(mut self, entity_path: impl Into<String>) -> Self {
        self.entity_path = Some(entity_path.into());
        self
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Same context, another kind (a session's links share its namespace and entity).
    pub fn child(&self, kind: &'static str) -> Self {
        Self {
            kind,
            name: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " '{name}'")?;
        }
        write!(f, " ({}", self.fully_qualified_namespace)?;
        if let Some(path) = &self.entity_path {
            write!(f, "/{path}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_name_or_path() {
        let ctx = ResourceContext::new("connection", "ns.example.net");
        assert_eq!(ctx.to_string(), "connection (ns.example.net)");
    }

    #[test]
    fn child_keeps_location_and_drops_name() {
        let session = ResourceContext::new("session", "ns.example.net")
            .with_entity_path("orders")
            .with_name("cbs");
        let channel = session.child("channel").with_name("$cbs");
        assert_eq!(channel.to_string(), "channel '$cbs' (ns.example.net/orders)");
    }
}
