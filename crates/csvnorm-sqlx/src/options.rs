/// Options that control how introspection behaves.
#[derive(Debug, Clone, Default)]
pub struct IntrospectOptions {
    pub include_system_schemas: bool,
    /// Restrict introspection to these namespaces.
    pub schemas: Option<Vec<String>>,
}

impl IntrospectOptions {
    /// Keep the namespaces these options select. An explicit list wins over
    /// the system schema rule.
    pub fn filter_schemas(&self, raw: Vec<String>) -> Vec<String> {
        raw.into_iter()
            .filter(|schema| {
                let is_system = schema.starts_with("pg_") || schema == "information_schema";
                match &self.schemas {
                    Some(list) => list.iter().any(|item| item == schema),
                    None => self.include_system_schemas || !is_system,
                }
            })
            .collect()
    }
}
