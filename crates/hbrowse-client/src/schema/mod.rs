//! Table and family metadata, cached per connection.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::error::{BrowseError, BrowseResult};
use crate::registry::Registry;
use crate::store::TableDescriptor;

/// A table and its column families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescriptor {
    /// Table name.
    pub table_name: String,
    /// Family names, sorted.
    pub families: BTreeSet<String>,
}

impl SchemaDescriptor {
    /// Creates a descriptor.
    pub fn new<I, S>(table_name: impl Into<String>, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table_name: table_name.into(),
            families: families.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the table has this family.
    pub fn has_family(&self, family: &str) -> bool {
        self.families.contains(family)
    }
}

impl From<&TableDescriptor> for SchemaDescriptor {
    fn from(table: &TableDescriptor) -> Self {
        Self::new(
            table.name.clone(),
            table
                .families
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned()),
        )
    }
}

/// Discovered schemas, keyed by connection name.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    schemas: Registry<Vec<SchemaDescriptor>>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists the tables of a connection, in store order.
    ///
    /// A failure leaves the handle usable.
    pub fn discover(&self, handle: &ConnectionHandle) -> BrowseResult<Vec<SchemaDescriptor>> {
        let tables = handle
            .session()?
            .list_tables()
            .map_err(|source| BrowseError::Schema {
                connection: handle.name().to_string(),
                source,
            })?;
        debug!(connection = %handle.name(), tables = tables.len(), "discovered schema");
        Ok(tables.iter().map(SchemaDescriptor::from).collect())
    }

    /// Stores the descriptors of a connection, replacing previous ones.
    pub fn store(&self, name: &str, descriptors: Vec<SchemaDescriptor>) {
        self.schemas.insert(name, descriptors);
    }

    /// Gets the descriptors of a connection.
    pub fn get(&self, name: &str) -> Option<Vec<SchemaDescriptor>> {
        self.schemas.get(name)
    }

    /// Gets one table of a connection.
    pub fn table(&self, name: &str, table: &str) -> Option<SchemaDescriptor> {
        self.get(name)?
            .into_iter()
            .find(|schema| schema.table_name == table)
    }

    /// Returns the table names of a connection, in store order.
    pub fn table_names(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|schemas| schemas.into_iter().map(|s| s.table_name).collect())
            .unwrap_or_default()
    }

    /// Forgets a connection.
    pub fn remove(&self, name: &str) -> Option<Vec<SchemaDescriptor>> {
        self.schemas.remove(name)
    }
}
