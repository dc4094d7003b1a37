use std::collections::{BTreeMap, BTreeSet};

use crate::constraints::Constraint;
use crate::error::{Error, Result};
use crate::schema::DatabaseSchema;

/// Validate internal consistency of a catalog.
///
/// This checks:
/// - duplicate schemas/tables/columns
/// - at most one primary key per table, and its columns exist
/// - unique and foreign key columns exist
/// - foreign key targets exist, with matching column counts
pub fn validate_schema(catalog: &DatabaseSchema) -> Result<()> {
    let mut tables_by_schema: BTreeMap<&str, BTreeMap<&str, BTreeSet<&str>>> = BTreeMap::new();

    for db_schema in &catalog.schemas {
        if tables_by_schema.contains_key(db_schema.name.as_str()) {
            return Err(Error::Schema(format!(
                "duplicate schema name: {}",
                db_schema.name
            )));
        }

        let mut tables = BTreeMap::new();
        for table in &db_schema.tables {
            if tables.contains_key(table.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate table name: {}.{}",
                    db_schema.name, table.name
                )));
            }

            let mut columns = BTreeSet::new();
            for column in &table.columns {
                if !columns.insert(column.name.as_str()) {
                    return Err(Error::Schema(format!(
                        "duplicate column name: {}.{}.{}",
                        db_schema.name, table.name, column.name
                    )));
                }
            }

            tables.insert(table.name.as_str(), columns);
        }

        tables_by_schema.insert(db_schema.name.as_str(), tables);
    }

    for db_schema in &catalog.schemas {
        for table in &db_schema.tables {
            let qualified = format!("{}.{}", db_schema.name, table.name);
            let columns = &tables_by_schema[db_schema.name.as_str()][table.name.as_str()];
            let check_columns = |kind: &str, names: &[String]| -> Result<()> {
                for name in names {
                    if !columns.contains(name.as_str()) {
                        return Err(Error::Schema(format!(
                            "{kind} column not found: {qualified}.{name}"
                        )));
                    }
                }
                Ok(())
            };

            let primary_keys = table
                .constraints
                .iter()
                .filter(|constraint| matches!(constraint, Constraint::PrimaryKey(_)))
                .count();
            if primary_keys > 1 {
                return Err(Error::Schema(format!(
                    "multiple primary keys declared on {qualified}"
                )));
            }

            for constraint in &table.constraints {
                match constraint {
                    Constraint::PrimaryKey(pk) => check_columns("primary key", &pk.columns)?,
                    Constraint::Unique(unique) => check_columns("unique", &unique.columns)?,
                    Constraint::ForeignKey(fk) => {
                        check_columns("foreign key", &fk.columns)?;

                        let ref_columns = tables_by_schema
                            .get(fk.referenced_schema.as_str())
                            .and_then(|tables| tables.get(fk.referenced_table.as_str()))
                            .ok_or_else(|| {
                                Error::Schema(format!(
                                    "referenced table not found: {}.{}",
                                    fk.referenced_schema, fk.referenced_table
                                ))
                            })?;

                        if !fk.referenced_columns.is_empty()
                            && fk.referenced_columns.len() != fk.columns.len()
                        {
                            return Err(Error::Schema(format!(
                                "foreign key on {qualified} references {} columns with {} source columns",
                                fk.referenced_columns.len(),
                                fk.columns.len()
                            )));
                        }

                        for column in &fk.referenced_columns {
                            if !ref_columns.contains(column.as_str()) {
                                return Err(Error::Schema(format!(
                                    "referenced column not found: {}.{}.{}",
                                    fk.referenced_schema, fk.referenced_table, column
                                )));
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
