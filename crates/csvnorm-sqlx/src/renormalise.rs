//! Turning flat rows back into rows the table accepts: every display value of
//! a mapped foreign key is replaced by the id of the referenced row.

use std::collections::BTreeMap;

use csvnorm_core::{
    CoerceOptions, Column, ColumnTidier, DatabaseSchema, Error, FlatRow, ForeignKeyMapping,
    MappedForeignKey, ResolvedRow, Result, TableName, Value, coerce_value, ensure_distinct_labels,
    lookup_all_sql, lookup_sql, resolve_foreign_keys,
};

use crate::session::Session;

/// Knobs for [`prepare_renormalise`].
#[derive(Debug, Clone, Default)]
pub struct RenormaliseOptions {
    /// Date and timestamp formats used to read display values.
    pub coerce: CoerceOptions,
    /// Read every `(display, id)` pair of each lookup table up front and
    /// resolve rows from memory instead of one query per value.
    pub preload: bool,
}

struct Lookup {
    entry: MappedForeignKey,
    display: Column,
    sql: String,
    /// Ids keyed by the CSV rendering of the display value.
    cache: Option<BTreeMap<String, Value>>,
}

/// Prepared renormalisation of one table, bound to a session.
pub struct Renormaliser<'s, S: Session + ?Sized> {
    session: &'s S,
    mapping: ForeignKeyMapping,
    lookups: Vec<Lookup>,
    coerce: CoerceOptions,
}

/// Prepare the row builder for `table_name`.
///
/// Uses the same mapping and naming as the denormalising read, so the column
/// names it accepts are exactly the ones that read produces.
pub async fn prepare_renormalise<'s, S>(
    session: &'s S,
    catalog: &DatabaseSchema,
    table_name: &TableName,
    tidier: &dyn ColumnTidier,
    options: &RenormaliseOptions,
) -> Result<Renormaliser<'s, S>>
where
    S: Session + ?Sized,
{
    let table = catalog.require_table(table_name)?;
    let mapping = resolve_foreign_keys(catalog, table_name, tidier)?;
    ensure_distinct_labels(table_name, mapping.flat_names(table))?;

    let dialect = session.dialect();
    let mut lookups = Vec::with_capacity(mapping.len());
    for entry in mapping.iter() {
        let display = catalog
            .require_table(&entry.target)?
            .column(&entry.display_column)
            .cloned()
            .ok_or_else(|| {
                Error::Schema(format!(
                    "display column not found: {}.{}",
                    entry.target, entry.display_column
                ))
            })?;
        lookups.push(Lookup {
            entry: entry.clone(),
            display,
            sql: lookup_sql(entry, dialect),
            cache: None,
        });
    }

    let mut renormaliser = Renormaliser {
        session,
        mapping,
        lookups,
        // Display values are compared against typed columns, so numbers are
        // parsed too.
        coerce: CoerceOptions {
            numeric: true,
            ..options.coerce.clone()
        },
    };
    if options.preload {
        renormaliser.preload().await?;
    }

    tracing::debug!(
        event = "renormalise_prepared",
        table = %table_name,
        mapped = renormaliser.lookups.len(),
        preload = options.preload,
    );
    Ok(renormaliser)
}

impl<'s, S: Session + ?Sized> Renormaliser<'s, S> {
    pub fn mapping(&self) -> &ForeignKeyMapping {
        &self.mapping
    }

    /// Load every `(display, id)` pair of each lookup table.
    pub async fn preload(&mut self) -> Result<()> {
        for lookup in &mut self.lookups {
            let rows = self
                .session
                .fetch_rows(
                    &lookup_all_sql(&lookup.entry),
                    &[],
                    &[lookup.entry.display_type, lookup.entry.target_id_type],
                )
                .await?;

            let mut cache = BTreeMap::new();
            for row in rows {
                let mut cells = row.into_iter();
                if let (Some(display), Some(id)) = (cells.next(), cells.next()) {
                    cache.entry(display.to_csv()).or_insert(id);
                }
            }
            tracing::debug!(
                event = "lookup_preloaded",
                target = %lookup.entry.target,
                pairs = cache.len(),
            );
            lookup.cache = Some(cache);
        }
        Ok(())
    }

    /// Replace every display value in `row` by the id it names.
    ///
    /// An empty or NULL display value of a nullable foreign key drops the key,
    /// so the column is stored as NULL. Keys that are not display names pass
    /// through unchanged.
    pub async fn renormalise(&self, row: &FlatRow) -> Result<ResolvedRow> {
        let mut resolved = ResolvedRow::new();

        for (key, value) in row {
            let Some(lookup) = self
                .lookups
                .iter()
                .find(|lookup| &lookup.entry.display_name == key)
            else {
                resolved.insert(key.clone(), value.clone());
                continue;
            };

            if lookup.entry.nullable && (value.is_null() || value.is_empty_text()) {
                continue;
            }

            let id = self.resolve(lookup, value).await?;
            resolved.insert(lookup.entry.column.clone(), id);
        }

        Ok(resolved)
    }

    async fn resolve(&self, lookup: &Lookup, value: &Value) -> Result<Value> {
        let display = coerce_value(&lookup.display, value, &self.coerce)?;

        let found = match &lookup.cache {
            Some(cache) => cache.get(&display.to_csv()).cloned(),
            None => self
                .session
                .fetch_rows(&lookup.sql, &[display], &[lookup.entry.target_id_type])
                .await?
                .into_iter()
                .next()
                .and_then(|row| row.into_iter().next()),
        };

        found.ok_or_else(|| Error::Lookup {
            column: lookup.entry.column.clone(),
            display: lookup.entry.display_column.clone(),
            value: value.to_csv(),
        })
    }
}
