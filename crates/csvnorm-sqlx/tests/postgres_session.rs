use std::env;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use csvnorm_core::{NativeType, SuffixTidier, TableName, Value, resolve_foreign_keys};
use csvnorm_sqlx::{IntrospectOptions, PostgresSession, Session};

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

#[tokio::test]
async fn timestamptz_round_trips_in_utc() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres session test");
        return Ok(());
    };
    let session = PostgresSession::connect(&url).await?;

    let zone = session
        .fetch_rows("select current_setting('TimeZone')", &[], &[NativeType::Text])
        .await?;
    assert_eq!(zone, vec![vec![Value::from("UTC")]]);

    session
        .execute(
            "create temporary table visit (id serial primary key, seen_at timestamptz not null)",
            &[],
        )
        .await?;
    let seen = NaiveDate::from_ymd_opt(2023, 7, 14)
        .unwrap()
        .and_hms_milli_opt(9, 15, 0, 250)
        .unwrap();
    session
        .execute(
            "insert into visit (seen_at) values (CAST($1 AS timestamp with time zone))",
            &[Value::Timestamp(seen)],
        )
        .await?;

    let stored = session
        .fetch_rows(
            "select seen_at, to_char(seen_at at time zone 'UTC', 'HH24:MI') from visit",
            &[],
            &[NativeType::Timestamp, NativeType::Text],
        )
        .await?;
    assert_eq!(
        stored,
        vec![vec![Value::Timestamp(seen), Value::from("09:15")]]
    );
    Ok(())
}

#[tokio::test]
async fn unique_index_counts_as_natural_key() -> Result<()> {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres session test");
        return Ok(());
    };
    let session = PostgresSession::connect(&url).await?;

    for sql in [
        "drop schema if exists csvnorm_index_check cascade",
        "create schema csvnorm_index_check",
        "create table csvnorm_index_check.country (id serial primary key, iso_code text not null)",
        "create unique index country_iso_idx on csvnorm_index_check.country (iso_code)",
        "create table csvnorm_index_check.city (
            id serial primary key,
            name text not null,
            country_id integer not null references csvnorm_index_check.country (id)
        )",
    ] {
        session.execute(sql, &[]).await?;
    }

    let catalog = session
        .introspect(&IntrospectOptions {
            schemas: Some(vec!["csvnorm_index_check".to_string()]),
            ..IntrospectOptions::default()
        })
        .await;
    session
        .execute("drop schema csvnorm_index_check cascade", &[])
        .await?;
    let catalog = catalog?;

    let mapping = resolve_foreign_keys(
        &catalog,
        &TableName::new("csvnorm_index_check", "city"),
        &SuffixTidier::default(),
    )?;
    let entry = mapping
        .get("country_id")
        .ok_or_else(|| anyhow!("country_id should be mapped"))?;
    assert_eq!(entry.display_column, "iso_code");
    assert_eq!(entry.display_name, "country");
    Ok(())
}
