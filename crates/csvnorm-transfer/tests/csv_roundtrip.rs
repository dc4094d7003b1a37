use anyhow::{Context, Result};
use csvnorm_core::{DatabaseSchema, NativeType, SuffixTidier, TableName, Value};
use csvnorm_sqlx::{IntrospectOptions, Session, SqliteSession};
use csvnorm_transfer::{ExportOptions, ImportOptions, TransferError, export_table, import_table};

const FIXTURE_SQL: &str = r#"
CREATE TABLE lookup_table (
    id INTEGER PRIMARY KEY,
    description VARCHAR NOT NULL UNIQUE
);
CREATE TABLE normalised_table (
    id INTEGER PRIMARY KEY,
    username VARCHAR NOT NULL UNIQUE,
    name VARCHAR,
    accounttype_id INTEGER NOT NULL REFERENCES lookup_table (id),
    age INTEGER NOT NULL,
    valid BOOLEAN NOT NULL,
    joined DATE
);
INSERT INTO lookup_table (description) VALUES ('admin');
INSERT INTO lookup_table (description) VALUES ('user');
INSERT INTO normalised_table (username, name, accounttype_id, age, valid, joined)
    VALUES ('bob', 'Big Bob', 1, 31, 1, '2021-05-04');
INSERT INTO normalised_table (username, name, accounttype_id, age, valid, joined)
    VALUES ('joe', 'Regular Joe', 2, 32, 0, NULL)
"#;

const EXPECTED_CSV: &str = "\
id,username,name,accounttype,age,valid,joined
1,bob,Big Bob,admin,31,true,2021-05-04
2,joe,Regular Joe,user,32,false,
";

async fn fixture() -> Result<(SqliteSession, DatabaseSchema)> {
    let session = SqliteSession::connect("sqlite::memory:").await?;
    for statement in FIXTURE_SQL.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }
        session
            .execute(sql, &[])
            .await
            .with_context(|| format!("executing {sql}"))?;
    }
    let catalog = session.introspect(&IntrospectOptions::default()).await?;
    Ok((session, catalog))
}

fn normalised() -> TableName {
    TableName::new("main", "normalised_table")
}

async fn export_to_string(session: &SqliteSession, catalog: &DatabaseSchema) -> Result<String> {
    export_csv(session, catalog, &normalised()).await
}

async fn export_csv(
    session: &SqliteSession,
    catalog: &DatabaseSchema,
    table: &TableName,
) -> Result<String> {
    let mut out = Vec::new();
    export_table(
        session,
        catalog,
        table,
        &SuffixTidier::default(),
        &ExportOptions::default(),
        &mut out,
    )
    .await?;
    Ok(String::from_utf8(out)?)
}

async fn count_rows(session: &SqliteSession) -> Result<Value> {
    let rows = session
        .fetch_rows(
            "SELECT COUNT(*) FROM normalised_table",
            &[],
            &[NativeType::Integer],
        )
        .await?;
    Ok(rows[0][0].clone())
}

#[tokio::test]
async fn exports_flat_csv() -> Result<()> {
    let (session, catalog) = fixture().await?;
    assert_eq!(export_to_string(&session, &catalog).await?, EXPECTED_CSV);
    Ok(())
}

#[tokio::test]
async fn export_then_import_reproduces_csv() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let exported = export_to_string(&session, &catalog).await?;

    session.execute("DELETE FROM normalised_table", &[]).await?;
    let report = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions::default(),
        exported.as_bytes(),
    )
    .await?;
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.rows_inserted, 2);
    assert!(report.rejected.is_empty());

    assert_eq!(export_to_string(&session, &catalog).await?, exported);
    Ok(())
}

#[tokio::test]
async fn invalid_rows_are_skipped_when_asked() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let input = "\
username,accounttype,age,valid
ann,user,40,yes
bad_lookup,superuser,41,no
bad_bool,admin,42,maybe
kim,admin,29,0
";

    let report = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions {
            skip_invalid_rows: true,
            preload_lookups: true,
            ..ImportOptions::default()
        },
        input.as_bytes(),
    )
    .await?;

    assert_eq!(report.rows_read, 4);
    assert_eq!(report.rows_inserted, 2);
    let lines: Vec<u64> = report.rejected.iter().map(|row| row.line).collect();
    assert_eq!(lines, vec![3, 4]);
    assert_eq!(count_rows(&session).await?, Value::Int(4));
    Ok(())
}

#[tokio::test]
async fn first_invalid_row_aborts_by_default() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let input = "username,accounttype,age,valid\nann,superuser,40,yes\n";

    let err = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions::default(),
        input.as_bytes(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TransferError::Row { line: 2, .. }));
    Ok(())
}

#[tokio::test]
async fn dry_run_writes_nothing() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let input = "username,accounttype,age,valid\nann,user,40,yes\n";

    let report = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        },
        input.as_bytes(),
    )
    .await?;
    assert!(report.dry_run);
    assert_eq!(report.rows_inserted, 1);
    assert_eq!(count_rows(&session).await?, Value::Int(2));
    Ok(())
}

#[tokio::test]
async fn unknown_header_is_rejected() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let input = "username,accounttype_id\nann,1\n";

    let err = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions::default(),
        input.as_bytes(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, TransferError::Core(csvnorm_core::Error::Schema(_))));
    Ok(())
}

#[tokio::test]
async fn repeated_header_is_rejected() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let input = "username,name,name,accounttype,age,valid\nann,Ann,Annie,user,40,yes\n";

    let err = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions::default(),
        input.as_bytes(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        &err,
        TransferError::Core(csvnorm_core::Error::Schema(message)) if message.contains("\"name\"")
    ));
    assert_eq!(count_rows(&session).await?, Value::Int(2));
    Ok(())
}

#[tokio::test]
async fn fractional_timestamps_survive_round_trip() -> Result<()> {
    let (session, _) = fixture().await?;
    session
        .execute(
            "CREATE TABLE visit (id INTEGER PRIMARY KEY, seen_at DATETIME NOT NULL)",
            &[],
        )
        .await?;
    session
        .execute(
            "INSERT INTO visit (seen_at) VALUES ('2023-07-14T09:15:00.250')",
            &[],
        )
        .await?;
    let catalog = session.introspect(&IntrospectOptions::default()).await?;
    let visit = TableName::new("main", "visit");

    let exported = export_csv(&session, &catalog, &visit).await?;
    assert_eq!(exported, "id,seen_at\n1,2023-07-14T09:15:00.250\n");

    session.execute("DELETE FROM visit", &[]).await?;
    let report = import_table(
        &session,
        &catalog,
        &visit,
        &SuffixTidier::default(),
        &ImportOptions::default(),
        exported.as_bytes(),
    )
    .await?;
    assert_eq!(report.rows_inserted, 1);
    assert_eq!(export_csv(&session, &catalog, &visit).await?, exported);
    Ok(())
}

#[tokio::test]
async fn skipped_rows_stay_inside_caller_transaction() -> Result<()> {
    let (session, catalog) = fixture().await?;
    let input = "username,accounttype,age,valid\nann,user,40,yes\nbad,superuser,41,no\n";

    session.begin().await?;
    let report = import_table(
        &session,
        &catalog,
        &normalised(),
        &SuffixTidier::default(),
        &ImportOptions {
            skip_invalid_rows: true,
            ..ImportOptions::default()
        },
        input.as_bytes(),
    )
    .await?;
    assert_eq!(report.rows_inserted, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(count_rows(&session).await?, Value::Int(3));

    session.rollback().await?;
    assert_eq!(count_rows(&session).await?, Value::Int(2));
    Ok(())
}
