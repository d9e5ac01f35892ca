use pgconn::{Connection, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    dotenvy::dotenv().ok();

    let mut conn = Connection::connect_env().await?;

    pgconn::query("CREATE TEMP TABLE demo(id serial, name text)", &mut conn)
        .execute()
        .await?;

    let inserted = pgconn::query("INSERT INTO demo(name) VALUES($1)", &mut conn)
        .bind(&"Foo")
        .execute()
        .await?;
    assert_eq!(inserted.rows_affected, 1);

    pgconn::query("INSERT INTO demo(name) VALUES('Bar')", &mut conn)
        .execute()
        .await?;

    let rows: Vec<(i32, String)> = pgconn::query("SELECT id, name FROM demo ORDER BY id", &mut conn)
        .fetch_all()
        .await?;
    dbg!(&rows);

    let (_id, name): (i32, String) = pgconn::query("SELECT id, name FROM demo LIMIT 1", &mut conn)
        .fetch_one()
        .await?;
    assert_eq!(name, "Foo");

    let none: Option<(i32, String)> = pgconn::query("SELECT id, name FROM demo LIMIT 0", &mut conn)
        .fetch_optional()
        .await?;
    assert!(none.is_none());

    // transaction + COPY IN
    let mut tx = pgconn::begin(&mut conn).await?;
    let mut copy = pgconn::copy_in("COPY demo(name) FROM STDIN", tx.connection()).await?;
    copy.write_row([Some("Baz")]).await?;
    copy.write_row([None]).await?;
    let copied = copy.finish().await?;
    dbg!(copied.rows_affected);
    tx.commit().await?;

    // simple query protocol, multiple statements in one round trip
    let mut simple = pgconn::query_simple("SELECT 1; SELECT 2", &mut conn).await?;
    while let Some(row) = simple.next().await? {
        dbg!(row);
    }
    simple.next_result_set();
    while let Some(row) = simple.next().await? {
        dbg!(row);
    }

    // cancellation: a fresh connection can cancel a running one
    let cancel_token = conn.cancel_token();
    drop(cancel_token);

    if let Err(e) = conn.close().await {
        eprintln!("failed to close cleanly: {e}");
    }

    Ok(())
}
