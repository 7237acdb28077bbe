use anyhow::{bail, Context};
use sqlx::{PgPool, Row};

use super::Sheet;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn list_sheets(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT DISTINCT sheet_name FROM milestone_tracking.sheet_rows ORDER BY sheet_name",
    )
    .fetch_all(pool)
    .await?;

    let mut names = Vec::with_capacity(rows.len());
    for row in rows {
        names.push(row.try_get("sheet_name")?);
    }
    Ok(names)
}

pub async fn read_sheet(pool: &PgPool, name: &str) -> anyhow::Result<Sheet> {
    let records = sqlx::query(
        r#"
        SELECT cells
        FROM milestone_tracking.sheet_rows
        WHERE sheet_name = $1
        ORDER BY row_index
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to read sheet `{name}`"))?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        rows.push(record.try_get::<Vec<String>, _>("cells")?);
    }
    Ok(Sheet::from_rows(name, rows))
}

pub async fn replace_sheet(pool: &PgPool, sheet: &Sheet) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM milestone_tracking.sheet_rows WHERE sheet_name = $1")
        .bind(&sheet.name)
        .execute(&mut *tx)
        .await?;

    for (index, cells) in sheet.all_rows().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO milestone_tracking.sheet_rows (sheet_name, row_index, cells)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&sheet.name)
        .bind(index as i32)
        .bind(cells.to_vec())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn write_header(pool: &PgPool, name: &str, header: &[String]) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO milestone_tracking.sheet_rows (sheet_name, row_index, cells)
        VALUES ($1, 0, $2)
        ON CONFLICT (sheet_name, row_index) DO UPDATE
        SET cells = EXCLUDED.cells, updated_at = now()
        "#,
    )
    .bind(name)
    .bind(header.to_vec())
    .execute(pool)
    .await?;
    Ok(())
}

/// `data_index` is zero-based and excludes the header.
pub async fn update_row(
    pool: &PgPool,
    name: &str,
    data_index: usize,
    cells: &[String],
) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE milestone_tracking.sheet_rows
        SET cells = $3, updated_at = now()
        WHERE sheet_name = $1 AND row_index = $2
        "#,
    )
    .bind(name)
    .bind(data_index as i32 + 1)
    .bind(cells.to_vec())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        bail!("sheet `{name}` has no data row {data_index}");
    }
    Ok(())
}

/// Returns the zero-based data index of the new row.
pub async fn append_row(pool: &PgPool, name: &str, cells: &[String]) -> anyhow::Result<usize> {
    let row_index: i32 = sqlx::query(
        r#"
        INSERT INTO milestone_tracking.sheet_rows (sheet_name, row_index, cells)
        SELECT $1, COALESCE(MAX(row_index), 0) + 1, $2
        FROM milestone_tracking.sheet_rows
        WHERE sheet_name = $1
        RETURNING row_index
        "#,
    )
    .bind(name)
    .bind(cells.to_vec())
    .fetch_one(pool)
    .await?
    .try_get("row_index")?;

    Ok((row_index - 1) as usize)
}
