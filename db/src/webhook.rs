use common::error::Res;
use sqlx::{Executor, Postgres};

/// Records a Stripe event id. Returns false when the event was already processed.
pub async fn record_event<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    event_id: &str,
    event_type: &str,
) -> Res<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO webhook_events (event_id, event_type)
        VALUES ($1, $2)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(event_type)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
