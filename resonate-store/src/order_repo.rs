use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use resonate_core::{
    Campaign, CampaignMatch, CampaignStatus, Deliverable, DeliverableStatus, EngineError,
    NewOrderBundle, Order, OrderLineItem, OrderStatus, OrderStatusChange, OrderStore,
    ProcurementStatus, Publisher, SourceCategory, SubmissionDraft,
};

/// Postgres-backed record store. Claims and status flips are single
/// conditional UPDATE statements; the order aggregate is written in one
/// transaction so readers never observe an order without its line items or
/// line items without their deliverables.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(err: sqlx::Error) -> EngineError {
    EngineError::dependency(err)
}

fn bad_value(what: &str, value: &str) -> EngineError {
    EngineError::Dependency(format!("unexpected {} value: {}", what, value).into())
}

// Internal structs for type-safe querying

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    advertiser_id: Uuid,
    title: String,
    budget_min_cents: i64,
    budget_max_cents: i64,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    targeting: serde_json::Value,
    source_category: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl CampaignRow {
    fn into_model(self) -> Result<Campaign, EngineError> {
        Ok(Campaign {
            id: self.id,
            advertiser_id: self.advertiser_id,
            title: self.title,
            budget_min_cents: self.budget_min_cents,
            budget_max_cents: self.budget_max_cents,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            targeting: self.targeting,
            source_category: SourceCategory::parse(&self.source_category)
                .ok_or_else(|| bad_value("source_category", &self.source_category))?,
            status: CampaignStatus::parse(&self.status)
                .ok_or_else(|| bad_value("campaign status", &self.status))?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PublisherRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: Uuid,
    campaign_id: Uuid,
    publisher_id: Uuid,
    is_selected: bool,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    campaign_id: Uuid,
    publisher_id: Uuid,
    match_id: Option<Uuid>,
    status: String,
    procurement_status: String,
    purchase_order_number: Option<String>,
    subtotal_cents: i64,
    platform_fee_cents: i64,
    total_cents: i64,
    delivery_deadline: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_model(self) -> Result<Order, EngineError> {
        Ok(Order {
            id: self.id,
            campaign_id: self.campaign_id,
            publisher_id: self.publisher_id,
            match_id: self.match_id,
            status: OrderStatus::parse(&self.status)
                .ok_or_else(|| bad_value("order status", &self.status))?,
            procurement_status: ProcurementStatus::parse(&self.procurement_status)
                .ok_or_else(|| bad_value("procurement status", &self.procurement_status))?,
            purchase_order_number: self.purchase_order_number,
            subtotal_cents: self.subtotal_cents,
            platform_fee_cents: self.platform_fee_cents,
            total_cents: self.total_cents,
            delivery_deadline: self.delivery_deadline,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineItemRow {
    id: Uuid,
    order_id: Uuid,
    deliverable_type: String,
    platform: String,
    quantity: i32,
    unit_price_cents: i64,
    total_price_cents: i64,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl LineItemRow {
    fn into_model(self) -> OrderLineItem {
        OrderLineItem {
            id: self.id,
            order_id: self.order_id,
            deliverable_type: self.deliverable_type,
            platform: self.platform,
            quantity: self.quantity.max(0) as u32,
            unit_price_cents: self.unit_price_cents,
            total_price_cents: self.total_price_cents,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeliverableRow {
    id: Uuid,
    order_id: Uuid,
    line_item_id: Uuid,
    platform: String,
    deliverable_type: String,
    status: String,
    submission_url: Option<String>,
    screenshot_url: Option<String>,
    submission_notes: Option<String>,
    metrics: serde_json::Value,
    submitted_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DeliverableRow {
    fn into_model(self) -> Result<Deliverable, EngineError> {
        Ok(Deliverable {
            id: self.id,
            order_id: self.order_id,
            line_item_id: self.line_item_id,
            platform: self.platform,
            deliverable_type: self.deliverable_type,
            status: DeliverableStatus::parse(&self.status)
                .ok_or_else(|| bad_value("deliverable status", &self.status))?,
            submission_url: self.submission_url,
            screenshot_url: self.screenshot_url,
            submission_notes: self.submission_notes,
            metrics: self.metrics,
            submitted_at: self.submitted_at,
            approved_at: self.approved_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusChangeRow {
    id: Uuid,
    order_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    changed_at: DateTime<Utc>,
    changed_by: Option<String>,
    notes: Option<String>,
}

impl StatusChangeRow {
    fn into_model(self) -> Result<OrderStatusChange, EngineError> {
        let from_status = match self.from_status {
            Some(s) => Some(OrderStatus::parse(&s).ok_or_else(|| bad_value("order status", &s))?),
            None => None,
        };
        Ok(OrderStatusChange {
            id: self.id,
            order_id: self.order_id,
            from_status,
            to_status: OrderStatus::parse(&self.to_status)
                .ok_or_else(|| bad_value("order status", &self.to_status))?,
            changed_at: self.changed_at,
            changed_by: self.changed_by,
            notes: self.notes,
        })
    }
}

const DELIVERABLE_COLUMNS: &str = "id, order_id, line_item_id, platform, deliverable_type, status, submission_url, screenshot_url, submission_notes, metrics, submitted_at, approved_at, created_at";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>, EngineError> {
        let row = sqlx::query_as::<_, CampaignRow>(
            "SELECT id, advertiser_id, title, budget_min_cents, budget_max_cents, starts_at, ends_at, targeting, source_category, status, created_at FROM campaigns WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(CampaignRow::into_model).transpose()
    }

    async fn publisher(&self, id: Uuid) -> Result<Option<Publisher>, EngineError> {
        let row = sqlx::query_as::<_, PublisherRow>(
            "SELECT id, name, created_at FROM publishers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| Publisher {
            id: r.id,
            name: r.name,
            created_at: r.created_at,
        }))
    }

    async fn campaign_match(&self, id: Uuid) -> Result<Option<CampaignMatch>, EngineError> {
        let row = sqlx::query_as::<_, MatchRow>(
            "SELECT id, campaign_id, publisher_id, is_selected, created_at FROM campaign_matches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| CampaignMatch {
            id: r.id,
            campaign_id: r.campaign_id,
            publisher_id: r.publisher_id,
            is_selected: r.is_selected,
            created_at: r.created_at,
        }))
    }

    async fn campaign_match_count(&self, campaign_id: Uuid) -> Result<u64, EngineError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaign_matches WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count as u64)
    }

    async fn campaign_order_count(&self, campaign_id: Uuid) -> Result<u64, EngineError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(count as u64)
    }

    async fn create_order(&self, bundle: &NewOrderBundle) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Win the match first: a compare-and-set inside the transaction, so
        // a lost race rolls the whole create back instead of double-booking
        if let Some(match_id) = bundle.select_match {
            let updated = sqlx::query(
                "UPDATE campaign_matches SET is_selected = TRUE WHERE id = $1 AND is_selected = FALSE",
            )
            .bind(match_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if updated.rows_affected() == 0 {
                return Err(EngineError::conflict(format!(
                    "campaign match {} is missing or already selected",
                    match_id
                )));
            }
        }

        let order = &bundle.order;
        sqlx::query(
            r#"
            INSERT INTO orders (id, campaign_id, publisher_id, match_id, status, procurement_status, purchase_order_number, subtotal_cents, platform_fee_cents, total_cents, delivery_deadline, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id)
        .bind(order.campaign_id)
        .bind(order.publisher_id)
        .bind(order.match_id)
        .bind(order.status.as_str())
        .bind(order.procurement_status.as_str())
        .bind(&order.purchase_order_number)
        .bind(order.subtotal_cents)
        .bind(order.platform_fee_cents)
        .bind(order.total_cents)
        .bind(order.delivery_deadline)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for item in &bundle.line_items {
            sqlx::query(
                r#"
                INSERT INTO order_line_items (id, order_id, deliverable_type, platform, quantity, unit_price_cents, total_price_cents, description, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(&item.deliverable_type)
            .bind(&item.platform)
            .bind(item.quantity as i32)
            .bind(item.unit_price_cents)
            .bind(item.total_price_cents)
            .bind(&item.description)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        for d in &bundle.deliverables {
            sqlx::query(
                r#"
                INSERT INTO deliverables (id, order_id, line_item_id, platform, deliverable_type, status, submission_url, screenshot_url, submission_notes, metrics, submitted_at, approved_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(d.id)
            .bind(d.order_id)
            .bind(d.line_item_id)
            .bind(&d.platform)
            .bind(&d.deliverable_type)
            .bind(d.status.as_str())
            .bind(&d.submission_url)
            .bind(&d.screenshot_url)
            .bind(&d.submission_notes)
            .bind(&d.metrics)
            .bind(d.submitted_at)
            .bind(d.approved_at)
            .bind(d.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        insert_status_change(&mut tx, &bundle.change).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, EngineError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, campaign_id, publisher_id, match_id, status, procurement_status, purchase_order_number, subtotal_cents, platform_fee_cents, total_cents, delivery_deadline, notes, created_at, updated_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(OrderRow::into_model).transpose()
    }

    async fn line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, EngineError> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            "SELECT id, order_id, deliverable_type, platform, quantity, unit_price_cents, total_price_cents, description, created_at FROM order_line_items WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(LineItemRow::into_model).collect())
    }

    async fn deliverables(&self, order_id: Uuid) -> Result<Vec<Deliverable>, EngineError> {
        let rows = sqlx::query_as::<_, DeliverableRow>(&format!(
            "SELECT {} FROM deliverables WHERE order_id = $1 ORDER BY created_at, id",
            DELIVERABLE_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DeliverableRow::into_model).collect()
    }

    async fn list_orders(&self, campaign_id: Option<Uuid>) -> Result<Vec<Order>, EngineError> {
        const COLUMNS: &str = "id, campaign_id, publisher_id, match_id, status, procurement_status, purchase_order_number, subtotal_cents, platform_fee_cents, total_cents, delivery_deadline, notes, created_at, updated_at";

        let rows = match campaign_id {
            Some(campaign_id) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {} FROM orders WHERE campaign_id = $1 ORDER BY created_at DESC",
                    COLUMNS
                ))
                .bind(campaign_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {} FROM orders ORDER BY created_at DESC",
                    COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.into_iter().map(OrderRow::into_model).collect()
    }

    async fn status_history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderStatusChange>, EngineError> {
        let rows = sqlx::query_as::<_, StatusChangeRow>(
            "SELECT id, order_id, from_status, to_status, changed_at, changed_by, notes FROM order_status_changes WHERE order_id = $1 ORDER BY changed_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(StatusChangeRow::into_model).collect()
    }

    async fn incomplete_orders(&self) -> Result<Vec<Uuid>, EngineError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT o.id FROM orders o
            WHERE NOT EXISTS (SELECT 1 FROM order_line_items li WHERE li.order_id = o.id)
               OR (SELECT COALESCE(SUM(li.quantity), 0) FROM order_line_items li WHERE li.order_id = o.id)
                  <> (SELECT COUNT(*) FROM deliverables d WHERE d.order_id = o.id)
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ids)
    }

    async fn claim_deliverable(
        &self,
        order_id: Uuid,
        line_item_id: Uuid,
        draft: &SubmissionDraft,
        now: DateTime<Utc>,
    ) -> Result<Deliverable, EngineError> {
        // Atomic claim: the FIFO pick and the state flip are one statement,
        // so concurrent submissions always consume distinct rows
        let row = sqlx::query_as::<_, DeliverableRow>(&format!(
            r#"
            UPDATE deliverables SET
                status = 'SUBMITTED',
                submission_url = COALESCE($3, submission_url),
                screenshot_url = COALESCE($4, screenshot_url),
                submission_notes = COALESCE($5, submission_notes),
                metrics = COALESCE($6, metrics),
                submitted_at = $7
            WHERE id = (
                SELECT id FROM deliverables
                WHERE order_id = $1 AND line_item_id = $2 AND status IN ('PENDING', 'REVISION_REQUESTED')
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            DELIVERABLE_COLUMNS
        ))
        .bind(order_id)
        .bind(line_item_id)
        .bind(&draft.url)
        .bind(&draft.screenshot_url)
        .bind(&draft.notes)
        .bind(&draft.metrics)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row.into_model(),
            None => {
                let existing: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM deliverables WHERE order_id = $1 AND line_item_id = $2",
                )
                .bind(order_id)
                .bind(line_item_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

                if existing == 0 {
                    Err(EngineError::not_found(format!(
                        "no deliverables for order {} line item {}",
                        order_id, line_item_id
                    )))
                } else {
                    Err(EngineError::conflict(format!(
                        "all deliverables for line item {} are already submitted",
                        line_item_id
                    )))
                }
            }
        }
    }

    async fn update_deliverable_status(
        &self,
        deliverable_id: Uuid,
        expected: DeliverableStatus,
        to: DeliverableStatus,
        now: DateTime<Utc>,
    ) -> Result<Deliverable, EngineError> {
        let row = sqlx::query_as::<_, DeliverableRow>(&format!(
            r#"
            UPDATE deliverables SET
                status = $2,
                approved_at = CASE WHEN $2 = 'APPROVED' THEN $3 ELSE approved_at END
            WHERE id = $1 AND status = $4
            RETURNING {}
            "#,
            DELIVERABLE_COLUMNS
        ))
        .bind(deliverable_id)
        .bind(to.as_str())
        .bind(now)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => row.into_model(),
            None => {
                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM deliverables WHERE id = $1")
                        .bind(deliverable_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(db_err)?;

                match current {
                    None => Err(EngineError::not_found(format!(
                        "deliverable {}",
                        deliverable_id
                    ))),
                    Some(current) => Err(EngineError::conflict(format!(
                        "deliverable {} is {} (expected {})",
                        deliverable_id,
                        current,
                        expected.as_str()
                    ))),
                }
            }
        }
    }

    async fn finish_order_if_fulfilled(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            r#"
            UPDATE orders SET status = 'DELIVERED', updated_at = $2
            WHERE id = $1 AND status = 'IN_PROGRESS'
              AND EXISTS (SELECT 1 FROM deliverables d WHERE d.order_id = $1)
              AND NOT EXISTS (
                  SELECT 1 FROM deliverables d
                  WHERE d.order_id = $1 AND d.status IN ('PENDING', 'REVISION_REQUESTED')
              )
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        let change = OrderStatusChange {
            id: Uuid::new_v4(),
            order_id,
            from_status: Some(OrderStatus::InProgress),
            to_status: OrderStatus::Delivered,
            changed_at: now,
            changed_by: Some("SYSTEM".to_string()),
            notes: Some("All deliverables submitted".to_string()),
        };
        insert_status_change(&mut tx, &change).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        change: &OrderStatusChange,
    ) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(order_id)
        .bind(change.to_status.as_str())
        .bind(change.changed_at)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(order_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?;

            return match current {
                None => Err(EngineError::not_found(format!("order {}", order_id))),
                Some(current) => Err(EngineError::conflict(format!(
                    "order {} is {} (expected {})",
                    order_id,
                    current,
                    expected.as_str()
                ))),
            };
        }

        insert_status_change(&mut tx, change).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update_procurement(
        &self,
        order_id: Uuid,
        status: ProcurementStatus,
        purchase_order_number: Option<&str>,
    ) -> Result<(), EngineError> {
        let updated = sqlx::query(
            "UPDATE orders SET procurement_status = $2, purchase_order_number = COALESCE($3, purchase_order_number), updated_at = $4 WHERE id = $1",
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(purchase_order_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Err(EngineError::not_found(format!("order {}", order_id)));
        }
        Ok(())
    }
}

async fn insert_status_change(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    change: &OrderStatusChange,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        INSERT INTO order_status_changes (id, order_id, from_status, to_status, changed_at, changed_by, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(change.id)
    .bind(change.order_id)
    .bind(change.from_status.map(|s| s.as_str()))
    .bind(change.to_status.as_str())
    .bind(change.changed_at)
    .bind(&change.changed_by)
    .bind(&change.notes)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}
