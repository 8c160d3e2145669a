//! Aggregates for the staff dashboard.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardCounts {
    pub pending_orders: i64,
    pub pending_prescriptions: i64,
    pub pending_refills: i64,
    pub pending_transfers: i64,
    pub upcoming_appointments: i64,
    pub new_contact_messages: i64,
    pub unread_staff_notifications: i64,
    pub orders_today: i64,
    pub revenue_today: Decimal,
    pub revenue_30d: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub counts: DashboardCounts,
    pub low_stock: Vec<LowStockProduct>,
}

pub async fn load_stats(pool: &PgPool, low_stock_threshold: i32) -> Result<DashboardStats, sqlx::Error> {
    let counts = sqlx::query_as::<_, DashboardCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
            (SELECT COUNT(*) FROM prescriptions WHERE status = 'pending') AS pending_prescriptions,
            (SELECT COUNT(*) FROM refill_requests WHERE status = 'pending') AS pending_refills,
            (SELECT COUNT(*) FROM transfer_requests WHERE status = 'pending') AS pending_transfers,
            (SELECT COUNT(*) FROM appointments
                WHERE preferred_date >= CURRENT_DATE
                  AND status IN ('pending', 'confirmed')) AS upcoming_appointments,
            (SELECT COUNT(*) FROM contact_forms WHERE status = 'new') AS new_contact_messages,
            (SELECT COUNT(*) FROM notifications
                WHERE audience = 'staff' AND NOT is_read) AS unread_staff_notifications,
            (SELECT COUNT(*) FROM orders WHERE created_at >= date_trunc('day', NOW())) AS orders_today,
            (SELECT COALESCE(SUM(total), 0) FROM orders
                WHERE payment_status = 'paid'
                  AND created_at >= date_trunc('day', NOW())) AS revenue_today,
            (SELECT COALESCE(SUM(total), 0) FROM orders
                WHERE payment_status = 'paid'
                  AND created_at >= NOW() - INTERVAL '30 days') AS revenue_30d
        "#,
    )
    .fetch_one(pool)
    .await?;

    let low_stock = sqlx::query_as::<_, LowStockProduct>(
        r#"
        SELECT id, name, sku, stock_quantity FROM products
        WHERE is_active AND stock_quantity <= $1
        ORDER BY stock_quantity, name
        LIMIT 50
        "#,
    )
    .bind(low_stock_threshold)
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats { counts, low_stock })
}
