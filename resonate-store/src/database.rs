use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::info;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Operator-tunable overrides layered over the file-config defaults.
    /// Expected row format: `{"value": <number>}` keyed by rule name.
    pub async fn fetch_business_rules(
        &self,
        defaults: BusinessRules,
    ) -> Result<BusinessRules, sqlx::Error> {
        let rows = sqlx::query("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;

        for row in rows {
            let rule_key: String = row.try_get("rule_key")?;
            let rule_value: serde_json::Value = row.try_get("rule_value")?;

            if let Some(v) = rule_value.get("value") {
                match rule_key.as_str() {
                    "platform_fee_rate" => {
                        if let Some(f) = v.as_f64() {
                            rules.platform_fee_rate = f;
                        }
                    }
                    "default_delivery_days" => {
                        if let Some(d) = v.as_i64() {
                            rules.default_delivery_days = d;
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(rules)
    }
}
