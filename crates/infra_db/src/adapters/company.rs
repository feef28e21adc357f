//! Company directory over the `companies` table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{CompanyId, DomainPort, HealthCheckResult, HealthCheckable, PortError, Timezone};
use domain_tenancy::{Company, CompanyDirectory, CompanyStatus};

use super::{parse_column, ping};
use crate::error::{port, DatabaseError};

const COLUMNS: &str = "id, name, domain, subdomain, status, billing_day, vat_percent, currency, \
                       timezone, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    domain: Option<String>,
    subdomain: Option<String>,
    status: String,
    billing_day: i16,
    vat_percent: Decimal,
    currency: String,
    timezone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CompanyRow> for Company {
    type Error = PortError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        Ok(Company {
            id: row.id.into(),
            name: row.name,
            domain: row.domain,
            subdomain: row.subdomain,
            status: parse_column::<CompanyStatus>("companies", &row.status)?,
            billing_day: u8::try_from(row.billing_day).map_err(|e| DatabaseError::corrupt("companies", e))?,
            vat_percent: row.vat_percent,
            currency: row.currency,
            timezone: parse_column::<Timezone>("companies", &row.timezone)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed `CompanyDirectory`
#[derive(Debug, Clone)]
pub struct PostgresCompanyDirectory {
    pool: PgPool,
}

impl PostgresCompanyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresCompanyDirectory {}

#[async_trait]
impl HealthCheckable for PostgresCompanyDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-company-directory").await
    }
}

#[async_trait]
impl CompanyDirectory for PostgresCompanyDirectory {
    #[instrument(skip(self), fields(company_id = %id))]
    async fn get_company(&self, id: CompanyId) -> Result<Company, PortError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!("SELECT {COLUMNS} FROM companies WHERE id = $1"))
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(port)?
            .ok_or_else(|| DatabaseError::not_found("Company", id))?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_by_host(&self, domain: &str, subdomain: Option<&str>) -> Result<Option<Company>, PortError> {
        debug!("resolving company by host");
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COLUMNS} FROM companies \
             WHERE domain = $1 OR ($2::text IS NOT NULL AND subdomain = $2) \
             ORDER BY (domain = $1) DESC NULLS LAST \
             LIMIT 1"
        ))
        .bind(domain)
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?;
        row.map(Company::try_from).transpose()
    }

    async fn list_companies(&self, status: Option<CompanyStatus>) -> Result<Vec<Company>, PortError> {
        sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COLUMNS} FROM companies WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(Company::try_from)
        .collect()
    }

    async fn host_key_taken(&self, key: &str, exclude: Option<CompanyId>) -> Result<bool, PortError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM companies \
             WHERE (domain = $1 OR subdomain = $1) AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(key)
        .bind(exclude.map(Uuid::from))
        .fetch_one(&self.pool)
        .await
        .map_err(port)
    }

    #[instrument(skip(self, company), fields(company_id = %company.id))]
    async fn insert_company(&self, company: &Company) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO companies (id, name, domain, subdomain, status, billing_day, vat_percent, \
             currency, timezone, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::from(company.id))
        .bind(&company.name)
        .bind(&company.domain)
        .bind(&company.subdomain)
        .bind(company.status.as_str())
        .bind(i16::from(company.billing_day))
        .bind(company.vat_percent)
        .bind(&company.currency)
        .bind(company.timezone.name())
        .bind(company.created_at)
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(())
    }

    #[instrument(skip(self, company), fields(company_id = %company.id))]
    async fn update_company(&self, company: &Company) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE companies SET name = $2, domain = $3, subdomain = $4, status = $5, billing_day = $6, \
             vat_percent = $7, currency = $8, timezone = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(Uuid::from(company.id))
        .bind(&company.name)
        .bind(&company.domain)
        .bind(&company.subdomain)
        .bind(company.status.as_str())
        .bind(i16::from(company.billing_day))
        .bind(company.vat_percent)
        .bind(&company.currency)
        .bind(company.timezone.name())
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Company", company.id).into());
        }
        Ok(())
    }
}
