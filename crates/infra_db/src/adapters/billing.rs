//! Billing store over customers, packages, invoices, payments and commissions

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    CompanyId, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PackageId, PortError,
    TenantContext, UserId,
};
use domain_billing::{
    BillingStore, CommissionStatus, Customer, CustomerQuery, CustomerStatus, CustomerType, Invoice, InvoiceQuery,
    InvoiceStatus, Package, Payment, PaymentMethod, PaymentRecord, RecordedPayment, ResellerCommission,
    ResellerProfile,
};

use super::{parse_column, ping};
use crate::error::{port, DatabaseError};
use crate::tenant::read_filter;

const CUSTOMER_COLUMNS: &str = "id, company_id, name, phone, email, username, ppp_password, nid, ip_address, \
    mac_address, notes, package_id, pop_id, router_id, reseller_id, customer_type, status, activation_date, \
    expiry_date, created_at, updated_at";

const PACKAGE_COLUMNS: &str =
    "id, company_id, name, price, vat_percent, duration_days, profile, is_expired_package, created_at";

const INVOICE_COLUMNS: &str = "id, company_id, customer_id, invoice_number, billing_date, due_date, base_price, \
    vat_amount, total_amount, status, payment_date, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, company_id, customer_id, invoice_id, amount, payment_method, payment_gateway, \
    transaction_id, operator_id, payment_date";

const COMMISSION_COLUMNS: &str = "id, company_id, reseller_id, customer_id, payment_id, base_amount, \
    commission_percent, commission_amount, status, paid_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    username: String,
    ppp_password: String,
    nid: Option<String>,
    ip_address: Option<String>,
    mac_address: Option<String>,
    notes: Option<String>,
    package_id: Option<Uuid>,
    pop_id: Option<Uuid>,
    router_id: Option<Uuid>,
    reseller_id: Option<Uuid>,
    customer_type: String,
    status: String,
    activation_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = PortError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: row.id.into(),
            company_id: row.company_id.into(),
            name: row.name,
            phone: row.phone,
            email: row.email,
            username: row.username,
            ppp_password: row.ppp_password,
            nid: row.nid,
            ip_address: row.ip_address,
            mac_address: row.mac_address,
            notes: row.notes,
            package_id: row.package_id.map(Into::into),
            pop_id: row.pop_id.map(Into::into),
            router_id: row.router_id.map(Into::into),
            reseller_id: row.reseller_id.map(Into::into),
            customer_type: parse_column::<CustomerType>("customers", &row.customer_type)?,
            status: parse_column::<CustomerStatus>("customers", &row.status)?,
            activation_date: row.activation_date,
            expiry_date: row.expiry_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PackageRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    price: Decimal,
    vat_percent: Option<Decimal>,
    duration_days: i32,
    profile: Option<String>,
    is_expired_package: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PackageRow> for Package {
    type Error = PortError;

    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        Ok(Package {
            id: row.id.into(),
            company_id: row.company_id.into(),
            name: row.name,
            price: row.price,
            vat_percent: row.vat_percent,
            duration_days: super::to_u32("packages", row.duration_days)?,
            profile: row.profile,
            is_expired_package: row.is_expired_package,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    company_id: Uuid,
    customer_id: Uuid,
    invoice_number: String,
    billing_date: NaiveDate,
    due_date: NaiveDate,
    base_price: Decimal,
    vat_amount: Decimal,
    total_amount: Decimal,
    status: String,
    payment_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = PortError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: row.id.into(),
            company_id: row.company_id.into(),
            customer_id: row.customer_id.into(),
            invoice_number: row.invoice_number,
            billing_date: row.billing_date,
            due_date: row.due_date,
            base_price: row.base_price,
            vat_amount: row.vat_amount,
            total_amount: row.total_amount,
            status: parse_column::<InvoiceStatus>("invoices", &row.status)?,
            payment_date: row.payment_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    company_id: Uuid,
    customer_id: Uuid,
    invoice_id: Option<Uuid>,
    amount: Decimal,
    payment_method: String,
    payment_gateway: Option<String>,
    transaction_id: Option<String>,
    operator_id: Option<Uuid>,
    payment_date: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PortError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id.into(),
            company_id: row.company_id.into(),
            customer_id: row.customer_id.into(),
            invoice_id: row.invoice_id.map(Into::into),
            amount: row.amount,
            payment_method: parse_column::<PaymentMethod>("payments", &row.payment_method)?,
            payment_gateway: row.payment_gateway,
            transaction_id: row.transaction_id,
            operator_id: row.operator_id.map(Into::into),
            payment_date: row.payment_date,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommissionRow {
    id: Uuid,
    company_id: Uuid,
    reseller_id: Uuid,
    customer_id: Uuid,
    payment_id: Option<Uuid>,
    base_amount: Decimal,
    commission_percent: Decimal,
    commission_amount: Decimal,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommissionRow> for ResellerCommission {
    type Error = PortError;

    fn try_from(row: CommissionRow) -> Result<Self, Self::Error> {
        Ok(ResellerCommission {
            id: row.id.into(),
            company_id: row.company_id.into(),
            reseller_id: row.reseller_id.into(),
            customer_id: row.customer_id.into(),
            payment_id: row.payment_id.map(Into::into),
            base_amount: row.base_amount,
            commission_percent: row.commission_percent,
            commission_amount: row.commission_amount,
            status: parse_column::<CommissionStatus>("reseller_commissions", &row.status)?,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

/// Reads the owner of a row under `FOR UPDATE` and checks it against `ctx`
pub(crate) async fn lock_owner(
    tx: &mut Transaction<'_, Postgres>,
    ctx: &TenantContext,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
) -> Result<CompanyId, PortError> {
    let owner: Uuid = sqlx::query_scalar(&format!("SELECT company_id FROM {table} WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(port)?
        .ok_or_else(|| DatabaseError::not_found(entity, id))?;
    let owner = CompanyId::from(owner);
    ctx.authorize_write(owner)?;
    Ok(owner)
}

async fn insert_commission_in(
    tx: &mut Transaction<'_, Postgres>,
    commission: &ResellerCommission,
) -> Result<(), PortError> {
    sqlx::query(&format!(
        "INSERT INTO reseller_commissions ({COMMISSION_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    ))
    .bind(Uuid::from(commission.id))
    .bind(Uuid::from(commission.company_id))
    .bind(Uuid::from(commission.reseller_id))
    .bind(Uuid::from(commission.customer_id))
    .bind(commission.payment_id.map(Uuid::from))
    .bind(commission.base_amount)
    .bind(commission.commission_percent)
    .bind(commission.commission_amount)
    .bind(commission.status.as_str())
    .bind(commission.paid_at)
    .bind(commission.created_at)
    .execute(&mut **tx)
    .await
    .map_err(port)?;
    Ok(())
}

/// Writes a payment, its invoice reconciliation and its commission inside `tx`
///
/// The invoice row is locked before its payments are summed, so two
/// payments against one invoice reconcile one after the other.
pub(crate) async fn write_payment(
    tx: &mut Transaction<'_, Postgres>,
    ctx: &TenantContext,
    record: &PaymentRecord,
) -> Result<RecordedPayment, PortError> {
    let mut payment = record.payment.clone();
    payment.company_id = ctx.stamp(payment.company_id)?;

    let invoice = match payment.invoice_id {
        Some(invoice_id) => {
            let mut invoice: Invoice = sqlx::query_as::<_, InvoiceRow>(&format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE"
            ))
            .bind(Uuid::from(invoice_id))
            .fetch_optional(&mut **tx)
            .await
            .map_err(port)?
            .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))?
            .try_into()?;
            ctx.authorize_write(invoice.company_id)?;

            let paid: Decimal =
                sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1")
                    .bind(Uuid::from(invoice_id))
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(port)?;
            invoice
                .reconcile(paid + payment.amount, payment.payment_date)
                .map_err(|err| PortError::conflict(err.to_string()))?;

            sqlx::query("UPDATE invoices SET status = $2, payment_date = $3, updated_at = $4 WHERE id = $1")
                .bind(Uuid::from(invoice.id))
                .bind(invoice.status.as_str())
                .bind(invoice.payment_date)
                .bind(invoice.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(port)?;
            Some(invoice)
        }
        None => None,
    };

    sqlx::query(&format!(
        "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    ))
    .bind(Uuid::from(payment.id))
    .bind(Uuid::from(payment.company_id))
    .bind(Uuid::from(payment.customer_id))
    .bind(payment.invoice_id.map(Uuid::from))
    .bind(payment.amount)
    .bind(payment.payment_method.as_str())
    .bind(&payment.payment_gateway)
    .bind(&payment.transaction_id)
    .bind(payment.operator_id.map(Uuid::from))
    .bind(payment.payment_date)
    .execute(&mut **tx)
    .await
    .map_err(port)?;

    if let Some(commission) = &record.commission {
        let mut commission = commission.clone();
        commission.company_id = ctx.stamp(commission.company_id)?;
        insert_commission_in(tx, &commission).await?;
    }

    Ok(RecordedPayment { payment, invoice })
}

/// PostgreSQL-backed `BillingStore`
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl HealthCheckable for PostgresBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-billing-store").await
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    #[instrument(skip(self, ctx), fields(customer_id = %id))]
    async fn get_customer(&self, ctx: &TenantContext, id: CustomerId) -> Result<Customer, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 AND ($2::uuid IS NULL OR company_id = $2)"
        ))
        .bind(Uuid::from(id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?
        .ok_or_else(|| DatabaseError::not_found("Customer", id))?;
        row.try_into()
    }

    async fn find_customer_by_username(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        username: &str,
    ) -> Result<Option<Customer>, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE company_id = $1 AND username = $2 AND ($3::uuid IS NULL OR company_id = $3)"
        ))
        .bind(Uuid::from(company_id))
        .bind(username)
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?;
        row.map(Customer::try_from).transpose()
    }

    async fn email_taken(&self, ctx: &TenantContext, company_id: CompanyId, email: &str) -> Result<bool, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM customers \
             WHERE company_id = $1 AND LOWER(email) = LOWER($2) AND ($3::uuid IS NULL OR company_id = $3))",
        )
        .bind(Uuid::from(company_id))
        .bind(email)
        .bind(filter)
        .fetch_one(&self.pool)
        .await
        .map_err(port)
    }

    #[instrument(skip(self, ctx, customer), fields(customer_id = %customer.id))]
    async fn insert_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<Customer, PortError> {
        let mut stored = customer.clone();
        stored.company_id = ctx.stamp(customer.company_id)?;

        sqlx::query(&format!(
            "INSERT INTO customers ({CUSTOMER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)"
        ))
        .bind(Uuid::from(stored.id))
        .bind(Uuid::from(stored.company_id))
        .bind(&stored.name)
        .bind(&stored.phone)
        .bind(&stored.email)
        .bind(&stored.username)
        .bind(&stored.ppp_password)
        .bind(&stored.nid)
        .bind(&stored.ip_address)
        .bind(&stored.mac_address)
        .bind(&stored.notes)
        .bind(stored.package_id.map(Uuid::from))
        .bind(stored.pop_id.map(Uuid::from))
        .bind(stored.router_id.map(Uuid::from))
        .bind(stored.reseller_id.map(Uuid::from))
        .bind(stored.customer_type.as_str())
        .bind(stored.status.as_str())
        .bind(stored.activation_date)
        .bind(stored.expiry_date)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;

        debug!(company_id = %stored.company_id, "customer inserted");
        Ok(stored)
    }

    #[instrument(skip(self, ctx, customer), fields(customer_id = %customer.id))]
    async fn update_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;
        lock_owner(&mut tx, ctx, "customers", "Customer", customer.id.into()).await?;

        sqlx::query(
            "UPDATE customers SET name = $2, phone = $3, email = $4, username = $5, ppp_password = $6, nid = $7, \
             ip_address = $8, mac_address = $9, notes = $10, package_id = $11, pop_id = $12, router_id = $13, \
             reseller_id = $14, customer_type = $15, status = $16, activation_date = $17, expiry_date = $18, \
             updated_at = $19 \
             WHERE id = $1",
        )
        .bind(Uuid::from(customer.id))
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.username)
        .bind(&customer.ppp_password)
        .bind(&customer.nid)
        .bind(&customer.ip_address)
        .bind(&customer.mac_address)
        .bind(&customer.notes)
        .bind(customer.package_id.map(Uuid::from))
        .bind(customer.pop_id.map(Uuid::from))
        .bind(customer.router_id.map(Uuid::from))
        .bind(customer.reseller_id.map(Uuid::from))
        .bind(customer.customer_type.as_str())
        .bind(customer.status.as_str())
        .bind(customer.activation_date)
        .bind(customer.expiry_date)
        .bind(customer.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(port)?;

        tx.commit().await.map_err(port)
    }

    async fn list_customers(&self, ctx: &TenantContext, query: &CustomerQuery) -> Result<Vec<Customer>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE ($1::uuid IS NULL OR company_id = $1) \
               AND ($2::uuid IS NULL OR company_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
               AND ($4::uuid IS NULL OR reseller_id = $4) \
               AND ($5::date IS NULL OR expiry_date = $5) \
               AND ($6::date IS NULL OR expiry_date IS NULL OR expiry_date < $6) \
             ORDER BY created_at \
             LIMIT $7"
        ))
        .bind(filter)
        .bind(query.company_id.map(Uuid::from))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.reseller_id.map(Uuid::from))
        .bind(query.expiring_on)
        .bind(query.expired_before)
        .bind(query.limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(Customer::try_from)
        .collect()
    }

    async fn get_package(&self, ctx: &TenantContext, id: PackageId) -> Result<Package, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = $1 AND ($2::uuid IS NULL OR company_id = $2)"
        ))
        .bind(Uuid::from(id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?
        .ok_or_else(|| DatabaseError::not_found("Package", id))?;
        row.try_into()
    }

    async fn insert_package(&self, ctx: &TenantContext, package: &Package) -> Result<Package, PortError> {
        let mut stored = package.clone();
        stored.company_id = ctx.stamp(package.company_id)?;
        let duration = i32::try_from(stored.duration_days)
            .map_err(|_| PortError::validation_field("duration too long", "duration_days"))?;

        sqlx::query(&format!(
            "INSERT INTO packages ({PACKAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(Uuid::from(stored.id))
        .bind(Uuid::from(stored.company_id))
        .bind(&stored.name)
        .bind(stored.price)
        .bind(stored.vat_percent)
        .bind(duration)
        .bind(&stored.profile)
        .bind(stored.is_expired_package)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(stored)
    }

    async fn find_expired_package(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<Option<Package>, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages \
             WHERE company_id = $1 AND is_expired_package AND ($2::uuid IS NULL OR company_id = $2) \
             ORDER BY created_at LIMIT 1"
        ))
        .bind(Uuid::from(company_id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?;
        row.map(Package::try_from).transpose()
    }

    async fn list_packages(&self, ctx: &TenantContext) -> Result<Vec<Package>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages WHERE ($1::uuid IS NULL OR company_id = $1) ORDER BY name"
        ))
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(Package::try_from)
        .collect()
    }

    #[instrument(skip(self, ctx), fields(company_id = %company_id))]
    async fn allocate_invoice_sequence(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        date: NaiveDate,
    ) -> Result<u32, PortError> {
        ctx.authorize_write(company_id)?;
        let value: i32 = sqlx::query_scalar(
            "INSERT INTO invoice_sequences (company_id, billing_date, last_value) VALUES ($1, $2, 1) \
             ON CONFLICT (company_id, billing_date) \
             DO UPDATE SET last_value = invoice_sequences.last_value + 1 \
             RETURNING last_value",
        )
        .bind(Uuid::from(company_id))
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(port)?;
        super::to_u32("invoice_sequences", value)
    }

    #[instrument(skip(self, ctx, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&self, ctx: &TenantContext, invoice: &Invoice) -> Result<Invoice, PortError> {
        let mut stored = invoice.clone();
        stored.company_id = ctx.stamp(invoice.company_id)?;

        sqlx::query(&format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(Uuid::from(stored.id))
        .bind(Uuid::from(stored.company_id))
        .bind(Uuid::from(stored.customer_id))
        .bind(&stored.invoice_number)
        .bind(stored.billing_date)
        .bind(stored.due_date)
        .bind(stored.base_price)
        .bind(stored.vat_amount)
        .bind(stored.total_amount)
        .bind(stored.status.as_str())
        .bind(stored.payment_date)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(stored)
    }

    async fn get_invoice(&self, ctx: &TenantContext, id: InvoiceId) -> Result<Invoice, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND ($2::uuid IS NULL OR company_id = $2)"
        ))
        .bind(Uuid::from(id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?
        .ok_or_else(|| DatabaseError::not_found("Invoice", id))?;
        row.try_into()
    }

    async fn list_invoices(&self, ctx: &TenantContext, query: &InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE ($1::uuid IS NULL OR company_id = $1) \
               AND ($2::uuid IS NULL OR customer_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY invoice_number DESC \
             LIMIT $4"
        ))
        .bind(filter)
        .bind(query.customer_id.map(Uuid::from))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(Invoice::try_from)
        .collect()
    }

    async fn has_unpaid_invoices(&self, ctx: &TenantContext, customer_id: CustomerId) -> Result<bool, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM invoices \
             WHERE customer_id = $1 AND status = 'unpaid' AND ($2::uuid IS NULL OR company_id = $2))",
        )
        .bind(Uuid::from(customer_id))
        .bind(filter)
        .fetch_one(&self.pool)
        .await
        .map_err(port)
    }

    #[instrument(skip(self, ctx, record), fields(payment_id = %record.payment.id))]
    async fn record_payment(&self, ctx: &TenantContext, record: &PaymentRecord) -> Result<RecordedPayment, PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;
        let recorded = write_payment(&mut tx, ctx, record).await?;
        tx.commit().await.map_err(port)?;

        debug!(company_id = %recorded.payment.company_id, "payment recorded");
        Ok(recorded)
    }

    async fn payments_total_for_invoice(&self, ctx: &TenantContext, invoice_id: InvoiceId) -> Result<Decimal, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payments \
             WHERE invoice_id = $1 AND ($2::uuid IS NULL OR company_id = $2)",
        )
        .bind(Uuid::from(invoice_id))
        .bind(filter)
        .fetch_one(&self.pool)
        .await
        .map_err(port)
    }

    async fn list_payments(&self, ctx: &TenantContext, customer_id: Option<CustomerId>) -> Result<Vec<Payment>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE ($1::uuid IS NULL OR company_id = $1) AND ($2::uuid IS NULL OR customer_id = $2) \
             ORDER BY payment_date"
        ))
        .bind(filter)
        .bind(customer_id.map(Uuid::from))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(Payment::try_from)
        .collect()
    }

    async fn get_reseller_profile(&self, ctx: &TenantContext, user_id: UserId) -> Result<Option<ResellerProfile>, PortError> {
        let filter = read_filter(ctx)?;
        let row: Option<(Uuid, Uuid, Option<Decimal>)> = sqlx::query_as(
            "SELECT user_id, company_id, commission_percent FROM reseller_profiles \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR company_id = $2)",
        )
        .bind(Uuid::from(user_id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?;

        Ok(row.map(|(user_id, company_id, commission_percent)| ResellerProfile {
            user_id: user_id.into(),
            company_id: company_id.into(),
            commission_percent,
        }))
    }

    async fn save_reseller_profile(&self, ctx: &TenantContext, profile: &ResellerProfile) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;
        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT company_id FROM reseller_profiles WHERE user_id = $1 FOR UPDATE")
                .bind(Uuid::from(profile.user_id))
                .fetch_optional(&mut *tx)
                .await
                .map_err(port)?;
        let owner = match existing {
            Some(owner) => {
                let owner = CompanyId::from(owner);
                ctx.authorize_write(owner)?;
                owner
            }
            None => ctx.stamp(profile.company_id)?,
        };

        sqlx::query(
            "INSERT INTO reseller_profiles (user_id, company_id, commission_percent) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET commission_percent = EXCLUDED.commission_percent",
        )
        .bind(Uuid::from(profile.user_id))
        .bind(Uuid::from(owner))
        .bind(profile.commission_percent)
        .execute(&mut *tx)
        .await
        .map_err(port)?;

        tx.commit().await.map_err(port)
    }

    async fn insert_commission(
        &self,
        ctx: &TenantContext,
        commission: &ResellerCommission,
    ) -> Result<ResellerCommission, PortError> {
        let mut stored = commission.clone();
        stored.company_id = ctx.stamp(commission.company_id)?;
        let mut tx = self.pool.begin().await.map_err(port)?;
        insert_commission_in(&mut tx, &stored).await?;
        tx.commit().await.map_err(port)?;
        Ok(stored)
    }

    async fn list_commissions(
        &self,
        ctx: &TenantContext,
        reseller_id: Option<UserId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<ResellerCommission>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, CommissionRow>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM reseller_commissions \
             WHERE ($1::uuid IS NULL OR company_id = $1) \
               AND ($2::uuid IS NULL OR reseller_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY created_at"
        ))
        .bind(filter)
        .bind(reseller_id.map(Uuid::from))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(ResellerCommission::try_from)
        .collect()
    }
}
