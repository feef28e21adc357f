//! Bulk orchestration
//!
//! Verbs run chunk by chunk; each chunk is one store call and commits on its
//! own. Imports create customers one row at a time through `CustomerService`.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use core_kernel::{BulkImportId, Clock, CompanyId, CustomerId, PackageId, TenantContext, UserId};
use domain_billing::{BillingError, CustomerService, CustomerStatus};
use domain_tenancy::CompanyDirectory;

use crate::error::BulkError;
use crate::import::{BulkImport, FieldMapping, MappedRow};
use crate::operation::{BulkOutcome, BulkVerb, DEFAULT_CHUNK_SIZE};
use crate::ports::BulkStore;

#[derive(Clone)]
pub struct BulkService {
    store: Arc<dyn BulkStore>,
    customers: CustomerService,
    companies: Arc<dyn CompanyDirectory>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

impl BulkService {
    pub fn new(
        store: Arc<dyn BulkStore>,
        customers: CustomerService,
        companies: Arc<dyn CompanyDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            customers,
            companies,
            clock,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Applies `verb` to every id, chunk by chunk
    ///
    /// A chunk that fails is counted in `failed_chunks` with its message and
    /// the remaining chunks still run.
    #[instrument(skip(self, ctx, ids), fields(verb = verb.name(), requested = ids.len()))]
    pub async fn execute(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        ids: &[CustomerId],
        verb: BulkVerb,
    ) -> Result<BulkOutcome, BulkError> {
        let company_id = ctx.stamp(company_id)?;
        match verb {
            BulkVerb::ExtendExpiry { days } if days == 0 => {
                return Err(BulkError::Validation("days must be at least 1".to_string()));
            }
            BulkVerb::ChangePackage { package_id } => {
                self.ensure_package(ctx, package_id).await?;
            }
            _ => {}
        }

        let company = self.companies.get_company(company_id).await?;
        let today = self.clock.today_in(company.timezone);

        let mut outcome = BulkOutcome {
            requested: ids.len(),
            ..Default::default()
        };
        for (index, chunk) in ids.chunks(self.chunk_size).enumerate() {
            let result = match verb {
                BulkVerb::ExtendExpiry { days } => self.store.extend_expiry(ctx, chunk, days, today).await,
                BulkVerb::ChangePackage { package_id } => self.store.change_package(ctx, chunk, package_id).await,
                BulkVerb::Enable => self.store.set_status(ctx, chunk, CustomerStatus::Active).await,
                BulkVerb::Disable => self.store.set_status(ctx, chunk, CustomerStatus::Suspended).await,
                BulkVerb::Delete => self.store.set_status(ctx, chunk, CustomerStatus::Deleted).await,
            };
            match result {
                Ok(affected) => outcome.affected += affected,
                Err(err) => {
                    warn!(chunk = index + 1, error = %err, "bulk chunk failed");
                    outcome.failed_chunks += 1;
                    outcome.errors.push(format!("Chunk {}: {}", index + 1, err));
                }
            }
        }

        info!(
            company_id = %company_id,
            affected = outcome.affected,
            failed_chunks = outcome.failed_chunks,
            "bulk {} finished",
            verb.name()
        );
        Ok(outcome)
    }

    pub async fn extend_expiry(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        ids: &[CustomerId],
        days: u32,
    ) -> Result<BulkOutcome, BulkError> {
        self.execute(ctx, company_id, ids, BulkVerb::ExtendExpiry { days }).await
    }

    pub async fn change_package(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        ids: &[CustomerId],
        package_id: PackageId,
    ) -> Result<BulkOutcome, BulkError> {
        self.execute(ctx, company_id, ids, BulkVerb::ChangePackage { package_id })
            .await
    }

    async fn ensure_package(&self, ctx: &TenantContext, package_id: PackageId) -> Result<(), BulkError> {
        let visible = self
            .customers
            .list_packages(ctx)
            .await?
            .iter()
            .any(|p| p.id == package_id);
        if visible {
            Ok(())
        } else {
            Err(BulkError::Billing(BillingError::PackageNotFound(package_id.to_string())))
        }
    }

    /// Imports customers from CSV
    ///
    /// The import record is written as `processing` before any row is read.
    /// Unreadable input marks it `failed`; otherwise it ends `completed` with
    /// one `Row N: message` line per rejected row.
    #[instrument(skip(self, ctx, file_name, data, mapping), fields(file_name = %file_name))]
    pub async fn import_customers(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        user_id: Option<UserId>,
        file_name: &str,
        data: &[u8],
        mapping: &FieldMapping,
    ) -> Result<BulkImport, BulkError> {
        mapping.validate().map_err(BulkError::Validation)?;
        let company_id = ctx.stamp(company_id)?;

        let mut import = self
            .store
            .insert_import(ctx, &BulkImport::start(company_id, user_id, file_name))
            .await?;

        match self.import_rows(ctx, company_id, &mut import, data, mapping).await {
            Ok(errors) => {
                import.complete(&errors, self.clock.now());
                info!(
                    import_id = %import.id,
                    total = import.total_records,
                    success = import.success_records,
                    failed = import.failed_records,
                    "customer import completed"
                );
            }
            Err(err) => {
                warn!(import_id = %import.id, error = %err, "customer import failed");
                import.fail(err.to_string(), self.clock.now());
            }
        }
        self.store.update_import(ctx, &import).await?;
        Ok(import)
    }

    async fn import_rows(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        import: &mut BulkImport,
        data: &[u8],
        mapping: &FieldMapping,
    ) -> Result<Vec<String>, BulkError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);
        let columns = mapping.resolve(reader.headers()?);
        let records: Vec<_> = reader.records().collect();
        import.total_records = record_count(records.len())?;

        let packages = self.customers.list_packages(ctx).await?;
        let mut errors = Vec::new();

        for record in records {
            let result = match record {
                Ok(record) => match MappedRow::new(&record, &columns).to_new_customer(&packages) {
                    Ok(request) => self
                        .customers
                        .create_customer(ctx, company_id, request)
                        .await
                        .map(|_| ())
                        .map_err(|err| row_message(&err)),
                    Err(message) => Err(message),
                },
                Err(err) => Err(err.to_string()),
            };

            match result {
                Ok(()) => import.success_records += 1,
                Err(message) => {
                    import.failed_records += 1;
                    errors.push(format!(
                        "Row {}: {}",
                        import.success_records + import.failed_records,
                        message
                    ));
                }
            }
        }
        Ok(errors)
    }

    pub async fn get_import(&self, ctx: &TenantContext, id: BulkImportId) -> Result<BulkImport, BulkError> {
        Ok(self.store.get_import(ctx, id).await?)
    }

    pub async fn list_imports(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<BulkImport>, BulkError> {
        Ok(self.store.list_imports(ctx, limit).await?)
    }
}

fn record_count(len: usize) -> Result<u32, BulkError> {
    u32::try_from(len).map_err(|_| BulkError::Validation(format!("too many rows in import: {}", len)))
}

fn row_message(err: &BillingError) -> String {
    match err {
        BillingError::Validation(message) => message.clone(),
        BillingError::Duplicate { field, value } => format!("{} '{}' has already been taken", field, value),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use core_kernel::{FixedClock, TenancyError};
    use domain_billing::ports::mock::MockBillingStore;
    use domain_billing::{Customer, NewCustomer, NewPackage, Package};
    use domain_tenancy::{Company, MockCompanyDirectory, NewCompany, TenancyConfig};

    use crate::import::ImportStatus;
    use crate::ports::mock::MockBulkStore;

    struct Fixture {
        service: BulkService,
        billing: MockBillingStore,
        company_a: CompanyId,
        company_b: CompanyId,
    }

    fn company(name: &str, subdomain: &str) -> Company {
        let request = NewCompany {
            name: name.to_string(),
            subdomain: Some(subdomain.to_string()),
            ..Default::default()
        };
        Company::from_request(request, &TenancyConfig::default().company_defaults())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    async fn fixture() -> Fixture {
        let a = company("Alpha Net", "alpha");
        let b = company("Beta Net", "beta");
        let (company_a, company_b) = (a.id, b.id);
        let directory: Arc<dyn CompanyDirectory> = Arc::new(MockCompanyDirectory::with_companies(vec![a, b]).await);
        let billing = MockBillingStore::new();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_date(today()));
        let customers = CustomerService::new(Arc::new(billing.clone()), directory.clone(), clock.clone());
        let service = BulkService::new(
            Arc::new(MockBulkStore::new(&billing)),
            customers,
            directory,
            clock,
        );
        Fixture {
            service,
            billing,
            company_a,
            company_b,
        }
    }

    async fn seed(f: &Fixture, company_id: CompanyId, username: &str, expiry: Option<NaiveDate>) -> CustomerId {
        let request = NewCustomer {
            name: username.to_string(),
            phone: "01700000000".to_string(),
            username: username.to_string(),
            password: "secret1".to_string(),
            expiry_date: expiry,
            ..Default::default()
        };
        let customer = Customer::from_request(company_id, request, today());
        let id = customer.id;
        f.billing.seed_customer(customer).await;
        id
    }

    #[tokio::test]
    async fn test_extend_expiry_counts_across_chunks() {
        let f = fixture().await;
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(seed(&f, f.company_a, &format!("user{}", i), Some(today())).await);
        }
        ids.push(seed(&f, f.company_a, "noexpiry", None).await);
        ids.push(CustomerId::new());

        let ctx = TenantContext::tenant(f.company_a);
        let outcome = f
            .service
            .clone()
            .with_chunk_size(2)
            .extend_expiry(&ctx, f.company_a, &ids, 30)
            .await
            .unwrap();

        assert_eq!(outcome.requested, 7);
        assert_eq!(outcome.affected, 6);
        assert!(outcome.is_complete());
        let extended = NaiveDate::from_ymd_opt(2025, 4, 9);
        for id in &ids[..6] {
            assert_eq!(f.billing.raw_customer(*id).await.unwrap().expiry_date, extended);
        }
    }

    #[tokio::test]
    async fn test_foreign_chunk_fails_without_rolling_back_others() {
        let f = fixture().await;
        let own_1 = seed(&f, f.company_a, "own1", None).await;
        let own_2 = seed(&f, f.company_a, "own2", None).await;
        let foreign = seed(&f, f.company_b, "foreign", None).await;
        let own_3 = seed(&f, f.company_a, "own3", None).await;

        let ctx = TenantContext::tenant(f.company_a);
        let outcome = f
            .service
            .clone()
            .with_chunk_size(2)
            .execute(&ctx, f.company_a, &[own_1, own_2, foreign, own_3], BulkVerb::Disable)
            .await
            .unwrap();

        assert_eq!(outcome.affected, 2);
        assert_eq!(outcome.failed_chunks, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(f.billing.raw_customer(own_1).await.unwrap().status, CustomerStatus::Suspended);
        assert_eq!(f.billing.raw_customer(own_3).await.unwrap().status, CustomerStatus::Active);
        assert_eq!(f.billing.raw_customer(foreign).await.unwrap().status, CustomerStatus::Active);
    }

    #[tokio::test]
    async fn test_delete_and_enable() {
        let f = fixture().await;
        let id = seed(&f, f.company_a, "karim", None).await;
        let ctx = TenantContext::tenant(f.company_a);

        f.service.execute(&ctx, f.company_a, &[id], BulkVerb::Delete).await.unwrap();
        assert_eq!(f.billing.raw_customer(id).await.unwrap().status, CustomerStatus::Deleted);

        f.service.execute(&ctx, f.company_a, &[id], BulkVerb::Enable).await.unwrap();
        assert_eq!(f.billing.raw_customer(id).await.unwrap().status, CustomerStatus::Active);
    }

    #[tokio::test]
    async fn test_change_package_requires_visible_package() {
        let f = fixture().await;
        let id = seed(&f, f.company_a, "karim", None).await;
        let foreign = Package::from_request(
            f.company_b,
            NewPackage {
                name: "Beta 20".to_string(),
                price: dec!(800),
                ..Default::default()
            },
        );
        let foreign_id = foreign.id;
        f.billing.seed_package(foreign).await;

        let ctx = TenantContext::tenant(f.company_a);
        let err = f
            .service
            .change_package(&ctx, f.company_a, &[id], foreign_id)
            .await
            .unwrap_err();
        assert!(matches!(err, BulkError::Billing(BillingError::PackageNotFound(_))));
        assert_eq!(f.billing.raw_customer(id).await.unwrap().package_id, None);
    }

    #[tokio::test]
    async fn test_extend_overflow_leaves_chunk_untouched() {
        let f = fixture().await;
        let fine = seed(&f, f.company_a, "fine", Some(today())).await;
        let edge = seed(&f, f.company_a, "edge", Some(NaiveDate::MAX)).await;

        let ctx = TenantContext::tenant(f.company_a);
        let outcome = f
            .service
            .extend_expiry(&ctx, f.company_a, &[fine, edge], 30)
            .await
            .unwrap();

        assert_eq!(outcome.affected, 0);
        assert_eq!(outcome.failed_chunks, 1);
        assert_eq!(f.billing.raw_customer(fine).await.unwrap().expiry_date, Some(today()));
        assert_eq!(f.billing.raw_customer(edge).await.unwrap().expiry_date, Some(NaiveDate::MAX));
    }

    #[test]
    fn test_record_count_bounds() {
        assert_eq!(record_count(10).unwrap(), 10);
        assert_eq!(record_count(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(record_count(u32::MAX as usize + 1), Err(BulkError::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_days_rejected() {
        let f = fixture().await;
        let ctx = TenantContext::tenant(f.company_a);
        let err = f.service.extend_expiry(&ctx, f.company_a, &[], 0).await.unwrap_err();
        assert!(matches!(err, BulkError::Validation(_)));
    }

    #[tokio::test]
    async fn test_uninitialized_context_fails_closed() {
        let f = fixture().await;
        let err = f
            .service
            .execute(&TenantContext::Uninitialized, f.company_a, &[], BulkVerb::Enable)
            .await
            .unwrap_err();
        assert!(matches!(err, BulkError::Tenancy(TenancyError::ContextMissing)));
    }

    fn csv_with_duplicate_at_row_5() -> String {
        let mut csv = String::from("Full Name,Mobile,Login,Secret\n");
        for i in 1..=10 {
            let login = if i == 5 { "user1".to_string() } else { format!("user{}", i) };
            csv.push_str(&format!("Customer {},0170000000{},{},secret{}\n", i, i % 10, login, i));
        }
        csv
    }

    fn mapping() -> FieldMapping {
        let mut mapping = FieldMapping::default();
        for (field, column) in [
            ("name", "Full Name"),
            ("phone", "Mobile"),
            ("username", "Login"),
            ("password", "Secret"),
        ] {
            mapping.0.insert(field.to_string(), column.to_string());
        }
        mapping
    }

    #[tokio::test]
    async fn test_import_duplicate_row_does_not_abort_batch() {
        let f = fixture().await;
        let ctx = TenantContext::tenant(f.company_a);

        let import = f
            .service
            .import_customers(&ctx, f.company_a, None, "customers.csv", csv_with_duplicate_at_row_5().as_bytes(), &mapping())
            .await
            .unwrap();

        assert_eq!(import.status, ImportStatus::Completed);
        assert_eq!(import.total_records, 10);
        assert_eq!(import.success_records, 9);
        assert_eq!(import.failed_records, 1);
        assert_eq!(import.errors(), vec!["Row 5: username 'user1' has already been taken"]);
        assert!(import.completed_at.is_some());

        let stored = f.billing.customers.read().await;
        assert_eq!(stored.values().filter(|c| c.company_id == f.company_a).count(), 9);
    }

    #[tokio::test]
    async fn test_import_record_is_persisted() {
        let f = fixture().await;
        let ctx = TenantContext::tenant(f.company_a);
        let import = f
            .service
            .import_customers(&ctx, f.company_a, None, "customers.csv", csv_with_duplicate_at_row_5().as_bytes(), &mapping())
            .await
            .unwrap();

        let stored = f.service.get_import(&ctx, import.id).await.unwrap();
        assert_eq!(stored, import);

        let other = TenantContext::tenant(f.company_b);
        assert!(f.service.get_import(&other, import.id).await.is_err());
        assert!(f.service.list_imports(&other, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_reports_validation_messages() {
        let f = fixture().await;
        let ctx = TenantContext::tenant(f.company_a);
        let csv = "Full Name,Mobile,Login,Secret\nShort Pass,01700000000,shorty,123\n";

        let import = f
            .service
            .import_customers(&ctx, f.company_a, None, "bad.csv", csv.as_bytes(), &mapping())
            .await
            .unwrap();

        assert_eq!(import.failed_records, 1);
        let errors = import.errors();
        assert!(errors[0].starts_with("Row 1: "));
        assert!(errors[0].contains("password"));
    }
}
