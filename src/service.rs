//! Service facade - The entry point a request handler calls.
//!
//! Each method runs one core operation under the caller's [`OpContext`],
//! bounded by the configured operation timeout and retried on transient store
//! failures. Each retry attempt opens a fresh transaction.

use crate::{
    config::{catalog::CatalogConfig, runtime::RuntimeSettings},
    core::{
        catalog::{self, SeedSummary},
        context::OpContext,
        depot,
        maintenance::{self, ExceptionReport, GcKind, GcReport},
        order::{self, OrderLine, OrderWithItems},
        plate,
        retry::RetryPolicy,
        user, wallet,
    },
    entities::{
        exception_log, food, plate as plate_entity, plate_depot, transaction, user as user_entity,
        wallet as wallet_entity, worker,
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tracing::instrument;

/// Owns the store connection and the policies applied to every call.
///
/// Clones share one connection pool.
#[derive(Debug, Clone)]
pub struct CanteenService {
    db: Arc<DatabaseConnection>,
    retry: RetryPolicy,
    operation_timeout: Duration,
    idle_unbind_after: Duration,
}

impl CanteenService {
    /// Builds a service with default runtime settings.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::from_settings(db, &RuntimeSettings::default())
    }

    #[must_use]
    pub fn from_settings(db: DatabaseConnection, settings: &RuntimeSettings) -> Self {
        Self {
            db: Arc::new(db),
            retry: settings.retry_policy(),
            operation_timeout: settings.operation_timeout,
            idle_unbind_after: settings.idle_unbind_after,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn execute<F, Fut, T>(&self, ctx: &OpContext, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        ctx.clone()
            .bounded_by(self.operation_timeout)
            .run(self.retry.retry_async(|_| op()))
            .await
    }

    /// Pings the store.
    #[instrument(skip(self, ctx))]
    pub async fn health_check(&self, ctx: &OpContext) -> Result<()> {
        ctx.clone()
            .bounded_by(self.operation_timeout)
            .run(async {
                self.db.ping().await.map_err(|err| Error::StoreUnavailable {
                    message: err.to_string(),
                })
            })
            .await
    }

    // Users and catalog

    #[instrument(skip(self, ctx))]
    pub async fn create_user(
        &self,
        ctx: &OpContext,
        user_id: &str,
        username: &str,
    ) -> Result<user_entity::Model> {
        self.execute(ctx, || user::create_user(self.db(), user_id, username))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_user_info(
        &self,
        ctx: &OpContext,
        user_id: &str,
    ) -> Result<(user_entity::Model, Option<wallet_entity::Model>)> {
        self.execute(ctx, || user::get_user_info(self.db(), user_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn create_food(
        &self,
        ctx: &OpContext,
        food_id: &str,
        name: &str,
        price_per_100g: i64,
        category: Option<String>,
    ) -> Result<food::Model> {
        self.execute(ctx, || {
            catalog::create_food(self.db(), food_id, name, price_per_100g, category.clone())
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn set_food_availability(
        &self,
        ctx: &OpContext,
        food_id: &str,
        is_available: bool,
    ) -> Result<food::Model> {
        self.execute(ctx, || {
            catalog::set_food_availability(self.db(), food_id, is_available)
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn create_worker(
        &self,
        ctx: &OpContext,
        worker_id: &str,
        name: &str,
        role: &str,
    ) -> Result<worker::Model> {
        self.execute(ctx, || catalog::create_worker(self.db(), worker_id, name, role))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn register_plate(
        &self,
        ctx: &OpContext,
        plate_id: &str,
        qr_code: &str,
    ) -> Result<plate_entity::Model> {
        self.execute(ctx, || catalog::register_plate(self.db(), plate_id, qr_code))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn create_depot(
        &self,
        ctx: &OpContext,
        depot_id: &str,
        name: &str,
        location: Option<String>,
        capacity: i32,
    ) -> Result<plate_depot::Model> {
        self.execute(ctx, || {
            catalog::create_depot(self.db(), depot_id, name, location.clone(), capacity)
        })
        .await
    }

    #[instrument(skip(self, ctx, config))]
    pub async fn seed_catalog(&self, ctx: &OpContext, config: &CatalogConfig) -> Result<SeedSummary> {
        self.execute(ctx, || catalog::seed_catalog(self.db(), config))
            .await
    }

    // Wallet ledger

    #[instrument(skip(self, ctx))]
    pub async fn charge(
        &self,
        ctx: &OpContext,
        user_id: &str,
        amount: i64,
    ) -> Result<(i64, transaction::Model)> {
        self.execute(ctx, || wallet::charge(self.db(), user_id, amount))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn debit(
        &self,
        ctx: &OpContext,
        user_id: &str,
        amount: i64,
        order_id: &str,
    ) -> Result<(i64, transaction::Model)> {
        self.execute(ctx, || wallet::debit(self.db(), user_id, amount, order_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn refund(
        &self,
        ctx: &OpContext,
        user_id: &str,
        amount: i64,
        order_id: &str,
    ) -> Result<(i64, transaction::Model)> {
        self.execute(ctx, || wallet::refund(self.db(), user_id, amount, order_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_wallet(&self, ctx: &OpContext, user_id: &str) -> Result<wallet_entity::Model> {
        self.execute(ctx, || wallet::get_wallet(self.db(), user_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_ledger(
        &self,
        ctx: &OpContext,
        user_id: &str,
    ) -> Result<Vec<transaction::Model>> {
        self.execute(ctx, || wallet::get_ledger(self.db(), user_id))
            .await
    }

    // Plates

    #[instrument(skip(self, ctx))]
    pub async fn bind_plate(
        &self,
        ctx: &OpContext,
        user_id: &str,
        plate_id: &str,
    ) -> Result<plate_entity::Model> {
        self.execute(ctx, || plate::bind_plate(self.db(), user_id, plate_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn unbind_plate(
        &self,
        ctx: &OpContext,
        user_id: &str,
        plate_id: &str,
    ) -> Result<plate_entity::Model> {
        self.execute(ctx, || plate::unbind_plate(self.db(), user_id, plate_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_plate_info(
        &self,
        ctx: &OpContext,
        plate_id: &str,
    ) -> Result<plate_entity::Model> {
        self.execute(ctx, || plate::get_plate_info(self.db(), plate_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_plate_list(
        &self,
        ctx: &OpContext,
        is_bound: Option<bool>,
    ) -> Result<Vec<plate_entity::Model>> {
        self.execute(ctx, || plate::get_plate_list(self.db(), is_bound))
            .await
    }

    /// Releases bindings older than the configured idle interval.
    #[instrument(skip(self, ctx))]
    pub async fn release_idle_bindings(&self, ctx: &OpContext) -> Result<Vec<String>> {
        self.execute(ctx, || {
            plate::release_idle_bindings(self.db(), self.idle_unbind_after)
        })
        .await
    }

    // Orders

    #[instrument(skip(self, ctx, lines), fields(lines = lines.len()))]
    pub async fn create_order(
        &self,
        ctx: &OpContext,
        user_id: &str,
        plate_id: &str,
        lines: &[OrderLine],
    ) -> Result<OrderWithItems> {
        self.execute(ctx, || order::create_order(self.db(), user_id, plate_id, lines))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_order_info(&self, ctx: &OpContext, order_id: &str) -> Result<OrderWithItems> {
        self.execute(ctx, || order::get_order_info(self.db(), order_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_user_orders(
        &self,
        ctx: &OpContext,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<OrderWithItems>, u64)> {
        self.execute(ctx, || {
            order::get_user_orders(self.db(), user_id, page, page_size)
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn complete_order(&self, ctx: &OpContext, order_id: &str) -> Result<OrderWithItems> {
        self.execute(ctx, || order::complete_order(self.db(), order_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn cancel_order(&self, ctx: &OpContext, order_id: &str) -> Result<OrderWithItems> {
        self.execute(ctx, || order::cancel_order(self.db(), order_id))
            .await
    }

    // Exceptions, reclamation and depots

    #[instrument(skip(self, ctx))]
    pub async fn handle_exception(
        &self,
        ctx: &OpContext,
        worker_id: &str,
        plate_id: Option<&str>,
        exception: &str,
        action: &str,
    ) -> Result<ExceptionReport> {
        self.execute(ctx, || {
            maintenance::handle_exception(self.db(), worker_id, plate_id, exception, action)
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn resolve_exception(
        &self,
        ctx: &OpContext,
        log_id: i64,
    ) -> Result<exception_log::Model> {
        self.execute(ctx, || maintenance::resolve_exception(self.db(), log_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn process_gc(
        &self,
        ctx: &OpContext,
        plate_id: &str,
        kind: GcKind,
    ) -> Result<GcReport> {
        self.execute(ctx, || maintenance::process_gc(self.db(), plate_id, kind))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_plate_depot(
        &self,
        ctx: &OpContext,
        depot_id: &str,
    ) -> Result<plate_depot::Model> {
        self.execute(ctx, || depot::get_plate_depot(self.db(), depot_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn checkout_from_depot(
        &self,
        ctx: &OpContext,
        depot_id: &str,
    ) -> Result<plate_depot::Model> {
        self.execute(ctx, || depot::checkout_from_depot(self.db(), depot_id))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn return_to_depot(
        &self,
        ctx: &OpContext,
        depot_id: &str,
    ) -> Result<plate_depot::Model> {
        self.execute(ctx, || depot::return_to_depot(self.db(), depot_id))
            .await
    }
}
