// Order book
// Owns the order collection. One mutex covers both the collection and the rewrite of the
// orders file, so every operation (including the scheduler's scans) is linearizable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::catalog::ItemCatalog;
use crate::models::BasketLine;
use crate::orders::{
    generate_order_id, CustomerReport, LifecycleDurations, Order, OrderError, OrderRepository,
    OrderStatus, OrderStatusScheduler, SchedulerHandle, StatusMachine,
};
use crate::persistence::PersistenceError;

pub struct OrderBook {
    repository: OrderRepository,
    catalog: Arc<dyn ItemCatalog>,
    orders: Mutex<Vec<Order>>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl OrderBook {
    /// Order book starting from an already loaded collection
    pub fn new(repository: OrderRepository, catalog: Arc<dyn ItemCatalog>, orders: Vec<Order>) -> Self {
        Self {
            repository,
            catalog,
            orders: Mutex::new(orders),
            scheduler: Mutex::new(None),
        }
    }

    /// Load the order book from its repository
    pub async fn load(
        repository: OrderRepository,
        catalog: Arc<dyn ItemCatalog>,
    ) -> Result<Self, PersistenceError> {
        let orders = repository.load().await?;
        tracing::info!("Loaded {} orders", orders.len());
        Ok(Self::new(repository, catalog, orders))
    }

    /// Place an order for `user_id`
    ///
    /// Stock is re-read from the catalog under the book lock, checked for the whole
    /// basket, then committed as one batch before the order is appended and the file
    /// rewritten. A stock shortfall commits nothing.
    pub async fn create(
        &self,
        user_id: &str,
        basket: &[BasketLine],
        shipping_address: &str,
    ) -> Result<Order, OrderError> {
        self.create_at(user_id, basket, shipping_address, Utc::now()).await
    }

    /// `create` with an explicit creation instant
    pub async fn create_at(
        &self,
        user_id: &str,
        basket: &[BasketLine],
        shipping_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut orders = self.orders.lock().await;

        let mut live = Vec::with_capacity(basket.len());
        for line in basket {
            let item = self
                .catalog
                .find_item(&line.item.item_id)
                .await?
                .ok_or_else(|| OrderError::ItemNotFound(line.item.item_id.clone()))?;
            live.push(BasketLine::new(item, line.quantity));
        }

        let placed = Order::place(user_id, &live, shipping_address, now).map_err(|e| {
            if let OrderError::InsufficientStock { .. } = &e {
                tracing::warn!("Order for user {} rejected: {}", user_id, e);
            }
            e
        })?;
        let mut order = placed.order;

        let mut salt = 0;
        while orders.iter().any(|existing| existing.id == order.id) {
            salt += 1;
            tracing::warn!(
                "Order id {} already taken, regenerating with salt {}",
                order.id,
                salt
            );
            order.id = generate_order_id(user_id, order.created_at, salt);
        }

        self.catalog.commit_stock(&placed.stock_updates).await?;

        orders.push(order.clone());
        self.persist(&orders).await?;

        tracing::info!(
            "Created order {} for user {} ({} lines, {} units, total {})",
            order.id,
            order.user_id,
            order.line_count(),
            order.unit_count(),
            order.total_amount
        );
        Ok(order)
    }

    pub async fn find_by_id(&self, id: &str) -> Option<Order> {
        self.orders
            .lock()
            .await
            .iter()
            .find(|order| order.id == id)
            .cloned()
    }

    /// Orders of one user, in creation order
    pub async fn find_by_user(&self, user_id: &str) -> Vec<Order> {
        self.orders
            .lock()
            .await
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn list_all(&self) -> Vec<Order> {
        self.orders.lock().await.clone()
    }

    /// Purchase statistics for one user, with categories taken from the current catalog
    pub async fn customer_report(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CustomerReport, OrderError> {
        let orders = self.find_by_user(user_id).await;
        let items = self.catalog.list_items().await?;

        let report = CustomerReport::build(user_id, &orders, &items, now)?;
        tracing::debug!(
            "Built report for user {} over {} orders",
            user_id,
            report.order_count
        );
        Ok(report)
    }

    /// Administrator override: set any status directly
    ///
    /// # Returns
    /// The updated order, or `NotFound` if no order has this id
    pub async fn set_status(&self, id: &str, status: OrderStatus) -> Result<Order, OrderError> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or_else(|| OrderError::NotFound(id.to_string()))?;

        let previous = order.status;
        order.set_status(status, Utc::now());
        if !StatusMachine::is_forward_step(previous, status) && previous != status {
            tracing::info!("Order {} forced from {} to {}", id, previous, status);
        }
        let updated = order.clone();

        self.persist(&orders).await?;

        tracing::info!("Order {} status set to {}", id, status);
        Ok(updated)
    }

    /// One scheduler scan: advance every order whose current status has lasted long enough
    ///
    /// Each order moves at most one step. The file is rewritten once if anything moved.
    ///
    /// # Returns
    /// Number of orders that changed status
    pub async fn advance_statuses(
        &self,
        now: DateTime<Utc>,
        durations: &LifecycleDurations,
    ) -> Result<usize, OrderError> {
        let mut orders = self.orders.lock().await;

        let mut changed = 0;
        for order in orders.iter_mut() {
            if StatusMachine::is_terminal(order.status) {
                continue;
            }
            let due = StatusMachine::due_transition(order.status, order.elapsed_in_status(now), durations);
            if let Some(next) = due {
                tracing::info!("Order {} moved from {} to {}", order.id, order.status, next);
                order.set_status(next, now);
                changed += 1;
            }
        }

        if changed > 0 {
            self.persist(&orders).await?;
        }
        Ok(changed)
    }

    /// Start the status scheduler for this book
    ///
    /// # Returns
    /// `false` if a scheduler was already running
    pub async fn enable_auto_update(
        self: &Arc<Self>,
        durations: LifecycleDurations,
        poll_interval: Duration,
    ) -> bool {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_some() {
            tracing::warn!("Order status scheduler is already running");
            return false;
        }

        *scheduler = Some(OrderStatusScheduler::new(Arc::clone(self), durations, poll_interval).spawn());
        true
    }

    /// Stop the status scheduler and wait for its task to finish
    ///
    /// # Returns
    /// `false` if no scheduler was running
    pub async fn disable_auto_update(&self) -> bool {
        let handle = self.scheduler.lock().await.take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    pub async fn is_auto_update_enabled(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    async fn persist(&self, orders: &[Order]) -> Result<(), OrderError> {
        self.repository.save(orders).await.map_err(|e| {
            tracing::error!(
                "Failed to write {}; in-memory orders are ahead of the file: {}",
                self.repository.path().display(),
                e
            );
            OrderError::from(e)
        })
    }
}
