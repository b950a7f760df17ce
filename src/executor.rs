//! Order submission. Enforces the builder-fee approval discipline once per
//! process, converts plans to wire orders, and synthesizes per-leg receipts
//! from venue statuses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::Address;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::VenueClient;
use crate::client::types::{BuilderInfo, ExchangeDataStatus, OrderRequest, TIF_IOC};
use crate::collateral::{CollateralManager, CollateralReceipt};
use crate::config::BuilderConfig;
use crate::routing::splitter::SplitAllocation;
use crate::routing::{ExecutionPlan, SplitExecutionPlan};
use crate::types::{Side, format_price, format_size};

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReceipt {
    pub success: bool,
    pub coin: String,
    pub side: Side,
    pub requested_size: f64,
    pub filled_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionReceipt {
    fn failed(plan: &ExecutionPlan, error: String) -> Self {
        Self {
            success: false,
            coin: plan.market.coin.clone(),
            side: plan.side,
            requested_size: plan.size,
            filled_size: 0.0,
            avg_price: None,
            order_id: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitExecutionReceipt {
    /// AND of every leg, and of collateral preparation when it ran.
    pub success: bool,
    pub legs: Vec<ExecutionReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral: Option<CollateralReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Executor {
    client: Arc<dyn VenueClient>,
    builder: Option<BuilderConfig>,
    /// One-shot per process lifetime; concurrent first calls race on a CAS
    /// so only one approval reaches the venue.
    approval_checked: AtomicBool,
}

impl Executor {
    pub fn new(client: Arc<dyn VenueClient>, builder: Option<BuilderConfig>) -> Self {
        Self {
            client,
            builder,
            approval_checked: AtomicBool::new(false),
        }
    }

    fn builder_info(&self) -> Option<BuilderInfo> {
        self.builder.map(|b| BuilderInfo {
            builder: format!("{:#x}", b.address),
            fee: b.fee_tenth_bps(),
        })
    }

    /// Check and, if needed, raise the builder-fee authorization. Runs at
    /// most once per process; approval failures are logged and never abort
    /// the trade.
    async fn ensure_builder_approval(&self, user: Address) {
        let Some(builder) = self.builder else {
            return;
        };
        if self
            .approval_checked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let approved = match self.client.max_builder_fee(user, builder.address).await {
            Ok(approved) => approved,
            Err(e) => {
                warn!(error = %e, "builder-fee check failed, continuing without approval");
                return;
            }
        };
        if approved >= builder.fee_tenth_bps() {
            debug!(approved, "builder fee already authorized");
            return;
        }

        let rate = builder.max_fee_rate();
        match self
            .client
            .approve_builder_fee(builder.address, &rate)
            .await
        {
            Ok(_) => info!(builder = %builder.address, rate = %rate, "builder fee approved"),
            Err(e) => warn!(error = %e, "builder-fee approval failed, continuing"),
        }
    }

    fn to_order(plan: &ExecutionPlan) -> OrderRequest {
        OrderRequest::limit(
            plan.market.asset_index,
            plan.side.is_buy(),
            format_price(plan.limit_price),
            format_size(plan.size, plan.market.sz_decimals),
            TIF_IOC,
        )
        .with_cloid(Some(uuid::Uuid::new_v4()))
    }

    fn receipt_from_status(plan: &ExecutionPlan, status: ExchangeDataStatus) -> ExecutionReceipt {
        match status {
            ExchangeDataStatus::Filled(fill) => ExecutionReceipt {
                success: true,
                coin: plan.market.coin.clone(),
                side: plan.side,
                requested_size: plan.size,
                filled_size: fill.total_sz.parse().unwrap_or(0.0),
                avg_price: fill.avg_px.parse().ok(),
                order_id: Some(fill.oid),
                error: None,
            },
            // IOC that rested crossed nothing: the submission succeeded but
            // nothing filled.
            ExchangeDataStatus::Resting(rest) => ExecutionReceipt {
                success: true,
                coin: plan.market.coin.clone(),
                side: plan.side,
                requested_size: plan.size,
                filled_size: 0.0,
                avg_price: None,
                order_id: Some(rest.oid),
                error: None,
            },
            ExchangeDataStatus::Error(msg) => ExecutionReceipt::failed(plan, msg),
            // Accepted with no fill information yet.
            ExchangeDataStatus::Success
            | ExchangeDataStatus::WaitingForFill
            | ExchangeDataStatus::WaitingForTrigger => ExecutionReceipt {
                success: true,
                coin: plan.market.coin.clone(),
                side: plan.side,
                requested_size: plan.size,
                filled_size: 0.0,
                avg_price: None,
                order_id: None,
                error: None,
            },
        }
    }

    /// Submit a single-leg plan.
    pub async fn execute(&self, plan: &ExecutionPlan, user: Address) -> ExecutionReceipt {
        self.ensure_builder_approval(user).await;

        let order = Self::to_order(plan);
        info!(
            coin = %plan.market.coin,
            side = %plan.side,
            size = %order.sz,
            limit_px = %order.limit_px,
            "submitting order"
        );

        let status = match self
            .client
            .place_order(&order, self.builder_info().as_ref())
            .await
        {
            Ok(status) => status,
            Err(e) => return ExecutionReceipt::failed(plan, e.to_string()),
        };

        match status.into_statuses() {
            Ok(statuses) => match statuses.into_iter().next() {
                Some(status) => Self::receipt_from_status(plan, status),
                None => ExecutionReceipt::failed(plan, "venue returned no order status".into()),
            },
            Err(msg) => ExecutionReceipt::failed(plan, msg),
        }
    }

    /// Submit a multi-leg plan: collateral preparation strictly precedes
    /// submission, and all legs go to the venue as one batch.
    pub async fn execute_split(
        &self,
        plan: &SplitExecutionPlan,
        collateral: &CollateralManager,
        user: Address,
    ) -> SplitExecutionReceipt {
        // Requirements are always re-estimated here against live balances;
        // the quote's plan is a placeholder.
        let estimate = match collateral
            .estimate_requirements(&Self::leg_allocations(plan), user)
            .await
        {
            Ok(estimate) => estimate,
            Err(e) => {
                return SplitExecutionReceipt {
                    success: false,
                    legs: Vec::new(),
                    collateral: None,
                    error: Some(format!("collateral estimation failed: {e}")),
                };
            }
        };

        let collateral_receipt = if estimate.swaps_needed {
            let receipt = collateral.prepare(&estimate, user).await;
            if !receipt.success {
                // No perp leg is placed once preparation fails.
                let error = receipt.error.clone();
                return SplitExecutionReceipt {
                    success: false,
                    legs: Vec::new(),
                    collateral: Some(receipt),
                    error,
                };
            }
            Some(receipt)
        } else {
            None
        };

        self.ensure_builder_approval(user).await;

        let orders: Vec<OrderRequest> = plan.legs.iter().map(Self::to_order).collect();
        info!(legs = orders.len(), side = %plan.side, "submitting batch");

        let status = match self
            .client
            .batch_orders(&orders, self.builder_info().as_ref())
            .await
        {
            Ok(status) => status,
            Err(e) => {
                return SplitExecutionReceipt {
                    success: false,
                    legs: plan
                        .legs
                        .iter()
                        .map(|leg| ExecutionReceipt::failed(leg, e.to_string()))
                        .collect(),
                    collateral: collateral_receipt,
                    error: Some(e.to_string()),
                };
            }
        };

        let statuses = match status.into_statuses() {
            Ok(statuses) => statuses,
            Err(msg) => {
                return SplitExecutionReceipt {
                    success: false,
                    legs: plan
                        .legs
                        .iter()
                        .map(|leg| ExecutionReceipt::failed(leg, msg.clone()))
                        .collect(),
                    collateral: collateral_receipt,
                    error: Some(msg),
                };
            }
        };

        let mut statuses = statuses.into_iter();
        let legs: Vec<ExecutionReceipt> = plan
            .legs
            .iter()
            .map(|leg| match statuses.next() {
                Some(status) => Self::receipt_from_status(leg, status),
                None => ExecutionReceipt::failed(leg, "no status returned for leg".into()),
            })
            .collect();

        SplitExecutionReceipt {
            success: legs.iter().all(|l| l.success),
            legs,
            collateral: collateral_receipt,
            error: None,
        }
    }

    /// Reconstruct allocation-shaped inputs for collateral estimation from
    /// the plan's legs. Leg limit prices already carry the slippage pad, so
    /// the implied cost is a conservative requirement.
    fn leg_allocations(plan: &SplitExecutionPlan) -> Vec<SplitAllocation> {
        plan.legs
            .iter()
            .map(|leg| SplitAllocation {
                market: leg.market.clone(),
                size: leg.size,
                estimated_cost: leg.size * leg.limit_price,
                estimated_avg_price: leg.limit_price,
                proportion: if plan.total_size > 0.0 {
                    leg.size / plan.total_size
                } else {
                    0.0
                },
            })
            .collect()
    }
}
