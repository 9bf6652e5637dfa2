//! GPU price catalog.
//!
//! Picks the cheapest GPU type that has enough memory, is in stock and has
//! a non-interruptible price.

use tracing::{debug, info};

use crate::error::{ConfigError, LifecycleError, PodrunError, Result};

use super::api::RunPodApi;
use super::types::GpuOffer;

/// Queries and filters GPU offers.
#[derive(Debug)]
pub struct PriceCatalog<'a, A: RunPodApi + ?Sized> {
    /// Provider API.
    api: &'a A,
}

impl<'a, A: RunPodApi + ?Sized> PriceCatalog<'a, A> {
    /// Creates a catalog over the given API.
    #[must_use]
    pub const fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Returns the eligible offers for `min_memory_gb`, in provider order.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_memory_gb` is zero or the query fails.
    pub async fn list_eligible(&self, min_memory_gb: u32) -> Result<Vec<GpuOffer>> {
        check_min_memory(min_memory_gb)?;

        let offers = self.api.gpu_offers(min_memory_gb).await?;
        Ok(eligible_offers(&offers, min_memory_gb)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Selects the cheapest eligible GPU offer.
    ///
    /// # Errors
    ///
    /// Returns `NoEligibleOffer` when nothing passes the filters, or an error
    /// if `min_memory_gb` is zero or the query fails.
    pub async fn select_cheapest_gpu(&self, min_memory_gb: u32) -> Result<GpuOffer> {
        check_min_memory(min_memory_gb)?;

        let offers = self.api.gpu_offers(min_memory_gb).await?;
        debug!("Inspecting {} GPU offers", offers.len());

        let eligible = eligible_offers(&offers, min_memory_gb);
        info!(
            "Found {} GPUs with at least {min_memory_gb} GB of VRAM available",
            eligible.len()
        );

        let cheapest = select_cheapest(&offers, min_memory_gb).ok_or(
            LifecycleError::NoEligibleOffer {
                min_memory_gb,
                total_offers: offers.len(),
            },
        )?;

        info!(
            "Cheapest GPU: {} with {} GB VRAM at ${:.2} per hour (stock status: {})",
            cheapest.display_name,
            cheapest.memory_in_gb.unwrap_or_default(),
            cheapest.uninterruptible_price().unwrap_or_default(),
            cheapest
                .stock_status()
                .map_or_else(|| String::from("unknown"), |s| s.to_string()),
        );

        Ok(cheapest.clone())
    }
}

/// Returns true if the offer may be selected for `min_memory_gb`.
#[must_use]
pub fn is_eligible(offer: &GpuOffer, min_memory_gb: u32) -> bool {
    offer.memory_in_gb.is_some_and(|gb| gb >= min_memory_gb)
        && !offer.is_out_of_stock()
        && offer.uninterruptible_price().is_some()
}

/// Filters offers down to the eligible ones, preserving input order.
#[must_use]
pub fn eligible_offers(offers: &[GpuOffer], min_memory_gb: u32) -> Vec<&GpuOffer> {
    offers
        .iter()
        .filter(|offer| is_eligible(offer, min_memory_gb))
        .collect()
}

/// Returns the cheapest eligible offer; the first one wins on equal price.
#[must_use]
pub fn select_cheapest(offers: &[GpuOffer], min_memory_gb: u32) -> Option<&GpuOffer> {
    let mut best: Option<(&GpuOffer, f64)> = None;

    for offer in offers {
        if !is_eligible(offer, min_memory_gb) {
            continue;
        }
        let Some(price) = offer.uninterruptible_price() else {
            continue;
        };
        // Strict comparison keeps the earliest offer on ties
        if best.is_none_or(|(_, best_price)| price < best_price) {
            best = Some((offer, price));
        }
    }

    best.map(|(offer, _)| offer)
}

/// Rejects a zero memory floor.
fn check_min_memory(min_memory_gb: u32) -> Result<()> {
    if min_memory_gb == 0 {
        return Err(PodrunError::Config(ConfigError::validation(
            "Minimum GPU memory must be positive",
            "min_memory_gb",
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runpod::api::MockRunPodApi;
    use crate::runpod::types::{LowestPrice, StockStatus};

    fn offer(id: &str, memory: Option<u32>, price: Option<f64>, stock: StockStatus) -> GpuOffer {
        GpuOffer {
            id: id.to_string(),
            display_name: format!("GPU {id}"),
            memory_in_gb: memory,
            lowest_price: Some(LowestPrice {
                uninterruptable_price: price,
                minimum_bid_price: None,
                stock_status: Some(stock),
            }),
        }
    }

    fn market() -> Vec<GpuOffer> {
        vec![
            offer("A", Some(16), Some(0.5), StockStatus::High),
            offer("B", Some(24), Some(0.9), StockStatus::High),
            offer("C", Some(48), Some(0.7), StockStatus::NoStock),
        ]
    }

    #[test]
    fn test_memory_floor_and_stock_filter() {
        let offers = market();
        let selected = select_cheapest(&offers, 24).expect("B is eligible");
        assert_eq!(selected.id, "B");

        let eligible: Vec<_> = eligible_offers(&offers, 24).iter().map(|o| o.id.as_str()).collect();
        assert_eq!(eligible, vec!["B"]);
    }

    #[test]
    fn test_nothing_above_floor() {
        assert!(select_cheapest(&market(), 64).is_none());
    }

    #[test]
    fn test_cheaper_ineligible_offers_never_win() {
        let offers = vec![
            offer("no-price", Some(80), None, StockStatus::High),
            offer("no-memory", None, Some(0.01), StockStatus::High),
            offer("no-stock", Some(80), Some(0.02), StockStatus::NoStock),
            offer("nan", Some(80), Some(f64::NAN), StockStatus::High),
            offer("ok", Some(80), Some(2.5), StockStatus::Low),
        ];
        assert_eq!(select_cheapest(&offers, 40).map(|o| o.id.as_str()), Some("ok"));
    }

    #[test]
    fn test_missing_lowest_price_is_ineligible() {
        let mut bare = offer("bare", Some(80), Some(0.1), StockStatus::High);
        bare.lowest_price = None;
        assert!(!is_eligible(&bare, 24));
    }

    #[test]
    fn test_tie_breaks_on_input_order() {
        let offers = vec![
            offer("expensive", Some(24), Some(1.0), StockStatus::High),
            offer("first", Some(24), Some(0.4), StockStatus::Medium),
            offer("second", Some(48), Some(0.4), StockStatus::High),
        ];

        for _ in 0..3 {
            assert_eq!(select_cheapest(&offers, 24).map(|o| o.id.as_str()), Some("first"));
        }
    }

    #[tokio::test]
    async fn test_select_cheapest_gpu_queries_provider() {
        let mut api = MockRunPodApi::new();
        api.expect_gpu_offers()
            .withf(|min| *min == 24)
            .times(1)
            .returning(|_| Ok(market()));

        let catalog = PriceCatalog::new(&api);
        let selected = catalog.select_cheapest_gpu(24).await.expect("selection succeeds");
        assert_eq!(selected.id, "B");
    }

    #[tokio::test]
    async fn test_no_eligible_offer_error() {
        let mut api = MockRunPodApi::new();
        api.expect_gpu_offers().times(1).returning(|_| Ok(market()));

        let catalog = PriceCatalog::new(&api);
        let err = catalog.select_cheapest_gpu(64).await.unwrap_err();
        assert!(matches!(
            err,
            PodrunError::Lifecycle(LifecycleError::NoEligibleOffer {
                min_memory_gb: 64,
                total_offers: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_zero_memory_rejected_before_query() {
        let mut api = MockRunPodApi::new();
        api.expect_gpu_offers().times(0);

        let catalog = PriceCatalog::new(&api);
        assert!(matches!(
            catalog.select_cheapest_gpu(0).await,
            Err(PodrunError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_eligible() {
        let mut api = MockRunPodApi::new();
        api.expect_gpu_offers().returning(|_| Ok(market()));

        let catalog = PriceCatalog::new(&api);
        let eligible = catalog.list_eligible(16).await.expect("listing succeeds");
        let ids: Vec<_> = eligible.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
