//! Monetization simulators.
//!
//! Three meshes carry a revenue model: `drip` runs an epsilon-greedy bandit
//! over (channel, price) arms, `pulse` runs a min-bid auction over its
//! agents, and `weave` bills metered units against tiered quotas. Each
//! cycle's outcome is written into the exec file and folded into run totals.
//! None of it feeds a hash other than the exec file's own content.

use rand::{Rng, RngCore};
use serde::Serialize;

use meshledger_core::MeshDef;

use crate::error::MonetizationError;

/// Round to four decimal places.
pub fn round4(x: f64) -> f64 {
    let scaled = x * 10_000.0;
    if scaled.is_finite() {
        scaled.round() / 10_000.0
    } else {
        x
    }
}

/// One cycle's monetization outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Monetization {
    Bandit {
        channel: String,
        price: u32,
        conversions: u32,
        revenue: f64,
    },
    Auction {
        winner: String,
        bid: f64,
        clearing: f64,
        bidders: usize,
        revenue: f64,
    },
    Saas {
        tier: String,
        units: u64,
        used: u64,
        revenue: f64,
    },
}

impl Monetization {
    pub fn revenue(&self) -> f64 {
        match self {
            Monetization::Bandit { revenue, .. }
            | Monetization::Auction { revenue, .. }
            | Monetization::Saas { revenue, .. } => *revenue,
        }
    }
}

/// A per-mesh revenue model, stepped once per cycle.
pub trait Monetizer: Send {
    fn settle(&mut self, rng: &mut dyn RngCore) -> Result<Monetization, MonetizationError>;
}

/// The revenue model for a mesh, if it has one.
pub fn for_mesh(mesh: &MeshDef) -> Option<Box<dyn Monetizer>> {
    match mesh.name.as_str() {
        "drip" => Some(Box::new(EpsilonGreedy::drip(&mesh.name))),
        "pulse" => Some(Box::new(MinBidAuction::from_mesh(mesh))),
        "weave" => Some(Box::new(SaasQuota::standard(&mesh.name))),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Arm {
    channel: String,
    price: u32,
    pulls: u64,
    reward: f64,
}

impl Arm {
    fn mean(&self) -> f64 {
        if self.pulls == 0 {
            0.0
        } else {
            self.reward / self.pulls as f64
        }
    }
}

/// Epsilon-greedy bandit over (channel, price).
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    mesh: String,
    epsilon: f64,
    audience: u32,
    arms: Vec<Arm>,
}

impl EpsilonGreedy {
    pub const CHANNELS: [&'static str; 3] = ["email", "sms", "push"];
    pub const PRICES: [u32; 3] = [9, 19, 29];

    pub fn new(mesh: &str, arms: &[(&str, u32)], epsilon: f64, audience: u32) -> Self {
        Self {
            mesh: mesh.to_string(),
            epsilon: epsilon.clamp(0.0, 1.0),
            audience,
            arms: arms
                .iter()
                .map(|(channel, price)| Arm {
                    channel: channel.to_string(),
                    price: *price,
                    pulls: 0,
                    reward: 0.0,
                })
                .collect(),
        }
    }

    /// Nine arms, epsilon 0.1, twenty recipients per cycle.
    pub fn drip(mesh: &str) -> Self {
        let arms: Vec<(&str, u32)> = Self::CHANNELS
            .iter()
            .flat_map(|c| Self::PRICES.iter().map(move |p| (*c, *p)))
            .collect();
        Self::new(mesh, &arms, 0.1, 20)
    }

    fn conversion_rate(channel: &str, price: u32) -> f64 {
        let base = match channel {
            "email" => 0.04,
            "sms" => 0.06,
            "push" => 0.03,
            _ => 0.02,
        };
        (base * 19.0 / f64::from(price.max(1))).min(1.0)
    }

    fn choose(&self, rng: &mut dyn RngCore) -> usize {
        if let Some(unpulled) = self.arms.iter().position(|a| a.pulls == 0) {
            return unpulled;
        }
        if rng.gen_bool(self.epsilon) {
            return rng.gen_range(0..self.arms.len());
        }
        let mut best = 0;
        for (i, arm) in self.arms.iter().enumerate().skip(1) {
            if arm.mean() > self.arms[best].mean() {
                best = i;
            }
        }
        best
    }
}

impl Monetizer for EpsilonGreedy {
    fn settle(&mut self, rng: &mut dyn RngCore) -> Result<Monetization, MonetizationError> {
        if self.arms.is_empty() {
            return Err(MonetizationError::NoArms {
                mesh: self.mesh.clone(),
            });
        }
        let index = self.choose(rng);
        let rate = Self::conversion_rate(&self.arms[index].channel, self.arms[index].price);
        let conversions = (0..self.audience).filter(|_| rng.gen_bool(rate)).count() as u32;

        let arm = &mut self.arms[index];
        let revenue = round4(f64::from(conversions * arm.price));
        arm.pulls += 1;
        arm.reward += revenue;

        Ok(Monetization::Bandit {
            channel: arm.channel.clone(),
            price: arm.price,
            conversions,
            revenue,
        })
    }
}

/// Lowest bid wins; the job clears at the second-lowest bid.
#[derive(Debug, Clone)]
pub struct MinBidAuction {
    mesh: String,
    bidders: Vec<String>,
    reserve: f64,
}

/// Largest reserve an auction accepts. Bids are drawn up to four times the
/// reserve, and that bound must stay finite.
pub const MAX_RESERVE: f64 = f64::MAX / 8.0;

impl MinBidAuction {
    /// A non-finite or non-positive reserve falls back to 1.0; anything above
    /// [`MAX_RESERVE`] is clamped to it.
    pub fn new(mesh: &str, bidders: Vec<String>, reserve: f64) -> Self {
        let reserve = if reserve.is_finite() && reserve > 0.0 {
            reserve.min(MAX_RESERVE)
        } else {
            1.0
        };
        Self {
            mesh: mesh.to_string(),
            bidders,
            reserve,
        }
    }

    /// Bidders are the mesh agents; the floor is the `reserve_price` policy.
    pub fn from_mesh(mesh: &MeshDef) -> Self {
        let reserve = mesh
            .policies
            .get("reserve_price")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
        Self::new(&mesh.name, mesh.agents.clone(), reserve)
    }
}

impl Monetizer for MinBidAuction {
    fn settle(&mut self, rng: &mut dyn RngCore) -> Result<Monetization, MonetizationError> {
        if self.bidders.is_empty() {
            return Err(MonetizationError::NoBidders {
                mesh: self.mesh.clone(),
            });
        }
        let bids: Vec<f64> = self
            .bidders
            .iter()
            .map(|_| round4(rng.gen_range(self.reserve..self.reserve * 4.0)))
            .collect();

        let mut winner = 0;
        for (i, bid) in bids.iter().enumerate().skip(1) {
            if *bid < bids[winner] {
                winner = i;
            }
        }
        let clearing = bids
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != winner)
            .map(|(_, b)| *b)
            .fold(None, |min: Option<f64>, b| Some(min.map_or(b, |m| m.min(b))))
            .unwrap_or(bids[winner]);

        Ok(Monetization::Auction {
            winner: self.bidders[winner].clone(),
            bid: bids[winner],
            clearing,
            bidders: bids.len(),
            revenue: clearing,
        })
    }
}

/// A pricing tier. `limit` is the cumulative unit ceiling; `None` is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    pub name: String,
    pub limit: Option<u64>,
    pub unit_price: f64,
}

/// Metered units billed at the tier covering cumulative usage.
#[derive(Debug, Clone)]
pub struct SaasQuota {
    mesh: String,
    tiers: Vec<Tier>,
    used: u64,
}

impl SaasQuota {
    pub fn new(mesh: &str, tiers: Vec<Tier>) -> Self {
        Self {
            mesh: mesh.to_string(),
            tiers,
            used: 0,
        }
    }

    /// starter (to 1k units), growth (to 25k), scale (unbounded).
    pub fn standard(mesh: &str) -> Self {
        let tier = |name: &str, limit, unit_price| Tier {
            name: name.to_string(),
            limit,
            unit_price,
        };
        Self::new(
            mesh,
            vec![
                tier("starter", Some(1_000), 0.012),
                tier("growth", Some(25_000), 0.009),
                tier("scale", None, 0.006),
            ],
        )
    }
}

impl Monetizer for SaasQuota {
    fn settle(&mut self, rng: &mut dyn RngCore) -> Result<Monetization, MonetizationError> {
        let units: u64 = rng.gen_range(50..=500);
        let used = self.used + units;
        let tier = self
            .tiers
            .iter()
            .find(|t| t.limit.map_or(true, |limit| used <= limit))
            .ok_or_else(|| MonetizationError::NoTier {
                mesh: self.mesh.clone(),
                units: used,
            })?;
        self.used = used;

        Ok(Monetization::Saas {
            tier: tier.name.clone(),
            units,
            used,
            revenue: round4(units as f64 * tier.unit_price),
        })
    }
}

/// Revenue against spend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub revenue: f64,
    pub cost: f64,
}

impl Totals {
    pub fn add(&mut self, other: Totals) {
        self.revenue += other.revenue;
        self.cost += other.cost;
    }

    /// Gross margin, `(revenue - cost) / revenue`.
    pub fn gm(&self) -> f64 {
        if self.revenue == 0.0 {
            0.0
        } else {
            (self.revenue - self.cost) / self.revenue
        }
    }

    /// `(revenue - cost) / cost`.
    pub fn roi(&self) -> f64 {
        if self.cost == 0.0 {
            0.0
        } else {
            (self.revenue - self.cost) / self.cost
        }
    }

    pub fn summary(&self) -> TotalsSummary {
        TotalsSummary {
            revenue: round4(self.revenue),
            cost: round4(self.cost),
            gm: round4(self.gm()),
            roi: round4(self.roi()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TotalsSummary {
    pub revenue: f64,
    pub cost: f64,
    pub gm: f64,
    pub roi: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshledger_core::builtin_mesh;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_bandit_pulls_every_arm_first() {
        let mut bandit = EpsilonGreedy::drip("drip");
        let mut rng = rng();
        let mut seen = Vec::new();
        for _ in 0..9 {
            match bandit.settle(&mut rng).unwrap() {
                Monetization::Bandit { channel, price, .. } => seen.push((channel, price)),
                other => panic!("unexpected {other:?}"),
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn test_bandit_without_arms_fails() {
        let mut bandit = EpsilonGreedy::new("drip", &[], 0.1, 20);
        assert_eq!(
            bandit.settle(&mut rng()),
            Err(MonetizationError::NoArms { mesh: "drip".into() })
        );
    }

    #[test]
    fn test_auction_picks_lowest_bid() {
        let mesh = builtin_mesh("pulse").unwrap();
        let mut auction = MinBidAuction::from_mesh(&mesh);
        let mut rng = rng();
        for _ in 0..20 {
            let Monetization::Auction {
                bid,
                clearing,
                bidders,
                ..
            } = auction.settle(&mut rng).unwrap()
            else {
                panic!("expected an auction outcome");
            };
            assert_eq!(bidders, mesh.agents.len());
            assert!(bid <= clearing);
            assert!(bid >= 2.5);
        }
    }

    #[test]
    fn test_auction_without_bidders_fails() {
        let mut auction = MinBidAuction::new("pulse", Vec::new(), 2.5);
        assert!(matches!(
            auction.settle(&mut rng()),
            Err(MonetizationError::NoBidders { .. })
        ));
    }

    #[test]
    fn test_huge_reserve_is_clamped() {
        let bidders = vec!["atlas".to_string(), "beacon".to_string()];
        let mut auction = MinBidAuction::new("pulse", bidders, f64::MAX / 2.0);
        let Monetization::Auction { bid, clearing, .. } = auction.settle(&mut rng()).unwrap()
        else {
            panic!("expected an auction outcome");
        };
        assert!(bid.is_finite() && clearing.is_finite());
        assert!(bid >= MAX_RESERVE);
        assert_eq!(round4(f64::MAX), f64::MAX);

        let mut mesh = MeshDef::single("pulse", "pulse").with_agents(&["atlas"]);
        mesh.policies
            .insert("reserve_price".into(), serde_json::json!(1e308));
        assert!(MinBidAuction::from_mesh(&mesh).settle(&mut rng()).is_ok());
    }

    #[test]
    fn test_quota_moves_through_tiers() {
        let mut quota = SaasQuota::standard("weave");
        let mut rng = rng();
        let mut tiers = Vec::new();
        for _ in 0..40 {
            if let Monetization::Saas { tier, .. } = quota.settle(&mut rng).unwrap() {
                tiers.push(tier);
            }
        }
        assert_eq!(tiers.first().map(String::as_str), Some("starter"));
        assert_eq!(tiers.last().map(String::as_str), Some("growth"));
    }

    #[test]
    fn test_bounded_quota_runs_out() {
        let mut quota = SaasQuota::new(
            "weave",
            vec![Tier {
                name: "tiny".into(),
                limit: Some(100),
                unit_price: 1.0,
            }],
        );
        assert!(matches!(
            quota.settle(&mut rng()),
            Err(MonetizationError::NoTier { .. })
        ));
    }

    #[test]
    fn test_totals() {
        let totals = Totals {
            revenue: 150.0,
            cost: 100.0,
        };
        let summary = totals.summary();
        assert_eq!(summary.gm, 0.3333);
        assert_eq!(summary.roi, 0.5);
        assert_eq!(Totals::default().summary().gm, 0.0);
    }

    #[test]
    fn test_only_builtin_meshes_monetize() {
        assert!(for_mesh(&builtin_mesh("drip").unwrap()).is_some());
        assert!(for_mesh(&MeshDef::single("solo", "act")).is_none());
    }
}
