// 4.0: the three liquidity slots the vault owns on the exchange.
// floor sits at the intrinsic minimum value, anchor sits on top of it and
// discovery above that. 4.1 has the layout check at the bottom.

use crate::types::{Liquidity, Price, Tick};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Floor,
    Anchor,
    Discovery,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Floor, Slot::Anchor, Slot::Discovery];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Floor => write!(f, "floor"),
            Slot::Anchor => write!(f, "anchor"),
            Slot::Discovery => write!(f, "discovery"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub lower: Tick,
    pub upper: Tick,
    pub liquidity: Liquidity,
    // price at `lower` when the range was minted
    pub reference_price: Price,
}

impl LiquidityPosition {
    pub fn new(lower: Tick, upper: Tick, liquidity: Liquidity, reference_price: Price) -> Self {
        Self {
            lower,
            upper,
            liquidity,
            reference_price,
        }
    }

    pub fn width(&self) -> i32 {
        self.upper.0 - self.lower.0
    }

    pub fn contains(&self, tick: Tick) -> bool {
        tick >= self.lower && tick < self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("{0} position not deployed")]
    NotDeployed(Slot),

    #[error("{0} position has zero liquidity")]
    ZeroLiquidity(Slot),

    #[error("{slot} range is empty: [{lower}, {upper})")]
    EmptyRange { slot: Slot, lower: Tick, upper: Tick },

    #[error("Floor upper {floor_upper} does not meet anchor lower {anchor_lower}")]
    FloorAnchorGap { floor_upper: Tick, anchor_lower: Tick },

    #[error("Anchor upper {anchor_upper} overlaps discovery lower {discovery_lower}")]
    AnchorDiscoveryOverlap { anchor_upper: Tick, discovery_lower: Tick },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionLedger {
    floor: Option<LiquidityPosition>,
    anchor: Option<LiquidityPosition>,
    discovery: Option<LiquidityPosition>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<&LiquidityPosition> {
        match slot {
            Slot::Floor => self.floor.as_ref(),
            Slot::Anchor => self.anchor.as_ref(),
            Slot::Discovery => self.discovery.as_ref(),
        }
    }

    pub fn require(&self, slot: Slot) -> Result<&LiquidityPosition, PositionError> {
        self.get(slot).ok_or(PositionError::NotDeployed(slot))
    }

    pub fn set(&mut self, slot: Slot, position: LiquidityPosition) {
        *self.slot_mut(slot) = Some(position);
    }

    pub fn take(&mut self, slot: Slot) -> Option<LiquidityPosition> {
        self.slot_mut(slot).take()
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<LiquidityPosition> {
        match slot {
            Slot::Floor => &mut self.floor,
            Slot::Anchor => &mut self.anchor,
            Slot::Discovery => &mut self.discovery,
        }
    }

    pub fn floor(&self) -> Option<&LiquidityPosition> {
        self.floor.as_ref()
    }

    pub fn anchor(&self) -> Option<&LiquidityPosition> {
        self.anchor.as_ref()
    }

    pub fn discovery(&self) -> Option<&LiquidityPosition> {
        self.discovery.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.floor.is_some() && self.anchor.is_some() && self.discovery.is_some()
    }

    // 4.1: floor.upper == anchor.lower, anchor.upper <= discovery.lower,
    // every range non-empty with liquidity > 0.
    pub fn check_layout(&self) -> Result<(), PositionError> {
        for slot in Slot::ALL {
            let p = self.require(slot)?;
            if p.upper <= p.lower {
                return Err(PositionError::EmptyRange {
                    slot,
                    lower: p.lower,
                    upper: p.upper,
                });
            }
            if p.liquidity.is_zero() {
                return Err(PositionError::ZeroLiquidity(slot));
            }
        }

        let floor = self.require(Slot::Floor)?;
        let anchor = self.require(Slot::Anchor)?;
        let discovery = self.require(Slot::Discovery)?;

        if floor.upper != anchor.lower {
            return Err(PositionError::FloorAnchorGap {
                floor_upper: floor.upper,
                anchor_lower: anchor.lower,
            });
        }
        if anchor.upper > discovery.lower {
            return Err(PositionError::AnchorDiscoveryOverlap {
                anchor_upper: anchor.upper,
                discovery_lower: discovery.lower,
            });
        }
        Ok(())
    }
}
