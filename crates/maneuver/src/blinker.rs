//! Driver and navigation blinker fusion

use crate::input::{AtcType, NavCommand, NavigationHint, VehicleState};
use crate::types::BlinkerState;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Navigation hint lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AtcStatus {
    #[default]
    Idle,
    /// Hint is driving the blinker
    Active,
    /// Hint conflicted with the driver and is ignored until the driver blinker clears
    Voided,
}

/// Fused blinker view for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlinkerOutput {
    pub driver: BlinkerState,
    pub driver_changed: bool,
    pub driver_enabled: bool,
    pub nav: BlinkerState,
    pub nav_enabled: bool,
    /// Driver blinker when enabled, otherwise the navigation one
    pub effective: BlinkerState,
    pub desire_enabled: bool,
}

/// Combines the driver stalk with navigation hints
#[derive(Debug, Clone)]
pub struct BlinkerFusion {
    driver: BlinkerState,
    command_blinker: BlinkerState,
    command_hold: u32,
    hold_ticks: u32,
    last_command_index: i64,
    atc_type: AtcType,
    status: AtcStatus,
    ignore: bool,
}

impl BlinkerFusion {
    /// `hold_ticks`: how long a one-shot lane-change command holds its direction
    pub fn new(hold_ticks: u32) -> Self {
        Self {
            driver: BlinkerState::None,
            command_blinker: BlinkerState::None,
            command_hold: 0,
            hold_ticks,
            last_command_index: 0,
            atc_type: AtcType::None,
            status: AtcStatus::Idle,
            ignore: false,
        }
    }

    pub fn status(&self) -> AtcStatus {
        self.status
    }

    /// Navigation hints are being ignored after a driver cancel
    pub fn is_ignoring(&self) -> bool {
        self.ignore
    }

    /// Ignore navigation hints until the driver blinker clears
    pub fn ignore_until_cleared(&mut self) {
        self.ignore = true;
    }

    /// A one-shot lane-change command is still holding its direction
    pub fn command_pending(&self) -> bool {
        self.command_hold > 0
    }

    pub fn update(
        &mut self,
        vehicle: &VehicleState,
        nav: &NavigationHint,
        need_torque: i64,
    ) -> BlinkerOutput {
        self.command_hold = self.command_hold.saturating_sub(1);

        let driver = BlinkerState::from_lamps(vehicle.left_blinker, vehicle.right_blinker);
        let driver_changed = driver != self.driver;
        self.driver = driver;
        let driver_enabled = driver.is_directional() && need_torque >= 0;

        if driver == BlinkerState::None && self.status == AtcStatus::Voided {
            self.status = AtcStatus::Idle;
        }

        let mut nav_blinker = self.navigation_blinker(nav);

        if driver != BlinkerState::None
            && nav_blinker != BlinkerState::None
            && driver != nav_blinker
        {
            debug!(?driver, nav = ?nav_blinker, "navigation hint conflicts with driver, voiding");
            nav_blinker = BlinkerState::None;
            self.status = AtcStatus::Voided;
        }

        let mut nav_enabled = nav_blinker.is_directional();

        if driver == BlinkerState::None {
            self.ignore = false;
        }
        if self.ignore {
            nav_blinker = BlinkerState::None;
            nav_enabled = false;
        }

        // A fresh hint type is held back for one tick
        if self.atc_type != nav.atc {
            nav_enabled = false;
        }
        self.atc_type = nav.atc;

        BlinkerOutput {
            driver,
            driver_changed,
            driver_enabled,
            nav: nav_blinker,
            nav_enabled,
            effective: if driver_enabled { driver } else { nav_blinker },
            desire_enabled: driver_enabled || nav_enabled,
        }
    }

    fn navigation_blinker(&mut self, nav: &NavigationHint) -> BlinkerState {
        if self.command_hold > 0 {
            return self.command_blinker;
        }
        if nav.command_index != self.last_command_index {
            if let Some(NavCommand::LaneChange(side)) = nav.command() {
                self.last_command_index = nav.command_index;
                self.command_hold = self.hold_ticks;
                self.command_blinker = side.into();
                return self.command_blinker;
            }
        }

        match nav.atc.side() {
            Some(side) if self.status != AtcStatus::Voided => {
                if nav.atc.is_turn() {
                    self.ignore = false;
                }
                self.status = AtcStatus::Active;
                side.into()
            }
            Some(_) => BlinkerState::None,
            None => {
                self.status = AtcStatus::Idle;
                BlinkerState::None
            }
        }
    }

    /// Retune the command hold; a hold already running keeps its remaining ticks
    pub fn set_hold_ticks(&mut self, hold_ticks: u32) {
        self.hold_ticks = hold_ticks;
    }
}
