//! Generic Redundancy Resolver: picks which of several redundant channels carrying the
//! same logical value is currently authoritative.

use crate::error::{Error, Result};
use crate::time::Timestamp;

/// Why [`GenericRedundancyResolver::update`] moved the active channel, if it did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwitchReason {
    /// The active channel did not change.
    None,
    /// First update since the resolver was created or last overridden.
    Init,
    /// The previously active channel went quiet for longer than `channel_timeout_usec`.
    Timeout,
    /// `redund_chan` reported a figure of merit better than the active channel's by more
    /// than the configured hysteresis, and the minimum switch interval had elapsed.
    Fom,
}

/// Resolver configuration. Grounded on `CanasGrrConfig`.
///
/// [`GrrConfig::default`] mirrors `canasGrrMakeConfig`: `fom_hysteresis` is left `NaN` so
/// the config is intentionally invalid until the embedder sets a concrete hysteresis or
/// switch interval. Pass the result to [`GrrConfig::validate`] before use.
#[derive(Copy, Clone, Debug)]
pub struct GrrConfig {
    pub fom_hysteresis: f32,
    pub min_fom_switch_interval_usec: u64,
    pub channel_timeout_usec: u64,
}

impl Default for GrrConfig {
    fn default() -> Self {
        GrrConfig { fom_hysteresis: f32::NAN, min_fom_switch_interval_usec: 0, channel_timeout_usec: 0 }
    }
}

impl GrrConfig {
    /// Grounded on `_isConfigOk`. At least one of `fom_hysteresis` or
    /// `min_fom_switch_interval_usec` must be nonzero, or the resolver would never be able
    /// to distinguish "no preference configured" from "switch on any FOM improvement".
    pub fn validate(&self) -> Result<()> {
        if self.channel_timeout_usec < 1 {
            return Err(Error::Argument);
        }
        if !self.fom_hysteresis.is_finite() || self.fom_hysteresis < 0.0 {
            return Err(Error::Argument);
        }
        if self.fom_hysteresis == 0.0 && self.min_fom_switch_interval_usec == 0 {
            return Err(Error::Argument);
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct ChannelState {
    fom: f32,
    last_update: Timestamp,
}

/// Tracks the figure of merit and recency of up to `REDUND_CHANNELS` redundant sources of
/// the same value, and decides which one the application should trust.
///
/// Grounded on `generic_redundancy_resolver.c`. `REDUND_CHANNELS` here plays the role of
/// the original's runtime `num_channels` field, moved to compile time.
pub struct GenericRedundancyResolver<const REDUND_CHANNELS: usize> {
    config: GrrConfig,
    active_channel: u8,
    last_switch: Timestamp,
    channels: [ChannelState; REDUND_CHANNELS],
}

impl<const REDUND_CHANNELS: usize> GenericRedundancyResolver<REDUND_CHANNELS> {
    pub fn new(config: GrrConfig) -> Result<Self> {
        config.validate()?;
        if REDUND_CHANNELS < 1 {
            return Err(Error::Argument);
        }
        Ok(GenericRedundancyResolver {
            config,
            active_channel: 0,
            last_switch: Timestamp::ZERO,
            channels: [ChannelState::default(); REDUND_CHANNELS],
        })
    }

    /// Currently authoritative channel. `0` by default.
    pub fn active_channel(&self) -> u8 {
        self.active_channel
    }

    /// Timestamp of the last channel switch, or `Timestamp::ZERO` if none has happened yet.
    pub fn last_switch_timestamp(&self) -> Timestamp {
        self.last_switch
    }

    /// Force the active channel without going through the usual FOM/timeout arbitration.
    ///
    /// Note this does not fire [`SwitchReason::Init`] on the following `update`, since the
    /// override already counts as a switch, matching `canasGrrOverrideActiveChannel`.
    pub fn override_active_channel(&mut self, redund_chan: u8, timestamp: Timestamp) -> Result<()> {
        if redund_chan as usize >= REDUND_CHANNELS {
            return Err(Error::BadRedundChan);
        }
        self.active_channel = redund_chan;
        self.last_switch = timestamp;
        Ok(())
    }

    /// Last reported figure of merit and update timestamp for `redund_chan`.
    pub fn channel_state(&self, redund_chan: u8) -> Result<(f32, Timestamp)> {
        if redund_chan as usize >= REDUND_CHANNELS {
            return Err(Error::BadRedundChan);
        }
        let c = self.channels[redund_chan as usize];
        Ok((c.fom, c.last_update))
    }

    /// Record a fresh figure of merit for `redund_chan` and re-run switch arbitration.
    ///
    /// Grounded on `canasGrrUpdate`. `fom == NaN` is treated as the worst possible finite
    /// value rather than propagated, since NaN comparisons would otherwise make that
    /// channel neither better nor worse than anything.
    pub fn update(&mut self, redund_chan: u8, fom: f32, timestamp: Timestamp) -> Result<SwitchReason> {
        if redund_chan as usize >= REDUND_CHANNELS {
            return Err(Error::BadRedundChan);
        }
        if timestamp == Timestamp::ZERO {
            return Err(Error::Argument);
        }

        let fom = if fom.is_nan() { -f32::MAX } else { fom };
        self.channels[redund_chan as usize] = ChannelState { fom, last_update: timestamp };

        let active_idx = self.active_channel as usize;
        let updating = self.channels[redund_chan as usize];
        let active = self.channels[active_idx];

        let mut reason = SwitchReason::None;

        if self.last_switch == Timestamp::ZERO {
            reason = SwitchReason::Init;
        }

        if reason == SwitchReason::None && redund_chan as usize != active_idx {
            let threshold = active.last_update.saturating_add(self.config.channel_timeout_usec);
            if updating.last_update > threshold {
                reason = SwitchReason::Timeout;
            }
        }

        if reason == SwitchReason::None && redund_chan as usize != active_idx {
            let fom_threshold = active.fom + self.config.fom_hysteresis;
            let dead_time = self.last_switch.saturating_add(self.config.min_fom_switch_interval_usec);
            if updating.fom > fom_threshold && timestamp >= dead_time {
                reason = SwitchReason::Fom;
            }
        }

        if reason != SwitchReason::None {
            log::trace!(
                "canaerospace: grr selecting {}[{}] -> {redund_chan}[{}] reason={reason:?}",
                self.active_channel,
                active.fom,
                updating.fom
            );
            self.active_channel = redund_chan;
            self.last_switch = timestamp;
        }
        Ok(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Channel timeout set far longer than any timestamp used below, so these tests
    /// exercise the FOM-hysteresis path without the timeout rule also firing.
    fn config() -> GrrConfig {
        GrrConfig { fom_hysteresis: 1.0, min_fom_switch_interval_usec: 1_000_000, channel_timeout_usec: 100_000_000 }
    }

    #[test]
    fn default_config_fails_validation() {
        assert_eq!(GrrConfig::default().validate(), Err(Error::Argument));
    }

    #[test]
    fn config_needs_hysteresis_or_switch_interval() {
        let cfg = GrrConfig { fom_hysteresis: 0.0, min_fom_switch_interval_usec: 0, channel_timeout_usec: 1 };
        assert_eq!(cfg.validate(), Err(Error::Argument));
    }

    #[test]
    fn first_update_reports_init() {
        let mut grr: GenericRedundancyResolver<3> = GenericRedundancyResolver::new(config()).unwrap();
        assert_eq!(grr.update(0, 10.0, Timestamp(1_000)).unwrap(), SwitchReason::Init);
        assert_eq!(grr.active_channel(), 0);
    }

    #[test]
    fn better_fom_switches_after_dead_time() {
        let mut grr: GenericRedundancyResolver<3> = GenericRedundancyResolver::new(config()).unwrap();
        grr.update(0, 10.0, Timestamp(1_000)).unwrap();

        // Well within the hysteresis margin: no switch.
        assert_eq!(grr.update(1, 10.5, Timestamp(1_000_500)).unwrap(), SwitchReason::None);

        // Comfortably better, but the minimum switch interval has not elapsed since the
        // last switch (still at t=1_000).
        assert_eq!(grr.update(1, 20.0, Timestamp(1_000_999)).unwrap(), SwitchReason::None);

        // Same improvement, now past the dead time.
        assert_eq!(grr.update(1, 20.0, Timestamp(1_001_000)).unwrap(), SwitchReason::Fom);
        assert_eq!(grr.active_channel(), 1);
    }

    #[test]
    fn stale_active_channel_times_out() {
        let cfg = GrrConfig { fom_hysteresis: 1.0, min_fom_switch_interval_usec: 1_000_000, channel_timeout_usec: 500_000 };
        let mut grr: GenericRedundancyResolver<3> = GenericRedundancyResolver::new(cfg).unwrap();
        grr.update(0, 10.0, Timestamp(1_000)).unwrap();
        assert_eq!(grr.update(1, 1.0, Timestamp(600_000)).unwrap(), SwitchReason::Timeout);
        assert_eq!(grr.active_channel(), 1);
    }

    #[test]
    fn nan_fom_is_treated_as_worst_possible() {
        let mut grr: GenericRedundancyResolver<2> = GenericRedundancyResolver::new(config()).unwrap();
        grr.update(0, 10.0, Timestamp(1_000)).unwrap();
        grr.update(1, f32::NAN, Timestamp(2_000_000)).unwrap();
        let (fom, _) = grr.channel_state(1).unwrap();
        assert_eq!(fom, -f32::MAX);
        assert_eq!(grr.active_channel(), 0);
    }

    #[test]
    fn override_bypasses_arbitration_and_suppresses_the_next_init() {
        let mut grr: GenericRedundancyResolver<3> = GenericRedundancyResolver::new(config()).unwrap();
        grr.override_active_channel(2, Timestamp(500)).unwrap();
        assert_eq!(grr.active_channel(), 2);
        assert_ne!(grr.update(0, 1.0, Timestamp(501)).unwrap(), SwitchReason::Init);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let mut grr: GenericRedundancyResolver<2> = GenericRedundancyResolver::new(config()).unwrap();
        assert_eq!(grr.update(2, 1.0, Timestamp(1)), Err(Error::BadRedundChan));
    }
}
