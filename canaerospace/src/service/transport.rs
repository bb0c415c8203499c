//! Service channel <-> message id mapping, shared by every node service.

use crate::error::{Error, Result};
use crate::types::{message_id_range, service_channel_range};

/// Is `service_channel` one of the 52 channels the standard defines (0..=35, 100..=115)?
pub fn is_valid_service_channel(service_channel: u8) -> bool {
    service_channel_range::HIGH.contains(&service_channel) || service_channel_range::LOW.contains(&service_channel)
}

/// Message id carrying a request (or, if `is_request` is false, a response) on `service_channel`.
///
/// Grounded on `canasServiceChannelToMessageID`: each channel owns a pair of adjacent
/// message ids, the even one for requests and the odd one for responses.
pub fn channel_to_message_id(service_channel: u8, is_request: bool) -> Result<u16> {
    if service_channel_range::HIGH.contains(&service_channel) {
        let base = 128 + service_channel as u16 * 2;
        return Ok(if is_request { base } else { base + 1 });
    }
    if service_channel_range::LOW.contains(&service_channel) {
        let offset = service_channel - *service_channel_range::LOW.start();
        let base = 2000 + offset as u16 * 2;
        return Ok(if is_request { base } else { base + 1 });
    }
    Err(Error::BadServiceChan)
}

/// Inverse of [`channel_to_message_id`]: recover `(service_channel, is_request)` from a
/// node-service message id.
///
/// Grounded on `_serviceChannelFromMessageID`.
pub fn message_id_to_channel(msg_id: u16) -> Result<(u8, bool)> {
    if message_id_range::NODE_SERVICE_HIGH.contains(&msg_id) {
        let is_request = msg_id & 1 == 0;
        let channel = (msg_id & !1u16) - 128;
        return Ok(((channel / 2) as u8, is_request));
    }
    if message_id_range::NODE_SERVICE_LOW.contains(&msg_id) {
        let is_request = msg_id & 1 == 0;
        let channel = (msg_id & !1u16) - 2000;
        return Ok((*service_channel_range::LOW.start() + (channel / 2) as u8, is_request));
    }
    Err(Error::BadMessageId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_channel_round_trips() {
        let req = channel_to_message_id(5, true).unwrap();
        let resp = channel_to_message_id(5, false).unwrap();
        assert_eq!(req, 138);
        assert_eq!(resp, 139);
        assert_eq!(message_id_to_channel(req).unwrap(), (5, true));
        assert_eq!(message_id_to_channel(resp).unwrap(), (5, false));
    }

    #[test]
    fn low_channel_round_trips() {
        let req = channel_to_message_id(100, true).unwrap();
        assert_eq!(req, 2000);
        assert_eq!(message_id_to_channel(req).unwrap(), (100, true));
        assert_eq!(message_id_to_channel(2031).unwrap(), (115, false));
    }

    #[test]
    fn channel_out_of_range_is_rejected() {
        assert_eq!(channel_to_message_id(36, true), Err(Error::BadServiceChan));
        assert_eq!(channel_to_message_id(99, true), Err(Error::BadServiceChan));
    }

    #[test]
    fn validity_check_matches_both_ranges() {
        assert!(is_valid_service_channel(0));
        assert!(is_valid_service_channel(35));
        assert!(is_valid_service_channel(100));
        assert!(is_valid_service_channel(115));
        assert!(!is_valid_service_channel(36));
        assert!(!is_valid_service_channel(116));
    }
}
